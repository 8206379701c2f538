//! Read-only tree queries against a saved snapshot.
//!
//! These answer common questions without loading the whole warehouse. All
//! functions take a shared `&Connection` and return `anyhow::Result<T>`.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::{from_sql_id, to_sql_id};
use crate::model::PackageId;

/// A stored package row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRow {
    pub package_id: PackageId,
    pub name: String,
    pub parent_id: Option<PackageId>,
}

/// Upper bound on recursion so a corrupted parent cycle cannot spin forever.
const MAX_TREE_LEVELS: i64 = 1024;

/// Look up a package by exact name. Names are not unique; the lowest id
/// wins.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn package_by_name(conn: &Connection, name: &str) -> Result<Option<PackageRow>> {
    conn.query_row(
        "SELECT package_id, name, parent_id FROM packages
         WHERE name = ?1 ORDER BY package_id LIMIT 1",
        params![name],
        |row| {
            Ok(PackageRow {
                package_id: PackageId(from_sql_id(0, row.get(0)?)?),
                name: row.get(1)?,
                parent_id: row
                    .get::<_, Option<i64>>(2)?
                    .map(|raw| from_sql_id(2, raw).map(PackageId))
                    .transpose()?,
            })
        },
    )
    .optional()
    .with_context(|| format!("look up package '{name}'"))
}

/// Ancestors of `package`, nearest first, excluding the package itself.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn ancestor_ids(conn: &Connection, package: PackageId) -> Result<Vec<PackageId>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE up(id, level) AS (
             SELECT parent_id, 1 FROM packages WHERE package_id = ?1 AND parent_id IS NOT NULL
             UNION ALL
             SELECT p.parent_id, up.level + 1
             FROM packages p JOIN up ON p.package_id = up.id
             WHERE p.parent_id IS NOT NULL AND up.level < ?2
         )
         SELECT id FROM up ORDER BY level",
    )?;
    collect_ids(&mut stmt, package).with_context(|| format!("ancestors of package {package}"))
}

/// `package` and every package below it, breadth first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn descendant_ids(conn: &Connection, package: PackageId) -> Result<Vec<PackageId>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE down(id, level) AS (
             SELECT package_id, 0 FROM packages WHERE package_id = ?1
             UNION ALL
             SELECT p.package_id, down.level + 1
             FROM packages p JOIN down ON p.parent_id = down.id
             WHERE down.level < ?2
         )
         SELECT id FROM down ORDER BY level, id",
    )?;
    collect_ids(&mut stmt, package).with_context(|| format!("descendants of package {package}"))
}

fn collect_ids(stmt: &mut rusqlite::Statement<'_>, package: PackageId) -> Result<Vec<PackageId>> {
    let rows = stmt.query_map(params![to_sql_id(package.get())?, MAX_TREE_LEVELS], |row| {
        from_sql_id(0, row.get(0)?).map(PackageId)
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
