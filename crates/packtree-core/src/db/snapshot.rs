//! Save and load a whole [`Warehouse`] to and from the project database.
//!
//! A save replaces every row inside one transaction, so the database always
//! holds a consistent snapshot. Loading rebuilds derived tree data (children,
//! direct quants, depths) from the stored parent pointers.

use anyhow::{Context, Result};
use rusqlite::{Connection, Row, params};
use tracing::debug;

use super::{from_sql_id, to_sql_id};
use crate::collection::{DEFAULT_BATCH_SIZE, sliced};
use crate::config::WarehouseConfig;
use crate::hierarchy::links::LinkLedger;
use crate::hierarchy::movement::MoveLineStore;
use crate::hierarchy::store::PackageStore;
use crate::model::{
    HierarchyLink, LinkId, Location, LocationId, LotId, MoveId, MoveLine, MoveLineId, Package,
    PackageId, PickingId, ProductId, Quant, QuantId,
};
use crate::warehouse::Warehouse;

fn opt_id(id: Option<u64>) -> rusqlite::Result<Option<i64>> {
    id.map(to_sql_id).transpose()
}

fn read_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    from_sql_id(idx, row.get(idx)?)
}

fn read_opt_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|raw| from_sql_id(idx, raw))
        .transpose()
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Replace the stored snapshot with `warehouse`.
///
/// # Errors
///
/// Returns an error if any statement fails; the previous snapshot is kept.
pub fn save_warehouse(conn: &mut Connection, warehouse: &Warehouse) -> Result<()> {
    let tx = conn.transaction().context("begin snapshot transaction")?;

    for table in [
        "link_move_lines",
        "hierarchy_links",
        "move_lines",
        "quants",
        "packages",
        "locations",
    ] {
        tx.execute(&format!("DELETE FROM {table}"), [])
            .with_context(|| format!("clear {table}"))?;
    }

    let store = warehouse.packages();

    {
        let mut stmt = tx.prepare_cached("INSERT INTO locations (location_id, name) VALUES (?1, ?2)")?;
        for location in store.locations() {
            stmt.execute(params![to_sql_id(location.id.get())?, location.name])
                .with_context(|| format!("insert location {}", location.id))?;
        }
    }

    let packages: Vec<&Package> = store.packages().collect();
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO packages (package_id, name, parent_id) VALUES (?1, ?2, ?3)",
        )?;
        for slice in sliced(&packages, DEFAULT_BATCH_SIZE) {
            for pkg in slice {
                stmt.execute(params![
                    to_sql_id(pkg.id().get())?,
                    pkg.name(),
                    opt_id(pkg.parent().map(PackageId::get))?,
                ])
                .with_context(|| format!("insert package {}", pkg.id()))?;
            }
            debug!(rows = slice.len(), "packages written");
        }
    }

    let quants: Vec<&Quant> = store.quants().collect();
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO quants (
                quant_id, product, lot, location_id, package_id, quantity, reserved_quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for slice in sliced(&quants, DEFAULT_BATCH_SIZE) {
            for quant in slice {
                stmt.execute(params![
                    to_sql_id(quant.id.get())?,
                    quant.product.as_str(),
                    quant.lot.as_ref().map(LotId::as_str),
                    to_sql_id(quant.location.get())?,
                    opt_id(quant.package.map(PackageId::get))?,
                    quant.quantity,
                    quant.reserved_quantity,
                ])
                .with_context(|| format!("insert quant {}", quant.id))?;
            }
            debug!(rows = slice.len(), "quants written");
        }
    }

    let lines: Vec<&MoveLine> = warehouse.move_lines().iter().collect();
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO move_lines (
                move_line_id, move_id, picking_id, product, lot,
                source_location_id, destination_location_id,
                source_package_id, destination_package_id, result_parent_package_id,
                quantity, quantity_done, selected, done
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )?;
        for slice in sliced(&lines, DEFAULT_BATCH_SIZE) {
            for line in slice {
                stmt.execute(params![
                    to_sql_id(line.id.get())?,
                    opt_id(line.move_id.map(MoveId::get))?,
                    opt_id(line.picking.map(PickingId::get))?,
                    line.product.as_str(),
                    line.lot.as_ref().map(LotId::as_str),
                    to_sql_id(line.source_location.get())?,
                    to_sql_id(line.destination_location.get())?,
                    opt_id(line.source_package.map(PackageId::get))?,
                    opt_id(line.destination_package.map(PackageId::get))?,
                    opt_id(line.result_parent_package.map(PackageId::get))?,
                    line.quantity,
                    line.quantity_done,
                    line.selected,
                    line.done,
                ])
                .with_context(|| format!("insert move line {}", line.id))?;
            }
            debug!(rows = slice.len(), "move lines written");
        }
    }

    let links: Vec<&HierarchyLink> = warehouse.links().iter().collect();
    {
        let mut link_stmt = tx.prepare_cached(
            "INSERT INTO hierarchy_links (link_id, parent_id, child_id, created_at_us)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut line_stmt = tx.prepare_cached(
            "INSERT INTO link_move_lines (link_id, move_line_id) VALUES (?1, ?2)",
        )?;
        for slice in sliced(&links, DEFAULT_BATCH_SIZE) {
            for link in slice {
                let link_id = to_sql_id(link.id.get())?;
                link_stmt
                    .execute(params![
                        link_id,
                        opt_id(link.parent.map(PackageId::get))?,
                        to_sql_id(link.child.get())?,
                        link.created_at_us,
                    ])
                    .with_context(|| format!("insert link {}", link.id))?;
                for line in &link.move_lines {
                    line_stmt.execute(params![link_id, to_sql_id(line.get())?])?;
                }
            }
            debug!(rows = slice.len(), "links written");
        }
    }

    tx.execute(
        "UPDATE store_meta SET last_saved_at_us = ?1 WHERE id = 1",
        params![chrono::Utc::now().timestamp_micros()],
    )
    .context("update store metadata")?;
    tx.commit().context("commit snapshot")?;

    debug!(
        packages = packages.len(),
        quants = quants.len(),
        move_lines = lines.len(),
        links = links.len(),
        "warehouse saved"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load the stored snapshot into a [`Warehouse`] using `config`.
///
/// # Errors
///
/// Returns an error if a query fails or the stored tree is inconsistent
/// (dangling references or a parent cycle).
pub fn load_warehouse(conn: &Connection, config: WarehouseConfig) -> Result<Warehouse> {
    let locations = load_locations(conn).context("load locations")?;
    let packages = load_packages(conn).context("load packages")?;
    let quants = load_quants(conn).context("load quants")?;
    let lines = load_move_lines(conn).context("load move lines")?;
    let links = load_links(conn).context("load hierarchy links")?;

    let store = PackageStore::restore(config, locations, packages, quants)
        .context("rebuild package tree")?;

    debug!(
        packages = store.packages().count(),
        move_lines = lines.len(),
        links = links.len(),
        "warehouse loaded"
    );
    Ok(Warehouse::from_parts(
        store,
        LinkLedger::restore(links),
        MoveLineStore::restore(lines),
    ))
}

fn load_locations(conn: &Connection) -> rusqlite::Result<Vec<Location>> {
    let mut stmt = conn.prepare("SELECT location_id, name FROM locations ORDER BY location_id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Location {
            id: LocationId(read_id(row, 0)?),
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

fn load_packages(conn: &Connection) -> rusqlite::Result<Vec<(PackageId, String, Option<PackageId>)>> {
    let mut stmt =
        conn.prepare("SELECT package_id, name, parent_id FROM packages ORDER BY package_id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            PackageId(read_id(row, 0)?),
            row.get(1)?,
            read_opt_id(row, 2)?.map(PackageId),
        ))
    })?;
    rows.collect()
}

fn load_quants(conn: &Connection) -> rusqlite::Result<Vec<Quant>> {
    let mut stmt = conn.prepare(
        "SELECT quant_id, product, lot, location_id, package_id, quantity, reserved_quantity
         FROM quants ORDER BY quant_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Quant {
            id: QuantId(read_id(row, 0)?),
            product: ProductId(row.get(1)?),
            lot: row.get::<_, Option<String>>(2)?.map(LotId),
            location: LocationId(read_id(row, 3)?),
            package: read_opt_id(row, 4)?.map(PackageId),
            quantity: row.get(5)?,
            reserved_quantity: row.get(6)?,
        })
    })?;
    rows.collect()
}

fn load_move_lines(conn: &Connection) -> rusqlite::Result<Vec<MoveLine>> {
    let mut stmt = conn.prepare(
        "SELECT move_line_id, move_id, picking_id, product, lot,
                source_location_id, destination_location_id,
                source_package_id, destination_package_id, result_parent_package_id,
                quantity, quantity_done, selected, done
         FROM move_lines ORDER BY move_line_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(MoveLine {
            id: MoveLineId(read_id(row, 0)?),
            move_id: read_opt_id(row, 1)?.map(MoveId),
            picking: read_opt_id(row, 2)?.map(PickingId),
            product: ProductId(row.get(3)?),
            lot: row.get::<_, Option<String>>(4)?.map(LotId),
            source_location: LocationId(read_id(row, 5)?),
            destination_location: LocationId(read_id(row, 6)?),
            source_package: read_opt_id(row, 7)?.map(PackageId),
            destination_package: read_opt_id(row, 8)?.map(PackageId),
            result_parent_package: read_opt_id(row, 9)?.map(PackageId),
            quantity: row.get(10)?,
            quantity_done: row.get(11)?,
            selected: row.get(12)?,
            done: row.get(13)?,
        })
    })?;
    rows.collect()
}

fn load_links(conn: &Connection) -> rusqlite::Result<Vec<HierarchyLink>> {
    let mut stmt = conn.prepare(
        "SELECT link_id, parent_id, child_id, created_at_us
         FROM hierarchy_links ORDER BY link_id",
    )?;
    let mut links: Vec<HierarchyLink> = stmt
        .query_map([], |row| {
            Ok(HierarchyLink {
                id: LinkId(read_id(row, 0)?),
                parent: read_opt_id(row, 1)?.map(PackageId),
                child: PackageId(read_id(row, 2)?),
                move_lines: std::collections::BTreeSet::new(),
                created_at_us: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare(
        "SELECT link_id, move_line_id FROM link_move_lines ORDER BY link_id, move_line_id",
    )?;
    let pairs = stmt
        .query_map([], |row| {
            Ok((LinkId(read_id(row, 0)?), MoveLineId(read_id(row, 1)?)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for (link_id, line_id) in pairs {
        if let Some(link) = links.iter_mut().find(|l| l.id == link_id) {
            link.move_lines.insert(line_id);
        }
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_store;
    use crate::hierarchy::error::HierarchyError;
    use crate::model::{LinkDraft, MoveLineDraft, QuantDraft};

    fn sample() -> Warehouse {
        let mut wh = Warehouse::new(WarehouseConfig::with_max_depth(3));
        let l1 = wh.add_location("L1").expect("location");
        let l2 = wh.add_location("L2").expect("location");
        let pallet = wh.create_package(Some("PALLET")).expect("package");
        let bx = wh.create_package(Some("BOX")).expect("package");
        let loose = wh.create_package(None).expect("package");
        wh.set_parent(bx, Some(pallet)).expect("nest");
        wh.add_quant(
            QuantDraft::new(ProductId::new("apple"), 5.0, l1)
                .in_package(bx)
                .with_lot(LotId::new("LOT-1")),
        )
        .expect("quant");
        let line = wh
            .add_move_line(
                MoveLineDraft::new(ProductId::new("apple"), 5.0, l1, l2)
                    .in_package(bx)
                    .of_move(MoveId(1))
                    .of_picking(PickingId(1)),
            )
            .expect("line");
        wh.move_lines_mut()
            .set_quantity_done(line, 5.0)
            .expect("done qty");
        wh.create_links(vec![
            LinkDraft::link(loose, bx).with_move_lines([line]),
            LinkDraft::unlink(pallet),
        ])
        .expect("links");
        wh
    }

    #[test]
    fn save_then_load_restores_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut conn = open_store(&dir.path().join("packtree.db")).expect("open");
        let wh = sample();

        save_warehouse(&mut conn, &wh).expect("save");
        let loaded = load_warehouse(&conn, WarehouseConfig::with_max_depth(3)).expect("load");

        assert_eq!(loaded, wh);
        let bx = loaded.packages().find_by_name("BOX").expect("box");
        assert_eq!(loaded.packages().display_name(bx).expect("name"), "PALLET/BOX");
        assert_eq!(loaded.packages().depth(loaded.packages().top_or_self(bx)), 2);
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut conn = open_store(&dir.path().join("packtree.db")).expect("open");

        save_warehouse(&mut conn, &sample()).expect("first save");
        let mut smaller = Warehouse::new(WarehouseConfig::default());
        smaller.create_package(Some("ONLY")).expect("package");
        save_warehouse(&mut conn, &smaller).expect("second save");

        let loaded = load_warehouse(&conn, WarehouseConfig::default()).expect("load");
        assert_eq!(loaded.packages().packages().count(), 1);
        assert!(loaded.links().is_empty());
        assert!(loaded.move_lines().is_empty());

        let saved_at: i64 = conn
            .query_row("SELECT last_saved_at_us FROM store_meta WHERE id = 1", [], |row| row.get(0))
            .expect("meta");
        assert!(saved_at > 0);
    }

    #[test]
    fn names_rejected_at_mutation_time_keep_saves_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut conn = open_store(&dir.path().join("packtree.db")).expect("open");
        let mut wh = Warehouse::new(WarehouseConfig::default());

        wh.add_location("Shelf").expect("first shelf");
        let dup = wh.add_location(" Shelf ").expect_err("duplicate location");
        assert!(matches!(dup, HierarchyError::Precondition(_)));
        assert!(wh.add_location("  ").is_err());
        for blank in ["", "   "] {
            let err = wh.create_package(Some(blank)).expect_err("blank package");
            assert!(matches!(err, HierarchyError::Precondition(_)));
        }
        wh.create_package(Some("BOX")).expect("named");
        wh.create_package(Some("BOX")).expect("package names may repeat");
        wh.create_package(None).expect("sequence name");

        save_warehouse(&mut conn, &wh).expect("save");
        let loaded = load_warehouse(&conn, WarehouseConfig::default()).expect("load");
        assert_eq!(loaded, wh);
        assert_eq!(loaded.packages().locations().count(), 1);
    }

    #[test]
    fn load_rejects_stored_parent_cycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open_store(&dir.path().join("packtree.db")).expect("open");
        conn.execute_batch(
            "BEGIN;
             INSERT INTO packages (package_id, name, parent_id) VALUES (1, 'A', 2);
             INSERT INTO packages (package_id, name, parent_id) VALUES (2, 'B', 1);
             COMMIT;",
        )
        .expect("seed");

        let err = load_warehouse(&conn, WarehouseConfig::default()).expect_err("cycle");
        assert!(format!("{err:#}").contains("rebuild package tree"));
    }

    #[test]
    fn empty_database_loads_empty_warehouse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open_store(&dir.path().join("packtree.db")).expect("open");
        let loaded = load_warehouse(&conn, WarehouseConfig::default()).expect("load");
        assert_eq!(loaded, Warehouse::new(WarehouseConfig::default()));
    }
}
