//! Locating and opening a packtree project.

use anyhow::{Context as _, Result, bail};
use packtree_core::config::{self, PROJECT_DIR};
use packtree_core::db::{self, DB_FILE, query};
use packtree_core::model::{LocationId, PackageId};
use packtree_core::{HierarchyError, Warehouse};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An opened project: its database connection and the loaded warehouse.
pub struct Project {
    conn: Connection,
    pub warehouse: Warehouse,
}

pub fn db_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join(DB_FILE)
}

impl Project {
    /// Open the project rooted at `project_root`.
    ///
    /// # Errors
    ///
    /// Fails if the project has not been initialized, or loading fails.
    pub fn open(project_root: &Path) -> Result<Self> {
        let path = db_path(project_root);
        if !path.exists() {
            bail!(
                "no packtree project at {}.\n  Run `pkt init` to create one.",
                project_root.display()
            );
        }
        let settings = config::resolve_config(project_root)?;
        let conn = db::open_store(&path)?;
        let warehouse = db::load_warehouse(&conn, settings.warehouse)
            .with_context(|| format!("load project database {}", path.display()))?;
        debug!(path = %path.display(), "project opened");
        Ok(Self { conn, warehouse })
    }

    /// Apply `f` to the warehouse and save the result. Nothing is written
    /// when `f` fails.
    pub fn update<T>(
        &mut self,
        f: impl FnOnce(&mut Warehouse) -> Result<T, HierarchyError>,
    ) -> Result<T> {
        let value = self.warehouse.transaction(f)?;
        db::save_warehouse(&mut self.conn, &self.warehouse)?;
        Ok(value)
    }

    /// The saved snapshot. It matches `warehouse` between updates.
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Resolve a package reference: an exact name, or `#id`.
    pub fn package(&self, reference: &str) -> Result<PackageId> {
        if let Some(row) = query::package_by_name(&self.conn, reference)? {
            return Ok(row.package_id);
        }
        let packages = self.warehouse.packages();
        if reference.starts_with('#')
            && let Ok(id) = reference.parse::<PackageId>()
            && packages.contains(id)
        {
            return Ok(id);
        }
        Err(HierarchyError::NotFound {
            kind: "package",
            id: reference.to_string(),
        }
        .into())
    }

    pub fn location(&self, name: &str) -> Result<LocationId> {
        self.warehouse
            .packages()
            .location_by_name(name)
            .ok_or_else(|| {
                HierarchyError::NotFound {
                    kind: "location",
                    id: name.to_string(),
                }
                .into()
            })
    }
}
