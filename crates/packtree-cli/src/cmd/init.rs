//! `pkt init`: create the project directory, config and database.

use crate::output::{OutputMode, pretty_kv, render};
use crate::project::db_path;
use anyhow::{Context as _, Result, bail};
use clap::Args;
use packtree_core::config::{PROJECT_DIR, ProjectConfig, WarehouseConfig, write_project_config};
use packtree_core::db;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Reinitialize even if `.packtree/` already exists. Stored data is kept.
    #[arg(long)]
    pub force: bool,

    /// Maximum number of levels in one package tree.
    #[arg(long, default_value_t = WarehouseConfig::default().max_package_depth)]
    pub max_depth: u32,
}

#[derive(Serialize)]
struct InitReport {
    config: String,
    database: String,
    max_package_depth: u32,
}

pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project_dir = project_root.join(PROJECT_DIR);
    if project_dir.exists() && !args.force {
        bail!("{PROJECT_DIR}/ already exists. Use `pkt init --force` to reinitialize.");
    }
    if args.max_depth == 0 {
        bail!("--max-depth must be at least 1");
    }

    let config = ProjectConfig {
        warehouse: WarehouseConfig::with_max_depth(args.max_depth),
    };
    let config_path = write_project_config(project_root, &config)?;
    let database = db_path(project_root);
    db::open_store(&database)
        .with_context(|| format!("initialize database {}", database.display()))?;

    let report = InitReport {
        config: config_path.display().to_string(),
        database: database.display().to_string(),
        max_package_depth: args.max_depth,
    };
    render(output, &report, |r, w| {
        writeln!(w, "Initialized {PROJECT_DIR}/")?;
        pretty_kv(w, "Config", &r.config)?;
        pretty_kv(w, "Database", &r.database)?;
        pretty_kv(w, "Max depth", r.max_package_depth.to_string())
    })
}
