//! `pkt package`: create, move, delete and inspect packages.

use crate::output::{OutputMode, pretty_kv, pretty_section, render};
use crate::project::Project;
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use packtree_core::db::query;
use packtree_core::model::PackageId;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct PackageArgs {
    #[command(subcommand)]
    pub command: PackageCommand,
}

#[derive(Subcommand, Debug)]
pub enum PackageCommand {
    /// Create a package, optionally inside another one.
    Create {
        /// Package name. Defaults to a generated `PACK0000001`-style name.
        #[arg(long)]
        name: Option<String>,

        /// Parent package (name or `#id`).
        #[arg(long)]
        parent: Option<String>,
    },
    /// Move a package under another one. Use `--parent none` to make it top-level.
    Move {
        /// Package to move (name or `#id`).
        package: String,

        #[arg(long)]
        parent: String,
    },
    /// Delete a package that holds no other packages.
    Delete {
        /// Package to delete (name or `#id`).
        package: String,
    },
    /// Show a package with its place in the tree and its contents.
    Show {
        /// Package to show (name or `#id`).
        package: String,
    },
}

#[derive(Debug, Serialize)]
pub struct PackageView {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub parent: Option<String>,
    /// Enclosing packages, outermost first.
    pub path: Vec<String>,
    pub children: Vec<String>,
    /// Packages anywhere below this one.
    pub nested: usize,
    pub depth: u32,
    pub location: Option<String>,
    pub contents: Vec<ContentView>,
}

#[derive(Debug, Serialize)]
pub struct ContentView {
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot: Option<String>,
    pub quantity: f64,
    pub package: String,
}

/// Snapshot of one package for display. The path and nesting come from
/// the saved database.
fn package_view(project: &Project, id: PackageId) -> Result<PackageView> {
    let store = project.warehouse.packages();
    let pkg = store.package(id)?;
    let location = store
        .location_of(id)
        .and_then(|loc| store.location(loc))
        .map(|loc| loc.name.clone());
    let contents = store
        .aggregated_contents(id)
        .into_iter()
        .map(|q| ContentView {
            product: q.product.to_string(),
            lot: q.lot.as_ref().map(ToString::to_string),
            quantity: q.quantity,
            package: q.package.map(|p| store.label(p)).unwrap_or_default(),
        })
        .collect();
    let mut path: Vec<String> = query::ancestor_ids(project.conn(), id)?
        .into_iter()
        .map(|p| store.label(p))
        .collect();
    path.reverse();
    let nested = query::descendant_ids(project.conn(), id)?.len().saturating_sub(1);
    Ok(PackageView {
        id: id.get(),
        name: pkg.name().to_string(),
        full_name: store.display_name(id)?,
        parent: pkg.parent().map(|p| store.label(p)),
        path,
        children: pkg.children().iter().map(|c| store.label(*c)).collect(),
        nested,
        depth: pkg.depth(),
        location,
        contents,
    })
}

fn parse_parent(project: &Project, raw: &str) -> Result<Option<PackageId>> {
    if raw.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        project.package(raw).map(Some)
    }
}

pub fn run_package(args: &PackageArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut project = Project::open(project_root)?;
    match &args.command {
        PackageCommand::Create { name, parent } => {
            let name = name.as_deref().map(str::trim);
            if let Some(name) = name
                && project.warehouse.packages().find_by_name(name).is_some()
            {
                bail!("package '{name}' already exists");
            }
            let parent = parent
                .as_deref()
                .map(|p| project.package(p))
                .transpose()?;
            let id = project.update(|wh| {
                let id = wh.create_package(name)?;
                wh.set_parent(id, parent)?;
                Ok(id)
            })?;
            let view = package_view(&project, id)?;
            render(output, &view, |v, w| {
                writeln!(w, "Created package {} (#{})", v.full_name, v.id)
            })
        }
        PackageCommand::Move { package, parent } => {
            let id = project.package(package)?;
            let parent = parse_parent(&project, parent)?;
            project.update(|wh| wh.set_parent(id, parent))?;
            let view = package_view(&project, id)?;
            render(output, &view, |v, w| writeln!(w, "Moved package to {}", v.full_name))
        }
        PackageCommand::Delete { package } => {
            let id = project.package(package)?;
            let removed = project.update(|wh| wh.delete_package(id))?;
            let view = serde_json::json!({ "id": id.get(), "name": removed.name(), "deleted": true });
            render(output, &view, |_, w| writeln!(w, "Deleted package {}", removed.name()))
        }
        PackageCommand::Show { package } => {
            let id = project.package(package)?;
            let view = package_view(&project, id)?;
            render(output, &view, |v, w| {
                pretty_section(w, &format!("{} (#{})", v.full_name, v.id))?;
                pretty_kv(w, "Parent", v.parent.as_deref().unwrap_or("-"))?;
                if !v.path.is_empty() {
                    pretty_kv(w, "Path", v.path.join(" > "))?;
                }
                pretty_kv(w, "Children", if v.children.is_empty() {
                    "-".to_string()
                } else {
                    v.children.join(", ")
                })?;
                pretty_kv(w, "Nested", v.nested.to_string())?;
                pretty_kv(w, "Depth", v.depth.to_string())?;
                pretty_kv(w, "Location", v.location.as_deref().unwrap_or("-"))?;
                if !v.contents.is_empty() {
                    writeln!(w)?;
                    for c in &v.contents {
                        let lot = c.lot.as_deref().map(|l| format!(" [{l}]")).unwrap_or_default();
                        writeln!(w, "  {} x {}{lot}  in {}", c.quantity, c.product, c.package)?;
                    }
                }
                Ok(())
            })
        }
    }
}
