//! `pkt links`: list the hierarchy link ledger.

use crate::output::{OutputMode, render};
use crate::project::Project;
use anyhow::Result;
use clap::Args;
use packtree_core::model::HierarchyLink;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct LinksArgs {
    /// Only links whose parent or child is this package (name or `#id`).
    #[arg(long)]
    pub package: Option<String>,
}

#[derive(Debug, Serialize)]
struct LinkView {
    id: u64,
    label: String,
    parent: Option<String>,
    child: String,
    unlink: bool,
    move_lines: Vec<u64>,
    created_at_us: i64,
}

pub fn run_links(args: &LinksArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let wh = &project.warehouse;
    let store = wh.packages();

    let selected: Vec<&HierarchyLink> = match &args.package {
        Some(reference) => {
            let id = project.package(reference)?;
            wh.links()
                .links_of_package(id)
                .into_iter()
                .filter_map(|link| wh.links().get(link))
                .collect()
        }
        None => wh.links().iter().collect(),
    };

    let views: Vec<LinkView> = selected
        .into_iter()
        .map(|link| LinkView {
            id: link.id.get(),
            label: link.label(|p| store.label(p)),
            parent: link.parent.map(|p| store.label(p)),
            child: store.label(link.child),
            unlink: link.is_unlink(),
            move_lines: link.move_lines.iter().map(|l| l.get()).collect(),
            created_at_us: link.created_at_us,
        })
        .collect();

    render(output, &views, |vs, w| {
        if vs.is_empty() {
            return writeln!(w, "No links.");
        }
        for v in vs {
            writeln!(w, "#{:<5} {}", v.id, v.label)?;
        }
        Ok(())
    })
}
