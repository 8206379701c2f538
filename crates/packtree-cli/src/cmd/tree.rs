//! `pkt tree`: print the package forest.

use crate::output::{OutputMode, render};
use crate::project::Project;
use anyhow::Result;
use clap::Args;
use packtree_core::hierarchy::PackageStore;
use packtree_core::model::PackageId;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Only print the tree rooted at this package (name or `#id`).
    pub package: Option<String>,
}

#[derive(Debug, Serialize)]
struct TreeNode {
    id: u64,
    name: String,
    depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    children: Vec<TreeNode>,
}

fn build(store: &PackageStore, id: PackageId) -> Option<TreeNode> {
    let pkg = store.get(id)?;
    Some(TreeNode {
        id: id.get(),
        name: pkg.name().to_string(),
        depth: pkg.depth(),
        location: store
            .location_of(id)
            .and_then(|loc| store.location(loc))
            .map(|loc| loc.name.clone()),
        children: pkg
            .children()
            .iter()
            .filter_map(|child| build(store, *child))
            .collect(),
    })
}

fn write_node(w: &mut dyn Write, node: &TreeNode, indent: usize) -> io::Result<()> {
    let location = node
        .location
        .as_deref()
        .map(|l| format!("  @ {l}"))
        .unwrap_or_default();
    writeln!(
        w,
        "{:indent$}{} (#{}, depth {}){location}",
        "",
        node.name,
        node.id,
        node.depth,
        indent = indent * 2
    )?;
    for child in &node.children {
        write_node(w, child, indent + 1)?;
    }
    Ok(())
}

pub fn run_tree(args: &TreeArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let store = project.warehouse.packages();
    let roots: Vec<PackageId> = match &args.package {
        Some(reference) => vec![project.package(reference)?],
        None => store
            .packages()
            .filter(|p| p.is_root())
            .map(|p| p.id())
            .collect(),
    };
    let forest: Vec<TreeNode> = roots.into_iter().filter_map(|r| build(store, r)).collect();

    render(output, &forest, |nodes, w| {
        if nodes.is_empty() {
            return writeln!(w, "No packages.");
        }
        for node in nodes {
            write_node(w, node, 0)?;
        }
        Ok(())
    })
}
