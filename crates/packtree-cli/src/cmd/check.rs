//! `pkt check`: re-validate every stored tree against the current config.
//!
//! The depth limit is not retroactive, so lowering it can leave trees that
//! no longer fit. This reports them without changing anything.

use crate::output::{OutputMode, render};
use crate::project::Project;
use anyhow::{Result, bail};
use packtree_core::HierarchyError;
use packtree_core::hierarchy::PackageStore;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct Problem {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    max_package_depth: u32,
    trees: usize,
    problems: Vec<Problem>,
}

fn problem(err: &HierarchyError) -> Problem {
    Problem {
        code: err.code().code(),
        message: err.to_string(),
    }
}

fn check_store(store: &PackageStore) -> CheckReport {
    let max = store.config().max_package_depth;
    let roots: Vec<_> = store.packages().filter(|p| p.is_root()).collect();
    let mut problems = Vec::new();
    for root in &roots {
        if root.depth() > max {
            problems.push(problem(&HierarchyError::DepthExceeded {
                package: root.name().to_string(),
                depth: root.depth(),
                max_depth: max,
            }));
        }
        if let Err(err) = store.check_not_multi_location(&[root.id()]) {
            problems.push(problem(&err));
        }
    }
    CheckReport {
        max_package_depth: max,
        trees: roots.len(),
        problems,
    }
}

pub fn run_check(output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let report = check_store(project.warehouse.packages());

    render(output, &report, |r, w| {
        if r.problems.is_empty() {
            return writeln!(w, "{} tree(s) OK (max depth {})", r.trees, r.max_package_depth);
        }
        for p in &r.problems {
            writeln!(w, "[{}] {}", p.code, p.message)?;
        }
        Ok(())
    })?;

    if !report.problems.is_empty() {
        bail!("{} problem(s) found", report.problems.len());
    }
    Ok(())
}
