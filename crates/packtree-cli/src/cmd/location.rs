//! `pkt location`: manage stock locations.

use crate::output::{OutputMode, render};
use crate::project::Project;
use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct LocationArgs {
    #[command(subcommand)]
    pub command: LocationCommand,
}

#[derive(Subcommand, Debug)]
pub enum LocationCommand {
    /// Add a named location.
    Add {
        /// Location name, unique within the project.
        name: String,
    },
    /// List locations.
    List,
}

#[derive(Serialize)]
struct LocationView {
    id: u64,
    name: String,
}

pub fn run_location(args: &LocationArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut project = Project::open(project_root)?;
    match &args.command {
        LocationCommand::Add { name } => {
            let id = project.update(|wh| wh.add_location(name.as_str()))?;
            let view = LocationView {
                id: id.get(),
                name: name.trim().to_string(),
            };
            render(output, &view, |v, w| writeln!(w, "Added location {} (#{})", v.name, v.id))
        }
        LocationCommand::List => {
            let views: Vec<LocationView> = project
                .warehouse
                .packages()
                .locations()
                .map(|l| LocationView {
                    id: l.id.get(),
                    name: l.name.clone(),
                })
                .collect();
            render(output, &views, |vs, w| {
                for v in vs {
                    writeln!(w, "#{:<5} {}", v.id, v.name)?;
                }
                Ok(())
            })
        }
    }
}
