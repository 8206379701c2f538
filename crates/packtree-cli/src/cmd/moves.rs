//! `pkt moves`: movement lines of pickings, whole-package processing and
//! completion.

use crate::output::{OutputMode, render};
use crate::project::Project;
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use packtree_core::Warehouse;
use packtree_core::model::{
    LinkId, LocationId, LotId, MoveId, MoveLine, MoveLineDraft, MoveLineId, PackageId, PickingId,
    ProductId,
};
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct MovesArgs {
    #[command(subcommand)]
    pub command: MovesCommand,
}

#[derive(Subcommand, Debug)]
pub enum MovesCommand {
    /// Plan a movement line.
    Add {
        product: String,

        quantity: f64,

        /// Source location name.
        #[arg(long)]
        from: String,

        /// Destination location name.
        #[arg(long)]
        to: String,

        /// Source package (name or `#id`).
        #[arg(long)]
        package: Option<String>,

        /// Destination package. Defaults to the source package; `none`
        /// unpacks.
        #[arg(long)]
        into: Option<String>,

        /// Parent the destination package should end up in.
        #[arg(long)]
        parent: Option<String>,

        #[arg(long)]
        picking: Option<u64>,

        /// Stock move the line belongs to.
        #[arg(long = "move")]
        move_id: Option<u64>,

        #[arg(long)]
        lot: Option<String>,
    },
    /// List movement lines.
    List {
        #[arg(long)]
        picking: Option<u64>,
    },
    /// Propose unlinks for packages the picking moves whole.
    Detect {
        #[arg(long)]
        picking: u64,
    },
    /// Mark every line of a package as processed, or reset them.
    Process {
        /// Package (name or `#id`).
        package: String,

        #[arg(long)]
        picking: u64,

        /// Send the processed lines to this location instead.
        #[arg(long)]
        to: Option<String>,
    },
    /// Relocate the stock of the picking's processed lines and apply links.
    Complete {
        #[arg(long)]
        picking: u64,
    },
}

#[derive(Debug, Serialize)]
struct MoveLineView {
    id: u64,
    picking: Option<u64>,
    product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    lot: Option<String>,
    from: String,
    to: String,
    source_package: Option<String>,
    destination_package: Option<String>,
    result_parent: Option<String>,
    quantity: f64,
    quantity_done: f64,
    done: bool,
}

fn line_view(wh: &Warehouse, line: &MoveLine) -> MoveLineView {
    let store = wh.packages();
    let location = |id: LocationId| {
        store
            .location(id)
            .map_or_else(|| format!("#{id}"), |loc| loc.name.clone())
    };
    MoveLineView {
        id: line.id.get(),
        picking: line.picking.map(PickingId::get),
        product: line.product.to_string(),
        lot: line.lot.as_ref().map(ToString::to_string),
        from: location(line.source_location),
        to: location(line.destination_location),
        source_package: line.source_package.map(|p| store.label(p)),
        destination_package: line.destination_package.map(|p| store.label(p)),
        result_parent: line.result_parent_package.map(|p| store.label(p)),
        quantity: line.quantity,
        quantity_done: line.quantity_done,
        done: line.done,
    }
}

fn write_line(w: &mut dyn std::io::Write, v: &MoveLineView) -> std::io::Result<()> {
    let from = v
        .source_package
        .as_deref()
        .map_or_else(|| v.from.clone(), |p| format!("{} [{p}]", v.from));
    let to = v
        .destination_package
        .as_deref()
        .map_or_else(|| v.to.clone(), |p| format!("{} [{p}]", v.to));
    let state = if v.done { "  done" } else { "" };
    writeln!(
        w,
        "#{:<5} {}/{} {}  {from} -> {to}{state}",
        v.id, v.quantity_done, v.quantity, v.product
    )
}

#[derive(Debug, Serialize)]
struct LinksView {
    links: Vec<String>,
}

fn links_view(wh: &Warehouse, ids: &[LinkId]) -> LinksView {
    let store = wh.packages();
    LinksView {
        links: ids
            .iter()
            .filter_map(|id| wh.links().get(*id))
            .map(|link| link.label(|p| store.label(p)))
            .collect(),
    }
}

fn resolve_into(
    project: &Project,
    into: Option<&str>,
    source: Option<PackageId>,
) -> Result<Option<PackageId>> {
    match into {
        None => Ok(source),
        Some(raw) if raw.eq_ignore_ascii_case("none") => Ok(None),
        Some(raw) => project.package(raw).map(Some),
    }
}

pub fn run_moves(args: &MovesArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut project = Project::open(project_root)?;
    match &args.command {
        MovesCommand::Add {
            product,
            quantity,
            from,
            to,
            package,
            into,
            parent,
            picking,
            move_id,
            lot,
        } => {
            if !quantity.is_finite() || *quantity <= 0.0 {
                bail!("quantity must be a positive number, got {quantity}");
            }
            let source_location = project.location(from)?;
            let destination_location = project.location(to)?;
            let source = package
                .as_deref()
                .map(|p| project.package(p))
                .transpose()?;
            let destination = resolve_into(&project, into.as_deref(), source)?;
            let parent = parent
                .as_deref()
                .map(|p| project.package(p))
                .transpose()?;

            let mut draft = MoveLineDraft::new(
                ProductId::new(product.as_str()),
                *quantity,
                source_location,
                destination_location,
            )
            .from_package(source)
            .into_package(destination);
            if let Some(parent) = parent {
                draft = draft.under_parent(parent);
            }
            if let Some(picking) = picking {
                draft = draft.of_picking(PickingId(*picking));
            }
            if let Some(move_id) = move_id {
                draft = draft.of_move(MoveId(*move_id));
            }
            if let Some(lot) = lot {
                draft = draft.with_lot(LotId::new(lot.as_str()));
            }

            let id = project.update(|wh| wh.add_move_line(draft))?;
            let line = project.warehouse.move_lines().line(id)?;
            let view = line_view(&project.warehouse, line);
            render(output, &view, |v, w| {
                write!(w, "Planned ")?;
                write_line(w, v)
            })
        }
        MovesCommand::List { picking } => {
            let wh = &project.warehouse;
            let views: Vec<MoveLineView> = wh
                .move_lines()
                .iter()
                .filter(|l| picking.is_none_or(|p| l.picking == Some(PickingId(p))))
                .map(|l| line_view(wh, l))
                .collect();
            render(output, &views, |vs, w| {
                if vs.is_empty() {
                    return writeln!(w, "No move lines.");
                }
                for v in vs {
                    write_line(w, v)?;
                }
                Ok(())
            })
        }
        MovesCommand::Detect { picking } => {
            let ids = project.update(|wh| wh.on_entire_package_detected(PickingId(*picking)))?;
            let view = links_view(&project.warehouse, &ids);
            render(output, &view, |v, w| {
                if v.links.is_empty() {
                    return writeln!(w, "No whole packages leave their parent.");
                }
                for label in &v.links {
                    writeln!(w, "Proposed {label}")?;
                }
                Ok(())
            })
        }
        MovesCommand::Process { package, picking, to } => {
            let id = project.package(package)?;
            let destination = to.as_deref().map(|l| project.location(l)).transpose()?;
            let processed =
                project.update(|wh| wh.toggle_processed(id, PickingId(*picking), destination))?;
            let view = serde_json::json!({
                "package": project.warehouse.packages().label(id),
                "picking": picking,
                "processed": processed,
            });
            render(output, &view, |_, w| {
                let label = project.warehouse.packages().label(id);
                if processed {
                    writeln!(w, "Processed {label} in picking {picking}")
                } else {
                    writeln!(w, "Reset {label} in picking {picking}")
                }
            })
        }
        MovesCommand::Complete { picking } => {
            let ids: Vec<MoveLineId> = project
                .warehouse
                .move_lines()
                .of_picking(PickingId(*picking))
                .into_iter()
                .filter(|l| !l.done && l.quantity_done > 0.0)
                .map(|l| l.id)
                .collect();
            if ids.is_empty() {
                bail!("picking {picking} has no processed lines to complete");
            }
            let completion = project.update(|wh| wh.complete_move_lines(&ids))?;
            let view = links_view(&project.warehouse, &completion.links);
            render(output, &view, |v, w| {
                writeln!(w, "Completed {} line(s) of picking {picking}", completion.lines)?;
                for label in &v.links {
                    writeln!(w, "Applied {label}")?;
                }
                Ok(())
            })
        }
    }
}
