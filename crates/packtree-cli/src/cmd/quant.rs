//! `pkt quant`: register stock.

use crate::output::{OutputMode, render};
use crate::project::Project;
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use packtree_core::model::{LotId, ProductId, QuantDraft};
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct QuantArgs {
    #[command(subcommand)]
    pub command: QuantCommand,
}

#[derive(Subcommand, Debug)]
pub enum QuantCommand {
    /// Add stock of a product at a location, optionally inside a package.
    Add {
        product: String,

        quantity: f64,

        /// Location name.
        #[arg(long)]
        location: String,

        /// Package holding the stock (name or `#id`).
        #[arg(long)]
        package: Option<String>,

        #[arg(long)]
        lot: Option<String>,
    },
}

#[derive(Serialize)]
struct QuantView {
    id: u64,
    product: String,
    quantity: f64,
    location: String,
    package: Option<String>,
}

pub fn run_quant(args: &QuantArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut project = Project::open(project_root)?;
    match &args.command {
        QuantCommand::Add {
            product,
            quantity,
            location,
            package,
            lot,
        } => {
            if !quantity.is_finite() || *quantity <= 0.0 {
                bail!("quantity must be a positive number, got {quantity}");
            }
            let location_id = project.location(location)?;
            let package_id = package
                .as_deref()
                .map(|p| project.package(p))
                .transpose()?;

            let mut draft = QuantDraft::new(ProductId::new(product.as_str()), *quantity, location_id);
            if let Some(pkg) = package_id {
                draft = draft.in_package(pkg);
            }
            if let Some(lot) = lot {
                draft = draft.with_lot(LotId::new(lot.as_str()));
            }
            let id = project.update(|wh| wh.add_quant(draft))?;

            let view = QuantView {
                id: id.get(),
                product: product.clone(),
                quantity: *quantity,
                location: location.clone(),
                package: package_id.map(|p| project.warehouse.packages().label(p)),
            };
            render(output, &view, |v, w| {
                let place = v
                    .package
                    .as_deref()
                    .map(|p| format!(" in {p}"))
                    .unwrap_or_default();
                writeln!(w, "Added {} x {} at {}{place}", v.quantity, v.product, v.location)
            })
        }
    }
}
