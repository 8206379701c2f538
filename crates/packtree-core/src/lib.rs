//! packtree-core library.
//!
//! Package hierarchy consistency for warehouses: a forest of packages that
//! can nest inside each other, a ledger of proposed parent/child edges tied
//! to movement lines, and the rules that keep every tree acyclic, shallow
//! enough and in one location.
//!
//! # Conventions
//!
//! - **Errors**: domain operations return [`HierarchyResult`]; storage and
//!   configuration use `anyhow::Result` with context.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

#![forbid(unsafe_code)]

pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod warehouse;

pub use config::{ProjectConfig, WarehouseConfig};
pub use error::ErrorCode;
pub use hierarchy::{HierarchyError, HierarchyResult};
pub use warehouse::Warehouse;
