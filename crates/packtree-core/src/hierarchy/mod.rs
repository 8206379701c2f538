//! The package hierarchy engine.
//!
//! - [`store`]: the package forest and the stock inside it.
//! - [`links`]: the ledger of proposed edges and their application.
//! - [`chain`]: link batch validation and chain building.
//! - [`movement`]: how movement lines drive links and completion.
//! - [`error`]: hierarchy errors and their stable codes.

pub mod chain;
pub mod error;
pub mod links;
pub mod movement;
pub mod store;

pub use chain::{Chain, build_chains, validate_chain, validate_links};
pub use error::{HierarchyError, HierarchyResult};
pub use links::LinkLedger;
pub use movement::{Completion, MoveLineStore};
pub use store::{ContentRef, PackageStore};
