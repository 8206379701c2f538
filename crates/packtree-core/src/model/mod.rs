//! Plain records shared by the hierarchy engine.
//!
//! - [`ids`]: opaque identifiers.
//! - [`package`]: package nodes of the forest.
//! - [`quant`]: physical stock units and locations.
//! - [`link`]: proposed hierarchy edges.
//! - [`move_line`]: in-flight movement lines (owned by the picking workflow).

pub mod ids;
pub mod link;
pub mod move_line;
pub mod package;
pub mod quant;

pub use ids::{LinkId, LocationId, LotId, MoveId, MoveLineId, PackageId, PickingId, ProductId, QuantId};
pub use link::{HierarchyLink, LinkDraft};
pub use move_line::{MoveLine, MoveLineDraft};
pub use package::Package;
pub use quant::{Location, QTY_EPSILON, Quant, QuantDraft};
