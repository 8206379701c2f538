use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::{LinkId, MoveLineId, PackageId};

/// A proposed hierarchy edge.
///
/// A link with a parent proposes "put `child` inside `parent`". A link
/// without a parent is an *unlink*: "take `child` out of whatever it is in".
/// Links are checked before any movement completes and applied by
/// [`LinkLedger::construct`](crate::hierarchy::links::LinkLedger::construct);
/// applied links stay in the ledger as an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLink {
    pub id: LinkId,
    pub parent: Option<PackageId>,
    pub child: PackageId,
    /// Movement lines that justify this edge.
    pub move_lines: BTreeSet<MoveLineId>,
    pub created_at_us: i64,
}

impl HierarchyLink {
    #[must_use]
    pub const fn is_unlink(&self) -> bool {
        self.parent.is_none()
    }

    /// Display label, given a way to resolve package names.
    pub fn label(&self, name_of: impl Fn(PackageId) -> String) -> String {
        match self.parent {
            Some(parent) => format!("Link {} and {}", name_of(parent), name_of(self.child)),
            None => format!("Unlink parent of {}", name_of(self.child)),
        }
    }
}

/// Values for a link that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDraft {
    pub parent: Option<PackageId>,
    pub child: PackageId,
    pub move_lines: BTreeSet<MoveLineId>,
}

impl LinkDraft {
    #[must_use]
    pub fn link(parent: PackageId, child: PackageId) -> Self {
        Self {
            parent: Some(parent),
            child,
            move_lines: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn unlink(child: PackageId) -> Self {
        Self {
            parent: None,
            child,
            move_lines: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_move_lines(mut self, lines: impl IntoIterator<Item = MoveLineId>) -> Self {
        self.move_lines.extend(lines);
        self
    }
}
