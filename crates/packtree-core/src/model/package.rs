use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::{PackageId, QuantId};

/// A package node in the forest.
///
/// `children`, `quants` and `depth` are derived data kept in sync by
/// [`PackageStore`](crate::hierarchy::store::PackageStore); only the store
/// can change them, so the fields are crate-private and read via accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub(crate) id: PackageId,
    pub(crate) name: String,
    pub(crate) parent: Option<PackageId>,
    pub(crate) children: BTreeSet<PackageId>,
    /// Quants placed directly in this package (not in sub-packages).
    pub(crate) quants: BTreeSet<QuantId>,
    /// Node count along the longest path down to a leaf, self included.
    pub(crate) depth: u32,
}

impl Package {
    pub(crate) fn new(id: PackageId, name: String) -> Self {
        Self {
            id,
            name,
            parent: None,
            children: BTreeSet::new(),
            quants: BTreeSet::new(),
            depth: 1,
        }
    }

    #[must_use]
    pub const fn id(&self) -> PackageId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn parent(&self) -> Option<PackageId> {
        self.parent
    }

    #[must_use]
    pub const fn children(&self) -> &BTreeSet<PackageId> {
        &self.children
    }

    #[must_use]
    pub const fn quants(&self) -> &BTreeSet<QuantId> {
        &self.quants
    }

    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Default sequence name for packages created without one.
#[must_use]
pub fn sequence_name(id: PackageId) -> String {
    format!("PACK{:07}", id.get())
}
