//! Package tree store: the forest of packages and the stock inside them.
//!
//! Packages live in an arena keyed by [`PackageId`]; a node only stores the
//! id of its parent, and every traversal (ancestors, subtree, depth) goes
//! through id lookups. The store owns three invariants and re-checks them on
//! every structural mutation:
//!
//! - no package is its own ancestor,
//! - the depth of a top-level package never exceeds
//!   [`WarehouseConfig::max_package_depth`],
//! - all material contents of one tree sit in a single location.
//!
//! A mutation that would break one of them is rolled back before the error is
//! returned, so callers never observe a half-applied change.

#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, warn};

use super::error::{HierarchyError, HierarchyResult};
use crate::config::WarehouseConfig;
use crate::model::package::sequence_name;
use crate::model::{
    Location, LocationId, LotId, MoveLineId, Package, PackageId, ProductId, QTY_EPSILON, Quant,
    QuantDraft, QuantId,
};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Reference to one record passed to [`PackageStore::is_all_contents_in`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContentRef {
    Quant(QuantId),
    Package(PackageId),
    Location(LocationId),
    MoveLine(MoveLineId),
}

impl ContentRef {
    const fn kind(self) -> &'static str {
        match self {
            Self::Quant(_) => "quant",
            Self::Package(_) => "package",
            Self::Location(_) => "location",
            Self::MoveLine(_) => "move line",
        }
    }
}

/// Id-indexed arena of packages, quants and locations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageStore {
    config: WarehouseConfig,
    packages: BTreeMap<PackageId, Package>,
    quants: BTreeMap<QuantId, Quant>,
    locations: BTreeMap<LocationId, Location>,
    next_package: u64,
    next_quant: u64,
    next_location: u64,
}

impl PackageStore {
    pub fn new(config: WarehouseConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub const fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Replace the configuration. Existing trees are not re-validated.
    pub fn set_config(&mut self, config: WarehouseConfig) {
        self.config = config;
    }

    // -----------------------------------------------------------------------
    // Locations
    // -----------------------------------------------------------------------

    /// Add a location. Names are trimmed, must not be blank and must be
    /// unique.
    pub fn add_location(&mut self, name: impl Into<String>) -> HierarchyResult<LocationId> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(HierarchyError::precondition("location name must not be empty"));
        }
        if self.location_by_name(&name).is_some() {
            return Err(HierarchyError::precondition(format!(
                "location '{name}' already exists"
            )));
        }
        self.next_location += 1;
        let id = LocationId(self.next_location);
        debug!(location = %id, %name, "location added");
        self.locations.insert(id, Location { id, name });
        Ok(id)
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(&id)
    }

    pub fn location_by_name(&self, name: &str) -> Option<LocationId> {
        self.locations
            .values()
            .find(|loc| loc.name == name)
            .map(|loc| loc.id)
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    fn location_label(&self, id: LocationId) -> String {
        self.locations
            .get(&id)
            .map_or_else(|| format!("#{id}"), |loc| loc.name.clone())
    }

    // -----------------------------------------------------------------------
    // Packages
    // -----------------------------------------------------------------------

    /// Create an empty root package. Without a name it gets the next
    /// sequence name (`PACK0000001`, ...). A blank name is refused.
    pub fn create_package(&mut self, name: Option<&str>) -> HierarchyResult<PackageId> {
        let name = name.map(str::trim);
        if name.is_some_and(str::is_empty) {
            return Err(HierarchyError::precondition("package name must not be empty"));
        }
        self.next_package += 1;
        let id = PackageId(self.next_package);
        let name = name.map_or_else(|| sequence_name(id), str::to_string);
        debug!(package = %id, %name, "package created");
        self.packages.insert(id, Package::new(id, name));
        Ok(id)
    }

    pub fn get(&self, id: PackageId) -> Option<&Package> {
        self.packages.get(&id)
    }

    /// Look up a package, failing with `NotFound`.
    pub fn package(&self, id: PackageId) -> HierarchyResult<&Package> {
        self.packages
            .get(&id)
            .ok_or_else(|| HierarchyError::not_found("package", id))
    }

    pub fn contains(&self, id: PackageId) -> bool {
        self.packages.contains_key(&id)
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn find_by_name(&self, name: &str) -> Option<PackageId> {
        self.packages
            .values()
            .find(|pkg| pkg.name == name)
            .map(|pkg| pkg.id)
    }

    /// Package name, or `#id` for unknown ids. Used in messages.
    pub fn label(&self, id: PackageId) -> String {
        self.packages
            .get(&id)
            .map_or_else(|| format!("#{id}"), |pkg| pkg.name.clone())
    }

    /// `"{parent}/{name}"` for nested packages, `name` for roots.
    pub fn display_name(&self, id: PackageId) -> HierarchyResult<String> {
        let pkg = self.package(id)?;
        Ok(match pkg.parent {
            Some(parent) => format!("{}/{}", self.label(parent), pkg.name),
            None => pkg.name.clone(),
        })
    }

    /// Delete a package. Refused while it holds other packages; quants
    /// directly inside are unpacked and stay where they are.
    pub fn delete_package(&mut self, id: PackageId) -> HierarchyResult<Package> {
        let pkg = self.package(id)?;
        if !pkg.children.is_empty() {
            return Err(HierarchyError::HasChildren {
                package: pkg.name.clone(),
                children: pkg.children.len(),
            });
        }
        let parent = pkg.parent;
        let quants: Vec<QuantId> = pkg.quants.iter().copied().collect();

        for quant in quants {
            if let Some(q) = self.quants.get_mut(&quant) {
                q.package = None;
            }
        }
        if let Some(parent_id) = parent
            && let Some(p) = self.packages.get_mut(&parent_id)
        {
            p.children.remove(&id);
        }
        self.refresh_depths(parent);

        let removed = self
            .packages
            .remove(&id)
            .ok_or_else(|| HierarchyError::not_found("package", id))?;
        debug!(package = %id, name = %removed.name, "package deleted");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Tree queries
    // -----------------------------------------------------------------------

    pub fn parent_of(&self, id: PackageId) -> Option<PackageId> {
        self.packages.get(&id).and_then(|pkg| pkg.parent)
    }

    /// Ancestors of `id`, nearest first, `id` excluded.
    pub fn ancestors(&self, id: PackageId) -> Vec<PackageId> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut current = self.parent_of(id);
        while let Some(ancestor) = current {
            if !seen.insert(ancestor) {
                break;
            }
            out.push(ancestor);
            current = self.parent_of(ancestor);
        }
        out
    }

    pub fn num_ancestors(&self, id: PackageId) -> usize {
        self.ancestors(id).len()
    }

    /// Top-most ancestor; `None` for a root.
    pub fn top_ancestor(&self, id: PackageId) -> Option<PackageId> {
        self.ancestors(id).last().copied()
    }

    /// Top-most ancestor, or `id` itself for a root.
    pub fn top_or_self(&self, id: PackageId) -> PackageId {
        self.top_ancestor(id).unwrap_or(id)
    }

    /// Subtree of `id` in breadth-first order, `id` first.
    pub fn descendants(&self, id: PackageId) -> Vec<PackageId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            if let Some(pkg) = self.packages.get(&current) {
                queue.extend(pkg.children.iter().copied());
            }
        }
        out
    }

    /// Cached subtree depth: 1 for a leaf.
    pub fn depth(&self, id: PackageId) -> u32 {
        self.packages.get(&id).map_or(0, |pkg| pkg.depth)
    }

    // -----------------------------------------------------------------------
    // Contents
    // -----------------------------------------------------------------------

    /// Material quants anywhere in the subtree of `id`, ordered by quant id.
    pub fn aggregated_contents(&self, id: PackageId) -> Vec<&Quant> {
        let mut ids: Vec<QuantId> = self
            .descendants(id)
            .iter()
            .filter_map(|pkg| self.packages.get(pkg))
            .flat_map(|pkg| pkg.quants.iter().copied())
            .collect();
        ids.sort_unstable();
        ids.iter()
            .filter_map(|q| self.quants.get(q))
            .filter(|q| q.is_material())
            .collect()
    }

    /// Distinct locations of the aggregated contents.
    pub fn locations_of(&self, id: PackageId) -> BTreeSet<LocationId> {
        self.aggregated_contents(id)
            .into_iter()
            .map(|q| q.location)
            .collect()
    }

    /// The single location of the aggregated contents, if there is exactly one.
    pub fn location_of(&self, id: PackageId) -> Option<LocationId> {
        let locations = self.locations_of(id);
        if locations.len() == 1 {
            locations.into_iter().next()
        } else {
            None
        }
    }

    /// Fail on the first package (in the given order) whose contents span
    /// more than one location.
    pub fn check_not_multi_location(&self, packages: &[PackageId]) -> HierarchyResult<()> {
        let mut checked = BTreeSet::new();
        for &id in packages {
            if !checked.insert(id) {
                continue;
            }
            let locations = self.locations_of(id);
            if locations.len() > 1 {
                return Err(HierarchyError::MultiLocation {
                    package: self.label(id),
                    locations: locations
                        .into_iter()
                        .map(|loc| self.location_label(loc))
                        .collect(),
                });
            }
        }
        Ok(())
    }

    /// True when every direct child of `id` of the targets' type is among
    /// `targets`.
    ///
    /// `targets` must be all quants or all packages. Only direct children
    /// are compared: targets unrelated to `id` are ignored. With an empty
    /// target set the answer is whether `id` has no direct contents at all.
    pub fn is_all_contents_in(
        &self,
        id: PackageId,
        targets: &[ContentRef],
    ) -> HierarchyResult<bool> {
        let pkg = self.package(id)?;
        let mut quants = BTreeSet::new();
        let mut packages = BTreeSet::new();
        for target in targets {
            match *target {
                ContentRef::Quant(q) => {
                    quants.insert(q);
                }
                ContentRef::Package(p) => {
                    packages.insert(p);
                }
                other => {
                    return Err(HierarchyError::TypeMismatch {
                        got: other.kind().to_string(),
                    });
                }
            }
        }

        let direct_quants = || {
            pkg.quants
                .iter()
                .filter(|q| self.quants.get(q).is_some_and(Quant::is_material))
        };

        match (quants.is_empty(), packages.is_empty()) {
            (false, false) => Err(HierarchyError::TypeMismatch {
                got: "a mix of quants and packages".to_string(),
            }),
            (false, true) => Ok(direct_quants().all(|q| quants.contains(q))),
            (true, false) => Ok(pkg.children.iter().all(|c| packages.contains(c))),
            (true, true) => Ok(pkg.children.is_empty() && direct_quants().next().is_none()),
        }
    }

    // -----------------------------------------------------------------------
    // Structural mutation
    // -----------------------------------------------------------------------

    /// Put `id` under `parent` (or make it a root with `None`).
    ///
    /// # Errors
    ///
    /// - `Loop` if `parent` is `id` or one of its descendants.
    /// - `DepthExceeded` if the resulting tree is deeper than allowed.
    /// - `MultiLocation` if the resulting tree spans several locations.
    ///
    /// On error the store is left exactly as it was.
    pub fn set_parent(&mut self, id: PackageId, parent: Option<PackageId>) -> HierarchyResult<()> {
        let old = self.package(id)?.parent;
        if old == parent {
            return Ok(());
        }

        if let Some(new_parent) = parent {
            self.package(new_parent)?;
            if new_parent == id || self.ancestors(new_parent).contains(&id) {
                warn!(package = %id, parent = %new_parent, "reparent rejected: loop");
                return Err(HierarchyError::Loop {
                    packages: vec![self.label(id), self.label(new_parent)],
                });
            }
        }

        self.move_edge(id, old, parent);
        if let Err(err) = self.check_tree_of(id) {
            self.move_edge(id, parent, old);
            warn!(package = %id, error = %err, "reparent rejected");
            return Err(err);
        }

        debug!(
            package = %id,
            from = ?old.map(PackageId::get),
            to = ?parent.map(PackageId::get),
            depth = self.depth(self.top_or_self(id)),
            "package reparented"
        );
        Ok(())
    }

    fn move_edge(&mut self, id: PackageId, from: Option<PackageId>, to: Option<PackageId>) {
        if let Some(old_parent) = from
            && let Some(p) = self.packages.get_mut(&old_parent)
        {
            p.children.remove(&id);
        }
        self.refresh_depths(from);

        if let Some(pkg) = self.packages.get_mut(&id) {
            pkg.parent = to;
        }
        if let Some(new_parent) = to
            && let Some(p) = self.packages.get_mut(&new_parent)
        {
            p.children.insert(id);
        }
        self.refresh_depths(to);
    }

    /// Recompute cached depths from `start` upward, stopping at the first
    /// node whose depth is unchanged.
    fn refresh_depths(&mut self, start: Option<PackageId>) {
        let mut current = start;
        let mut guard = self.packages.len();
        while let Some(id) = current {
            let Some(pkg) = self.packages.get(&id) else {
                break;
            };
            let depth = 1 + pkg
                .children
                .iter()
                .filter_map(|c| self.packages.get(c))
                .map(|c| c.depth)
                .max()
                .unwrap_or(0);
            if depth == pkg.depth || guard == 0 {
                break;
            }
            guard -= 1;
            let parent = pkg.parent;
            if let Some(pkg) = self.packages.get_mut(&id) {
                pkg.depth = depth;
            }
            current = parent;
        }
    }

    /// Depth and location checks on the tree that contains `id`.
    fn check_tree_of(&self, id: PackageId) -> HierarchyResult<()> {
        let top = self.top_or_self(id);
        let depth = self.depth(top);
        if depth > self.config.max_package_depth {
            return Err(HierarchyError::DepthExceeded {
                package: self.label(top),
                depth,
                max_depth: self.config.max_package_depth,
            });
        }
        self.check_not_multi_location(&[top])
    }

    // -----------------------------------------------------------------------
    // Quants
    // -----------------------------------------------------------------------

    pub fn quant(&self, id: QuantId) -> Option<&Quant> {
        self.quants.get(&id)
    }

    pub fn quants(&self) -> impl Iterator<Item = &Quant> {
        self.quants.values()
    }

    /// Add stock, re-checking the location coherence of the receiving tree.
    pub fn add_quant(&mut self, draft: QuantDraft) -> HierarchyResult<QuantId> {
        let package = draft.package;
        let id = self.add_quant_unchecked(draft)?;
        if let Some(pkg) = package
            && let Err(err) = self.check_not_multi_location(&[pkg, self.top_or_self(pkg)])
        {
            self.remove_quant(id);
            warn!(quant = %id, error = %err, "quant rejected");
            return Err(err);
        }
        Ok(id)
    }

    /// Add stock without the location check. Used while a batch of moves is
    /// being relocated; the caller re-checks once the batch is complete.
    pub(crate) fn add_quant_unchecked(&mut self, draft: QuantDraft) -> HierarchyResult<QuantId> {
        if !self.locations.contains_key(&draft.location) {
            return Err(HierarchyError::not_found("location", draft.location));
        }
        if let Some(pkg) = draft.package {
            self.package(pkg)?;
        }
        self.next_quant += 1;
        let id = QuantId(self.next_quant);
        let quant = draft.into_quant(id);
        if let Some(pkg) = quant.package
            && let Some(p) = self.packages.get_mut(&pkg)
        {
            p.quants.insert(id);
        }
        debug!(quant = %id, product = %quant.product, qty = quant.quantity, "quant added");
        self.quants.insert(id, quant);
        Ok(id)
    }

    fn remove_quant(&mut self, id: QuantId) {
        if let Some(quant) = self.quants.remove(&id)
            && let Some(pkg) = quant.package
            && let Some(p) = self.packages.get_mut(&pkg)
        {
            p.quants.remove(&id);
        }
    }

    /// Pack or unpack a quant in place.
    pub fn set_quant_package(
        &mut self,
        quant: QuantId,
        package: Option<PackageId>,
    ) -> HierarchyResult<()> {
        let (location, old) = self
            .quants
            .get(&quant)
            .map(|q| (q.location, q.package))
            .ok_or_else(|| HierarchyError::not_found("quant", quant))?;
        if let Some(pkg) = package {
            self.package(pkg)?;
        }

        self.place_quant(quant, location, package);
        if let Some(pkg) = package
            && let Err(err) = self.check_not_multi_location(&[pkg, self.top_or_self(pkg)])
        {
            self.place_quant(quant, location, old);
            warn!(quant = %quant, error = %err, "repack rejected");
            return Err(err);
        }
        Ok(())
    }

    /// Move a quant without any check.
    pub(crate) fn place_quant(
        &mut self,
        quant: QuantId,
        location: LocationId,
        package: Option<PackageId>,
    ) {
        let Some(q) = self.quants.get_mut(&quant) else {
            return;
        };
        let old = q.package;
        q.location = location;
        q.package = package;
        if let Some(old_pkg) = old
            && let Some(p) = self.packages.get_mut(&old_pkg)
        {
            p.quants.remove(&quant);
        }
        if let Some(new_pkg) = package
            && let Some(p) = self.packages.get_mut(&new_pkg)
        {
            p.quants.insert(quant);
        }
    }

    /// Reserve part of a quant for an upcoming move.
    pub fn reserve(&mut self, quant: QuantId, quantity: f64) -> HierarchyResult<()> {
        let q = self
            .quants
            .get_mut(&quant)
            .ok_or_else(|| HierarchyError::not_found("quant", quant))?;
        let reserved = q.reserved_quantity + quantity;
        if reserved < 0.0 || reserved > q.quantity {
            return Err(HierarchyError::precondition(format!(
                "cannot reserve {quantity} of quant {quant}: {} available, {} reserved",
                q.quantity, q.reserved_quantity
            )));
        }
        q.reserved_quantity = reserved;
        Ok(())
    }

    /// Remove `quantity` of a product from a location/package, consuming
    /// matching quants in id order. Emptied quants are kept at zero.
    pub(crate) fn take_stock(
        &mut self,
        key: &(ProductId, Option<LotId>),
        location: LocationId,
        package: Option<PackageId>,
        quantity: f64,
    ) -> HierarchyResult<()> {
        let matching: Vec<QuantId> = self
            .quants
            .values()
            .filter(|q| {
                q.location == location
                    && q.package == package
                    && q.stock_key() == *key
                    && q.quantity > 0.0
            })
            .map(|q| q.id)
            .collect();
        let available: f64 = matching
            .iter()
            .filter_map(|q| self.quants.get(q))
            .map(|q| q.quantity)
            .sum();
        if available + QTY_EPSILON < quantity {
            let source = package.map_or_else(|| self.location_label(location), |p| self.label(p));
            return Err(HierarchyError::precondition(format!(
                "not enough {} in {source}: {available} available, {quantity} requested",
                key.0
            )));
        }

        let mut remaining = quantity;
        for id in matching {
            if remaining <= 0.0 {
                break;
            }
            if let Some(q) = self.quants.get_mut(&id) {
                let taken = q.quantity.min(remaining);
                q.quantity -= taken;
                q.reserved_quantity = q.reserved_quantity.min(q.quantity).max(0.0);
                remaining -= taken;
            }
        }
        Ok(())
    }

    /// Add `quantity` to a location/package, merging into an existing quant
    /// of the same product and lot when there is one. Unchecked.
    pub(crate) fn put_stock(
        &mut self,
        key: &(ProductId, Option<LotId>),
        location: LocationId,
        package: Option<PackageId>,
        quantity: f64,
    ) -> HierarchyResult<QuantId> {
        let existing = self
            .quants
            .values_mut()
            .find(|q| q.location == location && q.package == package && q.stock_key() == *key);
        if let Some(q) = existing {
            q.quantity += quantity;
            return Ok(q.id);
        }
        let mut draft = QuantDraft::new(key.0.clone(), quantity, location);
        draft.lot.clone_from(&key.1);
        draft.package = package;
        self.add_quant_unchecked(draft)
    }

    // -----------------------------------------------------------------------
    // Bulk restore
    // -----------------------------------------------------------------------

    /// Rebuild a store from persisted rows. Derived data (children, quant
    /// membership, depth) is recomputed; the forest must be acyclic.
    pub(crate) fn restore(
        config: WarehouseConfig,
        locations: Vec<Location>,
        packages: Vec<(PackageId, String, Option<PackageId>)>,
        quants: Vec<Quant>,
    ) -> HierarchyResult<Self> {
        let mut store = Self::new(config);
        store.next_location = locations.iter().map(|l| l.id.get()).max().unwrap_or(0);
        store.next_package = packages.iter().map(|p| p.0.get()).max().unwrap_or(0);
        store.next_quant = quants.iter().map(|q| q.id.get()).max().unwrap_or(0);

        store.locations = locations.into_iter().map(|l| (l.id, l)).collect();
        for (id, name, parent) in &packages {
            let mut pkg = Package::new(*id, name.clone());
            pkg.parent = *parent;
            store.packages.insert(*id, pkg);
        }
        for (id, _, parent) in &packages {
            if let Some(parent) = parent {
                store
                    .packages
                    .get_mut(parent)
                    .ok_or_else(|| HierarchyError::not_found("package", parent))?
                    .children
                    .insert(*id);
            }
        }
        for quant in quants {
            if let Some(pkg) = quant.package {
                store
                    .packages
                    .get_mut(&pkg)
                    .ok_or_else(|| HierarchyError::not_found("package", pkg))?
                    .quants
                    .insert(quant.id);
            }
            store.quants.insert(quant.id, quant);
        }

        let roots: Vec<PackageId> = store
            .packages
            .values()
            .filter(|p| p.parent.is_none())
            .map(|p| p.id)
            .collect();
        let reachable: BTreeSet<PackageId> = roots
            .iter()
            .flat_map(|root| store.descendants(*root))
            .collect();
        if reachable.len() != store.packages.len() {
            let cyclic = store
                .packages
                .keys()
                .filter(|id| !reachable.contains(id))
                .map(|id| store.label(*id))
                .collect();
            return Err(HierarchyError::Loop { packages: cyclic });
        }
        for root in roots {
            store.recompute_subtree_depth(root);
        }
        Ok(store)
    }

    fn recompute_subtree_depth(&mut self, root: PackageId) {
        for id in self.descendants(root).into_iter().rev() {
            let depth = self.packages.get(&id).map_or(1, |pkg| {
                1 + pkg
                    .children
                    .iter()
                    .filter_map(|c| self.packages.get(c))
                    .map(|c| c.depth)
                    .max()
                    .unwrap_or(0)
            });
            if let Some(pkg) = self.packages.get_mut(&id) {
                pkg.depth = depth;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_depth: u32) -> PackageStore {
        PackageStore::new(WarehouseConfig::with_max_depth(max_depth))
    }

    fn apple() -> ProductId {
        ProductId::new("apple")
    }

    fn abc(store: &mut PackageStore) -> (PackageId, PackageId, PackageId) {
        let a = store.create_package(Some("A")).expect("package");
        let b = store.create_package(Some("B")).expect("package");
        let c = store.create_package(Some("C")).expect("package");
        store.set_parent(b, Some(a)).expect("B under A");
        store.set_parent(c, Some(b)).expect("C under B");
        (a, b, c)
    }

    #[test]
    fn sequence_names_when_unnamed() {
        let mut s = store(2);
        let first = s.create_package(None).expect("package");
        let second = s.create_package(None).expect("package");
        assert_eq!(s.label(first), "PACK0000001");
        assert_eq!(s.label(second), "PACK0000002");
    }

    #[test]
    fn depth_follows_children() {
        let mut s = store(3);
        let (a, b, c) = abc(&mut s);
        assert_eq!(s.depth(a), 3);
        assert_eq!(s.depth(b), 2);
        assert_eq!(s.depth(c), 1);

        s.set_parent(c, None).expect("detach C");
        assert_eq!(s.depth(a), 2);
        assert_eq!(s.depth(b), 1);
        assert!(s.get(b).expect("B").is_leaf());
    }

    #[test]
    fn ancestors_nearest_first() {
        let mut s = store(3);
        let (a, b, c) = abc(&mut s);
        assert_eq!(s.ancestors(c), vec![b, a]);
        assert_eq!(s.num_ancestors(c), 2);
        assert_eq!(s.top_ancestor(c), Some(a));
        assert_eq!(s.top_ancestor(a), None);
        assert_eq!(s.top_or_self(a), a);
        assert!(!s.ancestors(c).contains(&c));
    }

    #[test]
    fn descendants_breadth_first() {
        let mut s = store(3);
        let (a, b, c) = abc(&mut s);
        let d = s.create_package(Some("D")).expect("package");
        s.set_parent(d, Some(a)).expect("D under A");
        assert_eq!(s.descendants(a), vec![a, b, d, c]);
        assert!(s.descendants(PackageId(99)).is_empty());
    }

    #[test]
    fn self_parent_is_a_loop() {
        let mut s = store(3);
        let a = s.create_package(Some("A")).expect("package");
        let err = s.set_parent(a, Some(a)).expect_err("loop");
        assert!(matches!(err, HierarchyError::Loop { .. }));
    }

    #[test]
    fn child_and_grandchild_as_parent_are_loops() {
        let mut s = store(4);
        let (a, b, c) = abc(&mut s);
        let before = s.clone();

        let err = s.set_parent(a, Some(b)).expect_err("child as parent");
        assert!(matches!(err, HierarchyError::Loop { .. }));
        let err = s.set_parent(a, Some(c)).expect_err("grandchild as parent");
        assert!(matches!(err, HierarchyError::Loop { .. }));
        assert_eq!(s, before);
    }

    #[test]
    fn depth_limit_rejects_and_restores() {
        let mut s = store(3);
        let (a, _, c) = abc(&mut s);
        let d = s.create_package(Some("D")).expect("package");
        let before = s.clone();

        let err = s.set_parent(d, Some(c)).expect_err("too deep");
        assert_eq!(
            err,
            HierarchyError::DepthExceeded {
                package: "A".into(),
                depth: 4,
                max_depth: 3,
            }
        );
        assert_eq!(s, before);
        assert_eq!(s.depth(a), 3);
    }

    #[test]
    fn noop_reparent_is_ok() {
        let mut s = store(2);
        let a = s.create_package(Some("A")).expect("package");
        let b = s.create_package(Some("B")).expect("package");
        s.set_parent(b, Some(a)).expect("link");
        s.set_parent(b, Some(a)).expect("same parent again");
        s.set_parent(a, None).expect("already root");
        assert_eq!(s.parent_of(b), Some(a));
    }

    #[test]
    fn display_name_includes_parent() {
        let mut s = store(2);
        let pallet = s.create_package(Some("PALLET")).expect("package");
        let bx = s.create_package(Some("BOX")).expect("package");
        assert_eq!(s.display_name(bx).expect("name"), "BOX");
        s.set_parent(bx, Some(pallet)).expect("link");
        assert_eq!(s.display_name(bx).expect("name"), "PALLET/BOX");
        assert_eq!(s.find_by_name("BOX"), Some(bx));
    }

    #[test]
    fn multi_location_names_package_and_locations() {
        let mut s = store(2);
        let l1 = s.add_location("Shelf 1").expect("location");
        let l2 = s.add_location("Shelf 2").expect("location");
        let p = s.create_package(Some("P")).expect("package");
        s.add_quant_unchecked(QuantDraft::new(apple(), 1.0, l1).in_package(p))
            .expect("q1");
        s.add_quant_unchecked(QuantDraft::new(apple(), 1.0, l2).in_package(p))
            .expect("q2");

        let err = s.check_not_multi_location(&[p]).expect_err("two locations");
        assert_eq!(
            err,
            HierarchyError::MultiLocation {
                package: "P".into(),
                locations: vec!["Shelf 1".into(), "Shelf 2".into()],
            }
        );
        assert_eq!(s.location_of(p), None);
    }

    #[test]
    fn checked_quant_rejects_second_location() {
        let mut s = store(2);
        let l1 = s.add_location("L1").expect("location");
        let l2 = s.add_location("L2").expect("location");
        let pallet = s.create_package(Some("PALLET")).expect("package");
        let bx = s.create_package(Some("BOX")).expect("package");
        s.set_parent(bx, Some(pallet)).expect("link");
        s.add_quant(QuantDraft::new(apple(), 2.0, l1).in_package(pallet))
            .expect("first");

        let err = s
            .add_quant(QuantDraft::new(apple(), 2.0, l2).in_package(bx))
            .expect_err("box in another location");
        assert!(matches!(err, HierarchyError::MultiLocation { .. }));
        assert_eq!(s.quants().count(), 1);
        assert_eq!(s.location_of(pallet), Some(l1));
    }

    #[test]
    fn reparent_across_locations_is_rejected() {
        let mut s = store(2);
        let l1 = s.add_location("L1").expect("location");
        let l2 = s.add_location("L2").expect("location");
        let pallet = s.create_package(Some("PALLET")).expect("package");
        let bx = s.create_package(Some("BOX")).expect("package");
        s.add_quant(QuantDraft::new(apple(), 1.0, l1).in_package(pallet))
            .expect("pallet stock");
        s.add_quant(QuantDraft::new(apple(), 1.0, l2).in_package(bx))
            .expect("box stock");

        let err = s.set_parent(bx, Some(pallet)).expect_err("multi-location");
        assert!(matches!(err, HierarchyError::MultiLocation { .. }));
        assert_eq!(s.parent_of(bx), None);
        assert_eq!(s.depth(pallet), 1);
    }

    #[test]
    fn aggregated_contents_skip_zero_quants() {
        let mut s = store(2);
        let l1 = s.add_location("L1").expect("location");
        let pallet = s.create_package(Some("PALLET")).expect("package");
        let bx = s.create_package(Some("BOX")).expect("package");
        s.set_parent(bx, Some(pallet)).expect("link");
        let full = s
            .add_quant(QuantDraft::new(apple(), 3.0, l1).in_package(bx))
            .expect("full");
        s.add_quant(QuantDraft::new(apple(), 0.0, l1).in_package(pallet))
            .expect("empty");

        let ids: Vec<QuantId> = s.aggregated_contents(pallet).iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![full]);
    }

    #[test]
    fn is_all_contents_in_packages() {
        let mut s = store(2);
        let pallet = s.create_package(Some("PALLET")).expect("package");
        let b1 = s.create_package(Some("B1")).expect("package");
        let b2 = s.create_package(Some("B2")).expect("package");
        s.set_parent(b1, Some(pallet)).expect("b1");
        s.set_parent(b2, Some(pallet)).expect("b2");

        let both = [ContentRef::Package(b1), ContentRef::Package(b2)];
        assert!(s.is_all_contents_in(pallet, &both).expect("ok"));
        assert!(!s.is_all_contents_in(pallet, &both[..1]).expect("ok"));
        // siblings hold no packages, so any package set covers them
        assert!(s.is_all_contents_in(b1, &[ContentRef::Package(b2)]).expect("ok"));
    }

    #[test]
    fn is_all_contents_in_quants_and_empty_set() {
        let mut s = store(2);
        let l1 = s.add_location("L1").expect("location");
        let bx = s.create_package(Some("BOX")).expect("package");
        let empty = s.create_package(Some("EMPTY")).expect("package");
        let q1 = s
            .add_quant(QuantDraft::new(apple(), 1.0, l1).in_package(bx))
            .expect("q1");
        let q2 = s
            .add_quant(QuantDraft::new(apple(), 1.0, l1).in_package(bx))
            .expect("q2");

        assert!(s
            .is_all_contents_in(bx, &[ContentRef::Quant(q1), ContentRef::Quant(q2)])
            .expect("ok"));
        assert!(!s.is_all_contents_in(bx, &[ContentRef::Quant(q1)]).expect("ok"));
        assert!(!s.is_all_contents_in(bx, &[]).expect("ok"));
        assert!(s.is_all_contents_in(empty, &[]).expect("ok"));
    }

    #[test]
    fn is_all_contents_in_rejects_other_types() {
        let mut s = store(2);
        let l1 = s.add_location("L1").expect("location");
        let bx = s.create_package(Some("BOX")).expect("package");
        let err = s
            .is_all_contents_in(bx, &[ContentRef::Location(l1)])
            .expect_err("location");
        assert_eq!(err, HierarchyError::TypeMismatch { got: "location".into() });

        let err = s
            .is_all_contents_in(bx, &[ContentRef::Quant(QuantId(1)), ContentRef::Package(bx)])
            .expect_err("mixed");
        assert!(matches!(err, HierarchyError::TypeMismatch { .. }));
    }

    #[test]
    fn delete_refused_with_children_and_unpacks_quants() {
        let mut s = store(2);
        let l1 = s.add_location("L1").expect("location");
        let pallet = s.create_package(Some("PALLET")).expect("package");
        let bx = s.create_package(Some("BOX")).expect("package");
        s.set_parent(bx, Some(pallet)).expect("link");
        let q = s
            .add_quant(QuantDraft::new(apple(), 1.0, l1).in_package(bx))
            .expect("q");

        let err = s.delete_package(pallet).expect_err("has children");
        assert_eq!(err, HierarchyError::HasChildren { package: "PALLET".into(), children: 1 });

        s.delete_package(bx).expect("delete box");
        assert_eq!(s.quant(q).expect("quant").package, None);
        assert_eq!(s.depth(pallet), 1);
        assert!(s.get(pallet).expect("pallet").children().is_empty());
    }

    #[test]
    fn take_and_put_stock() {
        let mut s = store(2);
        let l1 = s.add_location("L1").expect("location");
        let l2 = s.add_location("L2").expect("location");
        let bx = s.create_package(Some("BOX")).expect("package");
        let key = (apple(), None);
        s.add_quant(QuantDraft::new(apple(), 5.0, l1).in_package(bx))
            .expect("stock");

        let err = s.take_stock(&key, l1, Some(bx), 6.0).expect_err("short");
        assert!(matches!(err, HierarchyError::Precondition(_)));

        s.take_stock(&key, l1, Some(bx), 4.0).expect("take");
        let q = s.put_stock(&key, l2, None, 4.0).expect("put");
        let again = s.put_stock(&key, l2, None, 1.0).expect("merge");
        assert_eq!(q, again);
        assert!((s.quant(q).expect("q").quantity - 5.0).abs() < f64::EPSILON);
        assert_eq!(s.aggregated_contents(bx).len(), 1);
    }

    #[test]
    fn reserve_is_bounded_by_quantity() {
        let mut s = store(2);
        let l1 = s.add_location("L1").expect("location");
        let q = s.add_quant(QuantDraft::new(apple(), 2.0, l1)).expect("q");
        s.reserve(q, 2.0).expect("reserve all");
        assert!(s.reserve(q, 0.5).is_err());
    }

    #[test]
    fn restore_recomputes_depth_and_detects_cycles() {
        let loc = Location { id: LocationId(1), name: "L1".into() };
        let restored = PackageStore::restore(
            WarehouseConfig::default(),
            vec![loc.clone()],
            vec![
                (PackageId(1), "P".into(), None),
                (PackageId(2), "B".into(), Some(PackageId(1))),
            ],
            Vec::new(),
        )
        .expect("restore");
        assert_eq!(restored.depth(PackageId(1)), 2);

        let mut again = restored.clone();
        assert_eq!(again.create_package(None).expect("package"), PackageId(3));

        let err = PackageStore::restore(
            WarehouseConfig::default(),
            vec![loc],
            vec![
                (PackageId(1), "X".into(), Some(PackageId(2))),
                (PackageId(2), "Y".into(), Some(PackageId(1))),
            ],
            Vec::new(),
        )
        .expect_err("cycle");
        assert!(matches!(err, HierarchyError::Loop { .. }));
    }
}
