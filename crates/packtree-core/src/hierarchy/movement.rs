//! Movement integration: where stock moves meet the package hierarchy.
//!
//! Movement lines are owned by the picking workflow; this module keeps them
//! in a [`MoveLineStore`] and decides what they mean for the tree:
//!
//! - before completion, which whole packages are leaving their parent
//!   (entire-package detection and unlinks),
//! - which parent a destination package should end up in (result parents),
//! - at completion, relocating the stock and applying the links.

#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use super::error::{HierarchyError, HierarchyResult};
use super::store::{ContentRef, PackageStore};
use crate::collection;
use crate::model::{
    LinkDraft, LinkId, LocationId, LotId, MoveLine, MoveLineDraft, MoveLineId, PackageId,
    PickingId, ProductId, QTY_EPSILON,
};
use crate::warehouse::Warehouse;

// ---------------------------------------------------------------------------
// Move line store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveLineStore {
    lines: BTreeMap<MoveLineId, MoveLine>,
    next_id: u64,
}

impl MoveLineStore {
    /// Insert a line without any check. [`Warehouse::add_move_line`] is the
    /// checked entry point.
    pub fn add(&mut self, draft: MoveLineDraft) -> MoveLineId {
        self.next_id += 1;
        let id = MoveLineId(self.next_id);
        self.lines.insert(id, draft.into_line(id));
        id
    }

    pub fn get(&self, id: MoveLineId) -> Option<&MoveLine> {
        self.lines.get(&id)
    }

    pub fn line(&self, id: MoveLineId) -> HierarchyResult<&MoveLine> {
        self.lines
            .get(&id)
            .ok_or_else(|| HierarchyError::not_found("move line", id))
    }

    pub(crate) fn line_mut(&mut self, id: MoveLineId) -> HierarchyResult<&mut MoveLine> {
        self.lines
            .get_mut(&id)
            .ok_or_else(|| HierarchyError::not_found("move line", id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MoveLine> {
        self.lines.values()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Resolve a list of ids, failing on the first unknown one.
    pub fn resolve(&self, ids: &[MoveLineId]) -> HierarchyResult<Vec<&MoveLine>> {
        ids.iter().map(|id| self.line(*id)).collect()
    }

    pub fn of_picking(&self, picking: PickingId) -> Vec<&MoveLine> {
        self.lines
            .values()
            .filter(|line| line.picking == Some(picking))
            .collect()
    }

    /// `lines` plus every line split from the same stock moves.
    pub fn sharing_moves(&self, lines: &BTreeSet<MoveLineId>) -> BTreeSet<MoveLineId> {
        let moves: BTreeSet<_> = lines
            .iter()
            .filter_map(|id| self.lines.get(id))
            .filter_map(|line| line.move_id)
            .collect();
        let mut out = lines.clone();
        out.extend(
            self.lines
                .values()
                .filter(|line| line.move_id.is_some_and(|m| moves.contains(&m)))
                .map(|line| line.id),
        );
        out
    }

    /// Lines whose source or destination package is one of `packages`.
    pub fn touching(&self, packages: &BTreeSet<PackageId>) -> Vec<&MoveLine> {
        self.lines
            .values()
            .filter(|line| packages.iter().any(|p| line.touches(*p)))
            .collect()
    }

    pub fn set_quantity_done(&mut self, id: MoveLineId, quantity: f64) -> HierarchyResult<()> {
        if quantity < 0.0 {
            return Err(HierarchyError::precondition(format!(
                "done quantity of move line {id} cannot be negative"
            )));
        }
        let line = self.line_mut(id)?;
        if line.done {
            return Err(HierarchyError::precondition(format!(
                "move line {id} is already done"
            )));
        }
        line.quantity_done = quantity;
        Ok(())
    }

    pub fn set_selected(&mut self, id: MoveLineId, selected: bool) -> HierarchyResult<()> {
        self.line_mut(id)?.selected = selected;
        Ok(())
    }

    pub fn remove(&mut self, id: MoveLineId) -> Option<MoveLine> {
        self.lines.remove(&id)
    }

    pub(crate) fn restore(lines: Vec<MoveLine>) -> Self {
        let next_id = lines.iter().map(|l| l.id.get()).max().unwrap_or(0);
        Self {
            lines: lines.into_iter().map(|l| (l.id, l)).collect(),
            next_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

type StockKey = (ProductId, Option<LotId>);

/// True when `lines` carry at least the contents of `packages`.
///
/// Contents are summed per product and lot over the union of the packages'
/// subtrees; only lines whose source package lies in that union count.
/// Over-delivery is tolerated. Empty packages are always fulfilled.
pub fn is_fulfilled_by(store: &PackageStore, packages: &[PackageId], lines: &[&MoveLine]) -> bool {
    let subtree: BTreeSet<PackageId> = packages
        .iter()
        .flat_map(|pkg| store.descendants(*pkg))
        .collect();

    let mut needed: BTreeMap<StockKey, f64> = BTreeMap::new();
    for pkg in &subtree {
        let Some(package) = store.get(*pkg) else {
            continue;
        };
        for quant in package.quants().iter().filter_map(|q| store.quant(*q)) {
            if quant.is_material() {
                *needed.entry(quant.stock_key()).or_default() += quant.quantity;
            }
        }
    }

    let mut carried: BTreeMap<StockKey, f64> = BTreeMap::new();
    for line in lines {
        if line.source_package.is_some_and(|p| subtree.contains(&p)) {
            *carried.entry(line.stock_key()).or_default() += line.quantity;
        }
    }

    needed
        .iter()
        .all(|(key, qty)| carried.get(key).copied().unwrap_or(0.0) + QTY_EPSILON >= *qty)
}

/// Lines acting on `package` or anything inside it.
pub fn move_lines_of_children<'a>(
    store: &PackageStore,
    move_lines: &'a MoveLineStore,
    package: PackageId,
) -> Vec<&'a MoveLine> {
    let subtree: BTreeSet<PackageId> = store.descendants(package).into_iter().collect();
    move_lines.touching(&subtree)
}

/// Pickings whose lines reference a nested package in the subtree of
/// `package`.
pub fn pickings_of_package(
    store: &PackageStore,
    move_lines: &MoveLineStore,
    package: PackageId,
) -> BTreeSet<PickingId> {
    let nested: BTreeSet<PackageId> = store
        .descendants(package)
        .into_iter()
        .filter(|p| store.parent_of(*p).is_some())
        .collect();
    move_lines
        .touching(&nested)
        .into_iter()
        .filter_map(|line| line.picking)
        .collect()
}

/// Packages moved whole by a picking.
///
/// Starts from the fulfilled source packages of the picking's lines, then
/// climbs: a parent joins when all its child packages are already in the set
/// and the lines also cover its own contents.
pub fn entire_packages_of_picking(
    store: &PackageStore,
    move_lines: &MoveLineStore,
    picking: PickingId,
) -> HierarchyResult<Vec<PackageId>> {
    let lines = move_lines.of_picking(picking);
    let sources: BTreeSet<PackageId> = lines.iter().filter_map(|l| l.source_package).collect();
    let mut entire: BTreeSet<PackageId> = sources
        .into_iter()
        .filter(|pkg| is_fulfilled_by(store, &[*pkg], &lines))
        .collect();

    loop {
        let targets: Vec<ContentRef> = entire.iter().map(|p| ContentRef::Package(*p)).collect();
        let parents: BTreeSet<PackageId> = entire
            .iter()
            .filter_map(|p| store.parent_of(*p))
            .filter(|p| !entire.contains(p))
            .collect();
        let mut grown = false;
        for parent in parents {
            if store.is_all_contents_in(parent, &targets)?
                && is_fulfilled_by(store, &[parent], &lines)
            {
                entire.insert(parent);
                grown = true;
            }
        }
        if !grown {
            break;
        }
    }

    Ok(entire.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Warehouse operations
// ---------------------------------------------------------------------------

/// Outcome of [`Warehouse::complete_move_lines`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Lines whose stock was relocated.
    pub lines: usize,
    /// Links applied to the tree.
    pub links: Vec<LinkId>,
}

impl Warehouse {
    /// Add a movement line, checking its references and result parent.
    pub fn add_move_line(&mut self, draft: MoveLineDraft) -> HierarchyResult<MoveLineId> {
        for location in [draft.source_location, draft.destination_location] {
            if self.packages.location(location).is_none() {
                return Err(HierarchyError::not_found("location", location));
            }
        }
        for pkg in [
            draft.source_package,
            draft.destination_package,
            draft.result_parent_package,
        ]
        .into_iter()
        .flatten()
        {
            self.packages.package(pkg)?;
        }

        let id = self.move_lines.add(draft);
        let checked = self
            .move_lines
            .line(id)
            .and_then(|line| self.check_result_parent(line));
        if let Err(err) = checked {
            self.move_lines.remove(id);
            return Err(err);
        }
        debug!(line = %id, "move line added");
        Ok(id)
    }

    /// Request a parent for the line's destination package. Reverted on
    /// failure.
    pub fn set_result_parent(
        &mut self,
        line: MoveLineId,
        parent: Option<PackageId>,
    ) -> HierarchyResult<()> {
        if let Some(parent) = parent {
            self.packages.package(parent)?;
        }
        let before = std::mem::replace(&mut self.move_lines.line_mut(line)?.result_parent_package, parent);
        let checked = self
            .move_lines
            .line(line)
            .and_then(|l| self.check_result_parent(l));
        if let Err(err) = checked {
            self.move_lines.line_mut(line)?.result_parent_package = before;
            return Err(err);
        }
        Ok(())
    }

    /// Change the line's destination package. Clearing it also clears the
    /// requested result parent.
    pub fn set_destination_package(
        &mut self,
        line: MoveLineId,
        package: Option<PackageId>,
    ) -> HierarchyResult<()> {
        if let Some(pkg) = package {
            self.packages.package(pkg)?;
        }
        let before = self.move_lines.line(line)?.clone();
        {
            let l = self.move_lines.line_mut(line)?;
            l.destination_package = package;
            if package.is_none() {
                l.result_parent_package = None;
            }
        }
        let checked = self
            .move_lines
            .line(line)
            .and_then(|l| self.check_result_parent(l));
        if let Err(err) = checked {
            *self.move_lines.line_mut(line)? = before;
            return Err(err);
        }
        Ok(())
    }

    /// A result parent needs a destination package, and within one picking a
    /// destination package may be sent to only one parent.
    fn check_result_parent(&self, line: &MoveLine) -> HierarchyResult<()> {
        if line.result_parent_package.is_none() {
            return Ok(());
        }
        let Some(result_package) = line.destination_package else {
            return Err(HierarchyError::precondition(
                "cannot set a result parent package on a move line without a destination package",
            ));
        };

        let siblings: Vec<&MoveLine> = match line.picking {
            Some(picking) => self.move_lines.of_picking(picking),
            None => vec![line],
        };
        let parents: BTreeSet<PackageId> = siblings
            .iter()
            .filter(|l| l.destination_package == Some(result_package))
            .filter_map(|l| l.result_parent_package)
            .collect();
        if parents.len() > 1 {
            return Err(HierarchyError::precondition(format!(
                "multiple result parent packages for package {}: {}",
                self.packages.label(result_package),
                parents
                    .iter()
                    .map(|p| self.packages.label(*p))
                    .collect::<Vec<_>>()
                    .join(" ")
            )));
        }
        Ok(())
    }

    /// Propose unlinks for packages that leave their parent whole.
    ///
    /// Candidates are the lines' source packages and their ancestors. Of the
    /// fulfilled ones, only those whose parent is not fulfilled get an
    /// unlink: a fulfilled parent travels together with its children.
    pub fn construct_hierarchy_links_for(
        &mut self,
        line_ids: &[MoveLineId],
    ) -> HierarchyResult<Vec<LinkId>> {
        let lines = self.move_lines.resolve(line_ids)?;
        let mut candidates = BTreeSet::new();
        for source in lines.iter().filter_map(|l| l.source_package) {
            candidates.insert(source);
            candidates.extend(self.packages.ancestors(source));
        }

        let fulfilled: BTreeSet<PackageId> = candidates
            .into_iter()
            .filter(|pkg| is_fulfilled_by(&self.packages, &[*pkg], &lines))
            .collect();
        let top_fulfilled: Vec<PackageId> = fulfilled
            .iter()
            .copied()
            .filter(|pkg| {
                self.packages
                    .parent_of(*pkg)
                    .is_some_and(|parent| !fulfilled.contains(&parent))
            })
            .collect();

        debug!(
            fulfilled = fulfilled.len(),
            top = top_fulfilled.len(),
            "entire packages detected"
        );
        self.links
            .create_unlinks(&top_fulfilled, &lines, &self.packages, &self.move_lines)
    }

    /// The picking confirmed that entire packages are moving.
    pub fn on_entire_package_detected(&mut self, picking: PickingId) -> HierarchyResult<Vec<LinkId>> {
        let ids: Vec<MoveLineId> = self
            .move_lines
            .of_picking(picking)
            .iter()
            .map(|l| l.id)
            .collect();
        self.construct_hierarchy_links_for(&ids)
    }

    /// Create links for the result parents requested by `line_ids`.
    ///
    /// Lines without a result parent are skipped. An existing link for the
    /// same edge is reused and gets the line attached.
    pub fn propose_result_parents(&mut self, line_ids: &[MoveLineId]) -> HierarchyResult<Vec<LinkId>> {
        let mut wanted: BTreeMap<(PackageId, PackageId), BTreeSet<MoveLineId>> = BTreeMap::new();
        for line in self.move_lines.resolve(line_ids)? {
            let Some(parent) = line.result_parent_package else {
                continue;
            };
            self.check_result_parent(line)?;
            if let Some(child) = line.destination_package {
                wanted.entry((parent, child)).or_default().insert(line.id);
            }
        }

        let mut ids = Vec::new();
        let mut drafts = Vec::new();
        for ((parent, child), lines) in wanted {
            match self.links.find(Some(parent), child) {
                Some(existing) => {
                    self.links.attach_move_lines(existing, lines)?;
                    ids.push(existing);
                }
                None => drafts.push(LinkDraft::link(parent, child).with_move_lines(lines)),
            }
        }
        ids.extend(self.links.create(drafts, &self.packages, &self.move_lines)?);
        Ok(ids)
    }

    /// Complete movement lines.
    ///
    /// Relocates each line's done quantity with location checks suspended,
    /// then applies the links of each group of lines sharing a destination
    /// location, then re-checks the destination packages and their trees.
    /// Runs as one transaction.
    pub fn complete_move_lines(&mut self, line_ids: &[MoveLineId]) -> HierarchyResult<Completion> {
        self.transaction(|wh| {
            wh.propose_result_parents(line_ids)?;

            let lines: Vec<MoveLine> = wh
                .move_lines
                .resolve(line_ids)?
                .into_iter()
                .filter(|l| l.quantity_done > 0.0)
                .cloned()
                .collect();
            if let Some(done) = lines.iter().find(|l| l.done) {
                return Err(HierarchyError::precondition(format!(
                    "move line {} is already done",
                    done.id
                )));
            }

            for line in &lines {
                let key = line.stock_key();
                wh.packages.take_stock(
                    &key,
                    line.source_location,
                    line.source_package,
                    line.quantity_done,
                )?;
                wh.packages.put_stock(
                    &key,
                    line.destination_location,
                    line.destination_package,
                    line.quantity_done,
                )?;
                let stored = wh.move_lines.line_mut(line.id)?;
                stored.done = true;
                stored.selected = false;
            }

            let mut applied = Vec::new();
            for (location, group) in collection::group_by(&lines, |l| l.destination_location) {
                let ids: BTreeSet<MoveLineId> = group.iter().map(|l| l.id).collect();
                let links = wh.links.links_of_move_lines(&ids);
                debug!(location = %location, links = links.len(), "constructing links");
                wh.links.construct(&links, &mut wh.packages)?;
                applied.extend(links);
            }

            let mut to_check = Vec::new();
            for pkg in lines.iter().filter_map(|l| l.destination_package) {
                to_check.push(pkg);
                to_check.push(wh.packages.top_or_self(pkg));
            }
            wh.packages.check_not_multi_location(&to_check)?;

            applied.sort_unstable();
            applied.dedup();
            info!(lines = lines.len(), links = applied.len(), "move lines completed");
            Ok(Completion {
                lines: lines.len(),
                links: applied,
            })
        })
    }

    /// Put the destination packages of the picking's selected lines on
    /// `pallet`, then clear the selection.
    pub fn palletise(
        &mut self,
        pallet: Option<PackageId>,
        picking: PickingId,
    ) -> HierarchyResult<Vec<PackageId>> {
        let Some(pallet) = pallet else {
            return Err(HierarchyError::precondition("Select a pallet."));
        };
        self.packages.package(pallet)?;

        let picking_lines: Vec<MoveLineId> = self
            .move_lines
            .of_picking(picking)
            .iter()
            .map(|l| l.id)
            .collect();
        let packages: BTreeSet<PackageId> = self
            .move_lines
            .of_picking(picking)
            .into_iter()
            .filter(|l| l.selected)
            .filter_map(|l| l.destination_package)
            .collect();
        if packages.is_empty() {
            return Err(HierarchyError::precondition(
                "Select the move lines to palletise.",
            ));
        }

        let palletised = self.transaction(|wh| {
            for pkg in &packages {
                wh.packages.set_parent(*pkg, Some(pallet))?;
            }
            wh.packages.check_not_multi_location(&[pallet])?;
            for id in &picking_lines {
                wh.move_lines.set_selected(*id, false)?;
            }
            Ok(packages.iter().copied().collect::<Vec<_>>())
        });
        if let Err(err) = &palletised {
            warn!(pallet = %pallet, picking = %picking, error = %err, "palletise failed");
        }
        palletised
    }

    /// Process a whole package within a picking, or undo that.
    ///
    /// The open lines of the picking acting on `package` or anything inside
    /// it are considered. While any of them has less done than planned, each
    /// gets its planned quantity as done and, when `destination` is given,
    /// that destination location. Once all are fully done, their done
    /// quantities go back to zero. Returns whether the lines are now
    /// processed.
    pub fn toggle_processed(
        &mut self,
        package: PackageId,
        picking: PickingId,
        destination: Option<LocationId>,
    ) -> HierarchyResult<bool> {
        self.packages.package(package)?;
        if let Some(location) = destination
            && self.packages.location(location).is_none()
        {
            return Err(HierarchyError::not_found("location", location));
        }

        let lines: Vec<(MoveLineId, f64, f64)> = self
            .move_lines_of_children(package)
            .into_iter()
            .filter(|l| l.picking == Some(picking) && !l.done)
            .map(|l| (l.id, l.quantity, l.quantity_done))
            .collect();
        if lines.is_empty() {
            return Err(HierarchyError::precondition(format!(
                "package {} has no open move lines in picking {picking}",
                self.packages.label(package)
            )));
        }

        let process = lines
            .iter()
            .any(|(_, planned, done)| done + QTY_EPSILON < *planned);
        for (id, planned, _) in &lines {
            let line = self.move_lines.line_mut(*id)?;
            if process {
                line.quantity_done = *planned;
                if let Some(location) = destination {
                    line.destination_location = location;
                }
            } else {
                line.quantity_done = 0.0;
            }
        }
        debug!(
            package = %package,
            picking = %picking,
            lines = lines.len(),
            processed = process,
            "package processing toggled"
        );
        Ok(process)
    }

    /// Lines acting on `package` or anything inside it.
    pub fn move_lines_of_children(&self, package: PackageId) -> Vec<&MoveLine> {
        move_lines_of_children(&self.packages, &self.move_lines, package)
    }

    pub fn pickings_of_package(&self, package: PackageId) -> BTreeSet<PickingId> {
        pickings_of_package(&self.packages, &self.move_lines, package)
    }

    pub fn entire_packages_of_picking(&self, picking: PickingId) -> HierarchyResult<Vec<PackageId>> {
        entire_packages_of_picking(&self.packages, &self.move_lines, picking)
    }

    /// See [`is_fulfilled_by`].
    pub fn is_fulfilled_by(
        &self,
        packages: &[PackageId],
        line_ids: &[MoveLineId],
    ) -> HierarchyResult<bool> {
        let lines = self.move_lines.resolve(line_ids)?;
        Ok(is_fulfilled_by(&self.packages, packages, &lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WarehouseConfig;
    use crate::model::{MoveId, QuantDraft};

    struct Site {
        wh: Warehouse,
        l1: LocationId,
        l2: LocationId,
        l3: LocationId,
    }

    fn site() -> Site {
        let mut wh = Warehouse::new(WarehouseConfig::default());
        let l1 = wh.add_location("L1").expect("location");
        let l2 = wh.add_location("L2").expect("location");
        let l3 = wh.add_location("L3").expect("location");
        Site { wh, l1, l2, l3 }
    }

    fn banana() -> ProductId {
        ProductId::new("banana")
    }

    impl Site {
        fn pkg(&mut self, name: &str) -> PackageId {
            self.wh.create_package(Some(name)).expect("package")
        }

        fn stock(&mut self, pkg: PackageId, qty: f64) {
            self.wh
                .add_quant(QuantDraft::new(banana(), qty, self.l1).in_package(pkg))
                .expect("stock");
        }

        fn take(&mut self, pkg: PackageId, qty: f64) -> MoveLineId {
            let draft = MoveLineDraft::new(banana(), qty, self.l1, self.l2)
                .in_package(pkg)
                .of_move(MoveId(1))
                .of_picking(PickingId(1));
            self.wh.add_move_line(draft).expect("line")
        }
    }

    #[test]
    fn fulfilment_exact_short_and_over() {
        for (carried, expected) in [(10.0, true), (9.0, false), (11.0, true)] {
            let mut s = site();
            let bx = s.pkg("BOX");
            s.stock(bx, 10.0);
            let line = s.take(bx, carried);
            assert_eq!(s.wh.is_fulfilled_by(&[bx], &[line]).expect("ok"), expected);
        }
    }

    #[test]
    fn fulfilment_aggregates_packages_and_products() {
        let mut s = site();
        let b1 = s.pkg("B1");
        let b2 = s.pkg("B2");
        let other = s.pkg("OTHER");
        s.stock(b1, 1.0);
        s.stock(b2, 1.0);
        s.wh
            .add_quant(QuantDraft::new(ProductId::new("apple"), 4.0, s.l1).in_package(other))
            .expect("apples");
        let l1 = s.take(b1, 1.0);
        let l2 = s.take(b2, 1.0);

        assert!(s.wh.is_fulfilled_by(&[b1, b2], &[l1, l2]).expect("ok"));
        assert!(!s.wh.is_fulfilled_by(&[b1, b2, other], &[l1, l2]).expect("ok"));

        let apples = MoveLineDraft::new(ProductId::new("apple"), 4.0, s.l1, s.l2).in_package(other);
        let l3 = s.wh.add_move_line(apples).expect("apple line");
        assert!(s.wh.is_fulfilled_by(&[b1, b2, other], &[l1, l2, l3]).expect("ok"));
    }

    #[test]
    fn empty_package_is_fulfilled() {
        let mut s = site();
        let empty = s.pkg("EMPTY");
        assert!(s.wh.is_fulfilled_by(&[empty], &[]).expect("ok"));
    }

    #[test]
    fn entire_package_detection_creates_top_unlinks() {
        // PALLET > {A > {C, D}, B > {E, F}} with lines for C, D and E
        let mut s = site();
        s.wh.set_config(WarehouseConfig::with_max_depth(3));
        let pallet = s.pkg("PALLET");
        let names = ["A", "B", "C", "D", "E", "F"];
        let ids: Vec<PackageId> = names.iter().map(|n| s.pkg(n)).collect();
        let (a, b, c, d, e, f) = (ids[0], ids[1], ids[2], ids[3], ids[4], ids[5]);
        for (child, parent) in [(a, pallet), (b, pallet), (c, a), (d, a), (e, b), (f, b)] {
            s.wh.set_parent(child, Some(parent)).expect("nest");
        }
        for leaf in [c, d, e, f] {
            s.stock(leaf, 5.0);
        }
        let lines = [s.take(c, 5.0), s.take(d, 5.0), s.take(e, 5.0)];

        let links = s.wh.construct_hierarchy_links_for(&lines).expect("links");
        let children: BTreeSet<PackageId> = links
            .iter()
            .map(|id| s.wh.links().link(*id).expect("link").child)
            .collect();
        assert_eq!(children, BTreeSet::from([a, e]));
        assert!(links.iter().all(|id| s.wh.links().link(*id).expect("link").is_unlink()));
    }

    #[test]
    fn complete_whole_pallet_keeps_hierarchy() {
        let mut s = site();
        let pallet = s.pkg("PALLET");
        let b1 = s.pkg("B1");
        let b2 = s.pkg("B2");
        s.wh.set_parent(b1, Some(pallet)).expect("b1");
        s.wh.set_parent(b2, Some(pallet)).expect("b2");
        s.stock(b1, 1.0);
        s.stock(b2, 1.0);
        let lines = [s.take(b1, 1.0), s.take(b2, 1.0)];

        let links = s.wh.on_entire_package_detected(PickingId(1)).expect("detect");
        assert!(links.is_empty());
        for line in lines {
            s.wh.move_lines_mut().set_quantity_done(line, 1.0).expect("qty");
        }
        let done = s.wh.complete_move_lines(&lines).expect("complete");
        assert_eq!(done.lines, 2);

        let p = s.wh.packages();
        assert_eq!(p.location_of(pallet), Some(s.l2));
        assert_eq!(p.parent_of(b1), Some(pallet));
        assert_eq!(p.parent_of(b2), Some(pallet));
    }

    #[test]
    fn complete_partial_pallet_detaches_full_box() {
        let mut s = site();
        let pallet = s.pkg("PALLET");
        let box1 = s.pkg("BOX1");
        let box2 = s.pkg("BOX2");
        s.wh.set_parent(box1, Some(pallet)).expect("box1");
        s.wh.set_parent(box2, Some(pallet)).expect("box2");
        s.stock(box1, 2.0);
        s.stock(box2, 3.0);

        let whole = s.take(box1, 2.0);
        let partial = s
            .wh
            .add_move_line(
                MoveLineDraft::new(banana(), 2.0, s.l1, s.l2)
                    .from_package(Some(box2))
                    .of_move(MoveId(1))
                    .of_picking(PickingId(1)),
            )
            .expect("partial line");

        let links = s.wh.on_entire_package_detected(PickingId(1)).expect("detect");
        assert_eq!(links.len(), 1);
        let link = s.wh.links().link(links[0]).expect("link").clone();
        assert!(link.is_unlink());
        assert_eq!(link.child, box1);

        s.wh.move_lines_mut().set_quantity_done(whole, 2.0).expect("qty");
        s.wh.move_lines_mut().set_quantity_done(partial, 2.0).expect("qty");
        s.wh.complete_move_lines(&[whole, partial]).expect("complete");

        let p = s.wh.packages();
        assert_eq!(p.parent_of(box1), None);
        assert_eq!(p.parent_of(box2), Some(pallet));
        assert_eq!(p.location_of(box1), Some(s.l2));
        assert_eq!(p.location_of(box2), Some(s.l1));
        assert_eq!(p.location_of(pallet), Some(s.l1));
    }

    #[test]
    fn failed_completion_changes_nothing() {
        let mut s = site();
        let bx = s.pkg("BOX");
        s.stock(bx, 1.0);
        let line = s.take(bx, 5.0);
        s.wh.move_lines_mut().set_quantity_done(line, 5.0).expect("qty");
        let before = s.wh.clone();

        let err = s.wh.complete_move_lines(&[line]).expect_err("not enough stock");
        assert!(matches!(err, HierarchyError::Precondition(_)));
        assert_eq!(s.wh, before);
    }

    #[test]
    fn completion_tolerates_rounding_in_done_quantity() {
        let mut s = site();
        let bx = s.pkg("BOX");
        s.stock(bx, 0.3);
        let line = s.take(bx, 0.3);
        let done = 0.1 + 0.2;
        assert!(done > 0.3);
        s.wh.move_lines_mut().set_quantity_done(line, done).expect("qty");
        assert!(s.wh.is_fulfilled_by(&[bx], &[line]).expect("ok"));

        s.wh.complete_move_lines(&[line]).expect("complete");
        let moved: f64 = s
            .wh
            .packages()
            .quants()
            .filter(|q| q.location == s.l2)
            .map(|q| q.quantity)
            .sum();
        assert!((moved - done).abs() < QTY_EPSILON);
    }

    #[test]
    fn toggle_processed_fills_then_clears_package_lines() {
        let mut s = site();
        s.wh.set_config(WarehouseConfig::with_max_depth(3));
        let pallet = s.pkg("PALLET");
        let bx = s.pkg("BOX");
        s.wh.set_parent(bx, Some(pallet)).expect("nest");
        s.stock(bx, 4.0);
        let inside = s.take(bx, 4.0);
        let elsewhere = s
            .wh
            .add_move_line(
                MoveLineDraft::new(banana(), 4.0, s.l1, s.l2)
                    .in_package(bx)
                    .of_picking(PickingId(9)),
            )
            .expect("other picking");
        s.wh.move_lines_mut().set_quantity_done(inside, 1.0).expect("partial");

        let processed = s
            .wh
            .toggle_processed(pallet, PickingId(1), Some(s.l3))
            .expect("process");
        assert!(processed);
        let line = s.wh.move_lines().line(inside).expect("line");
        assert_eq!(line.quantity_done, 4.0);
        assert_eq!(line.destination_location, s.l3);
        let other = s.wh.move_lines().line(elsewhere).expect("line");
        assert_eq!(other.quantity_done, 0.0);
        assert_eq!(other.destination_location, s.l2);

        let processed = s.wh.toggle_processed(pallet, PickingId(1), None).expect("reset");
        assert!(!processed);
        let line = s.wh.move_lines().line(inside).expect("line");
        assert_eq!(line.quantity_done, 0.0);
        assert_eq!(line.destination_location, s.l3);
    }

    #[test]
    fn toggle_processed_feeds_completion() {
        let mut s = site();
        let bx = s.pkg("BOX");
        s.stock(bx, 2.0);
        s.take(bx, 2.0);

        assert!(s.wh.toggle_processed(bx, PickingId(1), None).expect("process"));
        let ids: Vec<MoveLineId> = s.wh.move_lines().iter().map(|l| l.id).collect();
        s.wh.complete_move_lines(&ids).expect("complete");
        assert_eq!(s.wh.packages().location_of(bx), Some(s.l2));
    }

    #[test]
    fn toggle_processed_needs_open_lines() {
        let mut s = site();
        let bx = s.pkg("BOX");
        let err = s
            .wh
            .toggle_processed(bx, PickingId(1), None)
            .expect_err("no lines");
        assert!(matches!(err, HierarchyError::Precondition(_)));
        assert!(s.wh.toggle_processed(bx, PickingId(1), Some(LocationId(99))).is_err());
    }

    #[test]
    fn completion_constructs_links_per_destination() {
        // Two pallets at L1; one box of each leaves whole, to L2 and L3.
        let mut s = site();
        let p1 = s.pkg("P1");
        let p2 = s.pkg("P2");
        let a1 = s.pkg("A1");
        let a2 = s.pkg("A2");
        let b1 = s.pkg("B1");
        let b2 = s.pkg("B2");
        for (child, parent) in [(a1, p1), (a2, p1), (b1, p2), (b2, p2)] {
            s.wh.set_parent(child, Some(parent)).expect("nest");
        }
        for bx in [a1, a2, b1, b2] {
            s.stock(bx, 1.0);
        }
        let to_l2 = MoveLineDraft::new(banana(), 1.0, s.l1, s.l2)
            .in_package(a1)
            .of_move(MoveId(1))
            .of_picking(PickingId(1));
        let to_l3 = MoveLineDraft::new(banana(), 1.0, s.l1, s.l3)
            .in_package(b1)
            .of_move(MoveId(2))
            .of_picking(PickingId(1));
        let lines = [
            s.wh.add_move_line(to_l2).expect("line"),
            s.wh.add_move_line(to_l3).expect("line"),
        ];

        let unlinks = s.wh.on_entire_package_detected(PickingId(1)).expect("detect");
        assert_eq!(unlinks.len(), 2);
        for line in lines {
            s.wh.move_lines_mut().set_quantity_done(line, 1.0).expect("qty");
        }
        let done = s.wh.complete_move_lines(&lines).expect("complete");

        let mut applied = unlinks.clone();
        applied.sort_unstable();
        assert_eq!(done.links, applied);
        let p = s.wh.packages();
        assert_eq!(p.parent_of(a1), None);
        assert_eq!(p.parent_of(b1), None);
        assert_eq!(p.location_of(a1), Some(s.l2));
        assert_eq!(p.location_of(b1), Some(s.l3));
        assert_eq!(p.location_of(p1), Some(s.l1));
        assert_eq!(p.location_of(p2), Some(s.l1));
        p.check_not_multi_location(&[a1, b1, p1, p2]).expect("coherent");
    }

    #[test]
    fn completed_lines_cannot_run_twice() {
        let mut s = site();
        let bx = s.pkg("BOX");
        s.stock(bx, 2.0);
        let line = s.take(bx, 1.0);
        s.wh.move_lines_mut().set_quantity_done(line, 1.0).expect("qty");
        s.wh.complete_move_lines(&[line]).expect("first");
        assert!(s.wh.complete_move_lines(&[line]).is_err());
    }

    #[test]
    fn result_parent_requires_destination_package() {
        let mut s = site();
        let pallet = s.pkg("PALLET");
        let draft = MoveLineDraft::new(banana(), 1.0, s.l1, s.l2).under_parent(pallet);
        let err = s.wh.add_move_line(draft).expect_err("no destination package");
        assert!(matches!(err, HierarchyError::Precondition(_)));
        assert!(s.wh.move_lines().is_empty());
    }

    #[test]
    fn one_result_parent_per_package_in_a_picking() {
        let mut s = site();
        let p1 = s.pkg("P1");
        let p2 = s.pkg("P2");
        let bx = s.pkg("BOX");
        let first = MoveLineDraft::new(banana(), 1.0, s.l1, s.l2)
            .into_package(Some(bx))
            .under_parent(p1)
            .of_picking(PickingId(7));
        s.wh.add_move_line(first).expect("first");

        let second = MoveLineDraft::new(banana(), 1.0, s.l1, s.l2)
            .into_package(Some(bx))
            .of_picking(PickingId(7));
        let id = s.wh.add_move_line(second).expect("second");
        let err = s.wh.set_result_parent(id, Some(p2)).expect_err("two parents");
        assert!(err.to_string().contains("BOX"));
        assert_eq!(s.wh.move_lines().line(id).expect("line").result_parent_package, None);

        s.wh.set_result_parent(id, Some(p1)).expect("same parent is fine");
    }

    #[test]
    fn clearing_destination_clears_result_parent() {
        let mut s = site();
        let pallet = s.pkg("PALLET");
        let bx = s.pkg("BOX");
        let draft = MoveLineDraft::new(banana(), 1.0, s.l1, s.l2)
            .into_package(Some(bx))
            .under_parent(pallet);
        let id = s.wh.add_move_line(draft).expect("line");
        s.wh.set_destination_package(id, None).expect("clear");
        assert_eq!(s.wh.move_lines().line(id).expect("line").result_parent_package, None);
    }

    #[test]
    fn result_parent_applied_on_completion() {
        let mut s = site();
        let pallet = s.pkg("PALLET");
        let bx = s.pkg("BOX");
        s.stock(bx, 3.0);
        let draft = MoveLineDraft::new(banana(), 3.0, s.l1, s.l2)
            .in_package(bx)
            .under_parent(pallet);
        let line = s.wh.add_move_line(draft).expect("line");

        let proposed = s.wh.propose_result_parents(&[line]).expect("propose");
        assert_eq!(proposed.len(), 1);
        assert_eq!(s.wh.propose_result_parents(&[line]).expect("again"), proposed);

        s.wh.move_lines_mut().set_quantity_done(line, 3.0).expect("qty");
        let done = s.wh.complete_move_lines(&[line]).expect("complete");
        assert_eq!(done.links, proposed);
        assert_eq!(s.wh.packages().parent_of(bx), Some(pallet));
        assert_eq!(s.wh.packages().location_of(pallet), Some(s.l2));
    }

    #[test]
    fn palletise_selected_lines() {
        let mut s = site();
        let pallet = s.pkg("PALLET");
        let b1 = s.pkg("B1");
        let b2 = s.pkg("B2");
        let l1 = s.take(b1, 1.0);
        let l2 = s.take(b2, 1.0);

        let err = s.wh.palletise(None, PickingId(1)).expect_err("no pallet");
        assert_eq!(err.to_string(), "Select a pallet.");
        assert!(s.wh.palletise(Some(pallet), PickingId(1)).is_err());

        s.wh.move_lines_mut().set_selected(l1, true).expect("select");
        let done = s.wh.palletise(Some(pallet), PickingId(1)).expect("palletise");
        assert_eq!(done, vec![b1]);
        assert_eq!(s.wh.packages().parent_of(b1), Some(pallet));
        assert_eq!(s.wh.packages().parent_of(b2), None);
        assert!(!s.wh.move_lines().line(l1).expect("line").selected);
        assert!(!s.wh.move_lines().line(l2).expect("line").selected);
    }

    #[test]
    fn pickings_and_lines_of_subtree() {
        let mut s = site();
        let pallet = s.pkg("PALLET");
        let bx = s.pkg("BOX");
        let inner = s.pkg("INNER");
        s.wh.set_parent(bx, Some(pallet)).expect("box");
        s.wh.set_parent(inner, Some(bx)).expect("inner");

        let into_box = MoveLineDraft::new(banana(), 2.0, s.l1, s.l2)
            .into_package(Some(bx))
            .of_picking(PickingId(2));
        let on_inner = MoveLineDraft::new(banana(), 2.0, s.l1, s.l2)
            .from_package(Some(inner))
            .of_picking(PickingId(3));
        let on_pallet = MoveLineDraft::new(banana(), 2.0, s.l1, s.l2)
            .from_package(Some(pallet))
            .of_picking(PickingId(4));
        s.wh.add_move_line(into_box).expect("line");
        s.wh.add_move_line(on_inner).expect("line");
        s.wh.add_move_line(on_pallet).expect("line");

        assert_eq!(
            s.wh.pickings_of_package(pallet),
            BTreeSet::from([PickingId(2), PickingId(3)])
        );
        assert_eq!(s.wh.move_lines_of_children(bx).len(), 2);
        assert_eq!(s.wh.move_lines_of_children(pallet).len(), 3);
    }

    #[test]
    fn entire_packages_climb_to_covered_parents() {
        let mut s = site();
        let pallet = s.pkg("PALLET");
        let b1 = s.pkg("B1");
        let b2 = s.pkg("B2");
        let loose = s.pkg("LOOSE");
        s.wh.set_parent(b1, Some(pallet)).expect("b1");
        s.wh.set_parent(b2, Some(pallet)).expect("b2");
        s.stock(b1, 2.0);
        s.stock(b2, 2.0);
        s.stock(loose, 2.0);
        s.take(b1, 2.0);
        s.take(b2, 2.0);
        s.take(loose, 1.0);

        let entire = s.wh.entire_packages_of_picking(PickingId(1)).expect("entire");
        assert_eq!(entire, vec![pallet, b1, b2]);
    }
}
