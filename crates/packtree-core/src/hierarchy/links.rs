//! Hierarchy link ledger.
//!
//! Links are proposed edits to the package forest. They are created while
//! movements are planned, validated as a batch together with every link
//! reachable through shared stock moves, and turned into real parent changes
//! by [`LinkLedger::construct`] when the movement completes. Applied links
//! stay in the ledger as an audit trail.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use super::chain::validate_links;
use super::error::{HierarchyError, HierarchyResult};
use super::movement::MoveLineStore;
use super::store::PackageStore;
use crate::collection;
use crate::model::{HierarchyLink, LinkDraft, LinkId, MoveLine, MoveLineId, PackageId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkLedger {
    links: BTreeMap<LinkId, HierarchyLink>,
    next_id: u64,
}

impl LinkLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn restore(links: Vec<HierarchyLink>) -> Self {
        let next_id = links.iter().map(|l| l.id.get()).max().unwrap_or(0);
        Self {
            links: links.into_iter().map(|l| (l.id, l)).collect(),
            next_id,
        }
    }

    pub fn get(&self, id: LinkId) -> Option<&HierarchyLink> {
        self.links.get(&id)
    }

    pub fn link(&self, id: LinkId) -> HierarchyResult<&HierarchyLink> {
        self.links
            .get(&id)
            .ok_or_else(|| HierarchyError::not_found("link", id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &HierarchyLink> {
        self.links.values()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// `"Link {parent} and {child}"` or `"Unlink parent of {child}"`.
    pub fn name(&self, id: LinkId, store: &PackageStore) -> HierarchyResult<String> {
        Ok(self.link(id)?.label(|pkg| store.label(pkg)))
    }

    /// Links associated with any of `lines`, in id order.
    pub fn links_of_move_lines(&self, lines: &BTreeSet<MoveLineId>) -> Vec<LinkId> {
        self.links
            .values()
            .filter(|link| !link.move_lines.is_disjoint(lines))
            .map(|link| link.id)
            .collect()
    }

    /// Links whose child or parent is `package`.
    pub fn links_of_package(&self, package: PackageId) -> Vec<LinkId> {
        self.links
            .values()
            .filter(|link| link.child == package || link.parent == Some(package))
            .map(|link| link.id)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Creation and edits
    // -----------------------------------------------------------------------

    /// Insert a batch of links and validate it.
    ///
    /// The batch is checked together with the links of every movement line
    /// that shares a stock move with one of the batch's lines. On error
    /// nothing is inserted.
    pub fn create(
        &mut self,
        drafts: Vec<LinkDraft>,
        store: &PackageStore,
        move_lines: &MoveLineStore,
    ) -> HierarchyResult<Vec<LinkId>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        for draft in &drafts {
            store.package(draft.child)?;
            if let Some(parent) = draft.parent {
                store.package(parent)?;
            }
            for line in &draft.move_lines {
                move_lines.line(*line)?;
            }
        }

        let now = chrono::Utc::now().timestamp_micros();
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            self.next_id += 1;
            let id = LinkId(self.next_id);
            self.links.insert(
                id,
                HierarchyLink {
                    id,
                    parent: draft.parent,
                    child: draft.child,
                    move_lines: draft.move_lines,
                    created_at_us: now,
                },
            );
            created.push(id);
        }

        if let Err(err) = self.validate_closure(&created, store, move_lines) {
            for id in &created {
                self.links.remove(id);
            }
            warn!(links = created.len(), error = %err, "link batch rejected");
            return Err(err);
        }

        debug!(links = ?created.iter().map(|l| l.get()).collect::<Vec<_>>(), "links created");
        Ok(created)
    }

    /// Point an existing link at a different parent. Reverted on failure.
    pub fn set_link_parent(
        &mut self,
        id: LinkId,
        parent: Option<PackageId>,
        store: &PackageStore,
        move_lines: &MoveLineStore,
    ) -> HierarchyResult<()> {
        if let Some(parent) = parent {
            store.package(parent)?;
        }
        self.edit(id, store, move_lines, |link| link.parent = parent)
    }

    /// Point an existing link at a different child. Reverted on failure.
    pub fn set_link_child(
        &mut self,
        id: LinkId,
        child: PackageId,
        store: &PackageStore,
        move_lines: &MoveLineStore,
    ) -> HierarchyResult<()> {
        store.package(child)?;
        self.edit(id, store, move_lines, |link| link.child = child)
    }

    fn edit(
        &mut self,
        id: LinkId,
        store: &PackageStore,
        move_lines: &MoveLineStore,
        apply: impl FnOnce(&mut HierarchyLink),
    ) -> HierarchyResult<()> {
        let before = self.link(id)?.clone();
        if let Some(link) = self.links.get_mut(&id) {
            apply(link);
        }
        if let Err(err) = self.validate_closure(&[id], store, move_lines) {
            self.links.insert(id, before);
            warn!(link = %id, error = %err, "link edit rejected");
            return Err(err);
        }
        Ok(())
    }

    /// Associate more movement lines with an existing link. Not re-validated:
    /// only the edge itself is constrained.
    pub fn attach_move_lines(
        &mut self,
        id: LinkId,
        lines: impl IntoIterator<Item = MoveLineId>,
    ) -> HierarchyResult<()> {
        let link = self
            .links
            .get_mut(&id)
            .ok_or_else(|| HierarchyError::not_found("link", id))?;
        link.move_lines.extend(lines);
        Ok(())
    }

    pub fn remove(&mut self, ids: &[LinkId]) -> Vec<HierarchyLink> {
        ids.iter().filter_map(|id| self.links.remove(id)).collect()
    }

    /// Drop every link that references `package`.
    pub fn remove_for_package(&mut self, package: PackageId) -> Vec<HierarchyLink> {
        let ids = self.links_of_package(package);
        self.remove(&ids)
    }

    fn validate_closure(
        &self,
        ids: &[LinkId],
        store: &PackageStore,
        move_lines: &MoveLineStore,
    ) -> HierarchyResult<()> {
        let mut closure: BTreeSet<LinkId> = ids.iter().copied().collect();
        let lines: BTreeSet<MoveLineId> = ids
            .iter()
            .filter_map(|id| self.links.get(id))
            .flat_map(|link| link.move_lines.iter().copied())
            .collect();
        let related = move_lines.sharing_moves(&lines);
        closure.extend(self.links_of_move_lines(&related));

        let batch: Vec<&HierarchyLink> = closure.iter().filter_map(|id| self.links.get(id)).collect();
        validate_links(&batch, store)
    }

    // -----------------------------------------------------------------------
    // Proposals
    // -----------------------------------------------------------------------

    /// Propose detaching each of `packages` that currently has a parent.
    ///
    /// Each unlink is associated with the lines among `lines` that act on the
    /// package's subtree. An existing unlink of the same package is reused.
    pub fn create_unlinks(
        &mut self,
        packages: &[PackageId],
        lines: &[&MoveLine],
        store: &PackageStore,
        move_lines: &MoveLineStore,
    ) -> HierarchyResult<Vec<LinkId>> {
        let mut reused = Vec::new();
        let mut drafts = Vec::new();
        for &package in packages {
            if store.parent_of(package).is_none() {
                continue;
            }
            let subtree: BTreeSet<PackageId> = store.descendants(package).into_iter().collect();
            let acting: Vec<MoveLineId> = lines
                .iter()
                .filter(|line| subtree.iter().any(|p| line.touches(*p)))
                .map(|line| line.id)
                .collect();

            match self.find(None, package) {
                Some(existing) => {
                    self.attach_move_lines(existing, acting)?;
                    reused.push(existing);
                }
                None => drafts.push(LinkDraft::unlink(package).with_move_lines(acting)),
            }
        }

        let mut ids = reused;
        ids.extend(self.create(drafts, store, move_lines)?);
        if !ids.is_empty() {
            info!(unlinks = ids.len(), "unlinks proposed");
        }
        Ok(ids)
    }

    /// Make sure a link exists for every adjacent pair of `ordered` (deepest
    /// child first) plus an unlink of the top package. Existing links are
    /// reused, so calling this twice yields the same ids.
    pub fn get_or_construct_chain(
        &mut self,
        ordered: &[PackageId],
        store: &PackageStore,
        move_lines: &MoveLineStore,
    ) -> HierarchyResult<Vec<LinkId>> {
        let Some(&top) = ordered.last() else {
            return Ok(Vec::new());
        };

        let mut wanted: Vec<(Option<PackageId>, PackageId)> = ordered
            .windows(2)
            .map(|pair| (Some(pair[1]), pair[0]))
            .collect();
        wanted.push((None, top));

        let mut slots: Vec<Option<LinkId>> = wanted
            .iter()
            .map(|(parent, child)| self.find(*parent, *child))
            .collect();
        let drafts: Vec<LinkDraft> = wanted
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|((parent, child), _)| LinkDraft {
                parent: *parent,
                child: *child,
                move_lines: BTreeSet::new(),
            })
            .collect();

        let mut created = self.create(drafts, store, move_lines)?.into_iter();
        for slot in &mut slots {
            if slot.is_none() {
                *slot = created.next();
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }

    pub(crate) fn find(&self, parent: Option<PackageId>, child: PackageId) -> Option<LinkId> {
        self.links
            .values()
            .find(|link| link.parent == parent && link.child == child)
            .map(|link| link.id)
    }

    // -----------------------------------------------------------------------
    // Application
    // -----------------------------------------------------------------------

    /// Apply links to the real tree, unlinks first, then grouped by parent.
    ///
    /// All-or-nothing: if any `set_parent` fails the store is restored.
    pub fn construct(&self, ids: &[LinkId], store: &mut PackageStore) -> HierarchyResult<()> {
        let links: Vec<&HierarchyLink> = ids
            .iter()
            .map(|id| self.link(*id))
            .collect::<HierarchyResult<_>>()?;
        if links.is_empty() {
            return Ok(());
        }

        let snapshot = store.clone();
        for (parent, group) in collection::group_by(&links, |link| link.parent) {
            for link in group {
                if let Err(err) = store.set_parent(link.child, parent) {
                    *store = snapshot;
                    warn!(link = %link.id, error = %err, "construct aborted");
                    return Err(err);
                }
            }
        }

        info!(links = links.len(), "links constructed");
        Ok(())
    }
}
