//! The warehouse aggregate: packages, links and movement lines together.
//!
//! Each part can be used on its own, but operations that span them (cascade
//! deletes, movement completion, palletisation) live here so they can run as
//! one [`Warehouse::transaction`].

#![allow(clippy::must_use_candidate)]

use tracing::{debug, warn};

use crate::config::WarehouseConfig;
use crate::hierarchy::error::{HierarchyError, HierarchyResult};
use crate::hierarchy::links::LinkLedger;
use crate::hierarchy::movement::MoveLineStore;
use crate::hierarchy::store::PackageStore;
use crate::model::{
    HierarchyLink, LinkDraft, LinkId, LocationId, MoveLineId, Package, PackageId, QuantDraft,
    QuantId,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Warehouse {
    pub(crate) packages: PackageStore,
    pub(crate) links: LinkLedger,
    pub(crate) move_lines: MoveLineStore,
}

impl Warehouse {
    pub fn new(config: WarehouseConfig) -> Self {
        Self {
            packages: PackageStore::new(config),
            ..Self::default()
        }
    }

    pub(crate) const fn from_parts(
        packages: PackageStore,
        links: LinkLedger,
        move_lines: MoveLineStore,
    ) -> Self {
        Self {
            packages,
            links,
            move_lines,
        }
    }

    pub const fn config(&self) -> &WarehouseConfig {
        self.packages.config()
    }

    /// Replace the configuration. Existing trees are not re-validated.
    pub fn set_config(&mut self, config: WarehouseConfig) {
        self.packages.set_config(config);
    }

    pub const fn packages(&self) -> &PackageStore {
        &self.packages
    }

    pub const fn links(&self) -> &LinkLedger {
        &self.links
    }

    pub const fn move_lines(&self) -> &MoveLineStore {
        &self.move_lines
    }

    pub fn move_lines_mut(&mut self) -> &mut MoveLineStore {
        &mut self.move_lines
    }

    /// Run `f` against the warehouse; on error every change it made is
    /// undone.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> HierarchyResult<T>,
    ) -> HierarchyResult<T> {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self = snapshot;
                warn!(error = %err, code = %err.code(), "transaction rolled back");
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Packages and stock
    // -----------------------------------------------------------------------

    pub fn add_location(&mut self, name: impl Into<String>) -> HierarchyResult<LocationId> {
        self.packages.add_location(name)
    }

    pub fn create_package(&mut self, name: Option<&str>) -> HierarchyResult<PackageId> {
        self.packages.create_package(name)
    }

    pub fn set_parent(&mut self, package: PackageId, parent: Option<PackageId>) -> HierarchyResult<()> {
        self.packages.set_parent(package, parent)
    }

    /// Delete a childless package and every link that references it.
    ///
    /// Refused while a movement line still references the package.
    pub fn delete_package(&mut self, package: PackageId) -> HierarchyResult<Package> {
        if let Some(line) = self.move_lines.iter().find(|l| {
            l.touches(package) || l.result_parent_package == Some(package)
        }) {
            return Err(HierarchyError::precondition(format!(
                "package '{}' is still used by move line {}",
                self.packages.label(package),
                line.id
            )));
        }
        let removed = self.packages.delete_package(package)?;
        let dropped = self.links.remove_for_package(package);
        debug!(package = %package, links = dropped.len(), "package links dropped");
        Ok(removed)
    }

    pub fn add_quant(&mut self, draft: QuantDraft) -> HierarchyResult<QuantId> {
        self.packages.add_quant(draft)
    }

    pub fn set_quant_package(
        &mut self,
        quant: QuantId,
        package: Option<PackageId>,
    ) -> HierarchyResult<()> {
        self.packages.set_quant_package(quant, package)
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    pub fn create_links(&mut self, drafts: Vec<LinkDraft>) -> HierarchyResult<Vec<LinkId>> {
        self.links.create(drafts, &self.packages, &self.move_lines)
    }

    pub fn set_link_parent(&mut self, link: LinkId, parent: Option<PackageId>) -> HierarchyResult<()> {
        self.links
            .set_link_parent(link, parent, &self.packages, &self.move_lines)
    }

    pub fn set_link_child(&mut self, link: LinkId, child: PackageId) -> HierarchyResult<()> {
        self.links
            .set_link_child(link, child, &self.packages, &self.move_lines)
    }

    pub fn remove_links(&mut self, links: &[LinkId]) -> Vec<HierarchyLink> {
        self.links.remove(links)
    }

    /// Propose unlinks for `packages`, tied to the lines among `line_ids`
    /// acting on each package's subtree.
    pub fn create_unlinks(
        &mut self,
        packages: &[PackageId],
        line_ids: &[MoveLineId],
    ) -> HierarchyResult<Vec<LinkId>> {
        let lines = self.move_lines.resolve(line_ids)?;
        self.links
            .create_unlinks(packages, &lines, &self.packages, &self.move_lines)
    }

    pub fn get_or_construct_chain(&mut self, ordered: &[PackageId]) -> HierarchyResult<Vec<LinkId>> {
        self.links
            .get_or_construct_chain(ordered, &self.packages, &self.move_lines)
    }

    /// Apply links to the package tree.
    pub fn construct(&mut self, links: &[LinkId]) -> HierarchyResult<()> {
        self.links.construct(links, &mut self.packages)
    }
}
