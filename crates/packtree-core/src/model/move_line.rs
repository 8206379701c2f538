use serde::{Deserialize, Serialize};

use super::ids::{LocationId, LotId, MoveId, MoveLineId, PackageId, PickingId, ProductId};

/// A unit of in-flight relocation: some quantity of one product moving from
/// a source package/location to a destination package/location.
///
/// Movement lines belong to the surrounding picking workflow. The hierarchy
/// engine reads them and ties hierarchy links to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveLine {
    pub id: MoveLineId,
    /// Stock move this line was split from; lines of one move are validated
    /// together.
    pub move_id: Option<MoveId>,
    pub picking: Option<PickingId>,
    pub product: ProductId,
    pub lot: Option<LotId>,
    pub source_location: LocationId,
    pub destination_location: LocationId,
    pub source_package: Option<PackageId>,
    pub destination_package: Option<PackageId>,
    /// Requested parent for `destination_package` once the line is done.
    pub result_parent_package: Option<PackageId>,
    /// Planned quantity.
    pub quantity: f64,
    pub quantity_done: f64,
    /// Picking-level selection flag (palletisation).
    pub selected: bool,
    /// Set once the line's stock has been relocated.
    pub done: bool,
}

impl MoveLine {
    /// Product/lot key used for fulfilment accounting.
    #[must_use]
    pub fn stock_key(&self) -> (ProductId, Option<LotId>) {
        (self.product.clone(), self.lot.clone())
    }

    /// True when `package` is this line's source or destination package.
    #[must_use]
    pub fn touches(&self, package: PackageId) -> bool {
        self.source_package == Some(package) || self.destination_package == Some(package)
    }
}

/// Values for a movement line that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveLineDraft {
    pub move_id: Option<MoveId>,
    pub picking: Option<PickingId>,
    pub product: ProductId,
    pub lot: Option<LotId>,
    pub source_location: LocationId,
    pub destination_location: LocationId,
    pub source_package: Option<PackageId>,
    pub destination_package: Option<PackageId>,
    pub result_parent_package: Option<PackageId>,
    pub quantity: f64,
}

impl MoveLineDraft {
    /// A line moving `quantity` of `product` between two locations, outside
    /// any package.
    #[must_use]
    pub fn new(
        product: ProductId,
        quantity: f64,
        source_location: LocationId,
        destination_location: LocationId,
    ) -> Self {
        Self {
            move_id: None,
            picking: None,
            product,
            lot: None,
            source_location,
            destination_location,
            source_package: None,
            destination_package: None,
            result_parent_package: None,
            quantity,
        }
    }

    /// Move the package as-is: source and destination package are the same.
    #[must_use]
    pub const fn in_package(mut self, package: PackageId) -> Self {
        self.source_package = Some(package);
        self.destination_package = Some(package);
        self
    }

    #[must_use]
    pub const fn from_package(mut self, package: Option<PackageId>) -> Self {
        self.source_package = package;
        self
    }

    #[must_use]
    pub const fn into_package(mut self, package: Option<PackageId>) -> Self {
        self.destination_package = package;
        self
    }

    #[must_use]
    pub const fn under_parent(mut self, parent: PackageId) -> Self {
        self.result_parent_package = Some(parent);
        self
    }

    #[must_use]
    pub const fn of_move(mut self, move_id: MoveId) -> Self {
        self.move_id = Some(move_id);
        self
    }

    #[must_use]
    pub const fn of_picking(mut self, picking: PickingId) -> Self {
        self.picking = Some(picking);
        self
    }

    #[must_use]
    pub fn with_lot(mut self, lot: LotId) -> Self {
        self.lot = Some(lot);
        self
    }

    pub(crate) fn into_line(self, id: MoveLineId) -> MoveLine {
        MoveLine {
            id,
            move_id: self.move_id,
            picking: self.picking,
            product: self.product,
            lot: self.lot,
            source_location: self.source_location,
            destination_location: self.destination_location,
            source_package: self.source_package,
            destination_package: self.destination_package,
            result_parent_package: self.result_parent_package,
            quantity: self.quantity,
            quantity_done: 0.0,
            selected: false,
            done: false,
        }
    }
}
