use serde::{Deserialize, Serialize};

use super::ids::{LocationId, LotId, PackageId, ProductId, QuantId};

/// Quantities closer than this are considered equal.
pub const QTY_EPSILON: f64 = 1e-9;

/// A physical location stock can sit in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
}

/// A quantity of one product (and optional lot) at one location, optionally
/// inside a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quant {
    pub id: QuantId,
    pub product: ProductId,
    pub lot: Option<LotId>,
    pub location: LocationId,
    pub package: Option<PackageId>,
    pub quantity: f64,
    pub reserved_quantity: f64,
}

impl Quant {
    /// Zero-quantity, zero-reservation quants are bookkeeping leftovers and
    /// do not count as package contents.
    #[must_use]
    pub fn is_material(&self) -> bool {
        self.quantity != 0.0 || self.reserved_quantity != 0.0
    }

    /// Product/lot key used for fulfilment accounting.
    #[must_use]
    pub fn stock_key(&self) -> (ProductId, Option<LotId>) {
        (self.product.clone(), self.lot.clone())
    }
}

/// Values for a quant that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantDraft {
    pub product: ProductId,
    pub lot: Option<LotId>,
    pub location: LocationId,
    pub package: Option<PackageId>,
    pub quantity: f64,
}

impl QuantDraft {
    #[must_use]
    pub const fn new(product: ProductId, quantity: f64, location: LocationId) -> Self {
        Self {
            product,
            lot: None,
            location,
            package: None,
            quantity,
        }
    }

    #[must_use]
    pub const fn in_package(mut self, package: PackageId) -> Self {
        self.package = Some(package);
        self
    }

    #[must_use]
    pub fn with_lot(mut self, lot: LotId) -> Self {
        self.lot = Some(lot);
        self
    }

    pub(crate) fn into_quant(self, id: QuantId) -> Quant {
        Quant {
            id,
            product: self.product,
            lot: self.lot,
            location: self.location,
            package: self.package,
            quantity: self.quantity,
            reserved_quantity: 0.0,
        }
    }
}
