//! Opaque identifiers for every record the engine touches.
//!
//! Numeric ids are allocated by the owning store and are never reused within
//! one warehouse. Products and lots belong to an external catalogue, so they
//! are referenced by their code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric value, as stored in SQLite.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().trim_start_matches('#').parse().map(Self)
            }
        }
    };
}

macro_rules! code_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn new(code: impl Into<String>) -> Self {
                Self(code.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(code: &str) -> Self {
                Self(code.to_string())
            }
        }
    };
}

numeric_id!(
    /// A package (box, pallet, crate) node in the hierarchy.
    PackageId
);
numeric_id!(
    /// A physical stock unit.
    QuantId
);
numeric_id!(
    /// A physical location.
    LocationId
);
numeric_id!(
    /// A proposed hierarchy edge in the link ledger.
    LinkId
);
numeric_id!(
    /// An in-flight movement line.
    MoveLineId
);
numeric_id!(
    /// The stock move a set of movement lines was split from.
    MoveId
);
numeric_id!(
    /// The picking (transfer) that groups movement lines.
    PickingId
);

code_id!(
    /// External product reference.
    ProductId
);
code_id!(
    /// External lot/serial reference.
    LotId
);
