//! Strongly-typed identifiers for orderdesk entities.
//!
//! The dashboard backend hands out plain numeric keys. Wrapping each in its
//! own type prevents passing an area where a user is expected:
//!
//! ```rust
//! use orderdesk_core::id::{AreaId, UserId};
//!
//! let user = UserId::new(5);
//! let area: AreaId = "2".parse().unwrap();
//!
//! // IDs are different types - this won't compile:
//! // let wrong: AreaId = user;
//! # let _ = (user, area);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates an identifier from its raw backend value.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw backend value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|e| Error::InvalidId {
                        message: format!("invalid {} '{s}': {e}", $label),
                    })
            }
        }
    };
}

numeric_id!(
    /// The dashboard user an order is placed for.
    UserId,
    "user ID"
);

numeric_id!(
    /// The delivery area (store, department) an order belongs to.
    AreaId,
    "area ID"
);

numeric_id!(
    /// A server-side order or purchase.
    ///
    /// Line items hang off an order; the same ID space is used for
    /// supplier purchases, whose item collections reconcile identically.
    OrderId,
    "order ID"
);

numeric_id!(
    /// A server-side line item row.
    ItemId,
    "item ID"
);

numeric_id!(
    /// A catalog product.
    ProductId,
    "product ID"
);

numeric_id!(
    /// A unit of measurement (box, kilogram, piece).
    UnitId,
    "unit ID"
);
