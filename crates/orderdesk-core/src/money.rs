//! Decimal normalization for quantities and costs.
//!
//! Values reach the core in several shapes (`"1"`, `1`, `1.0`, `"1.004"`).
//! Two values are equal for diffing purposes when they round to the same
//! number at the configured scale, so comparisons go through
//! [`DecimalPolicy`] rather than raw `==`.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Rounding policy shared by the reconciler, the submitter and totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecimalPolicy {
    scale: u32,
}

impl DecimalPolicy {
    /// Default number of decimal places.
    pub const DEFAULT_SCALE: u32 = 2;

    /// Largest scale a `Decimal` can represent.
    pub const MAX_SCALE: u32 = 28;

    /// Creates a policy rounding to `scale` decimal places.
    ///
    /// Scales above [`Self::MAX_SCALE`] are clamped.
    #[must_use]
    pub const fn new(scale: u32) -> Self {
        let scale = if scale > Self::MAX_SCALE {
            Self::MAX_SCALE
        } else {
            scale
        };
        Self { scale }
    }

    /// Returns the configured scale.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.scale
    }

    /// Rounds a value to the configured scale (midpoints away from zero).
    #[must_use]
    pub fn normalize(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Returns true if both values round to the same number.
    #[must_use]
    pub fn same(&self, a: Decimal, b: Decimal) -> bool {
        self.normalize(a) == self.normalize(b)
    }

    /// Parses a textual value and normalizes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDecimal`] if the text is not a number.
    pub fn parse(&self, raw: &str) -> Result<Decimal> {
        Decimal::from_str(raw.trim())
            .map(|value| self.normalize(value))
            .map_err(|e| Error::decimal(format!("'{raw}': {e}")))
    }

    /// Computes `quantity * unit_cost`, rounded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDecimal`] on overflow.
    pub fn line_total(&self, quantity: Decimal, unit_cost: Decimal) -> Result<Decimal> {
        quantity
            .checked_mul(unit_cost)
            .map(|value| self.normalize(value))
            .ok_or_else(|| Error::decimal(format!("line total overflow: {quantity} x {unit_cost}")))
    }

    /// Sums `quantity * unit_cost` over all lines, rounded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDecimal`] on overflow.
    pub fn total(&self, lines: impl IntoIterator<Item = (Decimal, Decimal)>) -> Result<Decimal> {
        lines.into_iter().try_fold(Decimal::ZERO, |acc, (quantity, cost)| {
            let line = self.line_total(quantity, cost)?;
            acc.checked_add(line)
                .ok_or_else(|| Error::decimal("order total overflow"))
        })
    }
}

impl Default for DecimalPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SCALE)
    }
}
