//! Amount type in the smallest monetary unit
//!
//! All monetary values in AgentPay are exact integers in the smallest unit
//! of the settlement asset. Arithmetic is checked; budget invariants rely on
//! underflow being a typed error, never a wraparound.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An exact amount in the smallest monetary unit
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(pub u64);

impl Amount {
    /// The zero amount
    pub const ZERO: Amount = Amount(0);

    /// Create a new amount from smallest units
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Create a zero amount
    pub fn zero() -> Self {
        Self(0)
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Saturating subtraction, floored at zero
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Fraction of `total` this amount represents, as a percentage
    ///
    /// Returns 0.0 when `total` is zero.
    pub fn percent_of(self, total: Amount) -> f64 {
        if total.is_zero() {
            0.0
        } else {
            (self.0 as f64 / total.0 as f64) * 100.0
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
