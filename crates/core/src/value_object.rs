//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Basis points in one whole (100%).
pub const BPS_SCALE: u64 = 10_000;

/// A non-negative amount in whole rupees.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    pub const fn amount(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Smallest amount that is at least `bps` basis points of `self` (rounded up).
    pub fn floor_at_bps(self, bps: u64) -> Money {
        let scaled = u128::from(self.0) * u128::from(bps);
        let scale = u128::from(BPS_SCALE);
        let ceil = scaled.div_ceil(scale);
        Money(u64::try_from(ceil).unwrap_or(u64::MAX))
    }

    /// `true` when `self >= reference * bps / 10_000`, computed without rounding.
    pub fn meets_bps_of(self, reference: Money, bps: u64) -> bool {
        u128::from(self.0) * u128::from(BPS_SCALE) >= u128::from(reference.0) * u128::from(bps)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, factor: u64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for Money {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
