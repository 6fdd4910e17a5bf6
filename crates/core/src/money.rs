//! Money and pricing multipliers.
//!
//! Amounts are integers in the smallest unit of the hotel's single ledger currency.
//! Multipliers are basis points (`10_000` = ×1.0) so pricing stays exact.

use core::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// Amount in the smallest currency unit.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    pub const fn amount(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Multiply by a unit count. Saturates instead of wrapping.
    pub fn times(self, units: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(units)))
    }

    /// Apply a multiplier, rounding half away from zero.
    pub fn scaled(self, multiplier: Multiplier) -> Self {
        let raw = i128::from(self.0) * i128::from(multiplier.bps());
        let half = i128::from(Multiplier::ONE_BPS / 2);
        let rounded = if raw >= 0 {
            (raw + half) / i128::from(Multiplier::ONE_BPS)
        } else {
            (raw - half) / i128::from(Multiplier::ONE_BPS)
        };
        Self(rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ValueObject for Money {}

/// Pricing multiplier in basis points.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Multiplier(u32);

impl Multiplier {
    pub const ONE_BPS: u32 = 10_000;
    pub const ONE: Multiplier = Multiplier(Self::ONE_BPS);

    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    pub const fn bps(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for Multiplier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "x{}.{:04}", self.0 / Self::ONE_BPS, self.0 % Self::ONE_BPS)
    }
}

impl ValueObject for Multiplier {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scaling_is_exact_for_whole_multipliers() {
        assert_eq!(Money::new(800).scaled(Multiplier::from_bps(20_000)), Money::new(1600));
        assert_eq!(Money::new(200).scaled(Multiplier::from_bps(15_000)), Money::new(300));
        assert_eq!(Money::new(800).scaled(Multiplier::from_bps(18_000)), Money::new(1440));
    }

    #[test]
    fn scaling_rounds_half_away_from_zero() {
        // 5 x 0.5 = 2.5 -> 3
        assert_eq!(Money::new(5).scaled(Multiplier::from_bps(5_000)), Money::new(3));
        assert_eq!(Money::new(-5).scaled(Multiplier::from_bps(5_000)), Money::new(-3));
    }

    #[test]
    fn multiplier_display() {
        assert_eq!(Multiplier::from_bps(18_000).to_string(), "x1.8000");
    }

    proptest! {
        #[test]
        fn identity_multiplier_preserves_amount(amount in -1_000_000_000i64..1_000_000_000i64) {
            prop_assert_eq!(Money::new(amount).scaled(Multiplier::ONE), Money::new(amount));
        }
    }
}
