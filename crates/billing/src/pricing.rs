//! Versioned pricing table keyed by (transaction type, condition).

use serde::{Deserialize, Serialize};

use innkeep_core::{Money, Multiplier};
use innkeep_inventory::{Condition, CostEstimator, FindingIssue, ItemDefinition};

use crate::transaction::TransactionType;

/// Which catalog price a rule multiplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    UnitPrice,
    ReplacementPrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRule {
    pub basis: PriceBasis,
    pub multiplier: Multiplier,
}

impl PriceRule {
    const fn new(basis: PriceBasis, bps: u32) -> Self {
        Self {
            basis,
            multiplier: Multiplier::from_bps(bps),
        }
    }

    /// Per-unit price for `item`.
    pub fn unit_cost(&self, item: &ItemDefinition) -> Money {
        let base = match self.basis {
            PriceBasis::UnitPrice => item.unit_price,
            PriceBasis::ReplacementPrice => item.replacement_price,
        };
        base.scaled(self.multiplier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub version: u32,
    pub damage: Multiplier,
    pub missing: Multiplier,
    pub wear: Multiplier,
    pub extra_markup: Multiplier,
    pub replacement: Multiplier,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl PricingPolicy {
    /// damage x1.8, missing x2.0, wear x0.5 of replacement price; extras x1.5 of
    /// unit price; replacements x1.0 of replacement price.
    pub const fn standard() -> Self {
        Self {
            version: 1,
            damage: Multiplier::from_bps(18_000),
            missing: Multiplier::from_bps(20_000),
            wear: Multiplier::from_bps(5_000),
            extra_markup: Multiplier::from_bps(15_000),
            replacement: Multiplier::ONE,
        }
    }

    /// Same table with a different markup on extra requests; bumps the version.
    pub fn with_extra_markup(self, markup: Multiplier) -> Self {
        if markup == self.extra_markup {
            return self;
        }
        Self {
            version: self.version + 1,
            extra_markup: markup,
            ..self
        }
    }

    pub fn rule(&self, kind: TransactionType, condition: Condition) -> PriceRule {
        use PriceBasis::*;
        match kind {
            TransactionType::Replacement => PriceRule::new(ReplacementPrice, self.replacement.bps()),
            TransactionType::ExtraRequest => PriceRule::new(UnitPrice, self.extra_markup.bps()),
            TransactionType::Damage | TransactionType::CheckoutCharge => match condition {
                Condition::Good => PriceRule::new(UnitPrice, self.extra_markup.bps()),
                Condition::Worn => PriceRule::new(ReplacementPrice, self.wear.bps()),
                Condition::Damaged => PriceRule::new(ReplacementPrice, self.damage.bps()),
                Condition::Missing => PriceRule::new(ReplacementPrice, self.missing.bps()),
            },
        }
    }

    pub fn price(
        &self,
        item: &ItemDefinition,
        kind: TransactionType,
        condition: Condition,
        units: u32,
    ) -> (Money, Money) {
        let unit = self.rule(kind, condition).unit_cost(item);
        (unit, unit.times(units))
    }
}

impl CostEstimator for PricingPolicy {
    fn estimate(&self, item: &ItemDefinition, issue: FindingIssue, units: u32) -> Money {
        if issue == FindingIssue::None {
            return Money::ZERO;
        }
        self.price(item, TransactionType::Damage, issue.condition(), units).1
    }
}
