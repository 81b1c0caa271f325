//! Threshold Tiers
//!
//! A threshold-tier promotion checks the bill base against a list of spend
//! thresholds (e.g. spend 100k for 10% off, spend 500k for 100k off). The
//! richest tier the base qualifies for wins: tiers are matched by highest
//! `min_amount` first, never by their display order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::ProductId;

/// What a tier grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TierBenefit {
    /// Percent points off the base
    Percent(Decimal),

    /// Minor units off the base
    Amount(i64),

    /// One unit of a product for free
    FreeProduct(ProductId),

    /// Loyalty points multiplier; no bill discount
    PointsMultiplier(Decimal),
}

/// A single spend tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Display name
    pub name: String,

    /// Display hint only
    pub tier_order: i32,

    /// Inclusive lower bound, minor units
    pub min_amount: i64,

    /// Inclusive upper bound, minor units
    pub max_amount: Option<i64>,

    /// Reward
    pub benefit: TierBenefit,
}

impl Tier {
    /// Whether `base` falls inside the tier bounds.
    pub fn qualifies(&self, base: i64) -> bool {
        base >= self.min_amount && self.max_amount.is_none_or(|max| base <= max)
    }
}

/// Sort tiers richest first: highest `min_amount`, then display order.
pub fn sort_richest_first(tiers: &mut [Tier]) {
    tiers.sort_by(|a, b| {
        b.min_amount
            .cmp(&a.min_amount)
            .then(a.tier_order.cmp(&b.tier_order))
    });
}

/// Select the richest tier `base` qualifies for, whatever order `tiers` is in.
pub fn select_tier(tiers: &[Tier], base: i64) -> Option<&Tier> {
    tiers
        .iter()
        .filter(|tier| tier.qualifies(base))
        .max_by(|a, b| {
            a.min_amount
                .cmp(&b.min_amount)
                .then(b.tier_order.cmp(&a.tier_order))
        })
}
