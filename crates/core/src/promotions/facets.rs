//! Facets
//!
//! Cross-cutting blocks shared by every archetype. The normalizer builds them
//! from the flat promotion snapshot; the compiled document embeds them as-is.

use std::collections::BTreeSet;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{BrandId, CategoryId, MemberId, ProductId, PromotionId, StoreId},
    promotions::{
        ApplyTo, CrossBrandType, CustomerType, ExecutionStage,
        schedule::{TimeWindow, WeekdaySet},
    },
};

/// When the promotion is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    /// First valid day, inclusive
    pub start_date: Date,

    /// Last valid day, inclusive
    pub end_date: Date,

    /// Store-local time-of-day window
    pub time_window: Option<TimeWindow>,

    /// Allowed weekdays
    pub days_of_week: WeekdaySet,

    /// Not valid on public holidays
    pub exclude_holidays: bool,
}

impl Validity {
    /// Whether `date` falls inside the inclusive calendar range.
    pub fn covers_date(&self, date: Date) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Stores a promotion runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "stores", rename_all = "snake_case")]
pub enum StoreScope {
    /// Every store in brand scope
    All,

    /// Only the listed stores
    Listed(BTreeSet<StoreId>),
}

impl StoreScope {
    /// Whether `store` is in scope.
    pub fn includes(&self, store: StoreId) -> bool {
        match self {
            Self::All => true,
            Self::Listed(stores) => stores.contains(&store),
        }
    }
}

/// Brands a promotion runs for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "brands", rename_all = "snake_case")]
pub enum BrandCoverage {
    /// Every brand of the company
    Company,

    /// Only the listed brands
    Listed(BTreeSet<BrandId>),
}

/// Where a promotion runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Store coverage
    pub stores: StoreScope,

    /// Brand coverage
    pub brands: BrandCoverage,

    /// Brands never in scope
    pub exclude_brands: BTreeSet<BrandId>,

    /// Allowed sales channels, lower-case; empty means any
    pub sales_channels: BTreeSet<String>,

    /// Excluded sales channels, lower-case
    pub exclude_channels: BTreeSet<String>,
}

impl Scope {
    /// Whether `brand` is covered and not excluded.
    pub fn covers_brand(&self, brand: BrandId) -> bool {
        if self.exclude_brands.contains(&brand) {
            return false;
        }

        match &self.brands {
            BrandCoverage::Company => true,
            BrandCoverage::Listed(brands) => brands.contains(&brand),
        }
    }

    /// Whether the sales channel is allowed.
    pub fn allows_channel(&self, channel: &str) -> bool {
        let channel = channel.trim().to_ascii_lowercase();

        if self.exclude_channels.contains(&channel) {
            return false;
        }

        self.sales_channels.is_empty() || self.sales_channels.contains(&channel)
    }
}

/// Which bill lines the promotion discounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targeting {
    /// Targeted part of the bill
    pub apply_to: ApplyTo,

    /// Included categories
    pub categories: BTreeSet<CategoryId>,

    /// Included products
    pub products: BTreeSet<ProductId>,

    /// Excluded categories
    pub exclude_categories: BTreeSet<CategoryId>,

    /// Excluded products
    pub exclude_products: BTreeSet<ProductId>,
}

/// Who may receive the promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audience {
    /// Members only
    pub member_only: bool,

    /// Allowed tiers, lower-case; empty means any
    pub member_tiers: BTreeSet<String>,

    /// Members never eligible
    pub exclude_members: BTreeSet<MemberId>,

    /// Customer-acquisition filter
    pub customer_type: CustomerType,

    /// Days without an order before a customer counts as inactive
    pub inactive_days_threshold: u32,
}

/// Minimums the targeted lines must reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    /// Minimum purchase, minor units
    pub min_purchase: i64,

    /// Minimum units
    pub min_quantity: u32,

    /// Minimum distinct lines
    pub min_items: u32,
}

/// Usage caps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Global cap
    pub max_uses: Option<u32>,

    /// Per-customer cap
    pub max_uses_per_customer: Option<u32>,

    /// Per-day cap
    pub max_uses_per_day: Option<u32>,

    /// Uses at compile time
    pub current_uses: u32,
}

/// How the promotion combines with others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPolicy {
    /// May combine with other promotions
    pub is_stackable: bool,

    /// 1–999, lower executes first
    pub execution_priority: u16,

    /// Calculation stage
    pub execution_stage: ExecutionStage,

    /// Promotions this one never combines with
    pub cannot_combine_with: BTreeSet<PromotionId>,

    /// Considered without being requested
    pub is_auto_apply: bool,

    /// Only applies when a voucher is presented
    pub require_voucher: bool,

    /// Legacy display priority
    pub priority: i32,
}

impl ConflictPolicy {
    /// Whether the cashier must request the promotion explicitly.
    pub const fn needs_request(&self) -> bool {
        !self.is_auto_apply || self.require_voucher
    }
}

/// Cross-brand relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossBrand {
    /// Archetype
    pub kind: CrossBrandType,

    /// Brands whose spend triggers the promotion
    pub trigger_brands: BTreeSet<BrandId>,

    /// Brands where the benefit is granted; empty means the bill brand
    pub benefit_brands: BTreeSet<BrandId>,

    /// Minimum trigger spend, minor units
    pub trigger_min_amount: Option<i64>,

    /// Distinct brands required by spend and receipt conditions
    pub min_distinct_brands: u32,
}
