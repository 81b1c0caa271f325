//! Promotions
//!
//! The promotion snapshot as handed over by the persistence layer. It is a flat
//! record carrying the parameters of every archetype; most fields are unused by
//! any given promotion. The [`normalizer`] turns it into exactly one typed
//! [`rules::RuleVariant`] so nothing downstream has to probe optional fields.

use std::collections::BTreeSet;

use jiff::civil::{Date, Time};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{BrandId, CategoryId, CompanyId, MemberId, ProductId, PromotionId, StoreId};

pub mod facets;
pub mod normalizer;
pub mod rules;
pub mod schedule;
pub mod tiers;

/// Closed set of promotion archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoType {
    /// Percentage off the eligible subtotal
    PercentDiscount,

    /// Fixed amount off
    AmountDiscount,

    /// Buy X get Y (BOGO)
    BuyXGetY,

    /// Fixed price for a set of products
    Combo,

    /// Free product, optionally triggered by another product
    FreeItem,

    /// Time-window pricing
    HappyHour,

    /// Value returned after payment
    Cashback,

    /// Discount for paying with a given method
    PaymentDiscount,

    /// Set menu with fixed and choice components
    Package,

    /// N items from a category for a special price
    MixMatch,

    /// Add-on offered at a special price
    Upsell,

    /// Spend-threshold tiers
    ThresholdTier,
}

impl PromoType {
    /// All archetypes, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::PercentDiscount,
        Self::AmountDiscount,
        Self::BuyXGetY,
        Self::Combo,
        Self::FreeItem,
        Self::HappyHour,
        Self::Cashback,
        Self::PaymentDiscount,
        Self::Package,
        Self::MixMatch,
        Self::Upsell,
        Self::ThresholdTier,
    ];

    /// Wire tag of the archetype.
    #[must_use]
    pub const fn to_str(self) -> &'static str {
        match self {
            Self::PercentDiscount => "percent_discount",
            Self::AmountDiscount => "amount_discount",
            Self::BuyXGetY => "buy_x_get_y",
            Self::Combo => "combo",
            Self::FreeItem => "free_item",
            Self::HappyHour => "happy_hour",
            Self::Cashback => "cashback",
            Self::PaymentDiscount => "payment_discount",
            Self::Package => "package",
            Self::MixMatch => "mix_match",
            Self::Upsell => "upsell",
            Self::ThresholdTier => "threshold_tier",
        }
    }

    /// Parse a wire tag. Returns `None` for unknown tags.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|promo_type| promo_type.to_str() == tag)
    }
}

/// What part of the bill a promotion discounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyTo {
    /// Every line, minus exclusions
    #[default]
    All,

    /// Lines of the included categories
    Category,

    /// Lines of the included products
    Product,

    /// The bill subtotal
    Bill,

    /// The bill subtotal at payment time
    Payment,
}

impl ApplyTo {
    /// Whether the promotion works on the whole bill rather than on lines.
    #[must_use]
    pub const fn is_bill_scoped(self) -> bool {
        matches!(self, Self::Bill | Self::Payment)
    }
}

/// Brand scope of a promotion within its company.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrandScope {
    /// Every brand of the company
    #[default]
    Company,

    /// An explicit brand list
    Brands,

    /// A single brand
    Single,
}

/// Customer-acquisition filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    /// No filter
    #[default]
    All,

    /// First order ever
    FirstOrder,

    /// First order at the bill's brand
    FirstPerBrand,

    /// Returning after a lapse
    Comeback,

    /// No order for at least `inactive_days_threshold` days
    Inactive,
}

/// Cross-brand archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossBrandType {
    /// Spend at trigger brands unlocks a benefit at benefit brands
    TriggerBenefit,

    /// Spend across several brands unlocks a reward
    MultiBrandSpend,

    /// Bundle of products from several brands
    CrossBrandBundle,

    /// Points accumulate across brands
    LoyaltyAccumulate,

    /// Several brands on the same receipt
    SameReceipt,
}

/// When a terminal calculates the promotion.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStage {
    /// While items are added
    #[default]
    ItemLevel,

    /// When the cart is totalled
    CartLevel,

    /// At payment
    PaymentLevel,
}

impl ExecutionStage {
    /// Stages in execution order.
    pub const ORDERED: [Self; 3] = [Self::ItemLevel, Self::CartLevel, Self::PaymentLevel];
}

/// Package component kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageItemKind {
    /// A specific product
    Fixed,

    /// A choice from a category
    Choice,
}

/// Package (set menu) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Package display name
    pub package_name: String,

    /// Price of the whole package, in minor units
    pub package_price: i64,

    /// Whether the cashier may swap components
    #[serde(default)]
    pub allow_modification: bool,

    /// Components
    #[serde(default)]
    pub items: Vec<PackageItemConfig>,
}

/// A package component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageItemConfig {
    /// Fixed product or category choice
    pub item_type: PackageItemKind,

    /// Product, for fixed components
    #[serde(default)]
    pub product: Option<ProductId>,

    /// Category, for choice components
    #[serde(default)]
    pub category: Option<CategoryId>,

    /// Units per package
    #[serde(default = "defaults::one")]
    pub quantity: u32,

    /// Whether the component must be present
    #[serde(default = "defaults::yes")]
    pub is_required: bool,

    /// Minimum selections for a choice
    #[serde(default)]
    pub min_selection: u32,

    /// Maximum selections for a choice
    #[serde(default = "defaults::one")]
    pub max_selection: u32,

    /// Display order
    #[serde(default)]
    pub sort_order: i32,
}

/// How a threshold tier rewards the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierDiscountType {
    /// Percent of the base
    Percent,

    /// Fixed amount
    Amount,

    /// A free product
    FreeProduct,

    /// Loyalty points multiplier
    PointsMultiplier,
}

/// Threshold tier as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Tier display name
    pub tier_name: String,

    /// Display order only; never used for selection
    #[serde(default)]
    pub tier_order: i32,

    /// Inclusive lower bound, minor units
    pub min_amount: i64,

    /// Inclusive upper bound, minor units
    #[serde(default)]
    pub max_amount: Option<i64>,

    /// Reward kind
    pub discount_type: TierDiscountType,

    /// Percent points or minor units, depending on `discount_type`
    #[serde(default)]
    pub discount_value: Decimal,

    /// Product granted by `free_product` tiers
    #[serde(default)]
    pub free_product: Option<ProductId>,

    /// Multiplier granted by `points_multiplier` tiers
    #[serde(default)]
    pub points_multiplier: Option<Decimal>,

    /// Inactive tiers are ignored
    #[serde(default = "defaults::yes")]
    pub is_active: bool,
}

/// Promotion snapshot, read-only for the duration of a compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    /// Promotion id
    pub id: PromotionId,

    /// Owning company
    pub company_id: CompanyId,

    /// Unique human-chosen code
    pub code: String,

    /// Display name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Terms and conditions
    #[serde(default)]
    pub terms_conditions: String,

    /// Archetype tag; kept as a string so unknown tags surface as compile errors
    pub promo_type: String,

    /// Targeted part of the bill
    #[serde(default)]
    pub apply_to: ApplyTo,

    /// Brand scope
    #[serde(default)]
    pub scope: BrandScope,

    /// Brand, for single-brand scope
    #[serde(default)]
    pub brand_id: Option<BrandId>,

    /// Brands, for multi-brand scope
    #[serde(default)]
    pub brands: BTreeSet<BrandId>,

    /// Brands never in scope
    #[serde(default)]
    pub exclude_brands: BTreeSet<BrandId>,

    /// Every store in brand scope
    #[serde(default = "defaults::yes")]
    pub all_stores: bool,

    /// Explicit stores when `all_stores` is false
    #[serde(default)]
    pub stores: BTreeSet<StoreId>,

    /// Percent points
    #[serde(default)]
    pub discount_percent: Option<Decimal>,

    /// Minor units
    #[serde(default)]
    pub discount_amount: Option<i64>,

    /// Discount cap, minor units
    #[serde(default)]
    pub max_discount_amount: Option<i64>,

    /// BOGO buy quantity; trigger quantity for free items and upsells
    #[serde(default)]
    pub buy_quantity: Option<u32>,

    /// BOGO get quantity; free quantity for free items
    #[serde(default)]
    pub get_quantity: Option<u32>,

    /// BOGO / free-item product
    #[serde(default)]
    pub get_product: Option<ProductId>,

    /// Combo price, minor units
    #[serde(default)]
    pub combo_price: Option<i64>,

    /// Combo components
    #[serde(default)]
    pub combo_products: Vec<ProductId>,

    /// Happy-hour special unit price, minor units
    #[serde(default)]
    pub happy_hour_price: Option<i64>,

    /// Payment methods, e.g. `qris`, `gopay`
    #[serde(default)]
    pub payment_methods: Vec<String>,

    /// Minimum bill for payment discounts, minor units
    #[serde(default)]
    pub payment_min_amount: i64,

    /// Included categories
    #[serde(default)]
    pub categories: BTreeSet<CategoryId>,

    /// Included products
    #[serde(default)]
    pub products: BTreeSet<ProductId>,

    /// Excluded categories
    #[serde(default)]
    pub exclude_categories: BTreeSet<CategoryId>,

    /// Excluded products
    #[serde(default)]
    pub exclude_products: BTreeSet<ProductId>,

    /// Enables the cross-brand block
    #[serde(default)]
    pub is_cross_brand: bool,

    /// Cross-brand archetype
    #[serde(default)]
    pub cross_brand_type: Option<CrossBrandType>,

    /// Brands whose spend triggers the promotion
    #[serde(default)]
    pub trigger_brands: BTreeSet<BrandId>,

    /// Brands where the benefit is granted
    #[serde(default)]
    pub benefit_brands: BTreeSet<BrandId>,

    /// Minimum trigger spend, minor units
    #[serde(default)]
    pub trigger_min_amount: Option<i64>,

    /// Free-form cross-brand extras, validated during normalization
    #[serde(default)]
    pub cross_brand_rules: Option<serde_json::Value>,

    /// Members only
    #[serde(default)]
    pub member_only: bool,

    /// Allowed member tiers; empty means any
    #[serde(default)]
    pub member_tiers: Vec<String>,

    /// Members never eligible
    #[serde(default)]
    pub exclude_members: BTreeSet<MemberId>,

    /// First valid day, inclusive
    pub start_date: Date,

    /// Last valid day, inclusive
    pub end_date: Date,

    /// Allowed weekdays, Monday = 0; empty means every day
    #[serde(default)]
    pub valid_days: Vec<u8>,

    /// Time-of-day window start
    #[serde(default)]
    pub valid_time_start: Option<Time>,

    /// Time-of-day window end
    #[serde(default)]
    pub valid_time_end: Option<Time>,

    /// Not valid on public holidays
    #[serde(default)]
    pub exclude_holidays: bool,

    /// Global cap
    #[serde(default)]
    pub max_uses: Option<u32>,

    /// Per-customer cap
    #[serde(default)]
    pub max_uses_per_customer: Option<u32>,

    /// Per-day cap
    #[serde(default)]
    pub max_uses_per_day: Option<u32>,

    /// Uses so far, owned by the usage-accounting path
    #[serde(default)]
    pub current_uses: u32,

    /// Minimum purchase, minor units
    #[serde(default)]
    pub min_purchase: i64,

    /// Minimum units
    #[serde(default)]
    pub min_quantity: u32,

    /// Minimum distinct lines
    #[serde(default)]
    pub min_items: u32,

    /// May combine with other promotions
    #[serde(default)]
    pub is_stackable: bool,

    /// Legacy display priority
    #[serde(default)]
    pub priority: i32,

    /// Promotions this one never combines with
    #[serde(default)]
    pub cannot_combine_with: BTreeSet<PromotionId>,

    /// Allowed sales channels; empty means any
    #[serde(default)]
    pub sales_channels: Vec<String>,

    /// Excluded sales channels
    #[serde(default)]
    pub exclude_channels: Vec<String>,

    /// Customer-acquisition filter
    #[serde(default)]
    pub customer_type: CustomerType,

    /// Inactivity threshold for [`CustomerType::Inactive`]
    #[serde(default = "defaults::inactive_days")]
    pub inactive_days_threshold: u32,

    /// Upsell / free-item trigger product
    #[serde(default)]
    pub required_product: Option<ProductId>,

    /// Product offered by the upsell
    #[serde(default)]
    pub upsell_product: Option<ProductId>,

    /// Upsell price, minor units
    #[serde(default)]
    pub upsell_special_price: Option<i64>,

    /// Message shown with the upsell
    #[serde(default)]
    pub upsell_message: String,

    /// Mix-and-match rule blob
    #[serde(default)]
    pub mix_match_rules: Option<serde_json::Value>,

    /// 1–999, lower executes first
    #[serde(default = "defaults::execution_priority")]
    pub execution_priority: u16,

    /// Calculation stage
    #[serde(default)]
    pub execution_stage: ExecutionStage,

    /// Disabled promotions are skipped by batch compilation
    #[serde(default = "defaults::yes")]
    pub is_active: bool,

    /// Considered automatically when conditions are met
    #[serde(default = "defaults::yes")]
    pub is_auto_apply: bool,

    /// Only applies when a voucher is presented
    #[serde(default)]
    pub require_voucher: bool,

    /// Package configuration
    #[serde(default)]
    pub package: Option<PackageConfig>,

    /// Threshold tiers
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
}

impl Promotion {
    /// Create a promotion with every optional facet left at its default.
    #[must_use]
    pub fn new(
        id: PromotionId,
        company_id: CompanyId,
        code: impl Into<String>,
        promo_type: PromoType,
        start_date: Date,
        end_date: Date,
    ) -> Self {
        let code = code.into();

        Self {
            id,
            company_id,
            name: code.clone(),
            code,
            description: String::new(),
            terms_conditions: String::new(),
            promo_type: promo_type.to_str().to_string(),
            apply_to: ApplyTo::default(),
            scope: BrandScope::default(),
            brand_id: None,
            brands: BTreeSet::new(),
            exclude_brands: BTreeSet::new(),
            all_stores: true,
            stores: BTreeSet::new(),
            discount_percent: None,
            discount_amount: None,
            max_discount_amount: None,
            buy_quantity: None,
            get_quantity: None,
            get_product: None,
            combo_price: None,
            combo_products: Vec::new(),
            happy_hour_price: None,
            payment_methods: Vec::new(),
            payment_min_amount: 0,
            categories: BTreeSet::new(),
            products: BTreeSet::new(),
            exclude_categories: BTreeSet::new(),
            exclude_products: BTreeSet::new(),
            is_cross_brand: false,
            cross_brand_type: None,
            trigger_brands: BTreeSet::new(),
            benefit_brands: BTreeSet::new(),
            trigger_min_amount: None,
            cross_brand_rules: None,
            member_only: false,
            member_tiers: Vec::new(),
            exclude_members: BTreeSet::new(),
            start_date,
            end_date,
            valid_days: Vec::new(),
            valid_time_start: None,
            valid_time_end: None,
            exclude_holidays: false,
            max_uses: None,
            max_uses_per_customer: None,
            max_uses_per_day: None,
            current_uses: 0,
            min_purchase: 0,
            min_quantity: 0,
            min_items: 0,
            is_stackable: false,
            priority: 0,
            cannot_combine_with: BTreeSet::new(),
            sales_channels: Vec::new(),
            exclude_channels: Vec::new(),
            customer_type: CustomerType::default(),
            inactive_days_threshold: defaults::inactive_days(),
            required_product: None,
            upsell_product: None,
            upsell_special_price: None,
            upsell_message: String::new(),
            mix_match_rules: None,
            execution_priority: defaults::execution_priority(),
            execution_stage: ExecutionStage::default(),
            is_active: true,
            is_auto_apply: true,
            require_voucher: false,
            package: None,
            tiers: Vec::new(),
        }
    }

    /// Whether `date` falls inside the inclusive calendar range.
    #[must_use]
    pub fn is_calendar_active(&self, date: Date) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

mod defaults {
    pub(super) const fn yes() -> bool {
        true
    }

    pub(super) const fn one() -> u32 {
        1
    }

    pub(super) const fn inactive_days() -> u32 {
        30
    }

    pub(super) const fn execution_priority() -> u16 {
        500
    }
}
