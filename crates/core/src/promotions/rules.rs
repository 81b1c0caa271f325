//! Rule variants
//!
//! One strongly-typed shape per archetype. Each variant captures only the
//! parameters meaningful to it; the compiled document carries exactly one.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{CategoryId, ProductId},
    promotions::{
        PackageItemKind, PromoType,
        schedule::{TimeWindow, WeekdaySet},
        tiers::Tier,
    },
};

/// Normalized rule, tagged by archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleVariant {
    /// Percentage off
    PercentDiscount(PercentDiscount),

    /// Fixed amount off
    AmountDiscount(AmountDiscount),

    /// Buy X get Y
    BuyXGetY(BuyXGetY),

    /// Combo deal
    Combo(Combo),

    /// Free item
    FreeItem(FreeItem),

    /// Happy hour
    HappyHour(HappyHour),

    /// Cashback
    Cashback(Cashback),

    /// Payment-method discount
    PaymentDiscount(PaymentDiscount),

    /// Package / set menu
    Package(Package),

    /// Mix and match
    MixMatch(MixMatch),

    /// Upsell / add-on
    Upsell(Upsell),

    /// Threshold tiers
    ThresholdTier(ThresholdTier),
}

impl RuleVariant {
    /// The archetype this rule belongs to.
    pub const fn promo_type(&self) -> PromoType {
        match self {
            Self::PercentDiscount(_) => PromoType::PercentDiscount,
            Self::AmountDiscount(_) => PromoType::AmountDiscount,
            Self::BuyXGetY(_) => PromoType::BuyXGetY,
            Self::Combo(_) => PromoType::Combo,
            Self::FreeItem(_) => PromoType::FreeItem,
            Self::HappyHour(_) => PromoType::HappyHour,
            Self::Cashback(_) => PromoType::Cashback,
            Self::PaymentDiscount(_) => PromoType::PaymentDiscount,
            Self::Package(_) => PromoType::Package,
            Self::MixMatch(_) => PromoType::MixMatch,
            Self::Upsell(_) => PromoType::Upsell,
            Self::ThresholdTier(_) => PromoType::ThresholdTier,
        }
    }
}

/// Percentage or fixed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiscountValue {
    /// Percent points
    Percent(Decimal),

    /// Minor units
    Amount(i64),
}

impl DiscountValue {
    /// Whether the value is a percentage.
    pub const fn is_percent(&self) -> bool {
        matches!(self, Self::Percent(_))
    }
}

/// Percent of the eligible subtotal, capped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentDiscount {
    /// Percent points
    pub percent: Decimal,

    /// Maximum discount, minor units
    pub max_cap: Option<i64>,

    /// Minimum purchase, minor units
    pub min_purchase: i64,
}

/// Fixed amount off, never more than the eligible subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountDiscount {
    /// Minor units
    pub amount: i64,

    /// Minimum purchase, minor units
    pub min_purchase: i64,
}

/// Buy `buy_qty`, get `get_qty` discounted by `get_discount_percent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyXGetY {
    /// Units to buy
    pub buy_qty: u32,

    /// Units granted
    pub get_qty: u32,

    /// Discount on the granted units, percent points (100 = free)
    pub get_discount_percent: Decimal,

    /// Product granted; `None` means the purchased product itself
    pub specific_get_product: Option<ProductId>,

    /// Granted unit must be the purchased product
    pub same_product_only: bool,
}

/// All required products together for a fixed price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    /// Price of one combo set, minor units
    pub combo_price: i64,

    /// Products required, one unit each
    pub required_product_ids: BTreeSet<ProductId>,
}

/// A free product, optionally unlocked by a trigger product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeItem {
    /// Product that must be bought
    pub trigger_product_id: Option<ProductId>,

    /// Units of the trigger product required
    pub trigger_min_qty: u32,

    /// Product granted
    pub free_product_id: Option<ProductId>,

    /// Units granted
    pub free_qty: u32,
}

/// Happy-hour pricing; exactly one form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HappyHourPricing {
    /// Percent points off
    Percent(Decimal),

    /// Minor units off
    Amount(i64),

    /// Unit price override, minor units
    SpecialPrice(i64),
}

/// Time-window pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HappyHour {
    /// Pricing form
    pub pricing: HappyHourPricing,

    /// Store-local window
    pub time_window: TimeWindow,

    /// Allowed weekdays
    pub days_of_week: WeekdaySet,
}

/// Value returned to the customer after paying with one of `payment_methods`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cashback {
    /// Percent or amount
    pub value: DiscountValue,

    /// Maximum cashback, minor units
    pub max_cap: Option<i64>,

    /// Qualifying methods; empty means any
    pub payment_methods: BTreeSet<String>,

    /// Minimum purchase, minor units
    pub min_purchase: i64,
}

/// Discount for paying with one of `payment_methods`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDiscount {
    /// Qualifying methods; empty means any
    pub payment_methods: BTreeSet<String>,

    /// Percent or amount
    pub value: DiscountValue,

    /// Maximum discount, minor units
    pub max_cap: Option<i64>,

    /// Minimum purchase, minor units
    pub min_purchase: i64,
}

/// A package component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageItem {
    /// Fixed product or category choice
    pub kind: PackageItemKind,

    /// Product of a fixed component
    pub product_id: Option<ProductId>,

    /// Category of a choice component
    pub category_id: Option<CategoryId>,

    /// Units per package
    pub quantity: u32,

    /// Must be present
    pub required: bool,

    /// Minimum selections
    pub min_selection: u32,

    /// Maximum selections
    pub max_selection: u32,
}

/// Set menu sold for a package price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Display name
    pub name: String,

    /// Components in display order
    pub items: Vec<PackageItem>,

    /// Price of the package, minor units
    pub package_price: i64,

    /// Cashier may swap components
    pub allow_modification: bool,
}

/// Any `required_quantity` units of a category for a special price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixMatch {
    /// Category the units come from
    pub category_id: CategoryId,

    /// Units per group
    pub required_quantity: u32,

    /// Price of one group, minor units
    pub special_price: i64,

    /// A group may repeat a product
    pub allow_same_product: bool,
}

/// Add-on at a special price when the required product is bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upsell {
    /// Product that must be bought
    pub required_product_id: ProductId,

    /// Units of the required product
    pub required_min_qty: u32,

    /// Product offered
    pub upsell_product_id: ProductId,

    /// Offer price, minor units
    pub special_price: i64,

    /// Message shown to the cashier
    pub message: String,
}

/// Spend-threshold tiers, richest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdTier {
    /// Tiers sorted by `min_amount`, highest first
    pub tiers: Vec<Tier>,
}
