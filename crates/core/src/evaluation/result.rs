//! Eligibility results

use std::fmt;

use rust_decimal::Decimal;
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    discounts::DiscountError,
    ids::{ProductId, PromotionId},
    promotions::{PromoType, facets::ConflictPolicy},
};

/// Indices into the bill's lines.
pub type LineIndices = SmallVec<[usize; 8]>;

/// What an eligible promotion grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Benefit {
    /// Reduces the bill
    Discount,

    /// Returned after payment; the bill is not reduced
    Cashback,

    /// Loyalty points multiplier; the bill is not reduced
    PointsMultiplier(Decimal),

    /// A free product, priced into the discount
    FreeProduct(ProductId),
}

impl Benefit {
    /// Whether the benefit reduces the amount payable.
    pub const fn reduces_bill(&self) -> bool {
        matches!(self, Self::Discount | Self::FreeProduct(_))
    }
}

/// Gate an ineligibility belongs to, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Dates, times, weekdays and holidays
    Validity,

    /// Store, brand, channel and cross-brand conditions
    Scope,

    /// Product and category targeting
    Targeting,

    /// Membership and customer history
    Customer,

    /// Minimum purchase, quantity and items
    Threshold,

    /// Usage caps
    Limit,

    /// Archetype-specific conditions
    Rule,
}

/// Why a promotion does not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    /// Bill date outside the validity range
    OutsideDateRange,

    /// Bill time outside the time window
    OutsideTimeWindow,

    /// Weekday not allowed
    DayNotAllowed,

    /// Public holiday excluded
    HolidayExcluded,

    /// Store not in scope
    StoreNotInScope,

    /// Bill brand not in scope or excluded
    BrandNotInScope,

    /// Sales channel excluded or not allowed
    ChannelNotAllowed,

    /// Cross-brand trigger not satisfied
    CrossBrandConditionNotMet,

    /// No bill line is targeted
    TargetingGateFailed,

    /// Anonymous bill for a members-only promotion
    MemberRequired,

    /// Member tier not in the allow-list
    MemberTierNotAllowed,

    /// Member explicitly excluded
    MemberExcluded,

    /// Customer history does not match the customer type
    CustomerTypeMismatch,

    /// Minimum purchase not reached
    MinPurchaseNotMet,

    /// Minimum quantity not reached
    MinQuantityNotMet,

    /// Minimum distinct items not reached
    MinItemsNotMet,

    /// Global cap reached
    UsageLimitReached,

    /// Daily cap reached
    DailyLimitReached,

    /// Per-customer cap reached
    CustomerLimitReached,

    /// Archetype minimum purchase not reached
    RuleMinimumNotMet,

    /// Not enough units bought for buy-x-get-y
    BuyQuantityNotMet,

    /// A combo component is missing
    ComboIncomplete,

    /// Free-item trigger product missing or short
    TriggerProductMissing,

    /// The free product is not on the bill
    FreeItemNotInBill,

    /// No payment method chosen
    PaymentMethodMissing,

    /// Payment method not listed
    PaymentMethodNotAllowed,

    /// A required package component is missing
    PackageIncomplete,

    /// Not enough category units for one group
    MixMatchQuantityNotMet,

    /// Upsell required product missing or short
    UpsellRequirementNotMet,

    /// Upsell product not on the bill
    UpsellProductMissing,

    /// Base below every tier
    NoTierQualified,
}

impl IneligibleReason {
    /// Stable snake_case code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::OutsideDateRange => "outside_date_range",
            Self::OutsideTimeWindow => "outside_time_window",
            Self::DayNotAllowed => "day_not_allowed",
            Self::HolidayExcluded => "holiday_excluded",
            Self::StoreNotInScope => "store_not_in_scope",
            Self::BrandNotInScope => "brand_not_in_scope",
            Self::ChannelNotAllowed => "channel_not_allowed",
            Self::CrossBrandConditionNotMet => "cross_brand_condition_not_met",
            Self::TargetingGateFailed => "targeting_gate_failed",
            Self::MemberRequired => "member_required",
            Self::MemberTierNotAllowed => "member_tier_not_allowed",
            Self::MemberExcluded => "member_excluded",
            Self::CustomerTypeMismatch => "customer_type_mismatch",
            Self::MinPurchaseNotMet => "min_purchase_not_met",
            Self::MinQuantityNotMet => "min_quantity_not_met",
            Self::MinItemsNotMet => "min_items_not_met",
            Self::UsageLimitReached => "usage_limit_reached",
            Self::DailyLimitReached => "daily_limit_reached",
            Self::CustomerLimitReached => "customer_limit_reached",
            Self::RuleMinimumNotMet => "rule_minimum_not_met",
            Self::BuyQuantityNotMet => "buy_quantity_not_met",
            Self::ComboIncomplete => "combo_incomplete",
            Self::TriggerProductMissing => "trigger_product_missing",
            Self::FreeItemNotInBill => "free_item_not_in_bill",
            Self::PaymentMethodMissing => "payment_method_missing",
            Self::PaymentMethodNotAllowed => "payment_method_not_allowed",
            Self::PackageIncomplete => "package_incomplete",
            Self::MixMatchQuantityNotMet => "mix_match_quantity_not_met",
            Self::UpsellRequirementNotMet => "upsell_requirement_not_met",
            Self::UpsellProductMissing => "upsell_product_missing",
            Self::NoTierQualified => "no_tier_qualified",
        }
    }

    /// The gate that produces this reason.
    pub const fn gate(self) -> Gate {
        match self {
            Self::OutsideDateRange
            | Self::OutsideTimeWindow
            | Self::DayNotAllowed
            | Self::HolidayExcluded => Gate::Validity,
            Self::StoreNotInScope
            | Self::BrandNotInScope
            | Self::ChannelNotAllowed
            | Self::CrossBrandConditionNotMet => Gate::Scope,
            Self::TargetingGateFailed => Gate::Targeting,
            Self::MemberRequired
            | Self::MemberTierNotAllowed
            | Self::MemberExcluded
            | Self::CustomerTypeMismatch => Gate::Customer,
            Self::MinPurchaseNotMet | Self::MinQuantityNotMet | Self::MinItemsNotMet => {
                Gate::Threshold
            }
            Self::UsageLimitReached | Self::DailyLimitReached | Self::CustomerLimitReached => {
                Gate::Limit
            }
            Self::RuleMinimumNotMet
            | Self::BuyQuantityNotMet
            | Self::ComboIncomplete
            | Self::TriggerProductMissing
            | Self::FreeItemNotInBill
            | Self::PaymentMethodMissing
            | Self::PaymentMethodNotAllowed
            | Self::PackageIncomplete
            | Self::MixMatchQuantityNotMet
            | Self::UpsellRequirementNotMet
            | Self::UpsellProductMissing
            | Self::NoTierQualified => Gate::Rule,
        }
    }
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A document the evaluator cannot judge.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationFault {
    /// Document major version is not understood
    #[error("unsupported compiler version: {version}")]
    UnsupportedVersion {
        /// Version found on the document
        version: String,
    },

    /// Document and bill use different currencies
    #[error("document currency {document} does not match bill currency {bill}")]
    CurrencyMismatch {
        /// Document currency
        document: String,

        /// Bill currency
        bill: String,
    },

    /// Document currency is not ISO-4217
    #[error("unknown currency code: {code}")]
    UnknownCurrency {
        /// The code
        code: String,
    },

    /// Minor-unit arithmetic failed
    #[error("discount arithmetic failed: {source}")]
    Arithmetic {
        /// Underlying error
        #[from]
        source: DiscountError,
    },
}

/// Outcome for one promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    /// Every gate passed
    Eligible {
        /// Discount or cashback value, minor units
        discount: i64,

        /// What is granted
        benefit: Benefit,

        /// Lines the benefit is attributed to
        affected_lines: LineIndices,
    },

    /// A gate failed
    Ineligible {
        /// First failing gate's reason
        reason: IneligibleReason,
    },

    /// The document could not be judged
    Error {
        /// What went wrong
        fault: EvaluationFault,
    },
}

/// Eligibility of one promotion for one bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityResult {
    /// Promotion id
    pub promotion_id: PromotionId,

    /// Promotion code
    pub code: String,

    /// Archetype
    pub promo_type: PromoType,

    /// Currency of `discount`
    pub currency: String,

    /// Conflict policy copied from the document
    pub conflict: ConflictPolicy,

    /// The verdict
    pub verdict: Verdict,
}

impl EligibilityResult {
    /// Whether the promotion applies.
    pub const fn is_eligible(&self) -> bool {
        matches!(self.verdict, Verdict::Eligible { .. })
    }

    /// Discount in minor units; zero unless eligible.
    pub const fn discount_minor(&self) -> i64 {
        match self.verdict {
            Verdict::Eligible { discount, .. } => discount,
            _ => 0,
        }
    }

    /// Benefit, when eligible.
    pub const fn benefit(&self) -> Option<Benefit> {
        match self.verdict {
            Verdict::Eligible { benefit, .. } => Some(benefit),
            _ => None,
        }
    }

    /// Ineligibility reason, when ineligible.
    pub const fn reason(&self) -> Option<IneligibleReason> {
        match self.verdict {
            Verdict::Ineligible { reason } => Some(reason),
            _ => None,
        }
    }

    /// Discount as money in the document currency.
    pub fn discount(&self) -> Option<Money<'static, Currency>> {
        let currency = iso::find(&self.currency)?;

        Some(Money::from_minor(self.discount_minor(), currency))
    }
}
