//! Rule Normalizer
//!
//! Turns the flat promotion snapshot into exactly one [`RuleVariant`] plus the
//! shared facet blocks. Zero-valued optional numbers count as unset, matching
//! how the admin forms store "no value".

use std::collections::BTreeSet;

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Deserialize;

use crate::{
    compiler::error::CompileError,
    ids::CategoryId,
    promotions::{
        BrandScope, CrossBrandType, PackageItemKind, PromoType, Promotion, TierDiscountType,
        facets::{
            Audience, BrandCoverage, ConflictPolicy, CrossBrand, Limits, Requirements, Scope,
            StoreScope, Targeting, Validity,
        },
        rules::{
            AmountDiscount, BuyXGetY, Cashback, Combo, DiscountValue, FreeItem, HappyHour,
            HappyHourPricing, MixMatch, Package, PackageItem, PaymentDiscount, PercentDiscount,
            RuleVariant, ThresholdTier, Upsell,
        },
        schedule::{TimeWindow, WeekdaySet},
        tiers::{Tier, TierBenefit, sort_richest_first},
    },
};

/// A promotion reduced to its rule and facets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPromotion {
    /// The archetype rule
    pub rule: RuleVariant,

    /// Validity block
    pub validity: Validity,

    /// Scope block
    pub scope: Scope,

    /// Targeting block
    pub targeting: Targeting,

    /// Audience block
    pub audience: Audience,

    /// Requirements block
    pub requirements: Requirements,

    /// Limits block
    pub limits: Limits,

    /// Conflict block
    pub conflict: ConflictPolicy,

    /// Cross-brand block
    pub cross_brand: Option<CrossBrand>,
}

/// Normalize a promotion into its rule and facets.
///
/// # Errors
///
/// Returns a [`CompileError`] when the archetype is unknown, a required field
/// is missing, or a facet holds an unusable value.
pub fn normalize(promotion: &Promotion) -> Result<NormalizedPromotion, CompileError> {
    let rule = normalize_rule(promotion)?;
    let validity = validity(promotion)?;

    Ok(NormalizedPromotion {
        rule,
        validity,
        scope: scope(promotion)?,
        targeting: Targeting {
            apply_to: promotion.apply_to,
            categories: promotion.categories.clone(),
            products: promotion.products.clone(),
            exclude_categories: promotion.exclude_categories.clone(),
            exclude_products: promotion.exclude_products.clone(),
        },
        audience: Audience {
            member_only: promotion.member_only,
            member_tiers: lowercase_set(&promotion.member_tiers),
            exclude_members: promotion.exclude_members.clone(),
            customer_type: promotion.customer_type,
            inactive_days_threshold: promotion.inactive_days_threshold,
        },
        requirements: Requirements {
            min_purchase: non_negative("min_purchase", promotion.min_purchase)?,
            min_quantity: promotion.min_quantity,
            min_items: promotion.min_items,
        },
        limits: Limits {
            max_uses: promotion.max_uses.filter(|uses| *uses > 0),
            max_uses_per_customer: promotion.max_uses_per_customer.filter(|uses| *uses > 0),
            max_uses_per_day: promotion.max_uses_per_day.filter(|uses| *uses > 0),
            current_uses: promotion.current_uses,
        },
        conflict: conflict(promotion)?,
        cross_brand: cross_brand(promotion)?,
    })
}

/// Build the archetype rule alone.
///
/// # Errors
///
/// Returns [`CompileError::UnknownPromoType`] for an unknown tag, otherwise
/// the first missing or invalid archetype field.
pub fn normalize_rule(promotion: &Promotion) -> Result<RuleVariant, CompileError> {
    let promo_type = PromoType::from_tag(&promotion.promo_type)
        .ok_or_else(|| CompileError::UnknownPromoType(promotion.promo_type.clone()))?;

    let rule = match promo_type {
        PromoType::PercentDiscount => RuleVariant::PercentDiscount(PercentDiscount {
            percent: percent(promotion)?.ok_or(CompileError::missing("discount_percent"))?,
            max_cap: cap(promotion)?,
            min_purchase: non_negative("min_purchase", promotion.min_purchase)?,
        }),
        PromoType::AmountDiscount => RuleVariant::AmountDiscount(AmountDiscount {
            amount: amount(promotion)?.ok_or(CompileError::missing("discount_amount"))?,
            min_purchase: non_negative("min_purchase", promotion.min_purchase)?,
        }),
        PromoType::BuyXGetY => RuleVariant::BuyXGetY(BuyXGetY {
            buy_qty: positive_qty(promotion.buy_quantity)
                .ok_or(CompileError::missing("buy_quantity"))?,
            get_qty: positive_qty(promotion.get_quantity)
                .ok_or(CompileError::missing("get_quantity"))?,
            get_discount_percent: percent(promotion)?.unwrap_or(Decimal::ONE_HUNDRED),
            specific_get_product: promotion.get_product,
            same_product_only: promotion.get_product.is_none(),
        }),
        PromoType::Combo => combo(promotion)?,
        PromoType::FreeItem => RuleVariant::FreeItem(FreeItem {
            trigger_product_id: promotion.required_product,
            trigger_min_qty: positive_qty(promotion.buy_quantity).unwrap_or(1),
            free_product_id: Some(
                promotion
                    .get_product
                    .ok_or(CompileError::missing("get_product"))?,
            ),
            free_qty: positive_qty(promotion.get_quantity).unwrap_or(1),
        }),
        PromoType::HappyHour => happy_hour(promotion)?,
        PromoType::Cashback => RuleVariant::Cashback(Cashback {
            value: discount_value(promotion)?,
            max_cap: cap(promotion)?,
            payment_methods: lowercase_set(&promotion.payment_methods),
            min_purchase: non_negative("min_purchase", promotion.min_purchase)?,
        }),
        PromoType::PaymentDiscount => RuleVariant::PaymentDiscount(PaymentDiscount {
            payment_methods: lowercase_set(&promotion.payment_methods),
            value: discount_value(promotion)?,
            max_cap: cap(promotion)?,
            min_purchase: non_negative("payment_min_amount", promotion.payment_min_amount)?,
        }),
        PromoType::Package => package(promotion)?,
        PromoType::MixMatch => mix_match(promotion)?,
        PromoType::Upsell => RuleVariant::Upsell(Upsell {
            required_product_id: promotion
                .required_product
                .ok_or(CompileError::missing("required_product"))?,
            required_min_qty: positive_qty(promotion.buy_quantity).unwrap_or(1),
            upsell_product_id: promotion
                .upsell_product
                .ok_or(CompileError::missing("upsell_product"))?,
            special_price: non_negative(
                "upsell_special_price",
                promotion
                    .upsell_special_price
                    .ok_or(CompileError::missing("upsell_special_price"))?,
            )?,
            message: promotion.upsell_message.clone(),
        }),
        PromoType::ThresholdTier => threshold_tier(promotion)?,
    };

    Ok(rule)
}

fn validity(promotion: &Promotion) -> Result<Validity, CompileError> {
    if promotion.end_date < promotion.start_date {
        return Err(CompileError::InvalidDateRange {
            start: promotion.start_date,
            end: promotion.end_date,
        });
    }

    let time_window = match (promotion.valid_time_start, promotion.valid_time_end) {
        (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
        (None, None) => None,
        (Some(_), None) => return Err(CompileError::missing("valid_time_end")),
        (None, Some(_)) => return Err(CompileError::missing("valid_time_start")),
    };

    Ok(Validity {
        start_date: promotion.start_date,
        end_date: promotion.end_date,
        time_window,
        days_of_week: weekdays(promotion)?,
        exclude_holidays: promotion.exclude_holidays,
    })
}

fn weekdays(promotion: &Promotion) -> Result<WeekdaySet, CompileError> {
    WeekdaySet::from_offsets(&promotion.valid_days).map_err(|day| {
        CompileError::invalid("valid_days", format!("{day} is not a weekday (0-6)"))
    })
}

fn scope(promotion: &Promotion) -> Result<Scope, CompileError> {
    let stores = if promotion.all_stores {
        StoreScope::All
    } else if promotion.stores.is_empty() {
        return Err(CompileError::missing("stores"));
    } else {
        StoreScope::Listed(promotion.stores.clone())
    };

    let brands = match promotion.scope {
        BrandScope::Company => BrandCoverage::Company,
        BrandScope::Brands if promotion.brands.is_empty() => {
            return Err(CompileError::missing("brands"));
        }
        BrandScope::Brands => BrandCoverage::Listed(promotion.brands.clone()),
        BrandScope::Single => {
            let brand = promotion
                .brand_id
                .ok_or(CompileError::missing("brand_id"))?;

            BrandCoverage::Listed(BTreeSet::from([brand]))
        }
    };

    Ok(Scope {
        stores,
        brands,
        exclude_brands: promotion.exclude_brands.clone(),
        sales_channels: lowercase_set(&promotion.sales_channels),
        exclude_channels: lowercase_set(&promotion.exclude_channels),
    })
}

fn conflict(promotion: &Promotion) -> Result<ConflictPolicy, CompileError> {
    if !(1..=999).contains(&promotion.execution_priority) {
        return Err(CompileError::invalid(
            "execution_priority",
            format!("{} is outside 1-999", promotion.execution_priority),
        ));
    }

    Ok(ConflictPolicy {
        is_stackable: promotion.is_stackable,
        execution_priority: promotion.execution_priority,
        execution_stage: promotion.execution_stage,
        cannot_combine_with: promotion.cannot_combine_with.clone(),
        is_auto_apply: promotion.is_auto_apply,
        require_voucher: promotion.require_voucher,
        priority: promotion.priority,
    })
}

/// Typed extras of the cross-brand rule blob.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CrossBrandRules {
    #[serde(default = "default_min_distinct_brands")]
    min_distinct_brands: u32,
}

const fn default_min_distinct_brands() -> u32 {
    2
}

fn cross_brand(promotion: &Promotion) -> Result<Option<CrossBrand>, CompileError> {
    if !promotion.is_cross_brand {
        return Ok(None);
    }

    let kind = promotion
        .cross_brand_type
        .ok_or(CompileError::missing("cross_brand_type"))?;

    if kind == CrossBrandType::TriggerBenefit && promotion.trigger_brands.is_empty() {
        return Err(CompileError::EmptyTriggerBrands);
    }

    let rules = match &promotion.cross_brand_rules {
        Some(blob) if !blob.is_null() => CrossBrandRules::deserialize(blob)
            .map_err(|err| CompileError::invalid("cross_brand_rules", err))?,
        _ => CrossBrandRules {
            min_distinct_brands: default_min_distinct_brands(),
        },
    };

    if rules.min_distinct_brands == 0 {
        return Err(CompileError::invalid(
            "cross_brand_rules.min_distinct_brands",
            "must be at least 1",
        ));
    }

    let trigger_min_amount = promotion
        .trigger_min_amount
        .map(|amount| non_negative("trigger_min_amount", amount))
        .transpose()?
        .filter(|amount| *amount > 0);

    Ok(Some(CrossBrand {
        kind,
        trigger_brands: promotion.trigger_brands.clone(),
        benefit_brands: promotion.benefit_brands.clone(),
        trigger_min_amount,
        min_distinct_brands: rules.min_distinct_brands,
    }))
}

fn combo(promotion: &Promotion) -> Result<RuleVariant, CompileError> {
    let combo_price = positive_amount("combo_price", promotion.combo_price)?
        .ok_or(CompileError::missing("combo_price"))?;

    if promotion.combo_products.is_empty() {
        return Err(CompileError::missing("combo_products"));
    }

    Ok(RuleVariant::Combo(Combo {
        combo_price,
        required_product_ids: promotion.combo_products.iter().copied().collect(),
    }))
}

fn happy_hour(promotion: &Promotion) -> Result<RuleVariant, CompileError> {
    let mut pricing = [
        percent(promotion)?.map(HappyHourPricing::Percent),
        amount(promotion)?.map(HappyHourPricing::Amount),
        positive_amount("happy_hour_price", promotion.happy_hour_price)?
            .map(HappyHourPricing::SpecialPrice),
    ]
    .into_iter()
    .flatten();

    let Some(selected) = pricing.next() else {
        return Err(CompileError::missing("discount_percent"));
    };

    if pricing.next().is_some() {
        return Err(CompileError::AmbiguousConfiguration {
            fields: "discount_percent, discount_amount, happy_hour_price",
        });
    }

    let (Some(start), Some(end)) = (promotion.valid_time_start, promotion.valid_time_end) else {
        return Err(CompileError::missing("valid_time_start"));
    };

    Ok(RuleVariant::HappyHour(HappyHour {
        pricing: selected,
        time_window: TimeWindow::new(start, end),
        days_of_week: weekdays(promotion)?,
    }))
}

fn package(promotion: &Promotion) -> Result<RuleVariant, CompileError> {
    let config = promotion
        .package
        .as_ref()
        .ok_or(CompileError::missing("package"))?;

    if config.items.is_empty() {
        return Err(CompileError::missing("package.items"));
    }

    let mut configured: Vec<_> = config.items.iter().collect();
    configured.sort_by_key(|item| item.sort_order);

    let items = configured
        .into_iter()
        .map(|item| {
            match item.item_type {
                PackageItemKind::Fixed if item.product.is_none() => {
                    return Err(CompileError::missing("package.items.product"));
                }
                PackageItemKind::Choice if item.category.is_none() => {
                    return Err(CompileError::missing("package.items.category"));
                }
                _ => {}
            }

            if item.quantity == 0 {
                return Err(CompileError::invalid(
                    "package.items.quantity",
                    "must be at least 1",
                ));
            }

            if item.item_type == PackageItemKind::Choice && item.max_selection < item.min_selection
            {
                return Err(CompileError::invalid(
                    "package.items.max_selection",
                    format!(
                        "{} is below min_selection {}",
                        item.max_selection, item.min_selection
                    ),
                ));
            }

            Ok(PackageItem {
                kind: item.item_type,
                product_id: item.product,
                category_id: item.category,
                quantity: item.quantity,
                required: item.is_required,
                min_selection: item.min_selection,
                max_selection: item.max_selection,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RuleVariant::Package(Package {
        name: config.package_name.clone(),
        items,
        package_price: non_negative("package.package_price", config.package_price)?,
        allow_modification: config.allow_modification,
    }))
}

/// Strict schema of the mix-and-match rule blob.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MixMatchRules {
    #[serde(default)]
    category_id: Option<CategoryId>,

    #[serde(default = "default_required_quantity")]
    required_quantity: u32,

    #[serde(default)]
    special_price: Option<i64>,

    #[serde(default = "default_allow_same_product")]
    allow_same_product: bool,
}

const fn default_required_quantity() -> u32 {
    3
}

const fn default_allow_same_product() -> bool {
    true
}

fn mix_match(promotion: &Promotion) -> Result<RuleVariant, CompileError> {
    let blob = promotion
        .mix_match_rules
        .as_ref()
        .filter(|blob| !blob.is_null())
        .ok_or(CompileError::missing("mix_match_rules"))?;

    let rules = MixMatchRules::deserialize(blob)
        .map_err(|err| CompileError::invalid("mix_match_rules", err))?;

    if rules.required_quantity == 0 {
        return Err(CompileError::invalid(
            "mix_match_rules.required_quantity",
            "must be at least 1",
        ));
    }

    let special_price = rules
        .special_price
        .ok_or(CompileError::missing("mix_match_rules.special_price"))?;

    Ok(RuleVariant::MixMatch(MixMatch {
        category_id: rules
            .category_id
            .ok_or(CompileError::missing("mix_match_rules.category_id"))?,
        required_quantity: rules.required_quantity,
        special_price: non_negative("mix_match_rules.special_price", special_price)?,
        allow_same_product: rules.allow_same_product,
    }))
}

fn threshold_tier(promotion: &Promotion) -> Result<RuleVariant, CompileError> {
    let mut tiers = promotion
        .tiers
        .iter()
        .filter(|tier| tier.is_active)
        .map(|config| {
            let benefit = match config.discount_type {
                TierDiscountType::Percent => {
                    TierBenefit::Percent(percent_points("tiers.discount_value", config.discount_value)?)
                }
                TierDiscountType::Amount => {
                    TierBenefit::Amount(whole_minor("tiers.discount_value", config.discount_value)?)
                }
                TierDiscountType::FreeProduct => TierBenefit::FreeProduct(
                    config
                        .free_product
                        .ok_or(CompileError::missing("tiers.free_product"))?,
                ),
                TierDiscountType::PointsMultiplier => TierBenefit::PointsMultiplier(
                    config
                        .points_multiplier
                        .filter(|multiplier| *multiplier > Decimal::ZERO)
                        .ok_or(CompileError::missing("tiers.points_multiplier"))?,
                ),
            };

            let min_amount = non_negative("tiers.min_amount", config.min_amount)?;

            if let Some(max) = config.max_amount
                && max < min_amount
            {
                return Err(CompileError::invalid(
                    "tiers.max_amount",
                    format!("{max} is below min_amount {min_amount}"),
                ));
            }

            Ok(Tier {
                name: config.tier_name.clone(),
                tier_order: config.tier_order,
                min_amount,
                max_amount: config.max_amount,
                benefit,
            })
        })
        .collect::<Result<Vec<_>, CompileError>>()?;

    if tiers.is_empty() {
        return Err(CompileError::missing("tiers"));
    }

    sort_richest_first(&mut tiers);

    Ok(RuleVariant::ThresholdTier(ThresholdTier { tiers }))
}

fn discount_value(promotion: &Promotion) -> Result<DiscountValue, CompileError> {
    if let Some(percent) = percent(promotion)? {
        return Ok(DiscountValue::Percent(percent));
    }

    amount(promotion)?
        .map(DiscountValue::Amount)
        .ok_or(CompileError::missing("discount_percent"))
}

fn percent(promotion: &Promotion) -> Result<Option<Decimal>, CompileError> {
    promotion
        .discount_percent
        .filter(|points| !points.is_zero())
        .map(|points| percent_points("discount_percent", points))
        .transpose()
}

fn percent_points(field: &'static str, points: Decimal) -> Result<Decimal, CompileError> {
    if points < Decimal::ZERO || points > Decimal::ONE_HUNDRED {
        return Err(CompileError::invalid(
            field,
            format!("{points} is outside 0-100"),
        ));
    }

    Ok(points.normalize())
}

fn amount(promotion: &Promotion) -> Result<Option<i64>, CompileError> {
    positive_amount("discount_amount", promotion.discount_amount)
}

fn cap(promotion: &Promotion) -> Result<Option<i64>, CompileError> {
    positive_amount("max_discount_amount", promotion.max_discount_amount)
}

fn positive_amount(field: &'static str, value: Option<i64>) -> Result<Option<i64>, CompileError> {
    value
        .map(|value| non_negative(field, value))
        .transpose()
        .map(|value| value.filter(|value| *value > 0))
}

fn non_negative(field: &'static str, value: i64) -> Result<i64, CompileError> {
    if value < 0 {
        return Err(CompileError::invalid(field, format!("{value} is negative")));
    }

    Ok(value)
}

fn whole_minor(field: &'static str, value: Decimal) -> Result<i64, CompileError> {
    if value.fract() != Decimal::ZERO {
        return Err(CompileError::invalid(
            field,
            format!("{value} is not a whole number of minor units"),
        ));
    }

    let minor = value
        .to_i64()
        .ok_or_else(|| CompileError::invalid(field, format!("{value} is out of range")))?;

    non_negative(field, minor)
}

fn positive_qty(value: Option<u32>) -> Option<u32> {
    value.filter(|qty| *qty > 0)
}

fn lowercase_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use jiff::civil::{date, time};
    use serde_json::json;
    use testresult::TestResult;

    use super::*;
    use crate::{
        ids::{BrandId, CompanyId, ProductId, PromotionId},
        promotions::{PackageConfig, PackageItemConfig, TierConfig},
    };

    fn promotion(promo_type: PromoType) -> Promotion {
        Promotion::new(
            PromotionId::from_u128(1),
            CompanyId::from_u128(1),
            "TEST",
            promo_type,
            date(2026, 1, 1),
            date(2026, 12, 31),
        )
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut promo = promotion(PromoType::PercentDiscount);
        promo.promo_type = "lucky_draw".to_string();

        let result = normalize_rule(&promo);

        assert!(matches!(result, Err(CompileError::UnknownPromoType(tag)) if tag == "lucky_draw"));
    }

    #[test]
    fn percent_discount_carries_cap_and_minimum() -> TestResult {
        let mut promo = promotion(PromoType::PercentDiscount);
        promo.discount_percent = Some(Decimal::from(20));
        promo.max_discount_amount = Some(50_000);
        promo.min_purchase = 100_000;

        let rule = normalize_rule(&promo)?;

        assert_eq!(
            rule,
            RuleVariant::PercentDiscount(PercentDiscount {
                percent: Decimal::from(20),
                max_cap: Some(50_000),
                min_purchase: 100_000,
            })
        );

        Ok(())
    }

    #[test]
    fn zero_percent_counts_as_missing() {
        let mut promo = promotion(PromoType::PercentDiscount);
        promo.discount_percent = Some(Decimal::ZERO);

        let result = normalize_rule(&promo);

        assert!(matches!(
            result,
            Err(CompileError::MissingConfiguration {
                field: "discount_percent"
            })
        ));
    }

    #[test]
    fn percent_above_hundred_is_invalid() {
        let mut promo = promotion(PromoType::PercentDiscount);
        promo.discount_percent = Some(Decimal::from(120));

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::InvalidConfiguration {
                field: "discount_percent",
                ..
            })
        ));
    }

    #[test]
    fn bogo_defaults_to_free_same_product() -> TestResult {
        let mut promo = promotion(PromoType::BuyXGetY);
        promo.buy_quantity = Some(1);
        promo.get_quantity = Some(1);

        let RuleVariant::BuyXGetY(rule) = normalize_rule(&promo)? else {
            panic!("expected a buy-x-get-y rule");
        };

        assert_eq!(rule.get_discount_percent, Decimal::ONE_HUNDRED);
        assert!(rule.same_product_only);
        assert_eq!(rule.specific_get_product, None);

        Ok(())
    }

    #[test]
    fn bogo_without_buy_quantity_is_missing_configuration() {
        let mut promo = promotion(PromoType::BuyXGetY);
        promo.get_quantity = Some(1);

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::MissingConfiguration {
                field: "buy_quantity"
            })
        ));
    }

    #[test]
    fn happy_hour_needs_exactly_one_pricing() {
        let mut promo = promotion(PromoType::HappyHour);
        promo.valid_time_start = Some(time(14, 0, 0, 0));
        promo.valid_time_end = Some(time(17, 0, 0, 0));

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::MissingConfiguration { .. })
        ));

        promo.discount_percent = Some(Decimal::from(30));
        promo.happy_hour_price = Some(15_000);

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::AmbiguousConfiguration { .. })
        ));
    }

    #[test]
    fn happy_hour_requires_time_window() {
        let mut promo = promotion(PromoType::HappyHour);
        promo.happy_hour_price = Some(15_000);

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::MissingConfiguration {
                field: "valid_time_start"
            })
        ));
    }

    #[test]
    fn payment_discount_uses_payment_minimum_and_lowercases_methods() -> TestResult {
        let mut promo = promotion(PromoType::PaymentDiscount);
        promo.discount_amount = Some(10_000);
        promo.payment_methods = vec!["QRIS".to_string(), " gopay ".to_string()];
        promo.payment_min_amount = 50_000;
        promo.min_purchase = 1;

        let RuleVariant::PaymentDiscount(rule) = normalize_rule(&promo)? else {
            panic!("expected a payment discount rule");
        };

        assert_eq!(rule.min_purchase, 50_000);
        assert_eq!(rule.value, DiscountValue::Amount(10_000));
        assert_eq!(
            rule.payment_methods,
            BTreeSet::from(["gopay".to_string(), "qris".to_string()])
        );

        Ok(())
    }

    #[test]
    fn package_without_items_is_missing_configuration() {
        let mut promo = promotion(PromoType::Package);
        promo.package = Some(PackageConfig {
            package_name: "Family".to_string(),
            package_price: 100_000,
            allow_modification: false,
            items: Vec::new(),
        });

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::MissingConfiguration {
                field: "package.items"
            })
        ));
    }

    #[test]
    fn fixed_package_item_needs_a_product() {
        let mut promo = promotion(PromoType::Package);
        promo.package = Some(PackageConfig {
            package_name: "Family".to_string(),
            package_price: 100_000,
            allow_modification: false,
            items: vec![PackageItemConfig {
                item_type: PackageItemKind::Fixed,
                product: None,
                category: None,
                quantity: 1,
                is_required: true,
                min_selection: 0,
                max_selection: 1,
                sort_order: 0,
            }],
        });

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::MissingConfiguration {
                field: "package.items.product"
            })
        ));
    }

    #[test]
    fn mix_match_blob_fills_defaults() -> TestResult {
        let category = CategoryId::from_u128(5);
        let mut promo = promotion(PromoType::MixMatch);
        promo.mix_match_rules = Some(json!({
            "category_id": category.to_string(),
            "special_price": 50_000,
        }));

        let rule = normalize_rule(&promo)?;

        assert_eq!(
            rule,
            RuleVariant::MixMatch(MixMatch {
                category_id: category,
                required_quantity: 3,
                special_price: 50_000,
                allow_same_product: true,
            })
        );

        Ok(())
    }

    #[test]
    fn mix_match_blob_rejects_unknown_fields() {
        let mut promo = promotion(PromoType::MixMatch);
        promo.mix_match_rules = Some(json!({
            "category_id": CategoryId::from_u128(5).to_string(),
            "special_price": 50_000,
            "bonus": true,
        }));

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::InvalidConfiguration {
                field: "mix_match_rules",
                ..
            })
        ));
    }

    #[test]
    fn mix_match_without_category_is_missing_configuration() {
        let mut promo = promotion(PromoType::MixMatch);
        promo.mix_match_rules = Some(json!({ "special_price": 50_000 }));

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::MissingConfiguration {
                field: "mix_match_rules.category_id"
            })
        ));
    }

    #[test]
    fn threshold_tiers_drop_inactive_and_sort_richest_first() -> TestResult {
        let tier = |name: &str, order, min, kind, value: i64, active| TierConfig {
            tier_name: name.to_string(),
            tier_order: order,
            min_amount: min,
            max_amount: None,
            discount_type: kind,
            discount_value: Decimal::from(value),
            free_product: None,
            points_multiplier: None,
            is_active: active,
        };

        let mut promo = promotion(PromoType::ThresholdTier);
        promo.tiers = vec![
            tier("silver", 1, 100_000, TierDiscountType::Percent, 10, true),
            tier("gold", 2, 500_000, TierDiscountType::Amount, 100_000, true),
            tier("retired", 3, 900_000, TierDiscountType::Amount, 1, false),
        ];

        let RuleVariant::ThresholdTier(rule) = normalize_rule(&promo)? else {
            panic!("expected a threshold tier rule");
        };

        let names: Vec<_> = rule.tiers.iter().map(|tier| tier.name.as_str()).collect();

        assert_eq!(names, ["gold", "silver"]);
        assert_eq!(rule.tiers.first().map(|tier| tier.benefit), Some(TierBenefit::Amount(100_000)));

        Ok(())
    }

    #[test]
    fn threshold_without_active_tiers_is_missing_configuration() {
        let promo = promotion(PromoType::ThresholdTier);

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::MissingConfiguration { field: "tiers" })
        ));
    }

    #[test]
    fn upsell_requires_both_products() {
        let mut promo = promotion(PromoType::Upsell);
        promo.required_product = Some(ProductId::from_u128(1));
        promo.upsell_special_price = Some(5_000);

        assert!(matches!(
            normalize_rule(&promo),
            Err(CompileError::MissingConfiguration {
                field: "upsell_product"
            })
        ));
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let mut promo = promotion(PromoType::AmountDiscount);
        promo.discount_amount = Some(1_000);
        promo.end_date = date(2025, 12, 31);

        assert!(matches!(
            normalize(&promo),
            Err(CompileError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn unknown_tag_wins_over_reversed_dates() {
        let mut promo = promotion(PromoType::AmountDiscount);
        promo.promo_type = "lucky_draw".to_string();
        promo.end_date = date(2025, 12, 31);

        assert!(matches!(
            normalize(&promo),
            Err(CompileError::UnknownPromoType(tag)) if tag == "lucky_draw"
        ));
    }

    #[test]
    fn half_open_time_window_config_is_rejected() {
        let mut promo = promotion(PromoType::AmountDiscount);
        promo.discount_amount = Some(1_000);
        promo.valid_time_start = Some(time(10, 0, 0, 0));

        assert!(matches!(
            normalize(&promo),
            Err(CompileError::MissingConfiguration {
                field: "valid_time_end"
            })
        ));
    }

    #[test]
    fn weekday_out_of_range_is_invalid() {
        let mut promo = promotion(PromoType::AmountDiscount);
        promo.discount_amount = Some(1_000);
        promo.valid_days = vec![0, 7];

        assert!(matches!(
            normalize(&promo),
            Err(CompileError::InvalidConfiguration {
                field: "valid_days",
                ..
            })
        ));
    }

    #[test]
    fn single_brand_scope_lists_the_brand() -> TestResult {
        let brand = BrandId::from_u128(3);
        let mut promo = promotion(PromoType::AmountDiscount);
        promo.discount_amount = Some(1_000);
        promo.scope = BrandScope::Single;
        promo.brand_id = Some(brand);

        let normalized = normalize(&promo)?;

        assert_eq!(
            normalized.scope.brands,
            BrandCoverage::Listed(BTreeSet::from([brand]))
        );

        Ok(())
    }

    #[test]
    fn trigger_benefit_without_trigger_brands_is_rejected() {
        let mut promo = promotion(PromoType::AmountDiscount);
        promo.discount_amount = Some(1_000);
        promo.is_cross_brand = true;
        promo.cross_brand_type = Some(CrossBrandType::TriggerBenefit);

        assert!(matches!(
            normalize(&promo),
            Err(CompileError::EmptyTriggerBrands)
        ));
    }

    #[test]
    fn cross_brand_without_type_is_missing_configuration() {
        let mut promo = promotion(PromoType::AmountDiscount);
        promo.discount_amount = Some(1_000);
        promo.is_cross_brand = true;

        assert!(matches!(
            normalize(&promo),
            Err(CompileError::MissingConfiguration {
                field: "cross_brand_type"
            })
        ));
    }

    #[test]
    fn cross_brand_rules_blob_is_typed() -> TestResult {
        let mut promo = promotion(PromoType::AmountDiscount);
        promo.discount_amount = Some(1_000);
        promo.is_cross_brand = true;
        promo.cross_brand_type = Some(CrossBrandType::MultiBrandSpend);
        promo.cross_brand_rules = Some(json!({ "min_distinct_brands": 3 }));

        let cross_brand = normalize(&promo)?.cross_brand;

        assert_eq!(cross_brand.map(|block| block.min_distinct_brands), Some(3));

        Ok(())
    }
}
