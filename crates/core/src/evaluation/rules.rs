//! Rule formulas
//!
//! One formula per archetype. Every formula works on the eligible lines only
//! and yields a raw amount that the caller clamps to `[0, base]`.

use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use crate::{
    bill::{Bill, BillLine},
    discounts::{
        DiscountError, capped_percent_of_minor, clamp_discount, line_amount, percent_of_minor,
        percent_points,
    },
    evaluation::{
        Rejection,
        lines::{EligibleLines, UnitRuns},
        result::{Benefit, IneligibleReason, LineIndices},
    },
    ids::ProductId,
    promotions::{
        rules::{
            BuyXGetY, Cashback, Combo, DiscountValue, FreeItem, HappyHour, HappyHourPricing,
            MixMatch, Package, PaymentDiscount, PercentDiscount, RuleVariant, ThresholdTier,
            Upsell,
        },
        PackageItemKind,
        tiers::{TierBenefit, select_tier},
    },
    reference::Catalog,
};

/// What a formula works on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RuleInput<'a> {
    pub(crate) bill: &'a Bill,
    pub(crate) catalog: &'a Catalog,
    pub(crate) lines: &'a EligibleLines,
    pub(crate) base: i64,
}

/// A computed benefit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Grant {
    pub(crate) discount: i64,
    pub(crate) benefit: Benefit,
    pub(crate) affected_lines: LineIndices,
}

impl Grant {
    fn discount(discount: i64, affected_lines: LineIndices) -> Self {
        Self {
            discount,
            benefit: Benefit::Discount,
            affected_lines,
        }
    }
}

/// Apply the archetype formula and clamp the result to `[0, base]`.
pub(crate) fn compute(rule: &RuleVariant, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    let mut grant = match rule {
        RuleVariant::PercentDiscount(rule) => percent_discount(rule, input)?,
        RuleVariant::AmountDiscount(rule) => {
            minimum(input.lines.subtotal, rule.min_purchase)?;

            Grant::discount(rule.amount, input.lines.indices.clone())
        }
        RuleVariant::BuyXGetY(rule) => buy_x_get_y(rule, input)?,
        RuleVariant::Combo(rule) => combo(rule, input)?,
        RuleVariant::FreeItem(rule) => free_item(rule, input)?,
        RuleVariant::HappyHour(rule) => happy_hour(rule, input)?,
        RuleVariant::Cashback(rule) => cashback(rule, input)?,
        RuleVariant::PaymentDiscount(rule) => payment_discount(rule, input)?,
        RuleVariant::Package(rule) => package(rule, input)?,
        RuleVariant::MixMatch(rule) => mix_match(rule, input)?,
        RuleVariant::Upsell(rule) => upsell(rule, input)?,
        RuleVariant::ThresholdTier(rule) => threshold_tier(rule, input)?,
    };

    grant.discount = clamp_discount(grant.discount, input.base);

    Ok(grant)
}

/// Rule minimums are measured like the threshold gate: on the eligible lines,
/// or on the whole bill before earlier stages' discounts for bill scope.
fn minimum(measured: i64, min_purchase: i64) -> Result<(), Rejection> {
    if measured < min_purchase {
        return Err(IneligibleReason::RuleMinimumNotMet.into());
    }

    Ok(())
}

fn indices<'b>(lines: impl Iterator<Item = (usize, &'b BillLine)>) -> LineIndices {
    lines.map(|(index, _)| index).collect()
}

fn percent_discount(rule: &PercentDiscount, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    minimum(input.lines.subtotal, rule.min_purchase)?;

    let discount = capped_percent_of_minor(rule.percent, input.base, rule.max_cap)?;

    Ok(Grant::discount(discount, input.lines.indices.clone()))
}

fn buy_x_get_y(rule: &BuyXGetY, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    let RuleInput { bill, lines, .. } = input;
    let percent = percent_points(rule.get_discount_percent);

    let Some(get_product) = rule.specific_get_product else {
        let group = rule.buy_qty.saturating_add(rule.get_qty);

        let cheapest = lines
            .iter(bill)
            .filter_map(|(index, line)| {
                let free = line
                    .quantity
                    .checked_div(group)?
                    .saturating_mul(rule.get_qty);

                (free > 0).then_some((index, line.unit_price, free))
            })
            .min_by_key(|(index, price, _)| (*price, *index));

        let Some((index, price, free)) = cheapest else {
            return Err(IneligibleReason::BuyQuantityNotMet.into());
        };

        let discount = percent_of_minor(&percent, line_amount(price, free)?)?;

        return Ok(Grant::discount(discount, SmallVec::from_elem(index, 1)));
    };

    let qualifying = lines
        .iter(bill)
        .filter(|(_, line)| line.product_id != get_product)
        .fold(0_u32, |total, (_, line)| total.saturating_add(line.quantity));

    let times = qualifying.checked_div(rule.buy_qty).unwrap_or_default();

    if times == 0 {
        return Err(IneligibleReason::BuyQuantityNotMet.into());
    }

    let Some(price) = lines.cheapest_unit_of(bill, get_product) else {
        return Err(IneligibleReason::FreeItemNotInBill.into());
    };

    let free = times
        .saturating_mul(rule.get_qty)
        .min(lines.quantity_of(bill, get_product));

    let discount = percent_of_minor(&percent, line_amount(price, free)?)?;

    Ok(Grant::discount(discount, lines.indices.clone()))
}

fn combo(rule: &Combo, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    let RuleInput { bill, lines, .. } = input;

    if rule.required_product_ids.is_empty() {
        return Err(IneligibleReason::ComboIncomplete.into());
    }

    let mut sets = u32::MAX;
    let mut set_value = 0_i64;

    for product in &rule.required_product_ids {
        let Some(price) = lines.cheapest_unit_of(bill, *product) else {
            return Err(IneligibleReason::ComboIncomplete.into());
        };

        sets = sets.min(lines.quantity_of(bill, *product));
        set_value = set_value
            .checked_add(price)
            .ok_or(DiscountError::Overflow)?;
    }

    let saving = set_value.saturating_sub(rule.combo_price).max(0);
    let affected = indices(
        lines
            .iter(bill)
            .filter(|(_, line)| rule.required_product_ids.contains(&line.product_id)),
    );

    Ok(Grant::discount(line_amount(saving, sets)?, affected))
}

fn free_item(rule: &FreeItem, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    let RuleInput { bill, lines, .. } = input;

    if let Some(trigger) = rule.trigger_product_id
        && lines.quantity_of(bill, trigger) < rule.trigger_min_qty.max(1)
    {
        return Err(IneligibleReason::TriggerProductMissing.into());
    }

    let Some(free_product) = rule.free_product_id else {
        return Err(IneligibleReason::FreeItemNotInBill.into());
    };

    let Some(price) = lines.cheapest_unit_of(bill, free_product) else {
        return Err(IneligibleReason::FreeItemNotInBill.into());
    };

    let free = rule
        .free_qty
        .max(1)
        .min(lines.quantity_of(bill, free_product));

    Ok(Grant {
        discount: line_amount(price, free)?,
        benefit: Benefit::FreeProduct(free_product),
        affected_lines: indices(lines.of_product(bill, free_product)),
    })
}

fn happy_hour(rule: &HappyHour, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    let RuleInput {
        bill, lines, base, ..
    } = input;

    let discount = match rule.pricing {
        HappyHourPricing::Percent(points) => percent_of_minor(&percent_points(points), base)?,
        HappyHourPricing::Amount(amount) => amount.min(base),
        HappyHourPricing::SpecialPrice(special) => {
            lines.iter(bill).try_fold(0_i64, |total, (_, line)| {
                let saving = line.unit_price.saturating_sub(special).max(0);

                total
                    .checked_add(line_amount(saving, line.quantity)?)
                    .ok_or(DiscountError::Overflow)
            })?
        }
    };

    Ok(Grant::discount(discount, lines.indices.clone()))
}

fn payment_method(methods: &BTreeSet<String>, bill: &Bill) -> Result<(), Rejection> {
    let Some(method) = bill.payment_method.as_deref() else {
        return Err(IneligibleReason::PaymentMethodMissing.into());
    };

    let method = method.trim().to_ascii_lowercase();

    if !methods.is_empty() && !methods.contains(&method) {
        return Err(IneligibleReason::PaymentMethodNotAllowed.into());
    }

    Ok(())
}

fn value_of(value: DiscountValue, cap: Option<i64>, base: i64) -> Result<i64, DiscountError> {
    match value {
        DiscountValue::Percent(points) => capped_percent_of_minor(points, base, cap),
        DiscountValue::Amount(amount) => Ok(cap.map_or(amount, |cap| amount.min(cap))),
    }
}

fn cashback(rule: &Cashback, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    payment_method(&rule.payment_methods, input.bill)?;
    minimum(input.lines.subtotal, rule.min_purchase)?;

    Ok(Grant {
        discount: value_of(rule.value, rule.max_cap, input.base)?,
        benefit: Benefit::Cashback,
        affected_lines: input.lines.indices.clone(),
    })
}

fn payment_discount(rule: &PaymentDiscount, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    payment_method(&rule.payment_methods, input.bill)?;
    minimum(input.lines.subtotal, rule.min_purchase)?;

    Ok(Grant::discount(
        value_of(rule.value, rule.max_cap, input.base)?,
        input.lines.indices.clone(),
    ))
}

fn package(rule: &Package, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    let RuleInput {
        bill,
        catalog,
        lines,
        ..
    } = input;

    let mut value = 0_i64;
    let mut affected = LineIndices::new();
    let mut satisfied = 0_usize;

    for item in &rule.items {
        let component = match (item.kind, item.product_id, item.category_id) {
            (PackageItemKind::Fixed, Some(product), _) => {
                let present = lines.quantity_of(bill, product);

                match lines.cheapest_unit_of(bill, product) {
                    Some(price) if present >= item.quantity => {
                        affected.extend(indices(lines.of_product(bill, product)));

                        Some(line_amount(price, item.quantity)?)
                    }
                    _ => None,
                }
            }
            (PackageItemKind::Choice, _, Some(category)) => {
                let mut runs = UnitRuns::from_lines(
                    lines
                        .of_category(bill, catalog, category)
                        .map(|(_, line)| line),
                );
                let needed = item.min_selection.max(1);
                let allowed = item.max_selection.saturating_mul(item.quantity).max(needed);
                let count = u32::try_from(runs.units().min(u64::from(allowed)))
                    .unwrap_or(allowed);

                if count >= needed {
                    affected.extend(indices(lines.of_category(bill, catalog, category)));

                    runs.take(count)?
                } else {
                    None
                }
            }
            _ => None,
        };

        match component {
            Some(amount) => {
                value = value.checked_add(amount).ok_or(DiscountError::Overflow)?;
                satisfied += 1;
            }
            None if item.required => return Err(IneligibleReason::PackageIncomplete.into()),
            None => {}
        }
    }

    if satisfied == 0 {
        return Err(IneligibleReason::PackageIncomplete.into());
    }

    affected.sort_unstable();
    affected.dedup();

    Ok(Grant::discount(
        value.saturating_sub(rule.package_price).max(0),
        affected,
    ))
}

fn mix_match(rule: &MixMatch, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    let RuleInput {
        bill,
        catalog,
        lines,
        ..
    } = input;

    let group_size = rule.required_quantity;
    let mut discount = 0_i64;
    let mut groups = 0_u32;

    let mut add_group = |group_value: i64| -> Result<(), DiscountError> {
        discount = discount
            .checked_add(group_value.saturating_sub(rule.special_price).max(0))
            .ok_or(DiscountError::Overflow)?;
        groups += 1;

        Ok(())
    };

    if group_size > 0 && rule.allow_same_product {
        let mut runs = UnitRuns::from_lines(
            lines
                .of_category(bill, catalog, rule.category_id)
                .map(|(_, line)| line),
        );

        while let Some(group_value) = runs.take(group_size)? {
            add_group(group_value)?;
        }
    } else if group_size > 0 {
        let mut by_product: BTreeMap<ProductId, Vec<&BillLine>> = BTreeMap::new();

        for (_, line) in lines.of_category(bill, catalog, rule.category_id) {
            by_product.entry(line.product_id).or_default().push(line);
        }

        let mut runs: BTreeMap<ProductId, UnitRuns> = by_product
            .into_iter()
            .map(|(product, lines)| (product, UnitRuns::from_lines(lines)))
            .collect();

        let group_len = usize::try_from(group_size).unwrap_or(usize::MAX);

        loop {
            let mut fronts: SmallVec<[(i64, ProductId); 8]> = runs
                .iter()
                .filter_map(|(product, runs)| runs.peek().map(|price| (price, *product)))
                .collect();

            if fronts.len() < group_len {
                break;
            }

            fronts.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

            let mut group_value = 0_i64;

            for (_, product) in fronts.iter().take(group_len) {
                let unit = runs
                    .get_mut(product)
                    .map(|runs| runs.take(1))
                    .transpose()?
                    .flatten()
                    .unwrap_or_default();

                group_value = group_value
                    .checked_add(unit)
                    .ok_or(DiscountError::Overflow)?;
            }

            add_group(group_value)?;
        }
    }

    if groups == 0 {
        return Err(IneligibleReason::MixMatchQuantityNotMet.into());
    }

    Ok(Grant::discount(
        discount,
        indices(lines.of_category(bill, catalog, rule.category_id)),
    ))
}

fn upsell(rule: &Upsell, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    let RuleInput { bill, lines, .. } = input;

    if lines.quantity_of(bill, rule.required_product_id) < rule.required_min_qty.max(1) {
        return Err(IneligibleReason::UpsellRequirementNotMet.into());
    }

    let Some(price) = lines.cheapest_unit_of(bill, rule.upsell_product_id) else {
        return Err(IneligibleReason::UpsellProductMissing.into());
    };

    Ok(Grant::discount(
        price.saturating_sub(rule.special_price).max(0),
        indices(lines.of_product(bill, rule.upsell_product_id)),
    ))
}

fn threshold_tier(rule: &ThresholdTier, input: RuleInput<'_>) -> Result<Grant, Rejection> {
    let RuleInput {
        bill, lines, base, ..
    } = input;

    let Some(tier) = select_tier(&rule.tiers, base) else {
        return Err(IneligibleReason::NoTierQualified.into());
    };

    let grant = match tier.benefit {
        TierBenefit::Percent(points) => Grant::discount(
            percent_of_minor(&percent_points(points), base)?,
            lines.indices.clone(),
        ),
        TierBenefit::Amount(amount) => Grant::discount(amount, lines.indices.clone()),
        TierBenefit::FreeProduct(product) => {
            let Some(price) = lines.cheapest_unit_of(bill, product) else {
                return Err(IneligibleReason::FreeItemNotInBill.into());
            };

            Grant {
                discount: price,
                benefit: Benefit::FreeProduct(product),
                affected_lines: indices(lines.of_product(bill, product)),
            }
        }
        TierBenefit::PointsMultiplier(multiplier) => Grant {
            discount: 0,
            benefit: Benefit::PointsMultiplier(multiplier),
            affected_lines: lines.indices.clone(),
        },
    };

    Ok(grant)
}
