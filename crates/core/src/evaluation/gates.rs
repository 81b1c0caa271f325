//! Gates
//!
//! Checks run in fixed order before any rule formula. Each returns the reason
//! of the first failing condition.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::{
    compiler::CompiledPromotionDocument,
    discounts::{DiscountError, checked_sum},
    evaluation::{
        EvaluationContext, Rejection,
        lines::EligibleLines,
        result::{EvaluationFault, IneligibleReason},
    },
    ids::BrandId,
    promotions::{CrossBrandType, CustomerType, facets::CrossBrand},
};

/// Version and currency checks. Failures are faults, not ineligibility.
pub(crate) fn document(
    document: &CompiledPromotionDocument,
    context: &EvaluationContext<'_>,
) -> Result<(), EvaluationFault> {
    if !document.is_supported() {
        return Err(EvaluationFault::UnsupportedVersion {
            version: document.compiler_version.clone(),
        });
    }

    if document.currency().is_err() {
        return Err(EvaluationFault::UnknownCurrency {
            code: document.currency.clone(),
        });
    }

    if !document
        .currency
        .eq_ignore_ascii_case(context.bill.currency.trim())
    {
        return Err(EvaluationFault::CurrencyMismatch {
            document: document.currency.clone(),
            bill: context.bill.currency.clone(),
        });
    }

    Ok(())
}

pub(crate) fn validity(
    document: &CompiledPromotionDocument,
    context: &EvaluationContext<'_>,
) -> Result<(), IneligibleReason> {
    let validity = &document.validity;
    let date = context.bill.local_time.date();

    if !validity.covers_date(date) {
        return Err(IneligibleReason::OutsideDateRange);
    }

    if let Some(window) = validity.time_window
        && !window.contains(context.bill.local_time.time())
    {
        return Err(IneligibleReason::OutsideTimeWindow);
    }

    if !validity.days_of_week.allows(date.weekday()) {
        return Err(IneligibleReason::DayNotAllowed);
    }

    if validity.exclude_holidays && context.holidays.is_holiday(date) {
        return Err(IneligibleReason::HolidayExcluded);
    }

    Ok(())
}

pub(crate) fn scope(
    document: &CompiledPromotionDocument,
    context: &EvaluationContext<'_>,
) -> Result<(), Rejection> {
    let scope = &document.scope;
    let bill = context.bill;

    if !scope.stores.includes(bill.store_id) {
        return Err(IneligibleReason::StoreNotInScope.into());
    }

    if !scope.covers_brand(bill.brand_id) {
        return Err(IneligibleReason::BrandNotInScope.into());
    }

    if !scope.allows_channel(&bill.channel) {
        return Err(IneligibleReason::ChannelNotAllowed.into());
    }

    if let Some(cross_brand) = &document.cross_brand
        && !cross_brand_met(cross_brand, context)?
    {
        return Err(IneligibleReason::CrossBrandConditionNotMet.into());
    }

    Ok(())
}

/// Spend on this bill per brand.
fn bill_spend(context: &EvaluationContext<'_>) -> Result<FxHashMap<BrandId, i64>, DiscountError> {
    let mut spend: FxHashMap<BrandId, i64> = FxHashMap::default();

    for line in &context.bill.lines {
        let brand = context.bill.line_brand(line, context.catalog);
        let entry = spend.entry(brand).or_default();

        *entry = entry
            .checked_add(line.amount()?)
            .ok_or(DiscountError::Overflow)?;
    }

    Ok(spend)
}

fn cross_brand_met(
    cross_brand: &CrossBrand,
    context: &EvaluationContext<'_>,
) -> Result<bool, DiscountError> {
    let on_bill = bill_spend(context)?;
    let prior = |brand: BrandId| context.customer.map_or(0, |facts| facts.spend_at(brand));
    let in_trigger = |brand: &BrandId| {
        cross_brand.trigger_brands.is_empty() || cross_brand.trigger_brands.contains(brand)
    };
    let distinct_needed = usize::try_from(cross_brand.min_distinct_brands).unwrap_or(usize::MAX);

    let met = match cross_brand.kind {
        CrossBrandType::TriggerBenefit => {
            if !cross_brand.benefit_brands.is_empty()
                && !cross_brand.benefit_brands.contains(&context.bill.brand_id)
            {
                return Ok(false);
            }

            let spend = checked_sum(cross_brand.trigger_brands.iter().map(|brand| {
                prior(*brand).saturating_add(on_bill.get(brand).copied().unwrap_or_default())
            }))?;

            match cross_brand.trigger_min_amount {
                Some(minimum) => spend >= minimum,
                None => spend > 0,
            }
        }
        CrossBrandType::MultiBrandSpend => {
            let mut brands: BTreeSet<BrandId> = on_bill.keys().copied().collect();

            if let Some(facts) = context.customer {
                brands.extend(facts.brand_spend.keys().copied());
            }

            let spends = brands
                .into_iter()
                .filter(in_trigger)
                .map(|brand| {
                    prior(brand).saturating_add(on_bill.get(&brand).copied().unwrap_or_default())
                })
                .filter(|spend| *spend > 0)
                .collect::<Vec<_>>();

            spends.len() >= distinct_needed
                && checked_sum(spends)? >= cross_brand.trigger_min_amount.unwrap_or_default()
        }
        CrossBrandType::CrossBrandBundle => {
            let on_receipt: BTreeSet<BrandId> = on_bill.keys().copied().collect();

            if cross_brand.trigger_brands.is_empty() {
                on_receipt.len() >= distinct_needed
            } else {
                cross_brand.trigger_brands.is_subset(&on_receipt)
            }
        }
        CrossBrandType::SameReceipt => {
            on_bill.keys().filter(|brand| in_trigger(brand)).count() >= distinct_needed
        }
        CrossBrandType::LoyaltyAccumulate => true,
    };

    Ok(met)
}

/// Product and category targeting must select at least one line. Bill-scoped
/// promotions always pass; an empty bill fails them on the threshold instead.
pub(crate) fn targeting(
    document: &CompiledPromotionDocument,
    lines: &EligibleLines,
) -> Result<(), IneligibleReason> {
    if !document.targeting.apply_to.is_bill_scoped() && lines.is_empty() {
        return Err(IneligibleReason::TargetingGateFailed);
    }

    Ok(())
}

pub(crate) fn customer(
    document: &CompiledPromotionDocument,
    context: &EvaluationContext<'_>,
) -> Result<(), IneligibleReason> {
    let audience = &document.audience;
    let member = context.bill.member.as_ref();

    if audience.member_only && member.is_none() {
        return Err(IneligibleReason::MemberRequired);
    }

    if !audience.member_tiers.is_empty()
        && !context
            .bill
            .member_tier()
            .is_some_and(|tier| audience.member_tiers.contains(&tier))
    {
        return Err(IneligibleReason::MemberTierNotAllowed);
    }

    if member.is_some_and(|member| audience.exclude_members.contains(&member.id)) {
        return Err(IneligibleReason::MemberExcluded);
    }

    if audience.customer_type == CustomerType::All {
        return Ok(());
    }

    let Some(facts) = context.customer else {
        return Err(IneligibleReason::CustomerTypeMismatch);
    };

    let matches = match audience.customer_type {
        CustomerType::All => true,
        CustomerType::FirstOrder => facts.is_first_order(),
        CustomerType::FirstPerBrand => facts.is_first_order_at(context.bill.brand_id),
        CustomerType::Comeback => facts.is_comeback,
        CustomerType::Inactive => facts.is_inactive(audience.inactive_days_threshold),
    };

    if !matches {
        return Err(IneligibleReason::CustomerTypeMismatch);
    }

    Ok(())
}

/// Minimums, measured on the eligible lines or, for bill-scoped promotions,
/// on the whole bill.
pub(crate) fn threshold(
    document: &CompiledPromotionDocument,
    measured: &EligibleLines,
) -> Result<(), IneligibleReason> {
    let requirements = &document.requirements;

    if measured.subtotal < requirements.min_purchase {
        return Err(IneligibleReason::MinPurchaseNotMet);
    }

    if measured.quantity < requirements.min_quantity {
        return Err(IneligibleReason::MinQuantityNotMet);
    }

    if u32::try_from(measured.len()).unwrap_or(u32::MAX) < requirements.min_items {
        return Err(IneligibleReason::MinItemsNotMet);
    }

    Ok(())
}

pub(crate) fn limits(
    document: &CompiledPromotionDocument,
    context: &EvaluationContext<'_>,
) -> Result<(), IneligibleReason> {
    let limits = &document.limits;
    let usage = context.usage.and_then(|usage| usage.get(document.id));

    let total = usage.map_or(limits.current_uses, |usage| usage.total);

    if limits.max_uses.is_some_and(|max| total >= max) {
        return Err(IneligibleReason::UsageLimitReached);
    }

    let today = usage.map_or(0, |usage| usage.today);

    if limits.max_uses_per_day.is_some_and(|max| today >= max) {
        return Err(IneligibleReason::DailyLimitReached);
    }

    if context.bill.member.is_some() {
        let by_customer = usage.map_or(0, |usage| usage.by_customer);

        if limits
            .max_uses_per_customer
            .is_some_and(|max| by_customer >= max)
        {
            return Err(IneligibleReason::CustomerLimitReached);
        }
    }

    Ok(())
}
