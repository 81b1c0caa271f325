//! Integration tests for properties that hold across every archetype:
//! evaluation purity, compile idempotence, version and currency faults, and
//! how the stage pipeline combines promotions.

use std::collections::{BTreeMap, BTreeSet};

use jiff::{Timestamp, civil::date};
use rust_decimal::Decimal;
use testresult::TestResult;

use edge_promo::{
    bill::{Bill, BillLine},
    compiler::{
        CompiledPromotionDocument, Compiler,
        batch::{BatchOptions, SelectionWindow},
    },
    evaluation::{EvaluationContext, EvaluationFault, IneligibleReason, Verdict, evaluate},
    ids::{BrandId, CompanyId, ProductId, PromotionId, StoreId},
    promotions::{ApplyTo, ExecutionStage, PromoType, Promotion},
    reference::{Catalog, HolidayCalendar, Store},
    resolution::{SuppressionReason, apply_promotions},
};

fn promotion(id: u128, code: &str, promo_type: PromoType) -> Promotion {
    Promotion::new(
        PromotionId::from_u128(id),
        CompanyId::from_u128(1),
        code,
        promo_type,
        date(2026, 1, 1),
        date(2026, 12, 31),
    )
}

fn amount_off(id: u128, code: &str, amount: i64, priority: u16) -> Promotion {
    let mut promotion = promotion(id, code, PromoType::AmountDiscount);
    promotion.discount_amount = Some(amount);
    promotion.execution_priority = priority;

    promotion
}

fn compile(promotions: &[Promotion]) -> TestResult<Vec<CompiledPromotionDocument>> {
    let compiler = Compiler::new("IDR")?;

    Ok(promotions
        .iter()
        .map(|promotion| compiler.compile(promotion, Timestamp::UNIX_EPOCH))
        .collect::<Result<_, _>>()?)
}

/// One line of 100000.
fn bill() -> Bill {
    Bill {
        store_id: StoreId::from_u128(1),
        brand_id: BrandId::from_u128(1),
        currency: "IDR".to_string(),
        channel: "dine_in".to_string(),
        local_time: date(2026, 6, 1).at(12, 0, 0, 0),
        member: None,
        payment_method: None,
        lines: vec![BillLine {
            product_id: ProductId::from_u128(1),
            brand_id: None,
            quantity: 1,
            unit_price: 100_000,
        }],
        requested_promotions: BTreeSet::new(),
    }
}

#[test]
fn evaluation_is_pure() -> TestResult {
    let mut percent = promotion(1, "P10", PromoType::PercentDiscount);
    percent.discount_percent = Some(Decimal::from(10));

    let documents = compile(&[percent])?;
    let document = documents.first().ok_or("nothing compiled")?;
    let bill = bill();
    let before = bill.clone();
    let catalog = Catalog::default();
    let holidays = HolidayCalendar::default();
    let context = EvaluationContext::new(&bill, &catalog, &holidays);

    let first = evaluate(document, &context);
    let second = evaluate(document, &context);

    assert_eq!(first, second);
    assert_eq!(first.discount_minor(), 10_000);
    assert_eq!(bill, before);

    Ok(())
}

#[test]
fn compiling_twice_differs_only_in_the_timestamp() -> TestResult {
    let compiler = Compiler::new("IDR")?;
    let promotion = amount_off(1, "OFF5", 5_000, 100);

    let first = compiler.compile(&promotion, Timestamp::UNIX_EPOCH)?;
    let mut second = compiler.compile(&promotion, Timestamp::from_second(1_773_446_400)?)?;

    assert_eq!(first.fingerprint, second.fingerprint);
    assert_ne!(first.compiled_at, second.compiled_at);

    second.compiled_at = first.compiled_at;

    assert_eq!(first, second);

    Ok(())
}

#[test]
fn unknown_major_version_is_a_fault() -> TestResult {
    let mut documents = compile(&[amount_off(1, "OFF5", 5_000, 100)])?;
    let document = documents.first_mut().ok_or("nothing compiled")?;
    document.compiler_version = "2.0".to_string();

    let bill = bill();
    let catalog = Catalog::default();
    let holidays = HolidayCalendar::default();
    let result = evaluate(document, &EvaluationContext::new(&bill, &catalog, &holidays));

    assert!(matches!(
        result.verdict,
        Verdict::Error {
            fault: EvaluationFault::UnsupportedVersion { .. }
        }
    ));

    Ok(())
}

#[test]
fn currency_mismatch_is_a_fault() -> TestResult {
    let documents = compile(&[amount_off(1, "OFF5", 5_000, 100)])?;
    let document = documents.first().ok_or("nothing compiled")?;

    let mut bill = bill();
    bill.currency = "SGD".to_string();
    let catalog = Catalog::default();
    let holidays = HolidayCalendar::default();
    let result = evaluate(document, &EvaluationContext::new(&bill, &catalog, &holidays));

    assert!(matches!(
        result.verdict,
        Verdict::Error {
            fault: EvaluationFault::CurrencyMismatch { .. }
        }
    ));
    assert!(!result.is_eligible());

    Ok(())
}

/// Two non-stackable promotions on the same bill: the lower execution
/// priority (FIRST, 10000) applies, SECOND is suppressed.
#[test]
fn two_non_stackables_apply_only_one() -> TestResult {
    let documents = compile(&[
        amount_off(2, "SECOND", 20_000, 200),
        amount_off(1, "FIRST", 10_000, 100),
    ])?;

    let bill = bill();
    let catalog = Catalog::default();
    let holidays = HolidayCalendar::default();

    let outcome = apply_promotions(
        &documents,
        &EvaluationContext::new(&bill, &catalog, &holidays),
    )?;

    assert_eq!(outcome.resolution.total_discount, 10_000);
    assert!(outcome.resolution.is_applied(PromotionId::from_u128(1)));
    assert_eq!(
        outcome.resolution.suppression_of(PromotionId::from_u128(2)),
        Some(SuppressionReason::NonStackableConflict)
    );

    Ok(())
}

/// The item stage takes 30000 off the 100000 bill; a cart-level 10% bill
/// discount then works on the 70000 left: 7000.
#[test]
fn later_stages_see_earlier_discounts() -> TestResult {
    let mut item = amount_off(1, "ITEM30", 30_000, 900);
    item.is_stackable = true;

    let mut cart = promotion(2, "CART10", PromoType::PercentDiscount);
    cart.discount_percent = Some(Decimal::from(10));
    cart.apply_to = ApplyTo::Bill;
    cart.execution_stage = ExecutionStage::CartLevel;
    cart.execution_priority = 1;
    cart.is_stackable = true;

    let documents = compile(&[cart, item])?;
    let bill = bill();
    let catalog = Catalog::default();
    let holidays = HolidayCalendar::default();

    let outcome = apply_promotions(
        &documents,
        &EvaluationContext::new(&bill, &catalog, &holidays),
    )?;

    let amounts: Vec<(&str, i64)> = outcome
        .resolution
        .applied
        .iter()
        .map(|applied| (applied.code.as_str(), applied.amount))
        .collect();

    assert_eq!(amounts, [("ITEM30", 30_000), ("CART10", 7_000)]);
    assert_eq!(outcome.resolution.total_discount, 37_000);

    Ok(())
}

/// 120000 bill: ITEM takes 30000 in the item stage. CART's 100000 minimum
/// is measured on the full 120000, so it still applies: 10% of the 90000
/// left is 9000.
#[test]
fn bill_scoped_minimum_ignores_earlier_discounts() -> TestResult {
    let mut item = amount_off(1, "ITEM", 30_000, 100);
    item.is_stackable = true;

    let mut cart = promotion(2, "CART", PromoType::PercentDiscount);
    cart.discount_percent = Some(Decimal::from(10));
    cart.min_purchase = 100_000;
    cart.apply_to = ApplyTo::Bill;
    cart.execution_stage = ExecutionStage::CartLevel;
    cart.is_stackable = true;

    let documents = compile(&[item, cart])?;
    let mut bill = bill();

    for line in &mut bill.lines {
        line.unit_price = 120_000;
    }

    let catalog = Catalog::default();
    let holidays = HolidayCalendar::default();

    let outcome = apply_promotions(
        &documents,
        &EvaluationContext::new(&bill, &catalog, &holidays),
    )?;

    let amounts: Vec<(&str, i64)> = outcome
        .resolution
        .applied
        .iter()
        .map(|applied| (applied.code.as_str(), applied.amount))
        .collect();

    assert_eq!(amounts, [("ITEM", 30_000), ("CART", 9_000)]);
    assert_eq!(outcome.resolution.total_discount, 39_000);

    Ok(())
}

#[test]
fn empty_bill_fails_bill_scope_on_threshold_not_targeting() -> TestResult {
    let mut whole_bill = promotion(1, "BILL", PromoType::PercentDiscount);
    whole_bill.discount_percent = Some(Decimal::from(10));
    whole_bill.min_purchase = 50_000;
    whole_bill.apply_to = ApplyTo::Bill;

    let mut free_for_all = amount_off(2, "OPEN", 5_000, 100);
    free_for_all.apply_to = ApplyTo::Bill;

    let mut targeted = amount_off(3, "PRODUCT", 5_000, 100);
    targeted.apply_to = ApplyTo::Product;
    targeted.products = BTreeSet::from([ProductId::from_u128(1)]);

    let documents = compile(&[whole_bill, free_for_all, targeted])?;
    let mut empty = bill();
    empty.lines.clear();

    let catalog = Catalog::default();
    let holidays = HolidayCalendar::default();
    let context = EvaluationContext::new(&empty, &catalog, &holidays);

    let results: Vec<_> = documents
        .iter()
        .map(|document| evaluate(document, &context))
        .collect();

    let reasons: Vec<_> = results.iter().map(|result| result.reason()).collect();

    assert_eq!(
        reasons,
        [
            Some(IneligibleReason::MinPurchaseNotMet),
            None,
            Some(IneligibleReason::TargetingGateFailed)
        ]
    );
    assert!(results.get(1).is_some_and(|result| result.is_eligible()));
    assert_eq!(results.get(1).map(|result| result.discount_minor()), Some(0));

    Ok(())
}

#[test]
fn store_batch_documents_match_their_fingerprint() -> TestResult {
    let compiler = Compiler::new("IDR")?;
    let store = Store {
        id: StoreId::from_u128(1),
        company_id: CompanyId::from_u128(1),
        brand_id: BrandId::from_u128(1),
        code: "S1".to_string(),
        name: String::new(),
        is_active: true,
    };

    let mut percent = promotion(1, "TEN", PromoType::PercentDiscount);
    percent.discount_percent = Some(Decimal::from(10));

    let compilation = compiler.compile_for_store(
        &store,
        &[percent, amount_off(2, "FIVE", 5_000, 100)],
        BatchOptions {
            today: date(2026, 6, 1),
            compiled_at: Timestamp::UNIX_EPOCH,
            window: SelectionWindow::CurrentOnly,
        },
    );

    assert_eq!(compilation.documents.len(), 2);

    for document in &compilation.documents {
        assert_eq!(document.store_id, Some(store.id));
        assert_eq!(document.compute_fingerprint()?, document.fingerprint);
    }

    Ok(())
}

#[test]
fn manual_promotions_wait_for_the_cashier() -> TestResult {
    let mut manual = amount_off(1, "STAFF", 15_000, 100);
    manual.is_auto_apply = false;

    let documents = compile(&[manual])?;
    let catalog = Catalog::default();
    let holidays = HolidayCalendar::default();

    let bill = bill();
    let untouched = apply_promotions(
        &documents,
        &EvaluationContext::new(&bill, &catalog, &holidays),
    )?;

    assert_eq!(
        untouched
            .resolution
            .suppression_of(PromotionId::from_u128(1)),
        Some(SuppressionReason::NotRequested)
    );

    let mut requested = bill.clone();
    requested.requested_promotions.insert("staff".to_string());

    let applied = apply_promotions(
        &documents,
        &EvaluationContext::new(&requested, &catalog, &holidays),
    )?;

    assert_eq!(applied.resolution.total_discount, 15_000);

    Ok(())
}

#[test]
fn recompile_reports_changed_unchanged_and_removed() -> TestResult {
    let compiler = Compiler::new("IDR")?;
    let kept = amount_off(1, "KEPT", 5_000, 100);
    let edited = amount_off(2, "EDITED", 5_000, 100);
    let dropped = amount_off(3, "DROPPED", 5_000, 100);

    let previous: BTreeMap<PromotionId, String> = [&kept, &edited, &dropped]
        .into_iter()
        .map(|promotion| {
            compiler
                .compile(promotion, Timestamp::UNIX_EPOCH)
                .map(|document| (document.id, document.fingerprint))
        })
        .collect::<Result<_, _>>()?;

    let mut edited = edited;
    edited.discount_amount = Some(7_500);

    let recompiled = compiler.recompile(&previous, &[kept, edited], Timestamp::UNIX_EPOCH);

    assert_eq!(
        recompiled
            .changed
            .iter()
            .map(|document| document.code.as_str())
            .collect::<Vec<_>>(),
        ["EDITED"]
    );
    assert_eq!(recompiled.unchanged, BTreeSet::from([PromotionId::from_u128(1)]));
    assert_eq!(recompiled.removed, BTreeSet::from([PromotionId::from_u128(3)]));

    Ok(())
}
