//! End-to-end runs of the compiler service over the Nusantara fixture set.

use edge_promo::{
    compiler::batch::{BatchOptions, SelectionWindow},
    ids::{BrandId, StoreId},
};
use edge_promo_app::{
    service::{CompilerService, EvaluateRequest},
    source::FixtureSource,
    usage::{InMemoryUsageLedger, UsageLedger, UsageScope},
};
use jiff::{Timestamp, civil::date};
use testresult::TestResult;

const FIXTURES: &str = "../core/fixtures";

async fn service() -> Result<CompilerService<FixtureSource, InMemoryUsageLedger>, Box<dyn std::error::Error>> {
    let source = FixtureSource::load(FIXTURES, "nusantara").await?;

    Ok(CompilerService::new(source, InMemoryUsageLedger::new()))
}

fn request(bill: &str, customer: Option<&str>) -> Result<EvaluateRequest, jiff::Error> {
    Ok(EvaluateRequest {
        bill: bill.to_string(),
        customer: customer.map(str::to_string),
        compiled_at: Timestamp::from_second(1_773_446_400)?,
    })
}

#[tokio::test]
async fn company_compilation_covers_every_active_store() -> TestResult {
    let service = service().await?;

    let compilation = service
        .compile_company(BatchOptions {
            today: date(2026, 3, 14),
            compiled_at: Timestamp::from_second(1_773_446_400)?,
            window: SelectionWindow::CurrentOnly,
        })
        .await?;

    let ayam = compilation.summary.by_brand.get(&BrandId::from_u128(0xb1));
    let kopi = compilation.summary.by_brand.get(&BrandId::from_u128(0xb2));

    assert_eq!(compilation.summary.total_stores, 3);
    assert_eq!(compilation.summary.total_promotions, 18);
    assert_eq!(compilation.summary.failures, 3);
    assert_eq!(ayam.map(|brand| (brand.stores, brand.promotions)), Some((2, 12)));
    assert_eq!(kopi.map(|brand| (brand.stores, brand.promotions)), Some((1, 6)));
    assert!(!compilation.stores.contains_key(&StoreId::from_u128(0x504)));

    Ok(())
}

/// The returning member has 60000 recorded at Kopi Senja, which unlocks
/// KOPIAYAM (15000) on top of SAVE20 and MEGA60. The Bronze tier no longer
/// qualifies on what remains.
#[tokio::test]
async fn returning_member_unlocks_the_cross_brand_reward() -> TestResult {
    let service = service().await?;

    let evaluation = service
        .evaluate(&request("member_lunch", Some("returning_member"))?)
        .await?;

    assert_eq!(evaluation.outcome.resolution.total_discount, 165_000);

    Ok(())
}

/// SAVE20 takes 20% of 113000 and TEHGRATIS the 8000 iced tea; QRISCB pays
/// 10% of the remaining 82400 back without touching the bill.
#[tokio::test]
async fn settling_counts_every_applied_promotion() -> TestResult {
    let service = service().await?;

    let settled = service.settle(&request("ayam_qris", None)?).await?;
    let resolution = &settled.evaluation.outcome.resolution;

    assert_eq!(resolution.total_discount, 30_600);
    assert_eq!(resolution.total_cashback, 8_240);
    assert_eq!(settled.redemption.recorded.len(), resolution.applied.len());
    assert!(settled.redemption.refused.is_empty());

    for applied in &resolution.applied {
        assert_eq!(
            service
                .ledger()
                .count(applied.promotion_id, UsageScope::Total)
                .await?,
            1
        );
    }

    Ok(())
}
