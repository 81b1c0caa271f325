//! Usage Ledger
//!
//! The write path for promotion usage counters. Evaluation only ever reads a
//! [`UsageFacts`] snapshot; once a bill is settled the applied promotions are
//! counted here with an atomic compare-and-increment, so two terminals racing
//! for the last use of a capped promotion cannot both win.

use async_trait::async_trait;
use edge_promo::{
    bill::Bill,
    compiler::CompiledPromotionDocument,
    ids::{MemberId, PromotionId},
    reference::{PromotionUsage, UsageFacts},
    resolution::Resolution,
};
use jiff::civil::Date;
use mockall::automock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Errors raised by a ledger backend.
#[derive(Debug, Error)]
pub enum UsageError {
    /// The backing store rejected or failed the operation
    #[error("usage ledger unavailable: {0}")]
    Unavailable(String),
}

/// Counter a use is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", content = "key", rename_all = "snake_case")]
pub enum UsageScope {
    /// Uses across every store
    Total,

    /// Uses on one store-local day
    Day(Date),

    /// Uses by one member
    Customer(MemberId),
}

/// Atomic usage counters.
#[automock]
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Count one use of `promotion` in `scope` unless that would exceed `limit`.
    ///
    /// Returns `false`, without counting, when the counter already reached
    /// `limit`. A `None` limit always counts.
    async fn increment_if_under_limit(
        &self,
        promotion: PromotionId,
        scope: UsageScope,
        limit: Option<u32>,
    ) -> Result<bool, UsageError>;

    /// Current counter of `promotion` in `scope`.
    async fn count(&self, promotion: PromotionId, scope: UsageScope) -> Result<u32, UsageError>;
}

/// In-process ledger for tests and single-terminal runs.
#[derive(Debug, Default)]
pub struct InMemoryUsageLedger {
    counters: Mutex<FxHashMap<(PromotionId, UsageScope), u32>>,
}

impl InMemoryUsageLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageLedger for InMemoryUsageLedger {
    async fn increment_if_under_limit(
        &self,
        promotion: PromotionId,
        scope: UsageScope,
        limit: Option<u32>,
    ) -> Result<bool, UsageError> {
        let mut counters = self.counters.lock().await;
        let count = counters.entry((promotion, scope)).or_default();

        if limit.is_some_and(|limit| *count >= limit) {
            return Ok(false);
        }

        *count = count.saturating_add(1);

        Ok(true)
    }

    async fn count(&self, promotion: PromotionId, scope: UsageScope) -> Result<u32, UsageError> {
        let counters = self.counters.lock().await;

        Ok(counters.get(&(promotion, scope)).copied().unwrap_or_default())
    }
}

/// Read fresh counters for every document that carries a limit.
///
/// # Errors
///
/// Returns the first [`UsageError`] the ledger raises.
pub async fn snapshot<L>(
    ledger: &L,
    documents: &[CompiledPromotionDocument],
    bill: &Bill,
) -> Result<UsageFacts, UsageError>
where
    L: UsageLedger + ?Sized,
{
    let mut facts = UsageFacts::default();
    let day = bill.local_time.date();

    for document in documents {
        let limits = &document.limits;

        if limits.max_uses.is_none()
            && limits.max_uses_per_day.is_none()
            && limits.max_uses_per_customer.is_none()
        {
            continue;
        }

        let total = ledger.count(document.id, UsageScope::Total).await?;
        let today = ledger.count(document.id, UsageScope::Day(day)).await?;

        let by_customer = match &bill.member {
            Some(member) => {
                ledger
                    .count(document.id, UsageScope::Customer(member.id))
                    .await?
            }
            None => 0,
        };

        facts.insert(
            document.id,
            PromotionUsage {
                total: total.max(limits.current_uses),
                today,
                by_customer,
            },
        );
    }

    Ok(facts)
}

/// Outcome of recording a settled bill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Redemption {
    /// Promotions counted in every scope
    pub recorded: Vec<PromotionId>,

    /// Promotions another terminal used up first, with the scope that was full
    pub refused: Vec<(PromotionId, UsageScope)>,
}

/// Count every promotion applied in `resolution` against its limits.
///
/// Scopes are counted in the order total, day, customer. A refusal stops the
/// remaining scopes of that promotion; counters already taken stay taken.
///
/// # Errors
///
/// Returns the first [`UsageError`] the ledger raises.
pub async fn record_applied<L>(
    ledger: &L,
    documents: &[CompiledPromotionDocument],
    bill: &Bill,
    resolution: &Resolution,
) -> Result<Redemption, UsageError>
where
    L: UsageLedger + ?Sized,
{
    let mut redemption = Redemption::default();
    let day = bill.local_time.date();

    for applied in &resolution.applied {
        let Some(document) = documents
            .iter()
            .find(|document| document.id == applied.promotion_id)
        else {
            warn!(promotion_id = %applied.promotion_id, "applied promotion has no document");
            continue;
        };

        let limits = &document.limits;
        let mut scopes = vec![
            (UsageScope::Total, limits.max_uses),
            (UsageScope::Day(day), limits.max_uses_per_day),
        ];

        if let Some(member) = &bill.member {
            scopes.push((
                UsageScope::Customer(member.id),
                limits.max_uses_per_customer,
            ));
        }

        let mut refused = None;

        for (scope, limit) in scopes {
            if !ledger
                .increment_if_under_limit(document.id, scope, limit)
                .await?
            {
                refused = Some(scope);
                break;
            }
        }

        match refused {
            Some(scope) => {
                debug!(code = %document.code, ?scope, "usage limit reached at commit");
                redemption.refused.push((document.id, scope));
            }
            None => redemption.recorded.push(document.id),
        }
    }

    Ok(redemption)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    const PROMOTION: PromotionId = PromotionId::from_u128(0xf01);

    #[tokio::test]
    async fn increments_until_the_limit() -> TestResult {
        let ledger = InMemoryUsageLedger::new();

        assert!(
            ledger
                .increment_if_under_limit(PROMOTION, UsageScope::Total, Some(2))
                .await?
        );
        assert!(
            ledger
                .increment_if_under_limit(PROMOTION, UsageScope::Total, Some(2))
                .await?
        );
        assert!(
            !ledger
                .increment_if_under_limit(PROMOTION, UsageScope::Total, Some(2))
                .await?
        );
        assert_eq!(ledger.count(PROMOTION, UsageScope::Total).await?, 2);

        Ok(())
    }

    #[tokio::test]
    async fn unlimited_scope_always_counts() -> TestResult {
        let ledger = InMemoryUsageLedger::new();

        for _ in 0..5 {
            assert!(
                ledger
                    .increment_if_under_limit(PROMOTION, UsageScope::Total, None)
                    .await?
            );
        }

        assert_eq!(ledger.count(PROMOTION, UsageScope::Total).await?, 5);

        Ok(())
    }

    #[tokio::test]
    async fn scopes_count_independently() -> TestResult {
        let ledger = InMemoryUsageLedger::new();
        let monday = jiff::civil::date(2026, 3, 9);
        let tuesday = jiff::civil::date(2026, 3, 10);

        ledger
            .increment_if_under_limit(PROMOTION, UsageScope::Day(monday), Some(1))
            .await?;

        assert!(
            !ledger
                .increment_if_under_limit(PROMOTION, UsageScope::Day(monday), Some(1))
                .await?
        );
        assert!(
            ledger
                .increment_if_under_limit(PROMOTION, UsageScope::Day(tuesday), Some(1))
                .await?
        );
        assert_eq!(ledger.count(PROMOTION, UsageScope::Total).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_callers_never_exceed_the_limit() -> TestResult {
        let ledger = std::sync::Arc::new(InMemoryUsageLedger::new());
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..20 {
            let ledger = std::sync::Arc::clone(&ledger);

            tasks.spawn(async move {
                ledger
                    .increment_if_under_limit(PROMOTION, UsageScope::Total, Some(3))
                    .await
            });
        }

        let mut granted = 0;

        while let Some(joined) = tasks.join_next().await {
            if joined?? {
                granted += 1;
            }
        }

        assert_eq!(granted, 3);
        assert_eq!(ledger.count(PROMOTION, UsageScope::Total).await?, 3);

        Ok(())
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let mut ledger = MockUsageLedger::new();

        ledger
            .expect_increment_if_under_limit()
            .once()
            .returning(|_, _, _| Err(UsageError::Unavailable("timeout".to_string())));

        let result = ledger
            .increment_if_under_limit(PROMOTION, UsageScope::Total, Some(1))
            .await;

        assert!(matches!(result, Err(UsageError::Unavailable(_))));
    }
}
