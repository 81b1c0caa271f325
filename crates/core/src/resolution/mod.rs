//! Conflict Resolver
//!
//! Orders eligible promotions and decides which of them apply together.
//! Stages run item, then cart, then payment. Within a stage candidates are
//! taken by ascending `execution_priority`, then by code. A candidate is
//! suppressed when the cashier did not request a promotion that needs a
//! request, when it and an applied promotion rule each other out, when a
//! non-stackable promotion has already been applied, or when nothing is left
//! of the bill to discount.

use std::collections::BTreeSet;

use rusty_money::{
    Money,
    iso::{self, Currency},
};
use serde::Serialize;
use tracing::debug;

use crate::{
    bill::Bill,
    discounts::DiscountError,
    evaluation::{Benefit, EligibilityResult, Verdict, result::LineIndices},
    ids::PromotionId,
    promotions::ExecutionStage,
};

pub mod pipeline;

pub use pipeline::{PipelineOutcome, apply_promotions};

/// Why an eligible promotion was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    /// Needs a voucher or manual request that was not made
    NotRequested,

    /// An applied promotion lists it as incompatible, or the other way round
    ExplicitlyIncompatible,

    /// A non-stackable promotion was already applied
    NonStackableConflict,

    /// Nothing of the bill is left to discount
    BillFullyDiscounted,
}

/// A promotion the bill receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedPromotion {
    /// Promotion id
    pub promotion_id: PromotionId,

    /// Promotion code
    pub code: String,

    /// Stage it was applied in
    pub stage: ExecutionStage,

    /// Amount granted, minor units, after clamping to the remaining bill
    pub amount: i64,

    /// What is granted
    pub benefit: Benefit,

    /// Lines the benefit is attributed to
    pub affected_lines: LineIndices,
}

/// An eligible promotion that was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuppressedPromotion {
    /// Promotion id
    pub promotion_id: PromotionId,

    /// Promotion code
    pub code: String,

    /// Why
    pub reason: SuppressionReason,
}

/// Final decision for a bill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Bill currency
    pub currency: String,

    /// Applied promotions, in application order
    pub applied: Vec<AppliedPromotion>,

    /// Suppressed promotions, in consideration order
    pub suppressed: Vec<SuppressedPromotion>,

    /// Σ amounts that reduce the bill
    pub total_discount: i64,

    /// Σ cashback granted after payment
    pub total_cashback: i64,
}

impl Resolution {
    /// Total discount as money.
    pub fn total(&self) -> Option<Money<'static, Currency>> {
        iso::find(&self.currency).map(|currency| Money::from_minor(self.total_discount, currency))
    }

    /// Whether the promotion was applied.
    pub fn is_applied(&self, promotion: PromotionId) -> bool {
        self.applied
            .iter()
            .any(|applied| applied.promotion_id == promotion)
    }

    /// Suppression reason of the promotion, if it was suppressed.
    pub fn suppression_of(&self, promotion: PromotionId) -> Option<SuppressionReason> {
        self.suppressed
            .iter()
            .find(|suppressed| suppressed.promotion_id == promotion)
            .map(|suppressed| suppressed.reason)
    }
}

/// Incremental resolver, fed one stage at a time.
#[derive(Debug)]
pub struct Resolver<'b> {
    bill: &'b Bill,
    remaining: i64,
    non_stackable_applied: bool,
    incompatible: Vec<(PromotionId, BTreeSet<PromotionId>)>,
    resolution: Resolution,
}

impl<'b> Resolver<'b> {
    /// Start resolving for `bill`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Overflow`] if the bill subtotal does not fit.
    pub fn new(bill: &'b Bill) -> Result<Self, DiscountError> {
        Ok(Self {
            bill,
            remaining: bill.subtotal()?,
            non_stackable_applied: false,
            incompatible: Vec::new(),
            resolution: Resolution {
                currency: bill.currency.clone(),
                ..Resolution::default()
            },
        })
    }

    /// Discount applied so far, minor units.
    pub fn bill_discount(&self) -> i64 {
        self.resolution.total_discount
    }

    /// Resolve the candidates of one stage.
    ///
    /// Ineligible results are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Overflow`] if the totals do not fit.
    pub fn resolve_stage<'r>(
        &mut self,
        stage: ExecutionStage,
        results: impl IntoIterator<Item = &'r EligibilityResult>,
    ) -> Result<(), DiscountError> {
        let mut candidates: Vec<&EligibilityResult> = results
            .into_iter()
            .filter(|result| result.is_eligible() && result.conflict.execution_stage == stage)
            .collect();

        candidates.sort_by(|a, b| {
            a.conflict
                .execution_priority
                .cmp(&b.conflict.execution_priority)
                .then_with(|| a.code.cmp(&b.code))
        });

        for candidate in candidates {
            let Verdict::Eligible {
                discount,
                benefit,
                ref affected_lines,
            } = candidate.verdict
            else {
                continue;
            };

            if let Some(reason) = self.suppression(candidate, discount, benefit) {
                debug!(
                    promotion_id = %candidate.promotion_id,
                    code = %candidate.code,
                    reason = ?reason,
                    "suppressed promotion"
                );

                self.resolution.suppressed.push(SuppressedPromotion {
                    promotion_id: candidate.promotion_id,
                    code: candidate.code.clone(),
                    reason,
                });

                continue;
            }

            let amount = if benefit.reduces_bill() {
                let amount = discount.min(self.remaining).max(0);

                self.remaining -= amount;
                self.resolution.total_discount = self
                    .resolution
                    .total_discount
                    .checked_add(amount)
                    .ok_or(DiscountError::Overflow)?;

                amount
            } else {
                if benefit == Benefit::Cashback {
                    self.resolution.total_cashback = self
                        .resolution
                        .total_cashback
                        .checked_add(discount)
                        .ok_or(DiscountError::Overflow)?;
                }

                discount
            };

            if !candidate.conflict.is_stackable {
                self.non_stackable_applied = true;
            }

            self.incompatible.push((
                candidate.promotion_id,
                candidate.conflict.cannot_combine_with.clone(),
            ));

            self.resolution.applied.push(AppliedPromotion {
                promotion_id: candidate.promotion_id,
                code: candidate.code.clone(),
                stage,
                amount,
                benefit,
                affected_lines: affected_lines.clone(),
            });
        }

        Ok(())
    }

    fn suppression(
        &self,
        candidate: &EligibilityResult,
        discount: i64,
        benefit: Benefit,
    ) -> Option<SuppressionReason> {
        if candidate.conflict.needs_request()
            && !self.bill.requests(candidate.promotion_id, &candidate.code)
        {
            return Some(SuppressionReason::NotRequested);
        }

        let incompatible = self.incompatible.iter().any(|(applied, excludes)| {
            excludes.contains(&candidate.promotion_id)
                || candidate.conflict.cannot_combine_with.contains(applied)
        });

        if incompatible {
            return Some(SuppressionReason::ExplicitlyIncompatible);
        }

        if !candidate.conflict.is_stackable && self.non_stackable_applied {
            return Some(SuppressionReason::NonStackableConflict);
        }

        if benefit.reduces_bill() && discount > 0 && self.remaining <= 0 {
            return Some(SuppressionReason::BillFullyDiscounted);
        }

        None
    }

    /// Finish and return the decision.
    pub fn finish(self) -> Resolution {
        self.resolution
    }
}

/// Resolve already-evaluated results for `bill`, stage by stage.
///
/// # Errors
///
/// Returns [`DiscountError::Overflow`] if the bill subtotal or the totals do
/// not fit.
pub fn resolve(bill: &Bill, results: &[EligibilityResult]) -> Result<Resolution, DiscountError> {
    let mut resolver = Resolver::new(bill)?;

    for stage in ExecutionStage::ORDERED {
        resolver.resolve_stage(stage, results)?;
    }

    Ok(resolver.finish())
}
