//! Stage pipeline
//!
//! Evaluates and resolves documents one execution stage at a time, so that a
//! bill-scoped promotion in a later stage sees the discount earlier stages
//! already granted.

use serde::Serialize;
use tracing::info;

use crate::{
    compiler::CompiledPromotionDocument,
    discounts::DiscountError,
    evaluation::{EligibilityResult, EvaluationContext, evaluate},
    promotions::ExecutionStage,
    resolution::{Resolution, Resolver},
};

/// Every evaluation made on the way, plus the final decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutcome {
    /// One result per document, in stage order
    pub results: Vec<EligibilityResult>,

    /// Applied and suppressed promotions
    pub resolution: Resolution,
}

/// Evaluate `documents` against the bill in `context` and resolve conflicts.
///
/// # Errors
///
/// Returns [`DiscountError::Overflow`] if the bill subtotal or the totals do
/// not fit.
pub fn apply_promotions<'d>(
    documents: impl IntoIterator<Item = &'d CompiledPromotionDocument>,
    context: &EvaluationContext<'_>,
) -> Result<PipelineOutcome, DiscountError> {
    let documents: Vec<&CompiledPromotionDocument> = documents.into_iter().collect();
    let mut resolver = Resolver::new(context.bill)?;
    let mut results = Vec::with_capacity(documents.len());

    for stage in ExecutionStage::ORDERED {
        let staged = context.with_prior_discount(
            context
                .prior_discount
                .checked_add(resolver.bill_discount())
                .ok_or(DiscountError::Overflow)?,
        );

        let stage_results: Vec<EligibilityResult> = documents
            .iter()
            .filter(|document| document.conflict.execution_stage == stage)
            .map(|document| evaluate(document, &staged))
            .collect();

        resolver.resolve_stage(stage, &stage_results)?;
        results.extend(stage_results);
    }

    let resolution = resolver.finish();

    info!(
        evaluated = results.len(),
        applied = resolution.applied.len(),
        suppressed = resolution.suppressed.len(),
        total_discount = resolution.total_discount,
        "resolved promotions"
    );

    Ok(PipelineOutcome {
        results,
        resolution,
    })
}
