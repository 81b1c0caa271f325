//! Eligibility Evaluator
//!
//! The algorithm a terminal runs against a compiled document and a bill. Gates
//! run in a fixed order and the first failure decides the verdict:
//!
//! 0. document version and currency (faults)
//! 1. validity
//! 2. scope, including cross-brand conditions
//! 3. targeting
//! 4. customer
//! 5. threshold
//! 6. limits
//! 7. the archetype formula
//!
//! Evaluation is a pure function of its inputs and never returns `Err`.

use crate::{
    bill::Bill,
    compiler::CompiledPromotionDocument,
    discounts::DiscountError,
    reference::{Catalog, CustomerFacts, HolidayCalendar, UsageFacts},
};

mod gates;
pub mod lines;
pub mod result;
mod rules;

pub use result::{Benefit, EligibilityResult, EvaluationFault, Gate, IneligibleReason, Verdict};

use lines::EligibleLines;
use rules::{Grant, RuleInput};

/// Everything evaluation reads besides the document.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// The bill
    pub bill: &'a Bill,

    /// Product catalog
    pub catalog: &'a Catalog,

    /// Holiday calendar
    pub holidays: &'a HolidayCalendar,

    /// CRM facts about the customer, if known
    pub customer: Option<&'a CustomerFacts>,

    /// Fresh usage counts, if the ledger was consulted
    pub usage: Option<&'a UsageFacts>,

    /// Discount already applied by earlier execution stages, minor units
    pub prior_discount: i64,
}

impl<'a> EvaluationContext<'a> {
    /// Context with no customer facts, no usage counts and no prior discount.
    pub const fn new(bill: &'a Bill, catalog: &'a Catalog, holidays: &'a HolidayCalendar) -> Self {
        Self {
            bill,
            catalog,
            holidays,
            customer: None,
            usage: None,
            prior_discount: 0,
        }
    }

    /// Attach customer facts.
    #[must_use]
    pub const fn with_customer(mut self, customer: &'a CustomerFacts) -> Self {
        self.customer = Some(customer);

        self
    }

    /// Attach usage counts.
    #[must_use]
    pub const fn with_usage(mut self, usage: &'a UsageFacts) -> Self {
        self.usage = Some(usage);

        self
    }

    /// Set the discount granted by earlier stages.
    #[must_use]
    pub const fn with_prior_discount(mut self, prior_discount: i64) -> Self {
        self.prior_discount = prior_discount;

        self
    }
}

/// Why evaluation stopped before a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rejection {
    Ineligible(IneligibleReason),
    Fault(EvaluationFault),
}

impl From<IneligibleReason> for Rejection {
    fn from(reason: IneligibleReason) -> Self {
        Self::Ineligible(reason)
    }
}

impl From<EvaluationFault> for Rejection {
    fn from(fault: EvaluationFault) -> Self {
        Self::Fault(fault)
    }
}

impl From<DiscountError> for Rejection {
    fn from(error: DiscountError) -> Self {
        Self::Fault(EvaluationFault::from(error))
    }
}

/// Evaluate one document against a bill.
pub fn evaluate(
    document: &CompiledPromotionDocument,
    context: &EvaluationContext<'_>,
) -> EligibilityResult {
    let verdict = match run(document, context) {
        Ok(grant) => Verdict::Eligible {
            discount: grant.discount,
            benefit: grant.benefit,
            affected_lines: grant.affected_lines,
        },
        Err(Rejection::Ineligible(reason)) => Verdict::Ineligible { reason },
        Err(Rejection::Fault(fault)) => Verdict::Error { fault },
    };

    EligibilityResult {
        promotion_id: document.id,
        code: document.code.clone(),
        promo_type: document.promo_type(),
        currency: document.currency.clone(),
        conflict: document.conflict.clone(),
        verdict,
    }
}

/// Evaluate several documents against the same bill, in input order.
pub fn evaluate_all<'d>(
    documents: impl IntoIterator<Item = &'d CompiledPromotionDocument>,
    context: &EvaluationContext<'_>,
) -> Vec<EligibilityResult> {
    documents
        .into_iter()
        .map(|document| evaluate(document, context))
        .collect()
}

fn run(
    document: &CompiledPromotionDocument,
    context: &EvaluationContext<'_>,
) -> Result<Grant, Rejection> {
    gates::document(document, context)?;
    gates::validity(document, context)?;
    gates::scope(document, context)?;

    let lines = EligibleLines::select(&document.targeting, context.bill, context.catalog)?;
    gates::targeting(document, &lines)?;
    gates::customer(document, context)?;
    gates::threshold(document, &lines)?;
    gates::limits(document, context)?;

    let base = if document.targeting.apply_to.is_bill_scoped() {
        lines
            .subtotal
            .saturating_sub(context.prior_discount.max(0))
            .max(0)
    } else {
        lines.subtotal
    };

    rules::compute(
        &document.rule,
        RuleInput {
            bill: context.bill,
            catalog: context.catalog,
            lines: &lines,
            base,
        },
    )
}
