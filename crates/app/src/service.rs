//! Compiler Service
//!
//! Async front over the synchronous core. Store compilations of a company run
//! in parallel on the blocking pool and are recorded as they finish; the
//! company result does not depend on which store finishes first.

use std::sync::Arc;

use edge_promo::{
    bill::Bill,
    compiler::{
        CompileError, CompiledPromotionDocument, Compiler,
        batch::{BatchOptions, CompanyCompilation, SelectionWindow, StoreCompilation},
    },
    discounts::DiscountError,
    evaluation::EvaluationContext,
    ids::StoreId,
    promotions::Promotion,
    reference::ReferenceData,
    resolution::{PipelineOutcome, apply_promotions},
};
use jiff::Timestamp;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{Span, info};

use crate::{
    source::{PromotionSource, SourceError},
    usage::{Redemption, UsageError, UsageLedger, record_applied, snapshot},
};

/// Errors raised by [`CompilerService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Reading from the promotion source failed
    #[error("failed to read promotion source")]
    Source(#[from] SourceError),

    /// The company currency is unusable
    #[error("failed to build compiler")]
    Compiler(#[from] CompileError),

    /// The store is unknown or belongs to another company
    #[error("store not found: {0}")]
    StoreNotFound(StoreId),

    /// The store exists but does not trade
    #[error("store is inactive: {0}")]
    StoreInactive(StoreId),

    /// A store compilation task panicked or was cancelled
    #[error("store compilation task failed")]
    Join(#[from] tokio::task::JoinError),

    /// Bill totals do not fit in minor units
    #[error("failed to resolve promotions")]
    Discount(#[from] DiscountError),

    /// The usage ledger failed
    #[error("failed to access usage ledger")]
    Usage(#[from] UsageError),
}

/// What a terminal would do with a bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillEvaluation {
    /// Store the bill was rung at
    pub store_id: StoreId,

    /// Documents the store would hold
    pub documents: usize,

    /// Evaluations and the resolved outcome
    #[serde(flatten)]
    pub outcome: PipelineOutcome,
}

/// A settled bill and the counters it consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettledBill {
    /// Evaluation the bill was settled on
    pub evaluation: BillEvaluation,

    /// Counters recorded for the applied promotions
    pub redemption: Redemption,
}

/// Bill and optional customer to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluateRequest {
    /// Source key of the bill
    pub bill: String,

    /// Source key of the customer facts
    pub customer: Option<String>,

    /// Timestamp stamped on the documents compiled for the bill
    pub compiled_at: Timestamp,
}

/// Compiles and evaluates one company's promotions.
#[derive(Debug)]
pub struct CompilerService<S, L> {
    source: S,
    ledger: L,
}

impl<S, L> CompilerService<S, L>
where
    S: PromotionSource,
    L: UsageLedger,
{
    /// Create a service over `source`, counting usage in `ledger`.
    pub fn new(source: S, ledger: L) -> Self {
        Self { source, ledger }
    }

    /// The usage ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Compile every promotion that runs at one store.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails, the store is unknown or inactive,
    /// or the company currency is unknown. Individual promotions that fail
    /// to compile are reported in the result instead.
    #[tracing::instrument(
        name = "compiler.service.compile_store",
        skip(self, options),
        fields(
            store_id = %store_id,
            documents = tracing::field::Empty,
            failures = tracing::field::Empty
        ),
        err
    )]
    pub async fn compile_store(
        &self,
        store_id: StoreId,
        options: BatchOptions,
    ) -> Result<StoreCompilation, ServiceError> {
        let reference = self.source.reference_data().await?;
        let promotions = self.source.promotions().await?;
        let compilation = compile_at(&reference, &promotions, store_id, options)?;

        let span = Span::current();

        span.record("documents", compilation.documents.len());
        span.record("failures", compilation.failures.len());

        Ok(compilation)
    }

    /// Compile every active store of the company in parallel.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails, the company currency is unknown
    /// or a store task dies. No partial result is returned.
    #[tracing::instrument(
        name = "compiler.service.compile_company",
        skip(self, options),
        fields(
            company_id = tracing::field::Empty,
            stores = tracing::field::Empty
        ),
        err
    )]
    pub async fn compile_company(
        &self,
        options: BatchOptions,
    ) -> Result<CompanyCompilation, ServiceError> {
        let reference = self.source.reference_data().await?;
        let compiler = Compiler::new(&reference.company.currency)?;
        let promotions = Arc::new(self.source.promotions().await?);

        let span = Span::current();

        span.record("company_id", tracing::field::display(reference.company.id));

        let mut tasks = JoinSet::new();

        for store in reference.active_stores() {
            let store = store.clone();
            let promotions = Arc::clone(&promotions);

            tasks.spawn_blocking(move || compiler.compile_for_store(&store, &promotions, options));
        }

        let mut compilation = CompanyCompilation::new(reference.company.id, options.compiled_at);

        while let Some(joined) = tasks.join_next().await {
            compilation.record(joined?);
        }

        span.record("stores", compilation.summary.total_stores);

        info!(
            promotions = compilation.summary.total_promotions,
            failures = compilation.summary.failures,
            "compiled company promotions"
        );

        Ok(compilation)
    }

    /// Compile the bill's store for the bill's date, then evaluate and resolve.
    ///
    /// # Errors
    ///
    /// Returns an error if the source or ledger fails, the bill's store is
    /// unknown, or the bill totals overflow.
    #[tracing::instrument(
        name = "compiler.service.evaluate",
        skip(self, request),
        fields(bill = %request.bill, applied = tracing::field::Empty),
        err
    )]
    pub async fn evaluate(&self, request: &EvaluateRequest) -> Result<BillEvaluation, ServiceError> {
        let (evaluation, ..) = self.evaluate_with_documents(request).await?;

        Span::current().record("applied", evaluation.outcome.resolution.applied.len());

        Ok(evaluation)
    }

    /// Evaluate the bill and count the applied promotions in the ledger.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::evaluate`].
    #[tracing::instrument(
        name = "compiler.service.settle",
        skip(self, request),
        fields(bill = %request.bill),
        err
    )]
    pub async fn settle(&self, request: &EvaluateRequest) -> Result<SettledBill, ServiceError> {
        let (evaluation, documents, bill) = self.evaluate_with_documents(request).await?;

        let redemption = record_applied(
            &self.ledger,
            &documents,
            &bill,
            &evaluation.outcome.resolution,
        )
        .await?;

        Ok(SettledBill {
            evaluation,
            redemption,
        })
    }

    async fn evaluate_with_documents(
        &self,
        request: &EvaluateRequest,
    ) -> Result<(BillEvaluation, Vec<CompiledPromotionDocument>, Bill), ServiceError> {
        let bill = self.source.bill(&request.bill).await?;

        let customer = match &request.customer {
            Some(key) => Some(self.source.customer(key).await?),
            None => None,
        };

        let options = BatchOptions {
            today: bill.local_time.date(),
            compiled_at: request.compiled_at,
            window: SelectionWindow::CurrentOnly,
        };

        let reference = self.source.reference_data().await?;
        let promotions = self.source.promotions().await?;
        let documents = compile_at(&reference, &promotions, bill.store_id, options)?.documents;
        let usage = snapshot(&self.ledger, &documents, &bill).await?;

        let mut context =
            EvaluationContext::new(&bill, &reference.catalog, &reference.holidays).with_usage(&usage);

        if let Some(customer) = &customer {
            context = context.with_customer(customer);
        }

        let outcome = apply_promotions(&documents, &context)?;

        let evaluation = BillEvaluation {
            store_id: bill.store_id,
            documents: documents.len(),
            outcome,
        };

        Ok((evaluation, documents, bill))
    }
}

fn compile_at(
    reference: &ReferenceData,
    promotions: &[Promotion],
    store_id: StoreId,
    options: BatchOptions,
) -> Result<StoreCompilation, ServiceError> {
    let compiler = Compiler::new(&reference.company.currency)?;

    let store = reference
        .store(store_id)
        .filter(|store| store.company_id == reference.company.id)
        .ok_or(ServiceError::StoreNotFound(store_id))?;

    if !store.is_active {
        return Err(ServiceError::StoreInactive(store_id));
    }

    Ok(compiler.compile_for_store(store, promotions, options))
}
