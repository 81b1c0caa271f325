//! Batch compilation
//!
//! Compiles every promotion that applies to a store, or to every active store
//! of a company. A promotion that fails to compile is logged and reported; it
//! never aborts the batch.

use std::collections::BTreeMap;

use jiff::{Span, Timestamp, civil::Date};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    compiler::{COMPILER_VERSION, CompileFailure, CompiledPromotionDocument, Compiler},
    ids::{BrandId, CompanyId, StoreId},
    promotions::{BrandScope, Promotion},
    reference::{ReferenceData, Store},
};

/// Which promotions a batch picks by date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SelectionWindow {
    /// Valid today
    #[default]
    CurrentOnly,

    /// Valid today, starting within `future_days`, or ended within `past_days`
    IncludeFuture {
        /// Days ahead to include upcoming promotions
        future_days: u32,

        /// Days back to include recently ended promotions
        past_days: u32,
    },

    /// Every active promotion regardless of dates
    AllActive,
}

impl SelectionWindow {
    /// Whether a promotion running `start..=end` is selected on `today`.
    pub fn selects(&self, start: Date, end: Date, today: Date) -> bool {
        match *self {
            Self::CurrentOnly => start <= today && today <= end,
            Self::IncludeFuture {
                future_days,
                past_days,
            } => {
                start <= shift(today, i64::from(future_days))
                    && end >= shift(today, -i64::from(past_days))
            }
            Self::AllActive => true,
        }
    }
}

fn shift(date: Date, days: i64) -> Date {
    let saturated = if days < 0 { Date::MIN } else { Date::MAX };

    Span::new()
        .try_days(days)
        .and_then(|span| date.checked_add(span))
        .unwrap_or(saturated)
}

/// Inputs shared by every store of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Store-local date used for selection
    pub today: Date,

    /// Timestamp stamped on every document
    pub compiled_at: Timestamp,

    /// Date selection strategy
    pub window: SelectionWindow,
}

/// Whether `promotion` runs at `store`: active, same company, store in scope and
/// the store's brand in brand scope.
pub fn applies_to_store(promotion: &Promotion, store: &Store) -> bool {
    if !promotion.is_active || promotion.company_id != store.company_id {
        return false;
    }

    if !promotion.all_stores && !promotion.stores.contains(&store.id) {
        return false;
    }

    if promotion.exclude_brands.contains(&store.brand_id) {
        return false;
    }

    match promotion.scope {
        BrandScope::Company => true,
        BrandScope::Brands => promotion.brands.contains(&store.brand_id),
        BrandScope::Single => promotion.brand_id == Some(store.brand_id),
    }
}

/// Documents compiled for one store.
#[derive(Debug, Serialize)]
pub struct StoreCompilation {
    /// Store
    pub store_id: StoreId,

    /// Brand of the store
    pub brand_id: BrandId,

    /// Timestamp shared by the batch
    pub compiled_at: Timestamp,

    /// Compiler version
    pub compiler_version: &'static str,

    /// Compiled documents, in execution order
    pub documents: Vec<CompiledPromotionDocument>,

    /// Promotions that failed to compile
    pub failures: Vec<CompileFailure>,
}

/// Per-brand counts in a company summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrandSummary {
    /// Stores of the brand
    pub stores: usize,

    /// Documents across those stores
    pub promotions: usize,
}

/// Counts across a company batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompanySummary {
    /// Stores compiled
    pub total_stores: usize,

    /// Documents across every store
    pub total_promotions: usize,

    /// Stores with at least one document
    pub stores_with_promotions: usize,

    /// Compile failures across every store
    pub failures: usize,

    /// Breakdown per brand
    pub by_brand: BTreeMap<BrandId, BrandSummary>,
}

impl CompanySummary {
    fn add(&mut self, store: &StoreCompilation) {
        self.total_stores += 1;
        self.total_promotions += store.documents.len();
        self.failures += store.failures.len();

        if !store.documents.is_empty() {
            self.stores_with_promotions += 1;
        }

        let brand = self.by_brand.entry(store.brand_id).or_default();
        brand.stores += 1;
        brand.promotions += store.documents.len();
    }

    fn remove(&mut self, store: &StoreCompilation) {
        self.total_stores = self.total_stores.saturating_sub(1);
        self.total_promotions = self.total_promotions.saturating_sub(store.documents.len());
        self.failures = self.failures.saturating_sub(store.failures.len());

        if !store.documents.is_empty() {
            self.stores_with_promotions = self.stores_with_promotions.saturating_sub(1);
        }

        if let Some(brand) = self.by_brand.get_mut(&store.brand_id) {
            brand.stores = brand.stores.saturating_sub(1);
            brand.promotions = brand.promotions.saturating_sub(store.documents.len());

            if brand.stores == 0 {
                self.by_brand.remove(&store.brand_id);
            }
        }
    }
}

/// Documents compiled for every active store of a company.
#[derive(Debug, Serialize)]
pub struct CompanyCompilation {
    /// Company
    pub company_id: CompanyId,

    /// Timestamp shared by the batch
    pub compiled_at: Timestamp,

    /// Compiler version
    pub compiler_version: &'static str,

    /// Per-store results
    pub stores: BTreeMap<StoreId, StoreCompilation>,

    /// Aggregate counts
    pub summary: CompanySummary,
}

impl CompanyCompilation {
    /// Start an empty company result.
    pub fn new(company_id: CompanyId, compiled_at: Timestamp) -> Self {
        Self {
            company_id,
            compiled_at,
            compiler_version: COMPILER_VERSION,
            stores: BTreeMap::new(),
            summary: CompanySummary::default(),
        }
    }

    /// Add a store result. The outcome does not depend on the order stores
    /// are recorded in; recording a store twice keeps the latest result.
    pub fn record(&mut self, store: StoreCompilation) {
        self.summary.add(&store);

        if let Some(previous) = self.stores.insert(store.store_id, store) {
            self.summary.remove(&previous);
        }
    }
}

impl Compiler {
    /// Compile every promotion that runs at `store` on `options.today`.
    pub fn compile_for_store(
        &self,
        store: &Store,
        promotions: &[Promotion],
        options: BatchOptions,
    ) -> StoreCompilation {
        let mut documents = Vec::new();
        let mut failures = Vec::new();

        let selected = promotions.iter().filter(|promotion| {
            applies_to_store(promotion, store)
                && options
                    .window
                    .selects(promotion.start_date, promotion.end_date, options.today)
        });

        for promotion in selected {
            match self.compile(promotion, options.compiled_at) {
                Ok(mut document) => {
                    document.store_id = Some(store.id);
                    documents.push(document);
                }
                Err(error) => {
                    warn!(
                        store_id = %store.id,
                        promotion_id = %promotion.id,
                        code = %promotion.code,
                        error = %error,
                        "failed to compile promotion"
                    );

                    failures.push(CompileFailure {
                        promotion_id: promotion.id,
                        code: promotion.code.clone(),
                        error,
                    });
                }
            }
        }

        documents.sort_by(|a, b| {
            a.conflict
                .execution_stage
                .cmp(&b.conflict.execution_stage)
                .then(a.conflict.execution_priority.cmp(&b.conflict.execution_priority))
                .then_with(|| a.code.cmp(&b.code))
        });

        info!(
            store_id = %store.id,
            documents = documents.len(),
            failures = failures.len(),
            "compiled store promotions"
        );

        StoreCompilation {
            store_id: store.id,
            brand_id: store.brand_id,
            compiled_at: options.compiled_at,
            compiler_version: COMPILER_VERSION,
            documents,
            failures,
        }
    }

    /// Compile for every active store of the company in `reference`.
    pub fn compile_for_company(
        &self,
        reference: &ReferenceData,
        promotions: &[Promotion],
        options: BatchOptions,
    ) -> CompanyCompilation {
        let mut compilation = CompanyCompilation::new(reference.company.id, options.compiled_at);

        for store in reference.active_stores() {
            compilation.record(self.compile_for_store(store, promotions, options));
        }

        info!(
            company_id = %reference.company.id,
            stores = compilation.summary.total_stores,
            promotions = compilation.summary.total_promotions,
            failures = compilation.summary.failures,
            "compiled company promotions"
        );

        compilation
    }
}
