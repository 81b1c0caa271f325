//! Incremental re-compilation
//!
//! Compares fresh documents against the fingerprints a terminal already holds
//! so the sync layer only ships what changed.

use std::collections::{BTreeMap, BTreeSet};

use jiff::Timestamp;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    compiler::{CompileFailure, CompiledPromotionDocument, Compiler},
    ids::PromotionId,
    promotions::Promotion,
};

/// Outcome of a re-compilation against known fingerprints.
#[derive(Debug, Default, Serialize)]
pub struct Recompilation {
    /// New documents or documents whose fingerprint changed
    pub changed: Vec<CompiledPromotionDocument>,

    /// Promotions whose fingerprint is unchanged
    pub unchanged: BTreeSet<PromotionId>,

    /// Previously known promotions no longer present
    pub removed: BTreeSet<PromotionId>,

    /// Promotions that failed to compile; their previous document is kept
    pub failures: Vec<CompileFailure>,
}

impl Recompilation {
    /// Whether anything needs to be shipped.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

impl Compiler {
    /// Compile `promotions` and partition them against `previous`
    /// fingerprints.
    pub fn recompile(
        &self,
        previous: &BTreeMap<PromotionId, String>,
        promotions: &[Promotion],
        compiled_at: Timestamp,
    ) -> Recompilation {
        let mut result = Recompilation::default();
        let mut seen = BTreeSet::new();

        for promotion in promotions {
            seen.insert(promotion.id);

            match self.compile(promotion, compiled_at) {
                Ok(document) => {
                    if previous.get(&document.id) == Some(&document.fingerprint) {
                        result.unchanged.insert(document.id);
                    } else {
                        result.changed.push(document);
                    }
                }
                Err(error) => {
                    warn!(
                        promotion_id = %promotion.id,
                        code = %promotion.code,
                        error = %error,
                        "failed to recompile promotion"
                    );

                    result.failures.push(CompileFailure {
                        promotion_id: promotion.id,
                        code: promotion.code.clone(),
                        error,
                    });
                }
            }
        }

        result.removed = previous
            .keys()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect();

        info!(
            changed = result.changed.len(),
            unchanged = result.unchanged.len(),
            removed = result.removed.len(),
            failures = result.failures.len(),
            "recompiled promotions"
        );

        result
    }
}
