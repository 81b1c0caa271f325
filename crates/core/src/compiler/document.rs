//! Compiled promotion documents

use jiff::Timestamp;
use rusty_money::iso::{self, Currency};
use serde::{Deserialize, Serialize};

use crate::{
    compiler::error::CompileError,
    ids::{BrandId, CompanyId, PromotionId, StoreId},
    promotions::{
        PromoType,
        facets::{
            Audience, ConflictPolicy, CrossBrand, Limits, Requirements, Scope, Targeting,
            Validity,
        },
        rules::RuleVariant,
    },
};

/// Version stamped on every document.
pub const COMPILER_VERSION: &str = "1.0";

/// Major document version evaluators understand.
pub const SUPPORTED_MAJOR_VERSION: u32 = 1;

/// Self-contained, versioned promotion document.
///
/// Never mutated once built; a newer document with the same `id` supersedes
/// it. Terminals key their cache by `(id, fingerprint)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPromotionDocument {
    /// Promotion id
    pub id: PromotionId,

    /// Promotion code
    pub code: String,

    /// Display name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Terms and conditions
    #[serde(default)]
    pub terms_conditions: String,

    /// Owning company
    pub company_id: CompanyId,

    /// Owning brand, for single-brand promotions
    #[serde(default)]
    pub brand_id: Option<BrandId>,

    /// ISO-4217 currency of every amount in the document
    pub currency: String,

    /// Compiler version, `MAJOR.MINOR`
    pub compiler_version: String,

    /// When the document was compiled
    pub compiled_at: Timestamp,

    /// Content hash, independent of `compiled_at` and `store_id`
    #[serde(default)]
    pub fingerprint: String,

    /// Store the document was compiled for, in store batches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<StoreId>,

    /// Archetype rule
    pub rule: RuleVariant,

    /// Validity block
    pub validity: Validity,

    /// Scope block
    pub scope: Scope,

    /// Targeting block
    pub targeting: Targeting,

    /// Audience block
    pub audience: Audience,

    /// Requirements block
    pub requirements: Requirements,

    /// Limits block
    pub limits: Limits,

    /// Conflict block
    pub conflict: ConflictPolicy,

    /// Cross-brand block
    #[serde(default)]
    pub cross_brand: Option<CrossBrand>,
}

impl CompiledPromotionDocument {
    /// Archetype of the rule.
    pub const fn promo_type(&self) -> PromoType {
        self.rule.promo_type()
    }

    /// Major part of `compiler_version`.
    pub fn major_version(&self) -> Option<u32> {
        self.compiler_version
            .split('.')
            .next()
            .and_then(|major| major.parse().ok())
    }

    /// Whether this evaluator understands the document format.
    pub fn is_supported(&self) -> bool {
        self.major_version() == Some(SUPPORTED_MAJOR_VERSION)
    }

    /// The document currency.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnknownCurrency`] for a code outside ISO-4217.
    pub fn currency(&self) -> Result<&'static Currency, CompileError> {
        iso::find(&self.currency).ok_or_else(|| CompileError::UnknownCurrency(self.currency.clone()))
    }

    /// Compute the content fingerprint.
    ///
    /// BLAKE3 over the JSON form with `compiled_at`, `store_id` and
    /// `fingerprint` blanked, so recompiling unchanged input yields the same
    /// value and every store of a batch holds the same hash for a promotion.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Serialization`] if the document cannot be
    /// serialized.
    pub fn compute_fingerprint(&self) -> Result<String, CompileError> {
        let mut canonical = self.clone();
        canonical.compiled_at = Timestamp::UNIX_EPOCH;
        canonical.store_id = None;
        canonical.fingerprint.clear();

        let bytes = serde_json::to_vec(&canonical)?;

        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}
