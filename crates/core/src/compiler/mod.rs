//! Document Compiler
//!
//! Assembles normalized rules and facets into [`CompiledPromotionDocument`]s.
//! Compilation is pure: the clock and the currency are inputs, so compiling
//! the same snapshot twice yields documents that differ only in
//! `compiled_at`.

use jiff::Timestamp;
use rusty_money::iso::{self, Currency};
use tracing::debug;

use crate::promotions::{Promotion, normalizer::normalize};

pub mod batch;
pub mod document;
pub mod error;
pub mod incremental;

pub use document::{COMPILER_VERSION, CompiledPromotionDocument, SUPPORTED_MAJOR_VERSION};
pub use error::{CompileError, CompileFailure};

/// Compiles promotions of one company into documents priced in its currency.
#[derive(Debug, Clone, Copy)]
pub struct Compiler {
    currency: &'static Currency,
}

impl Compiler {
    /// Create a compiler for the given ISO-4217 currency code.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnknownCurrency`] for an unknown code.
    pub fn new(currency_code: &str) -> Result<Self, CompileError> {
        let currency = iso::find(currency_code.trim())
            .ok_or_else(|| CompileError::UnknownCurrency(currency_code.to_string()))?;

        Ok(Self { currency })
    }

    /// Currency stamped on every document.
    pub const fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Compile a single promotion.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] if the promotion cannot be normalized.
    pub fn compile(
        &self,
        promotion: &Promotion,
        compiled_at: Timestamp,
    ) -> Result<CompiledPromotionDocument, CompileError> {
        let normalized = normalize(promotion)?;

        let mut document = CompiledPromotionDocument {
            id: promotion.id,
            code: promotion.code.clone(),
            name: promotion.name.clone(),
            description: promotion.description.clone(),
            terms_conditions: promotion.terms_conditions.clone(),
            company_id: promotion.company_id,
            brand_id: promotion.brand_id,
            currency: self.currency.iso_alpha_code.to_string(),
            compiler_version: COMPILER_VERSION.to_string(),
            compiled_at,
            fingerprint: String::new(),
            store_id: None,
            rule: normalized.rule,
            validity: normalized.validity,
            scope: normalized.scope,
            targeting: normalized.targeting,
            audience: normalized.audience,
            requirements: normalized.requirements,
            limits: normalized.limits,
            conflict: normalized.conflict,
            cross_brand: normalized.cross_brand,
        };

        document.fingerprint = document.compute_fingerprint()?;

        debug!(
            promotion_id = %document.id,
            code = %document.code,
            promo_type = document.promo_type().to_str(),
            fingerprint = %document.fingerprint,
            "compiled promotion"
        );

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;
    use crate::{
        ids::{CompanyId, PromotionId},
        promotions::{PromoType, rules::RuleVariant},
    };

    fn save20() -> Promotion {
        let mut promotion = Promotion::new(
            PromotionId::from_u128(1),
            CompanyId::from_u128(1),
            "SAVE20",
            PromoType::PercentDiscount,
            date(2026, 1, 1),
            date(2026, 12, 31),
        );
        promotion.discount_percent = Some(Decimal::from(20));
        promotion.max_discount_amount = Some(50_000);

        promotion
    }

    #[test]
    fn unknown_currency_is_rejected() {
        assert!(matches!(
            Compiler::new("XYZ"),
            Err(CompileError::UnknownCurrency(code)) if code == "XYZ"
        ));
    }

    #[test]
    fn documents_are_stamped() -> TestResult {
        let compiler = Compiler::new("IDR")?;
        let compiled_at = Timestamp::from_second(1_770_000_000)?;

        let document = compiler.compile(&save20(), compiled_at)?;

        assert_eq!(document.compiler_version, COMPILER_VERSION);
        assert_eq!(document.currency, "IDR");
        assert_eq!(document.compiled_at, compiled_at);
        assert!(document.is_supported());
        assert!(matches!(document.rule, RuleVariant::PercentDiscount(_)));
        assert_eq!(document.fingerprint.len(), 64);

        Ok(())
    }

    #[test]
    fn recompiling_differs_only_in_timestamp() -> TestResult {
        let compiler = Compiler::new("IDR")?;
        let first = compiler.compile(&save20(), Timestamp::from_second(1_770_000_000)?)?;
        let mut second = compiler.compile(&save20(), Timestamp::from_second(1_780_000_000)?)?;

        assert_eq!(first.fingerprint, second.fingerprint);

        second.compiled_at = first.compiled_at;

        assert_eq!(first, second);

        Ok(())
    }

    #[test]
    fn fingerprint_tracks_content() -> TestResult {
        let compiler = Compiler::new("IDR")?;
        let mut changed = save20();
        changed.max_discount_amount = Some(40_000);

        let original = compiler.compile(&save20(), Timestamp::UNIX_EPOCH)?;
        let updated = compiler.compile(&changed, Timestamp::UNIX_EPOCH)?;

        assert_ne!(original.fingerprint, updated.fingerprint);

        Ok(())
    }

    #[test]
    fn documents_survive_json() -> TestResult {
        let compiler = Compiler::new("IDR")?;
        let document = compiler.compile(&save20(), Timestamp::UNIX_EPOCH)?;

        let json = serde_json::to_string(&document)?;
        let parsed: CompiledPromotionDocument = serde_json::from_str(&json)?;

        assert_eq!(parsed, document);
        assert_eq!(parsed.compute_fingerprint()?, document.fingerprint);

        Ok(())
    }

    #[test]
    fn unsupported_major_version_is_detected() -> TestResult {
        let compiler = Compiler::new("IDR")?;
        let mut document = compiler.compile(&save20(), Timestamp::UNIX_EPOCH)?;
        document.compiler_version = "2.0".to_string();

        assert!(!document.is_supported());
        assert_eq!(document.major_version(), Some(2));

        Ok(())
    }
}
