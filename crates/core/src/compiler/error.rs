//! Compile errors

use std::fmt;

use jiff::civil::Date;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use thiserror::Error;

use crate::ids::PromotionId;

/// Errors raised while normalizing or compiling a single promotion.
///
/// None of these abort a batch: the batch compilers record them as
/// [`CompileFailure`]s and carry on with the remaining promotions.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The archetype tag is not one of the known archetypes.
    #[error("unknown promotion type: {0}")]
    UnknownPromoType(String),

    /// A field required by the archetype is absent.
    #[error("missing configuration: {field}")]
    MissingConfiguration {
        /// Name of the missing field
        field: &'static str,
    },

    /// More than one mutually exclusive field is set.
    #[error("ambiguous configuration: only one of {fields} may be set")]
    AmbiguousConfiguration {
        /// The competing fields
        fields: &'static str,
    },

    /// A field is present but its value is unusable.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfiguration {
        /// Offending field
        field: &'static str,

        /// What is wrong with it
        reason: String,
    },

    /// A `trigger_benefit` cross-brand promotion without trigger brands.
    #[error("cross-brand trigger_benefit promotion has no trigger brands")]
    EmptyTriggerBrands,

    /// The document currency is not an ISO-4217 code.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// The validity range ends before it starts.
    #[error("end date {end} is before start date {start}")]
    InvalidDateRange {
        /// First valid day
        start: Date,

        /// Last valid day
        end: Date,
    },

    /// The document could not be serialized for fingerprinting.
    #[error("failed to serialize compiled document: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CompileError {
    pub(crate) fn invalid(field: &'static str, reason: impl fmt::Display) -> Self {
        Self::InvalidConfiguration {
            field,
            reason: reason.to_string(),
        }
    }

    pub(crate) const fn missing(field: &'static str) -> Self {
        Self::MissingConfiguration { field }
    }

    /// Stable snake_case code for reporting.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownPromoType(_) => "unknown_promo_type",
            Self::MissingConfiguration { .. } => "missing_configuration",
            Self::AmbiguousConfiguration { .. } => "ambiguous_configuration",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::EmptyTriggerBrands => "empty_trigger_brands",
            Self::UnknownCurrency(_) => "unknown_currency",
            Self::InvalidDateRange { .. } => "invalid_date_range",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// A promotion that failed to compile, with the reason.
#[derive(Debug, Serialize)]
pub struct CompileFailure {
    /// Promotion id
    pub promotion_id: PromotionId,

    /// Promotion code
    pub code: String,

    /// Why it failed
    #[serde(serialize_with = "serialize_error")]
    pub error: CompileError,
}

fn serialize_error<S>(error: &CompileError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut reported = serializer.serialize_struct("CompileError", 2)?;
    reported.serialize_field("kind", error.code())?;
    reported.serialize_field("message", &error.to_string())?;
    reported.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_serialize_with_kind_and_message() -> Result<(), serde_json::Error> {
        let failure = CompileFailure {
            promotion_id: PromotionId::from_u128(7),
            code: "PKG".to_string(),
            error: CompileError::missing("package.items"),
        };

        let json = serde_json::to_value(&failure)?;

        assert_eq!(json["code"], "PKG");
        assert_eq!(json["error"]["kind"], "missing_configuration");
        assert_eq!(
            json["error"]["message"],
            "missing configuration: package.items"
        );

        Ok(())
    }
}
