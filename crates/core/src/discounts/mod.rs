//! Discount arithmetic
//!
//! Integer minor-unit arithmetic shared by every rule formula. All amounts are
//! whole minor units of the document currency so that a server-side preview
//! and an offline terminal compute identical discounts for identical inputs.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::Serialize;
use thiserror::Error;

/// Errors specific to discount calculations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Minor-unit arithmetic overflowed.
    #[error("amount arithmetic overflowed")]
    Overflow,
}

/// Convert percent points (e.g. `20` for 20%) into a fractional [`Percentage`].
pub fn percent_points(points: Decimal) -> Percentage {
    Percentage::from(points / Decimal::ONE_HUNDRED)
}

/// Calculate the discount amount in minor units based on a percentage and a minor unit amount.
///
/// Rounds half away from zero to whole minor units.
///
/// # Errors
///
/// Returns an error if:
/// - The percentage calculation overflows or cannot be safely represented (`DiscountError::PercentConversion`).
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage crate doesn't actually expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

/// Percent of `minor` given in percent points, optionally capped.
///
/// # Errors
///
/// Returns an error if the percentage cannot be represented.
pub fn capped_percent_of_minor(
    points: Decimal,
    minor: i64,
    cap: Option<i64>,
) -> Result<i64, DiscountError> {
    let raw = percent_of_minor(&percent_points(points), minor)?;

    Ok(cap.map_or(raw, |cap| raw.min(cap)))
}

/// Clamp a raw discount to `[0, ceiling]`.
pub fn clamp_discount(raw: i64, ceiling: i64) -> i64 {
    raw.min(ceiling).max(0)
}

/// Multiply a unit price by a quantity.
///
/// # Errors
///
/// Returns [`DiscountError::Overflow`] if the product does not fit in an `i64`.
pub fn line_amount(unit_minor: i64, quantity: u32) -> Result<i64, DiscountError> {
    unit_minor
        .checked_mul(i64::from(quantity))
        .ok_or(DiscountError::Overflow)
}

/// Checked sum of minor-unit amounts.
///
/// # Errors
///
/// Returns [`DiscountError::Overflow`] if the sum does not fit in an `i64`.
pub fn checked_sum<I>(amounts: I) -> Result<i64, DiscountError>
where
    I: IntoIterator<Item = i64>,
{
    amounts
        .into_iter()
        .try_fold(0_i64, |acc, amount| acc.checked_add(amount))
        .ok_or(DiscountError::Overflow)
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use decimal_percentage::Percentage;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn percent_of_minor_overflow_returns_error() {
        let percent = Percentage::from(2.0);
        let result = percent_of_minor(&percent, i64::MAX);

        assert!(matches!(result, Err(DiscountError::PercentConversion)));
    }

    #[test]
    fn percent_of_minor_checked_mul_overflow_returns_error() -> TestResult {
        // 1e20 is representable as a Decimal, but multiplying by a very large minor value should
        // overflow the Decimal range.
        let percent = Percentage::try_from("100000000000000000000")?;
        let result = percent_of_minor(&percent, i64::MAX);

        assert!(matches!(result, Err(DiscountError::PercentConversion)));

        Ok(())
    }

    #[test]
    fn percent_of_minor_calculates_correctly() -> TestResult {
        let percent = Percentage::from(0.25);
        let result = percent_of_minor(&percent, 200)?;

        assert_eq!(result, 50);

        Ok(())
    }

    #[test]
    fn percent_points_round_half_away_from_zero() -> TestResult {
        // 15% of 1_25 = 18.75 -> 19
        let result = percent_of_minor(&percent_points(Decimal::from(15)), 125)?;

        assert_eq!(result, 19);

        Ok(())
    }

    #[test]
    fn capped_percent_respects_cap() -> TestResult {
        let uncapped = capped_percent_of_minor(Decimal::from(20), 300_000, None)?;
        let capped = capped_percent_of_minor(Decimal::from(20), 300_000, Some(50_000))?;

        assert_eq!(uncapped, 60_000);
        assert_eq!(capped, 50_000);

        Ok(())
    }

    #[test]
    fn clamp_discount_never_negative_or_above_ceiling() {
        assert_eq!(clamp_discount(-5, 100), 0);
        assert_eq!(clamp_discount(150, 100), 100);
        assert_eq!(clamp_discount(40, 100), 40);
    }

    #[test]
    fn line_amount_detects_overflow() {
        assert_eq!(line_amount(250, 3), Ok(750));
        assert_eq!(line_amount(i64::MAX, 2), Err(DiscountError::Overflow));
    }

    #[test]
    fn checked_sum_detects_overflow() {
        assert_eq!(checked_sum([1, 2, 3]), Ok(6));
        assert_eq!(checked_sum([i64::MAX, 1]), Err(DiscountError::Overflow));
    }
}
