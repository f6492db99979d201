//! Decimal helpers shared by the engine and the importers.
//!
//! Amounts are carried as [`Decimal`] at full precision. Rounding happens only
//! when an amount is presented in a currency ([`format_amount`]) or when a
//! converted value has to be stored in a currency ([`round_to`]).
//!
//! # Examples
//!
//! ```rust
//! use engine::money::{format_amount, parse_amount};
//!
//! let amount = parse_amount("-123.455").unwrap();
//! assert_eq!(format_amount(amount, 2), "-123.46");
//! assert_eq!(format_amount(parse_amount("7").unwrap(), 3), "7.000");
//! ```

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{EngineError, ResultEngine};

/// Scale used when comparing base-currency amounts of the two sides.
pub const BALANCE_SCALE: u32 = 18;

/// Parse a user supplied amount.
///
/// Accepts `.` or `,` as decimal separator and an optional leading sign.
/// Scientific notation is accepted as well (`1e-5`), since script runtimes
/// produce it for small numbers.
pub fn parse_amount(value: &str) -> ResultEngine<Decimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidFormat(
            "amount must not be empty".to_string(),
        ));
    }
    let normalized = trimmed.replace(',', ".");
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| EngineError::InvalidFormat(format!("invalid amount: {trimmed}")))
}

/// Round half away from zero to `decimal_places`.
#[must_use]
pub fn round_to(amount: Decimal, decimal_places: u32) -> Decimal {
    amount.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero)
}

/// Render `amount` with exactly `decimal_places` fraction digits.
#[must_use]
pub fn format_amount(amount: Decimal, decimal_places: u32) -> String {
    let mut rounded = round_to(amount, decimal_places);
    rounded.rescale(decimal_places);
    rounded.to_string()
}

/// `decimal_places` is stored as a signed column; negative values mean zero.
pub(crate) fn places(decimal_places: i32) -> u32 {
    u32::try_from(decimal_places).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!(parse_amount("-123.45").unwrap(), dec!(-123.45));
        assert_eq!(parse_amount("10,5").unwrap(), dec!(10.5));
        assert_eq!(parse_amount(" 0.00001 ").unwrap(), dec!(0.00001));
    }

    #[test]
    fn parse_accepts_scientific_notation() {
        assert_eq!(parse_amount("1e-7").unwrap(), dec!(0.0000001));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(
            parse_amount("12a"),
            Err(EngineError::InvalidFormat("invalid amount: 12a".to_string()))
        );
        assert!(parse_amount("   ").is_err());
    }

    #[test]
    fn format_pads_and_rounds() {
        assert_eq!(format_amount(dec!(10), 2), "10.00");
        assert_eq!(format_amount(dec!(0.125), 2), "0.13");
        assert_eq!(format_amount(dec!(-0.125), 2), "-0.13");
        assert_eq!(format_amount(dec!(1234.5678), 0), "1235");
    }

    #[test]
    fn round_keeps_precision_when_not_needed() {
        assert_eq!(round_to(dec!(18.452), 2), dec!(18.45));
        assert_eq!(round_to(dec!(1.5), 4), dec!(1.5));
    }
}
