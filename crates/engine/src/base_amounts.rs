//! Base-currency normalization.
//!
//! Fills `source_amount_in_base_currency` and
//! `destination_amount_in_base_currency` from the native amounts:
//!
//! - a side already in the base currency keeps its native amount;
//! - a side in another currency is converted with the current rates;
//! - when exactly one side is in the base currency, the other side mirrors it
//!   so the rate the user actually got is preserved;
//! - when neither side is, the destination mirrors the converted source;
//! - an absent amount stays absent.

use crate::{CurrencyConverter, ResultEngine, Transaction};

pub fn normalize(
    tx: &mut Transaction,
    base_currency: &str,
    converter: &CurrencyConverter,
) -> ResultEngine<()> {
    let source_is_base = tx.source_currency == base_currency;
    let destination_is_base = tx.destination_currency == base_currency;

    let source_base = tx
        .source_amount
        .map(|amount| converter.convert(&tx.source_currency, base_currency, amount))
        .transpose()?;
    let destination_base = tx
        .destination_amount
        .map(|amount| converter.convert(&tx.destination_currency, base_currency, amount))
        .transpose()?;

    let (source_base, destination_base) = match (source_base, destination_base) {
        (Some(source), Some(destination)) => match (source_is_base, destination_is_base) {
            (true, true) => (Some(source), Some(destination)),
            (true, false) => (Some(source), Some(-source)),
            (false, true) => (Some(-destination), Some(destination)),
            (false, false) => (Some(source), Some(-source)),
        },
        other => other,
    };

    tx.source_amount_in_base_currency = source_base;
    tx.destination_amount_in_base_currency = destination_base;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::Currency;

    fn converter() -> CurrencyConverter {
        CurrencyConverter::new([
            Currency::new("USD", dec!(1), 2),
            Currency::new("UAH", dec!(41.5), 2),
            Currency::new("PLN", dec!(4), 2),
        ])
    }

    fn tx(
        source: Option<(Decimal, &str)>,
        destination: Option<(Decimal, &str)>,
    ) -> Transaction {
        let mut tx = Transaction::empty(Utc::now());
        if let Some((amount, currency)) = source {
            tx.source_amount = Some(amount);
            tx.source_currency = currency.to_string();
        }
        if let Some((amount, currency)) = destination {
            tx.destination_amount = Some(amount);
            tx.destination_currency = currency.to_string();
        }
        tx
    }

    #[test]
    fn base_currency_sides_keep_native_amounts() {
        let mut t = tx(Some((dec!(-10), "USD")), Some((dec!(10), "USD")));
        normalize(&mut t, "USD", &converter()).unwrap();
        assert_eq!(t.source_amount_in_base_currency, Some(dec!(-10)));
        assert_eq!(t.destination_amount_in_base_currency, Some(dec!(10)));
    }

    #[test]
    fn non_base_side_mirrors_base_side() {
        let mut t = tx(Some((dec!(-120), "USD")), Some((dec!(481), "PLN")));
        normalize(&mut t, "USD", &converter()).unwrap();
        assert_eq!(t.source_amount_in_base_currency, Some(dec!(-120)));
        assert_eq!(t.destination_amount_in_base_currency, Some(dec!(120)));

        let mut t = tx(Some((dec!(-765.76), "UAH")), Some((dec!(18.45), "USD")));
        normalize(&mut t, "USD", &converter()).unwrap();
        assert_eq!(t.source_amount_in_base_currency, Some(dec!(-18.45)));
        assert_eq!(t.destination_amount_in_base_currency, Some(dec!(18.45)));
    }

    #[test]
    fn two_foreign_sides_follow_the_source() {
        let mut t = tx(Some((dec!(-83), "UAH")), Some((dec!(9), "PLN")));
        normalize(&mut t, "USD", &converter()).unwrap();
        assert_eq!(t.source_amount_in_base_currency, Some(dec!(-2)));
        assert_eq!(t.destination_amount_in_base_currency, Some(dec!(2)));
    }

    #[test]
    fn absent_amounts_propagate() {
        let mut t = tx(None, Some((dec!(80), "PLN")));
        normalize(&mut t, "USD", &converter()).unwrap();
        assert_eq!(t.source_amount_in_base_currency, None);
        assert_eq!(t.destination_amount_in_base_currency, Some(dec!(20)));
    }

    #[test]
    fn unknown_currency_fails() {
        let mut t = tx(Some((dec!(-1), "GBP")), Some((dec!(1), "USD")));
        assert!(normalize(&mut t, "USD", &converter()).is_err());
    }
}
