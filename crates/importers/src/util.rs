use std::{collections::HashMap, str::FromStr};

use csv::{Reader, ReaderBuilder, StringRecord};
use rust_decimal::Decimal;

use crate::{ImportError, ResultImport};

/// Parse an amount as banks print it: optional spaces as thousands
/// separators and either `.` or `,` as the decimal mark.
pub(crate) fn parse_amount(raw: &str, row: usize) -> ResultImport<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    Decimal::from_str(&cleaned)
        .map_err(|err| ImportError::row(row, format!("invalid amount \"{raw}\": {err}")))
}

/// Optional amount: blank cells are `None`.
pub(crate) fn parse_optional_amount(raw: &str, row: usize) -> ResultImport<Option<Decimal>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_amount(raw, row).map(Some)
}

pub(crate) fn dedup_key(parts: &[&str]) -> String {
    parts.join("|")
}

/// Keeps keys of identical rows in one statement apart: the first row keeps
/// the plain key, repeats get `|#2`, `|#3` in statement order.
#[derive(Debug, Default)]
pub(crate) struct KeyCounter {
    seen: HashMap<String, usize>,
}

impl KeyCounter {
    pub(crate) fn unique(&mut self, key: String) -> String {
        let count = self.seen.entry(key.clone()).or_default();
        *count += 1;
        if *count == 1 {
            key
        } else {
            format!("{key}|#{count}")
        }
    }
}

/// Headerless, flexible reader; callers skip the header themselves.
pub(crate) fn csv_reader(data: &[u8]) -> Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(strip_bom(data))
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}

pub(crate) fn field<'r>(record: &'r StringRecord, index: usize, row: usize) -> ResultImport<&'r str> {
    record
        .get(index)
        .ok_or_else(|| ImportError::row(row, format!("missing column {}", index + 1)))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn amounts_accept_bank_formatting() {
        assert_eq!(parse_amount("-1 234,56", 1).unwrap(), dec!(-1234.56));
        assert_eq!(parse_amount("59.00", 1).unwrap(), dec!(59.00));
        assert!(parse_amount("abc", 3).is_err());
        assert_eq!(parse_optional_amount(" ", 1).unwrap(), None);
    }

    #[test]
    fn repeated_keys_get_an_ordinal() {
        let mut keys = KeyCounter::default();
        assert_eq!(keys.unique("a|1".to_string()), "a|1");
        assert_eq!(keys.unique("b|1".to_string()), "b|1");
        assert_eq!(keys.unique("a|1".to_string()), "a|1|#2");
        assert_eq!(keys.unique("a|1".to_string()), "a|1|#3");
    }

    #[test]
    fn bom_is_ignored() {
        let mut reader = csv_reader(b"\xEF\xBB\xBFa,b\n1,2\n");
        let first = reader.records().next().unwrap().unwrap();
        assert_eq!(&first[0], "a");
    }
}
