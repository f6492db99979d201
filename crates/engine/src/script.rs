//! Embedded JavaScript runtime for rule scripts.
//!
//! A script sees a global `tx` handle (getters/setters over a copy of the
//! transaction) plus the `convertCurrency` and `getAccountByID` helpers.
//! The transaction crosses the boundary as JSON; decimal and date arithmetic
//! is done on the Rust side so scripts never see float rounding in stored
//! amounts.

use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use rquickjs::{CatchResultExt, Context, Function, Runtime, Value, prelude::Func};
use serde::Deserialize;
use serde_json::json;

use crate::{
    Account, Currency, EngineError, ResultEngine, Transaction,
    money::{format_amount, parse_amount},
};

const PRELUDE: &str = include_str!("script/prelude.js");
const MEMORY_LIMIT: usize = 32 * 1024 * 1024;
const TIME_LIMIT: Duration = Duration::from_secs(5);

/// Runs one script against a candidate transaction.
///
/// Returns whether the script changed anything. The candidate is only touched
/// when the script finished without error.
pub trait ScriptRunner {
    fn run(&self, script: &str, tx: &mut Transaction) -> ResultEngine<bool>;
}

#[derive(Deserialize)]
struct ScriptOutput {
    modified: bool,
    tx: Transaction,
}

/// QuickJS backed [`ScriptRunner`].
///
/// Holds the helper environment (currency table and accounts) as JSON; a
/// fresh runtime is created per run so scripts cannot leak state into each
/// other.
#[derive(Clone, Debug)]
pub struct JsInterpreter {
    env_json: String,
}

impl JsInterpreter {
    pub fn new(currencies: &[Currency], accounts: &[Account]) -> ResultEngine<Self> {
        let currencies: serde_json::Map<String, serde_json::Value> = currencies
            .iter()
            .filter(|c| c.deleted_at.is_none())
            .map(|c| {
                (
                    c.id.clone(),
                    json!({ "rate": c.rate.to_string(), "decimal_places": c.decimal_places }),
                )
            })
            .collect();
        let accounts: serde_json::Map<String, serde_json::Value> = accounts
            .iter()
            .filter(|a| a.deleted_at.is_none())
            .map(|a| Ok((a.id.to_string(), serde_json::to_value(a)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        let env_json = serde_json::to_string(&json!({
            "currencies": currencies,
            "accounts": accounts,
        }))?;
        Ok(Self { env_json })
    }

    fn evaluate(&self, script: &str, state_json: &str) -> Result<String, String> {
        let runtime = Runtime::new().map_err(|err| format!("runtime: {err}"))?;
        runtime.set_memory_limit(MEMORY_LIMIT);
        let deadline = Instant::now() + TIME_LIMIT;
        runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() > deadline)));
        let context = Context::full(&runtime).map_err(|err| format!("context: {err}"))?;

        context.with(|ctx| {
            let globals = ctx.globals();
            let register = |name: &str, result: rquickjs::Result<()>| {
                result.map_err(|err| format!("failed to register {name}: {err}"))
            };
            register(
                "__signed",
                globals.set(
                    "__signed",
                    Func::from(|value: String, sign: i32| signed_amount(&value, sign)),
                ),
            )?;
            register(
                "__round",
                globals.set(
                    "__round",
                    Func::from(|value: String, places: i32, absolute: bool| {
                        round_amount(&value, places, absolute)
                    }),
                ),
            )?;
            register(
                "__convert",
                globals.set(
                    "__convert",
                    Func::from(
                        |value: String, rate_from: String, rate_to: String, places: i32| {
                            convert_amount(&value, &rate_from, &rate_to, places)
                        },
                    ),
                ),
            )?;
            register(
                "__addDate",
                globals.set(
                    "__addDate",
                    Func::from(|at: String, years: i32, months: i32, days: i32| {
                        shift_date(&at, years, months, days)
                    }),
                ),
            )?;
            register(
                "__setTime",
                globals.set(
                    "__setTime",
                    Func::from(|at: String, hour: i32, minute: i32| {
                        set_time_of_day(&at, hour, minute)
                    }),
                ),
            )?;

            ctx.eval::<(), _>(PRELUDE)
                .catch(&ctx)
                .map_err(|err| format!("prelude: {err}"))?;

            let state = ctx
                .json_parse(state_json)
                .catch(&ctx)
                .map_err(|err| format!("failed to load transaction: {err}"))?;
            let env = ctx
                .json_parse(self.env_json.as_str())
                .catch(&ctx)
                .map_err(|err| format!("failed to load environment: {err}"))?;
            let init: Function = globals
                .get("__init")
                .catch(&ctx)
                .map_err(|err| format!("prelude: {err}"))?;
            init.call::<_, ()>((state, env))
                .catch(&ctx)
                .map_err(|err| format!("prelude: {err}"))?;

            let wrapped = format!("(function () {{\n{script}\n}})();");
            ctx.eval::<(), _>(wrapped)
                .catch(&ctx)
                .map_err(|err| err.to_string())?;

            let finish: Function = globals
                .get("__finish")
                .catch(&ctx)
                .map_err(|err| format!("prelude: {err}"))?;
            let output: Value = finish
                .call(())
                .catch(&ctx)
                .map_err(|err| format!("prelude: {err}"))?;
            ctx.json_stringify(output)
                .catch(&ctx)
                .map_err(|err| format!("failed to read transaction back: {err}"))?
                .ok_or_else(|| "script left a non-serializable transaction".to_string())?
                .to_string()
                .map_err(|err| format!("failed to read transaction back: {err}"))
        })
    }
}

impl ScriptRunner for JsInterpreter {
    fn run(&self, script: &str, tx: &mut Transaction) -> ResultEngine<bool> {
        let state_json = serde_json::to_string(&*tx)?;
        let output_json = self
            .evaluate(script, &state_json)
            .map_err(EngineError::Script)?;
        let output: ScriptOutput = serde_json::from_str(&output_json)
            .map_err(|err| EngineError::Script(format!("invalid transaction after script: {err}")))?;
        if !output.modified {
            return Ok(false);
        }

        let mut updated = output.tx;
        // Identity and bookkeeping columns are not part of the script surface.
        updated.id = tx.id;
        updated.flags = tx.flags;
        updated.voided_by_transaction_id = tx.voided_by_transaction_id;
        updated.source_amount_in_base_currency = tx.source_amount_in_base_currency;
        updated.destination_amount_in_base_currency = tx.destination_amount_in_base_currency;
        updated.created_at = tx.created_at;
        updated.updated_at = tx.updated_at;
        updated.deleted_at = tx.deleted_at;
        updated.transaction_date_only = updated.transaction_date_time.date_naive();
        *tx = updated;
        Ok(true)
    }
}

/// `sign`: `-1` forces negative, `1` forces positive, anything else keeps it.
/// An empty string tells the script the value was unusable.
fn signed_amount(value: &str, sign: i32) -> String {
    match parse_amount(value) {
        Ok(amount) => match sign {
            -1 => (-amount.abs()).to_string(),
            1 => amount.abs().to_string(),
            _ => amount.to_string(),
        },
        Err(_) => String::new(),
    }
}

fn round_amount(value: &str, places: i32, absolute: bool) -> String {
    let Ok(places) = u32::try_from(places) else {
        return String::new();
    };
    match parse_amount(value) {
        Ok(amount) if absolute => format_amount(amount.abs(), places),
        Ok(amount) => format_amount(amount, places),
        Err(_) => String::new(),
    }
}

fn convert_amount(value: &str, rate_from: &str, rate_to: &str, places: i32) -> String {
    let (Ok(amount), Ok(from), Ok(to)) = (
        parse_amount(value),
        parse_amount(rate_from),
        parse_amount(rate_to),
    ) else {
        return String::new();
    };
    if from.is_zero() {
        return String::new();
    }
    match amount.checked_mul(to).and_then(|v| v.checked_div(from)) {
        Some(converted) => format_amount(converted, u32::try_from(places).unwrap_or(0)),
        None => String::new(),
    }
}

/// Add calendar years, months and days. Overflowing days roll into the next
/// month (January 31st plus one month is March 2nd or 3rd).
pub(crate) fn add_date(
    at: DateTime<Utc>,
    years: i32,
    months: i32,
    days: i32,
) -> Option<DateTime<Utc>> {
    let total_months =
        (i64::from(at.year()) + i64::from(years)) * 12 + i64::from(at.month0()) + i64::from(months);
    let year = i32::try_from(total_months.div_euclid(12)).ok()?;
    let month = u32::try_from(total_months.rem_euclid(12)).ok()? + 1;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let date = first.checked_add_signed(TimeDelta::try_days(
        i64::from(at.day0()) + i64::from(days),
    )?)?;
    Some(date.and_time(at.time()).and_utc())
}

pub(crate) fn set_time(at: DateTime<Utc>, hour: i32, minute: i32) -> Option<DateTime<Utc>> {
    let hour = u32::try_from(hour).ok()?;
    let minute = u32::try_from(minute).ok()?;
    Some(at.date_naive().and_hms_opt(hour, minute, 0)?.and_utc())
}

fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn shift_date(at: &str, years: i32, months: i32, days: i32) -> String {
    parse_instant(at)
        .and_then(|at| add_date(at, years, months, days))
        .map(|at| at.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

fn set_time_of_day(at: &str, hour: i32, minute: i32) -> String {
    parse_instant(at)
        .and_then(|at| set_time(at, hour, minute))
        .map(|at| at.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{AccountType, TransactionType};

    fn interpreter() -> JsInterpreter {
        let mut card = Account::new("Card", "UAH", AccountType::Asset);
        card.id = 3;
        JsInterpreter::new(
            &[
                Currency::new("USD", dec!(1), 2),
                Currency::new("UAH", dec!(41.5), 2),
            ],
            &[card],
        )
        .unwrap()
    }

    fn expense() -> Transaction {
        let mut tx = Transaction::empty(Utc.with_ymd_and_hms(2024, 1, 31, 22, 40, 0).unwrap());
        tx.transaction_type = TransactionType::Expense;
        tx.title = "Coffee".to_string();
        tx.source_account_id = Some(3);
        tx.source_currency = "UAH".to_string();
        tx.source_amount = Some(dec!(-120.50));
        tx.destination_account_id = Some(1);
        tx.destination_currency = "USD".to_string();
        tx.destination_amount = Some(dec!(2.9));
        tx
    }

    #[test]
    fn read_only_script_reports_unmodified() {
        let mut tx = expense();
        let modified = interpreter()
            .run("if (tx.sourceAmount !== 120.5) { throw new Error('bad'); }", &mut tx)
            .unwrap();
        assert!(!modified);
        assert_eq!(tx, expense());
    }

    #[test]
    fn setters_mark_modified_and_keep_sign_conventions() {
        let mut tx = expense();
        let modified = interpreter()
            .run(
                "tx.title = tx.title + ' shop'; tx.sourceAmount = 99.99; tx.destinationAmount = -3;",
                &mut tx,
            )
            .unwrap();
        assert!(modified);
        assert_eq!(tx.title, "Coffee shop");
        assert_eq!(tx.source_amount, Some(dec!(-99.99)));
        assert_eq!(tx.destination_amount, Some(dec!(3)));
    }

    #[test]
    fn tags_are_a_sorted_set() {
        let mut tx = expense();
        tx.tag_ids.insert(5);
        interpreter()
            .run(
                "tx.addTag(9); tx.addTag(1); tx.addTag(9); tx.removeTag(5); \
                 if (tx.getTags().join(',') !== '1,9') { throw new Error(tx.getTags().join(',')); }",
                &mut tx,
            )
            .unwrap();
        assert_eq!(tx.tag_ids.into_iter().collect::<Vec<_>>(), vec![1, 9]);
    }

    #[test]
    fn date_helpers_move_date_only() {
        let mut tx = expense();
        interpreter()
            .run(
                "tx.transactionDateTimeAddDate(0, 1, 0); tx.transactionDateTimeSetTime(8, 15);",
                &mut tx,
            )
            .unwrap();
        assert_eq!(
            tx.transaction_date_time,
            Utc.with_ymd_and_hms(2024, 3, 2, 8, 15, 0).unwrap()
        );
        assert_eq!(tx.transaction_date_only, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn helpers_convert_and_look_up_accounts() {
        let mut tx = expense();
        interpreter()
            .run(
                "const acc = getAccountByID(tx.sourceAccountId); \
                 tx.notes = acc.name + ':' + convertCurrency('UAH', 'USD', tx.sourceAmount) + ':' \
                   + tx.getSourceAmountWithDecimalPlaces(0);",
                &mut tx,
            )
            .unwrap();
        assert_eq!(tx.notes, "Card:2.9:121");
    }

    #[test]
    fn missing_helper_argument_is_a_script_error() {
        let mut tx = expense();
        let err = interpreter()
            .run("tx.title = convertCurrency('UAH', 'USD');", &mut tx)
            .unwrap_err();
        match err {
            EngineError::Script(message) => assert!(message.contains("missing argument 3")),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(tx, expense());
    }

    #[test]
    fn thrown_errors_leave_candidate_untouched() {
        let mut tx = expense();
        let err = interpreter()
            .run("tx.title = 'changed'; throw new Error('nope');", &mut tx)
            .unwrap_err();
        assert!(matches!(err, EngineError::Script(_)));
        assert_eq!(tx.title, "Coffee");
    }

    #[test]
    fn invalid_type_is_rejected() {
        let mut tx = expense();
        let err = interpreter()
            .run("tx.transactionType = 'gift';", &mut tx)
            .unwrap_err();
        assert!(matches!(err, EngineError::Script(_)));
    }

    #[test]
    fn add_date_rolls_over_like_calendar_math() {
        let at = Utc.with_ymd_and_hms(2023, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            add_date(at, 0, 1, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 3, 3, 12, 0, 0).unwrap()
        );
        assert_eq!(
            add_date(at, 1, -1, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn set_time_rejects_out_of_range() {
        let at = Utc.with_ymd_and_hms(2023, 1, 31, 12, 0, 0).unwrap();
        assert!(set_time(at, 25, 0).is_none());
        assert!(set_time(at, -1, 0).is_none());
    }
}
