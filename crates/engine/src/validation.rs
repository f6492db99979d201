//! Transaction shape and account checks.
//!
//! Shape per type (`REQ` non-zero / non-empty, `NEG`/`POS` sign, `-` absent):
//!
//! | field                | transfer | expense | income  | adjustment |
//! |----------------------|----------|---------|---------|------------|
//! | source_account_id    | REQ      | REQ     | REQ     | -          |
//! | destination_acc. id  | REQ      | REQ     | REQ     | REQ        |
//! | source_amount        | NEG REQ  | NEG REQ | NEG REQ | -          |
//! | destination_amount   | POS REQ  | POS REQ | POS REQ | REQ        |
//! | source_currency      | REQ      | REQ     | REQ     | -          |
//! | destination_currency | REQ      | REQ     | REQ     | REQ        |
//! | fx_source_* pair     | -        | NEG opt | -       | -          |

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::{Account, AccountType, EngineError, ResultEngine, Transaction, TransactionType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sign {
    Negative,
    Positive,
    Any,
}

fn rule(message: String) -> EngineError {
    EngineError::BusinessRule(message)
}

fn require_id(value: Option<i32>, field: &str, kind: TransactionType) -> ResultEngine<i32> {
    match value {
        Some(id) if id != 0 => Ok(id),
        _ => Err(rule(format!("{field} is required for {kind}"))),
    }
}

fn require_amount(
    value: Option<Decimal>,
    field: &str,
    sign: Sign,
    kind: TransactionType,
) -> ResultEngine<()> {
    let amount = match value {
        Some(amount) if !amount.is_zero() => amount,
        _ => return Err(rule(format!("{field} is required for {kind}"))),
    };
    match sign {
        Sign::Negative if amount.is_sign_positive() => {
            Err(rule(format!("{field} must be negative for {kind}")))
        }
        Sign::Positive if amount.is_sign_negative() => {
            Err(rule(format!("{field} must be positive for {kind}")))
        }
        _ => Ok(()),
    }
}

fn require_text(value: &str, field: &str, kind: TransactionType) -> ResultEngine<()> {
    if value.trim().is_empty() {
        return Err(rule(format!("{field} is required for {kind}")));
    }
    Ok(())
}

fn forbid<T>(value: &Option<T>, field: &str, kind: TransactionType) -> ResultEngine<()> {
    if value.is_some() {
        return Err(rule(format!("{field} must be empty for {kind}")));
    }
    Ok(())
}

/// Check the per-type shape of `tx`.
pub fn validate_shape(tx: &Transaction) -> ResultEngine<()> {
    let kind = tx.transaction_type;
    match kind {
        TransactionType::TransferBetweenAccounts
        | TransactionType::Expense
        | TransactionType::Income => {
            require_id(tx.source_account_id, "source_account_id", kind)?;
            require_id(tx.destination_account_id, "destination_account_id", kind)?;
            require_amount(tx.source_amount, "source_amount", Sign::Negative, kind)?;
            require_amount(
                tx.destination_amount,
                "destination_amount",
                Sign::Positive,
                kind,
            )?;
            require_text(&tx.source_currency, "source_currency", kind)?;
            require_text(&tx.destination_currency, "destination_currency", kind)?;
            validate_same_currency_amounts(tx)?;
            if kind == TransactionType::Expense {
                validate_fx_pair(tx)?;
            } else {
                forbid(&tx.fx_source_amount, "fx_source_amount", kind)?;
                forbid(&tx.fx_source_currency, "fx_source_currency", kind)?;
            }
        }
        TransactionType::Adjustment => {
            forbid(&tx.source_account_id, "source_account_id", kind)?;
            forbid(&tx.source_amount, "source_amount", kind)?;
            if !tx.source_currency.is_empty() {
                return Err(rule(format!("source_currency must be empty for {kind}")));
            }
            require_id(tx.destination_account_id, "destination_account_id", kind)?;
            require_amount(tx.destination_amount, "destination_amount", Sign::Any, kind)?;
            require_text(&tx.destination_currency, "destination_currency", kind)?;
            forbid(&tx.fx_source_amount, "fx_source_amount", kind)?;
            forbid(&tx.fx_source_currency, "fx_source_currency", kind)?;
        }
    }
    Ok(())
}

/// Both sides in one currency must move the same amount.
fn validate_same_currency_amounts(tx: &Transaction) -> ResultEngine<()> {
    if tx.source_currency != tx.destination_currency {
        return Ok(());
    }
    let (Some(source), Some(destination)) = (tx.source_amount, tx.destination_amount) else {
        return Ok(());
    };
    if source.abs() != destination {
        return Err(rule(format!(
            "{} amounts differ in {}: {source} vs {destination}",
            tx.transaction_type, tx.source_currency
        )));
    }
    Ok(())
}

fn validate_fx_pair(tx: &Transaction) -> ResultEngine<()> {
    let kind = tx.transaction_type;
    let currency = tx
        .fx_source_currency
        .as_deref()
        .filter(|c| !c.trim().is_empty());
    match (tx.fx_source_amount, currency) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(rule(format!(
            "fx_source_currency is required with fx_source_amount for {kind}"
        ))),
        (None, Some(_)) => Err(rule(format!(
            "fx_source_amount is required with fx_source_currency for {kind}"
        ))),
        (Some(amount), Some(_)) => {
            require_amount(Some(amount), "fx_source_amount", Sign::Negative, kind)
        }
    }
}

/// Account types a transaction type may connect.
fn applicable(kind: TransactionType, source: Option<AccountType>, destination: AccountType) -> bool {
    match kind {
        TransactionType::TransferBetweenAccounts => {
            source.is_some_and(AccountType::is_balance_sheet) && destination.is_balance_sheet()
        }
        TransactionType::Expense => {
            source.is_some_and(AccountType::is_balance_sheet)
                && destination == AccountType::ExpenseCategory
        }
        TransactionType::Income => {
            source == Some(AccountType::IncomeCategory) && destination.is_balance_sheet()
        }
        TransactionType::Adjustment => {
            matches!(source, None | Some(AccountType::Adjustment)) && destination.is_balance_sheet()
        }
    }
}

fn lookup<'a>(accounts: &'a HashMap<i32, Account>, id: i32) -> ResultEngine<&'a Account> {
    accounts
        .get(&id)
        .filter(|account| account.deleted_at.is_none())
        .ok_or_else(|| EngineError::NotFound(format!("account {id}")))
}

fn check_currency(account: &Account, declared: &str, side: &str) -> ResultEngine<()> {
    if account.currency != declared {
        return Err(rule(format!(
            "{side} account {} has currency {}, expected {declared}",
            account.id, account.currency
        )));
    }
    Ok(())
}

/// Check that referenced accounts exist, match the declared currencies and
/// fit the transaction type.
pub fn validate_accounts(tx: &Transaction, accounts: &HashMap<i32, Account>) -> ResultEngine<()> {
    let source = match tx.source_account_id {
        Some(id) => {
            let account = lookup(accounts, id)?;
            check_currency(account, &tx.source_currency, "source")?;
            Some(account.account_type)
        }
        None => None,
    };
    let destination_id = tx
        .destination_account_id
        .ok_or_else(|| EngineError::MissingField("destination_account_id".to_string()))?;
    let destination = lookup(accounts, destination_id)?;
    check_currency(destination, &tx.destination_currency, "destination")?;

    if !applicable(tx.transaction_type, source, destination.account_type) {
        return Err(rule(format!(
            "{} cannot move money from {} to {}",
            tx.transaction_type,
            source.map_or("nothing", AccountType::as_str),
            destination.account_type.as_str()
        )));
    }
    Ok(())
}

/// Full validation: shape first, then accounts.
pub fn validate(tx: &Transaction, accounts: &HashMap<i32, Account>) -> ResultEngine<()> {
    validate_shape(tx)?;
    validate_accounts(tx, accounts)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;

    fn account(id: i32, currency: &str, kind: AccountType) -> Account {
        let mut account = Account::new("acc", currency, kind);
        account.id = id;
        account
    }

    fn accounts() -> HashMap<i32, Account> {
        [
            account(1, "USD", AccountType::Asset),
            account(2, "USD", AccountType::ExpenseCategory),
            account(3, "UAH", AccountType::Asset),
            account(4, "USD", AccountType::IncomeCategory),
            account(5, "USD", AccountType::Liability),
            account(6, "USD", AccountType::Adjustment),
        ]
        .into_iter()
        .map(|a| (a.id, a))
        .collect()
    }

    fn expense() -> Transaction {
        let mut tx = Transaction::empty(Utc::now());
        tx.transaction_type = TransactionType::Expense;
        tx.source_account_id = Some(1);
        tx.destination_account_id = Some(2);
        tx.source_currency = "USD".to_string();
        tx.destination_currency = "USD".to_string();
        tx.source_amount = Some(dec!(-10));
        tx.destination_amount = Some(dec!(10));
        tx
    }

    #[test]
    fn valid_expense_passes() {
        assert!(validate(&expense(), &accounts()).is_ok());
    }

    #[test]
    fn positive_source_amount_is_rejected() {
        let mut tx = expense();
        tx.source_amount = Some(dec!(10));
        assert_eq!(
            validate(&tx, &accounts()).unwrap_err(),
            EngineError::BusinessRule(
                "source_amount must be negative for TRANSACTION_TYPE_EXPENSE".to_string()
            )
        );
    }

    #[test]
    fn zero_destination_amount_is_missing() {
        let mut tx = expense();
        tx.destination_amount = Some(Decimal::ZERO);
        assert_eq!(
            validate_shape(&tx).unwrap_err(),
            EngineError::BusinessRule(
                "destination_amount is required for TRANSACTION_TYPE_EXPENSE".to_string()
            )
        );
    }

    #[test]
    fn currency_mismatch_is_reported() {
        let mut tx = expense();
        tx.source_account_id = Some(3);
        let err = validate(&tx, &accounts()).unwrap_err();
        assert_eq!(
            err,
            EngineError::BusinessRule(
                "source account 3 has currency UAH, expected USD".to_string()
            )
        );
    }

    #[test]
    fn missing_account_is_not_found() {
        let mut tx = expense();
        tx.destination_account_id = Some(42);
        assert_eq!(
            validate(&tx, &accounts()).unwrap_err(),
            EngineError::NotFound("account 42".to_string())
        );
    }

    #[test]
    fn fx_pair_must_be_complete_and_negative() {
        let mut tx = expense();
        tx.fx_source_amount = Some(dec!(-67.54));
        assert!(validate_shape(&tx).is_err());
        tx.fx_source_currency = Some("PLN".to_string());
        assert!(validate_shape(&tx).is_ok());
        tx.fx_source_amount = Some(dec!(67.54));
        assert!(validate_shape(&tx).is_err());
    }

    #[test]
    fn fx_pair_is_forbidden_on_transfers() {
        let mut tx = expense();
        tx.transaction_type = TransactionType::TransferBetweenAccounts;
        tx.fx_source_amount = Some(dec!(-1));
        tx.fx_source_currency = Some("PLN".to_string());
        assert!(validate_shape(&tx).is_err());
    }

    #[test]
    fn expense_into_asset_is_not_applicable() {
        let mut tx = expense();
        tx.destination_account_id = Some(5);
        let err = validate(&tx, &accounts()).unwrap_err();
        assert!(matches!(err, EngineError::BusinessRule(_)));
    }

    #[test]
    fn income_needs_income_category_source() {
        let mut tx = expense();
        tx.transaction_type = TransactionType::Income;
        tx.source_account_id = Some(4);
        tx.destination_account_id = Some(1);
        assert!(validate(&tx, &accounts()).is_ok());
        tx.source_account_id = Some(5);
        assert!(validate(&tx, &accounts()).is_err());
    }

    #[test]
    fn adjustment_shape() {
        let mut tx = Transaction::empty(Utc::now());
        tx.transaction_type = TransactionType::Adjustment;
        tx.destination_account_id = Some(1);
        tx.destination_currency = "USD".to_string();
        tx.destination_amount = Some(dec!(-3));
        assert!(validate(&tx, &accounts()).is_ok());

        tx.source_amount = Some(dec!(3));
        assert_eq!(
            validate_shape(&tx).unwrap_err(),
            EngineError::BusinessRule(
                "source_amount must be empty for TRANSACTION_TYPE_ADJUSTMENT".to_string()
            )
        );
    }

    #[test]
    fn same_currency_sides_must_match() {
        let mut tx = expense();
        tx.transaction_type = TransactionType::TransferBetweenAccounts;
        tx.destination_account_id = Some(5);
        tx.destination_amount = Some(dec!(9));
        assert_eq!(
            validate_shape(&tx).unwrap_err(),
            EngineError::BusinessRule(
                "TRANSACTION_TYPE_TRANSFER_BETWEEN_ACCOUNTS amounts differ in USD: -10 vs 9"
                    .to_string()
            )
        );

        tx.source_currency = "UAH".to_string();
        tx.destination_currency = "UAH".to_string();
        assert!(validate_shape(&tx).is_err());

        tx.destination_amount = Some(dec!(10.00));
        assert!(validate_shape(&tx).is_ok());
    }

    #[test]
    fn cross_currency_sides_may_differ() {
        let mut tx = expense();
        tx.transaction_type = TransactionType::TransferBetweenAccounts;
        tx.destination_account_id = Some(3);
        tx.destination_currency = "UAH".to_string();
        tx.destination_amount = Some(dec!(415));
        assert!(validate(&tx, &accounts()).is_ok());
    }

    #[test]
    fn transfer_between_asset_and_liability() {
        let mut tx = expense();
        tx.transaction_type = TransactionType::TransferBetweenAccounts;
        tx.destination_account_id = Some(5);
        assert!(validate(&tx, &accounts()).is_ok());
    }
}
