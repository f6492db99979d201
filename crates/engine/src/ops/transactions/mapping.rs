use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;

use crate::{
    AccountType, CreateTransactionRequest, CurrencyConverter, EngineError, ResultEngine,
    Transaction, TransactionType, TxMeta, currency::normalize_code,
};

use super::super::{Engine, default_account};

fn blank(meta: TxMeta, transaction_type: TransactionType) -> ResultEngine<Transaction> {
    let at = meta
        .transaction_date
        .ok_or_else(|| EngineError::MissingField("transaction_date".to_string()))?;
    let now = Utc::now();
    let mut tx = Transaction::empty(at);
    tx.transaction_type = transaction_type;
    tx.title = meta.title.trim().to_string();
    tx.notes = meta.notes;
    tx.extra = meta.extra;
    tx.tag_ids = meta.tag_ids;
    tx.category_id = meta.category_id;
    tx.reference_number = meta.reference_number;
    tx.internal_reference_number = meta.internal_reference_number;
    tx.created_at = now;
    tx.updated_at = now;
    Ok(tx)
}

/// Counterpart amount for a side that the caller left out: the other side
/// converted into `to` and negated.
fn mirrored(
    converter: &CurrencyConverter,
    from: &str,
    to: &str,
    amount: Decimal,
) -> ResultEngine<Decimal> {
    Ok(-converter.convert_rounded(from, to, amount)?)
}

impl Engine {
    /// Turn a request into a draft transaction, filling defaulted
    /// counterparts. Adjustments are left one-sided; their source is filled
    /// after rules ran.
    pub(crate) async fn map_request<C: ConnectionTrait>(
        &self,
        conn: &C,
        request: CreateTransactionRequest,
        converter: &CurrencyConverter,
    ) -> ResultEngine<Transaction> {
        match request {
            CreateTransactionRequest::Withdrawal(cmd) => {
                let mut tx = blank(cmd.meta, TransactionType::Expense)?;
                let source_currency = normalize_code(&cmd.source_currency);
                let destination_id = match cmd.destination_account_id {
                    Some(id) => id,
                    None => default_account(conn, AccountType::ExpenseCategory).await?.id,
                };
                let destination_currency = match cmd.destination_currency {
                    Some(code) => normalize_code(&code),
                    None => self.account_currency(conn, destination_id).await?,
                };
                let fx_currency = cmd.fx_source_currency.as_deref().map(normalize_code);
                let destination_amount = match (cmd.destination_amount, cmd.fx_source_amount) {
                    (Some(amount), _) => amount,
                    // The amount charged in the operation currency is exact.
                    (None, Some(fx))
                        if fx_currency.as_deref() == Some(destination_currency.as_str()) =>
                    {
                        -fx
                    }
                    (None, _) => mirrored(
                        converter,
                        &source_currency,
                        &destination_currency,
                        cmd.source_amount,
                    )?,
                };
                tx.source_account_id = Some(cmd.source_account_id);
                tx.source_amount = Some(cmd.source_amount);
                tx.source_currency = source_currency;
                tx.destination_account_id = Some(destination_id);
                tx.destination_amount = Some(destination_amount);
                tx.destination_currency = destination_currency;
                tx.fx_source_amount = cmd.fx_source_amount;
                tx.fx_source_currency = fx_currency;
                Ok(tx)
            }
            CreateTransactionRequest::Deposit(cmd) => {
                let mut tx = blank(cmd.meta, TransactionType::Income)?;
                let destination_currency = normalize_code(&cmd.destination_currency);
                let source_id = match cmd.source_account_id {
                    Some(id) => id,
                    None => default_account(conn, AccountType::IncomeCategory).await?.id,
                };
                let source_currency = match cmd.source_currency {
                    Some(code) => normalize_code(&code),
                    None => self.account_currency(conn, source_id).await?,
                };
                let source_amount = match cmd.source_amount {
                    Some(amount) => amount,
                    None => mirrored(
                        converter,
                        &destination_currency,
                        &source_currency,
                        cmd.destination_amount,
                    )?,
                };
                tx.source_account_id = Some(source_id);
                tx.source_amount = Some(source_amount);
                tx.source_currency = source_currency;
                tx.destination_account_id = Some(cmd.destination_account_id);
                tx.destination_amount = Some(cmd.destination_amount);
                tx.destination_currency = destination_currency;
                Ok(tx)
            }
            CreateTransactionRequest::Transfer(cmd) => {
                let mut tx = blank(cmd.meta, TransactionType::TransferBetweenAccounts)?;
                tx.source_account_id = Some(cmd.source_account_id);
                tx.source_amount = Some(cmd.source_amount);
                tx.source_currency = normalize_code(&cmd.source_currency);
                tx.destination_account_id = Some(cmd.destination_account_id);
                tx.destination_amount = Some(cmd.destination_amount);
                tx.destination_currency = normalize_code(&cmd.destination_currency);
                Ok(tx)
            }
            CreateTransactionRequest::Adjustment(cmd) => {
                let mut tx = blank(cmd.meta, TransactionType::Adjustment)?;
                tx.destination_account_id = Some(cmd.destination_account_id);
                tx.destination_amount = Some(cmd.destination_amount);
                tx.destination_currency = normalize_code(&cmd.destination_currency);
                Ok(tx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::Currency;

    #[test]
    fn missing_date_is_reported() {
        let err = blank(TxMeta::default(), TransactionType::Expense).unwrap_err();
        assert_eq!(
            err,
            EngineError::MissingField("transaction_date".to_string())
        );
    }

    #[test]
    fn mirrored_amount_is_negated_and_rounded() {
        let converter = CurrencyConverter::new([
            Currency::new("USD", dec!(1), 2),
            Currency::new("UAH", dec!(41.5), 2),
        ]);
        assert_eq!(
            mirrored(&converter, "UAH", "USD", dec!(-765.76)).unwrap(),
            dec!(18.45)
        );
    }
}
