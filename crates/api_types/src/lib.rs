use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error body returned with every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub mod account {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AccountKind {
        Asset,
        Liability,
        IncomeCategory,
        ExpenseCategory,
        Adjustment,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub name: String,
        pub currency: String,
        pub account_type: AccountKind,
        /// Comma separated card numbers, IBANs or virtual names.
        #[serde(default)]
        pub account_number: String,
        #[serde(default)]
        pub iban: String,
        #[serde(default)]
        pub note: String,
        pub display_order: Option<i32>,
        pub liability_percent: Option<Decimal>,
        #[serde(default)]
        pub is_default: bool,
        #[serde(default)]
        pub extra: BTreeMap<String, String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountsNew {
        pub accounts: Vec<AccountNew>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: i32,
        pub name: String,
        pub currency: String,
        pub account_type: AccountKind,
        pub current_balance: Decimal,
        pub account_number: String,
        pub iban: String,
        pub note: String,
        pub display_order: Option<i32>,
        pub liability_percent: Option<Decimal>,
        pub is_default: bool,
        pub extra: BTreeMap<String, String>,
        pub first_transaction_at: Option<DateTime<Utc>>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountsResponse {
        pub accounts: Vec<AccountView>,
    }
}

pub mod currency {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CurrencyView {
        pub id: String,
        /// Units of this currency per one unit of the base currency.
        pub rate: Decimal,
        pub decimal_places: i32,
        pub is_active: bool,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CurrencyNew {
        pub id: String,
        pub rate: Decimal,
        pub decimal_places: i32,
        #[serde(default = "active")]
        pub is_active: bool,
    }

    fn active() -> bool {
        true
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CurrenciesResponse {
        pub currencies: Vec<CurrencyView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Exchange {
        pub from: String,
        pub to: String,
        pub amount: Decimal,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExchangeResponse {
        pub amount: Decimal,
        pub currency: String,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        TransferBetweenAccounts,
        Expense,
        Income,
        Adjustment,
    }

    /// Fields shared by every create request.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct Details {
        /// RFC3339 timestamp, including timezone offset.
        pub transaction_date: Option<DateTime<FixedOffset>>,
        #[serde(default)]
        pub title: String,
        #[serde(default)]
        pub notes: String,
        #[serde(default)]
        pub tag_ids: Vec<i32>,
        pub category_id: Option<i32>,
        pub reference_number: Option<String>,
        pub internal_reference_number: Option<String>,
        #[serde(default)]
        pub extra: BTreeMap<String, String>,
    }

    /// A create request. Amounts are signed: source negative, destination
    /// positive.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum TransactionNew {
        Withdrawal {
            source_account_id: i32,
            source_amount: Decimal,
            source_currency: String,
            destination_account_id: Option<i32>,
            destination_amount: Option<Decimal>,
            destination_currency: Option<String>,
            fx_source_amount: Option<Decimal>,
            fx_source_currency: Option<String>,
            #[serde(flatten)]
            details: Details,
        },
        Deposit {
            destination_account_id: i32,
            destination_amount: Decimal,
            destination_currency: String,
            source_account_id: Option<i32>,
            source_amount: Option<Decimal>,
            source_currency: Option<String>,
            #[serde(flatten)]
            details: Details,
        },
        Transfer {
            source_account_id: i32,
            source_amount: Decimal,
            source_currency: String,
            destination_account_id: i32,
            destination_amount: Decimal,
            destination_currency: String,
            #[serde(flatten)]
            details: Details,
        },
        Adjustment {
            destination_account_id: i32,
            destination_amount: Decimal,
            destination_currency: String,
            #[serde(flatten)]
            details: Details,
        },
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionsNew {
        pub transactions: Vec<TransactionNew>,
        #[serde(default)]
        pub skip_rules: bool,
    }

    /// Query for listing transactions; `from` inclusive, `to` exclusive.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionList {
        pub from: Option<DateTime<FixedOffset>>,
        pub to: Option<DateTime<FixedOffset>>,
        pub account_id: Option<i32>,
        pub transaction_type: Option<TransactionKind>,
        pub limit: Option<u64>,
        pub offset: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: i64,
        pub transaction_type: TransactionKind,
        pub source_account_id: Option<i32>,
        pub destination_account_id: Option<i32>,
        pub source_currency: String,
        pub destination_currency: String,
        pub source_amount: Option<Decimal>,
        pub destination_amount: Option<Decimal>,
        pub fx_source_amount: Option<Decimal>,
        pub fx_source_currency: Option<String>,
        pub source_amount_in_base_currency: Option<Decimal>,
        pub destination_amount_in_base_currency: Option<Decimal>,
        pub transaction_date_time: DateTime<Utc>,
        pub transaction_date_only: NaiveDate,
        pub title: String,
        pub notes: String,
        pub tag_ids: Vec<i32>,
        pub category_id: Option<i32>,
        pub reference_number: Option<String>,
        pub internal_reference_number: Option<String>,
        pub extra: BTreeMap<String, String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionsResponse {
        pub transactions: Vec<TransactionView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DoubleEntryView {
        pub account_id: i32,
        pub is_debit: bool,
        pub amount_in_base_currency: Decimal,
        pub base_currency: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DoubleEntriesResponse {
        pub entries: Vec<DoubleEntryView>,
    }
}

pub mod rule {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleNew {
        pub title: String,
        pub script: String,
        #[serde(default)]
        pub sort_order: i32,
        #[serde(default)]
        pub group_name: String,
        #[serde(default = "enabled")]
        pub enabled: bool,
        #[serde(default)]
        pub is_final_rule: bool,
    }

    fn enabled() -> bool {
        true
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleView {
        pub id: i32,
        pub title: String,
        pub script: String,
        pub interpreter_type: String,
        pub sort_order: i32,
        pub group_name: String,
        pub enabled: bool,
        pub is_final_rule: bool,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RulesResponse {
        pub rules: Vec<RuleView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScheduleRuleNew {
        pub title: String,
        pub script: String,
        /// Five or six field cron expression.
        pub cron_expression: String,
        #[serde(default)]
        pub group_name: String,
        #[serde(default = "enabled")]
        pub enabled: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScheduleRuleView {
        pub id: i32,
        pub title: String,
        pub script: String,
        pub interpreter_type: String,
        pub cron_expression: String,
        pub group_name: String,
        pub enabled: bool,
        pub last_run_at: Option<DateTime<Utc>>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScheduleRulesResponse {
        pub rules: Vec<ScheduleRuleView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DryRun {
        pub script: String,
        /// Run against this stored transaction; an empty one otherwise.
        pub transaction_id: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DryRunResponse {
        pub before: transaction::TransactionView,
        pub after: transaction::TransactionView,
        pub modified: bool,
    }
}

pub mod import {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ImportTransactions {
        pub source: String,
        /// Base64 encoded files.
        pub content: Vec<String>,
        #[serde(default)]
        pub skip_rules: bool,
        #[serde(default)]
        pub tags: Vec<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportResponse {
        pub imported_count: usize,
        pub duplicate_count: usize,
        pub transactions: Vec<transaction::TransactionView>,
    }
}

pub mod maintenance {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RecalculateResponse {
        pub replayed: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FixDailyGapsResponse {
        pub accounts: usize,
    }
}

pub mod label {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LabelNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LabelView {
        pub id: i32,
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LabelsResponse {
        pub labels: Vec<LabelView>,
    }
}

pub mod stats {
    use super::*;

    /// Inclusive date range of balance snapshots for one account.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct StatsQuery {
        pub account_id: i32,
        pub from: NaiveDate,
        pub to: NaiveDate,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Snapshot {
        pub date: NaiveDate,
        pub amount: Decimal,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct StatsResponse {
        pub account_id: i32,
        pub snapshots: Vec<Snapshot>,
    }
}
