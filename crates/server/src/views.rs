//! Mapping between engine types and wire types.

use api_types::{
    account::{AccountKind, AccountView},
    currency::CurrencyView,
    label::LabelView,
    rule::{RuleView, ScheduleRuleView},
    transaction::{DoubleEntryView, TransactionKind, TransactionView},
};
use engine::{
    Account, AccountType, Currency, DoubleEntry, Label, Rule, ScheduleRule, Transaction,
    TransactionType,
};

pub(crate) fn account_kind(kind: AccountType) -> AccountKind {
    match kind {
        AccountType::Asset => AccountKind::Asset,
        AccountType::Liability => AccountKind::Liability,
        AccountType::IncomeCategory => AccountKind::IncomeCategory,
        AccountType::ExpenseCategory => AccountKind::ExpenseCategory,
        AccountType::Adjustment => AccountKind::Adjustment,
    }
}

pub(crate) fn account_type(kind: AccountKind) -> AccountType {
    match kind {
        AccountKind::Asset => AccountType::Asset,
        AccountKind::Liability => AccountType::Liability,
        AccountKind::IncomeCategory => AccountType::IncomeCategory,
        AccountKind::ExpenseCategory => AccountType::ExpenseCategory,
        AccountKind::Adjustment => AccountType::Adjustment,
    }
}

pub(crate) fn transaction_kind(kind: TransactionType) -> TransactionKind {
    match kind {
        TransactionType::TransferBetweenAccounts => TransactionKind::TransferBetweenAccounts,
        TransactionType::Expense => TransactionKind::Expense,
        TransactionType::Income => TransactionKind::Income,
        TransactionType::Adjustment => TransactionKind::Adjustment,
    }
}

pub(crate) fn transaction_type(kind: TransactionKind) -> TransactionType {
    match kind {
        TransactionKind::TransferBetweenAccounts => TransactionType::TransferBetweenAccounts,
        TransactionKind::Expense => TransactionType::Expense,
        TransactionKind::Income => TransactionType::Income,
        TransactionKind::Adjustment => TransactionType::Adjustment,
    }
}

pub(crate) fn account(account: Account) -> AccountView {
    let is_default = account.is_default();
    AccountView {
        id: account.id,
        name: account.name,
        currency: account.currency,
        account_type: account_kind(account.account_type),
        current_balance: account.current_balance,
        account_number: account.account_number,
        iban: account.iban,
        note: account.note,
        display_order: account.display_order,
        liability_percent: account.liability_percent,
        is_default,
        extra: account.extra,
        first_transaction_at: account.first_transaction_at,
        created_at: account.created_at,
    }
}

pub(crate) fn transaction(tx: Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        transaction_type: transaction_kind(tx.transaction_type),
        source_account_id: tx.source_account_id,
        destination_account_id: tx.destination_account_id,
        source_currency: tx.source_currency,
        destination_currency: tx.destination_currency,
        source_amount: tx.source_amount,
        destination_amount: tx.destination_amount,
        fx_source_amount: tx.fx_source_amount,
        fx_source_currency: tx.fx_source_currency,
        source_amount_in_base_currency: tx.source_amount_in_base_currency,
        destination_amount_in_base_currency: tx.destination_amount_in_base_currency,
        transaction_date_time: tx.transaction_date_time,
        transaction_date_only: tx.transaction_date_only,
        title: tx.title,
        notes: tx.notes,
        tag_ids: tx.tag_ids.into_iter().collect(),
        category_id: tx.category_id,
        reference_number: tx.reference_number,
        internal_reference_number: tx.internal_reference_number,
        extra: tx.extra,
    }
}

pub(crate) fn double_entry(entry: DoubleEntry) -> DoubleEntryView {
    DoubleEntryView {
        account_id: entry.account_id,
        is_debit: entry.is_debit,
        amount_in_base_currency: entry.amount_in_base_currency,
        base_currency: entry.base_currency,
    }
}

pub(crate) fn currency(currency: Currency) -> CurrencyView {
    CurrencyView {
        id: currency.id,
        rate: currency.rate,
        decimal_places: currency.decimal_places,
        is_active: currency.is_active,
        updated_at: currency.updated_at,
    }
}

pub(crate) fn rule(rule: Rule) -> RuleView {
    RuleView {
        id: rule.id,
        title: rule.title,
        script: rule.script,
        interpreter_type: rule.interpreter_type.as_str().to_string(),
        sort_order: rule.sort_order,
        group_name: rule.group_name,
        enabled: rule.enabled,
        is_final_rule: rule.is_final_rule,
        updated_at: rule.updated_at,
    }
}

pub(crate) fn schedule_rule(rule: ScheduleRule) -> ScheduleRuleView {
    ScheduleRuleView {
        id: rule.id,
        title: rule.title,
        script: rule.script,
        interpreter_type: rule.interpreter_type.as_str().to_string(),
        cron_expression: rule.cron_expression,
        group_name: rule.group_name,
        enabled: rule.enabled,
        last_run_at: rule.last_run_at,
        updated_at: rule.updated_at,
    }
}

pub(crate) fn label(label: Label) -> LabelView {
    LabelView {
        id: label.id,
        name: label.name,
    }
}
