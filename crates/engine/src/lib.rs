//! Multi-currency double-entry ledger.
//!
//! The [`Engine`] owns the write path: request mapping, validation, rules,
//! persistence, base-currency normalization, double-entry posting and balance
//! snapshots, all inside one database transaction per call.

pub use accounts::{Account, AccountType};
pub use commands::{
    AdjustmentCmd, CreateTransactionRequest, DepositCmd, TransactionListFilter, TransferCmd,
    TxMeta, WithdrawalCmd,
};
pub use currency::{Currency, CurrencyConverter, ExchangeRateRow};
pub use double_entries::DoubleEntry;
pub use error::EngineError;
pub use executor::{Execution, RuleExecutor};
pub use ops::{
    DryRunResult, Engine, EngineBuilder, ImportBatch, ImportItem, ImportSummary,
};
pub use rules::{InterpreterType, Rule};
pub use schedule_rules::{ScheduleRule, parse_cron};
pub use scheduler::RuleScheduler;
pub use script::{JsInterpreter, ScriptRunner};
pub use tags::Label;
pub use transactions::{Transaction, TransactionType};

pub mod accounts;
pub mod base_amounts;
mod cache;
pub mod categories;
mod commands;
pub mod currency;
pub mod daily_stats;
pub mod double_entries;
mod error;
mod executor;
pub mod import_deduplications;
pub mod money;
pub mod monthly_stats;
mod ops;
pub mod rules;
pub mod schedule_rules;
mod scheduler;
mod script;
pub mod tags;
pub mod transactions;
pub mod validation;

type ResultEngine<T> = Result<T, EngineError>;
