use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, EntityTrait, QueryFilter,
};

use engine::{
    Account, AccountType, AdjustmentCmd, DepositCmd, Engine, EngineError, ExchangeRateRow, Rule,
    RuleScheduler, ScheduleRule, TransactionListFilter, TransactionType, TransferCmd, TxMeta,
    WithdrawalCmd, daily_stats, schedule_rules,
};
use migration::MigratorTrait;

fn rate(code: &str, rate: Decimal) -> ExchangeRateRow {
    ExchangeRateRow {
        id: code.to_string(),
        rate,
        decimal_places: 2,
        is_active: true,
    }
}

async fn engine() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .base_currency("USD")
        .build()
        .await
        .unwrap();
    engine.bootstrap().await.unwrap();
    engine
        .upsert_exchange_rates(vec![rate("UAH", dec!(41.5)), rate("PLN", dec!(4))])
        .await
        .unwrap();
    engine
}

async fn asset(engine: &Engine, name: &str, currency: &str) -> Account {
    engine
        .create_account(Account::new(name, currency, AccountType::Asset))
        .await
        .unwrap()
}

async fn default_of(engine: &Engine, kind: AccountType) -> Account {
    engine
        .list_accounts()
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.account_type == kind && a.is_default())
        .unwrap()
}

async fn deposit(engine: &Engine, account: &Account, amount: Decimal, days_ago: i64) {
    let at = Utc::now() - Duration::days(days_ago);
    engine
        .create_transaction(
            DepositCmd::new(account.id, amount, &account.currency, TxMeta::new(at)).into(),
        )
        .await
        .unwrap();
}

async fn spend(engine: &Engine, account: &Account, amount: Decimal, days_ago: i64) {
    let at = Utc::now() - Duration::days(days_ago);
    engine
        .create_transaction(
            WithdrawalCmd::new(account.id, amount, &account.currency, TxMeta::new(at)).into(),
        )
        .await
        .unwrap();
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn days_ago(n: i64) -> NaiveDate {
    today() - Duration::days(n)
}

async fn day_balance(engine: &Engine, account_id: i32, date: NaiveDate) -> Decimal {
    let rows = engine.daily_stats(account_id, date, date).await.unwrap();
    assert_eq!(rows.len(), 1, "missing daily stat for {date}");
    rows[0].1
}

#[tokio::test]
async fn bootstrap_creates_defaults_once() {
    let engine = engine().await;
    engine.bootstrap().await.unwrap();

    let accounts = engine.list_accounts().await.unwrap();
    assert_eq!(accounts.len(), 5);
    for kind in AccountType::ALL {
        assert_eq!(
            accounts
                .iter()
                .filter(|a| a.account_type == kind && a.is_default())
                .count(),
            1
        );
    }
    let base = engine.currency("usd").await.unwrap();
    assert_eq!(base.rate, dec!(1));
}

#[tokio::test]
async fn default_accounts_cannot_be_deleted_or_duplicated() {
    let engine = engine().await;
    let cash = default_of(&engine, AccountType::Asset).await;

    let err = engine.delete_account(cash.id).await.unwrap_err();
    assert!(matches!(err, EngineError::BusinessRule(_)));

    let err = engine
        .create_account(Account::new("Second cash", "USD", AccountType::Asset).default_for_type())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn simple_same_currency_expense() {
    let engine = engine().await;
    let wallet = asset(&engine, "Wallet", "USD").await;
    let expense = default_of(&engine, AccountType::ExpenseCategory).await;

    let tx = engine
        .create_transaction(
            WithdrawalCmd::new(wallet.id, dec!(-10.00), "USD", TxMeta::new(Utc::now()).title("Lunch"))
                .into(),
        )
        .await
        .unwrap();

    assert_eq!(tx.destination_account_id, Some(expense.id));
    assert_eq!(tx.destination_amount, Some(dec!(10)));
    assert_eq!(engine.list_transactions(&TransactionListFilter::default()).await.unwrap().len(), 1);

    let entries = engine.double_entries(tx.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    let credit = entries.iter().find(|e| e.account_id == wallet.id).unwrap();
    let debit = entries.iter().find(|e| e.account_id == expense.id).unwrap();
    assert!(!credit.is_debit);
    assert!(debit.is_debit);
    assert_eq!(credit.amount_in_base_currency, dec!(10));
    assert_eq!(debit.amount_in_base_currency, dec!(10));

    assert_eq!(day_balance(&engine, wallet.id, today()).await, dec!(-10));
    assert_eq!(
        engine.account(wallet.id).await.unwrap().current_balance,
        dec!(-10)
    );
}

#[tokio::test]
async fn multi_currency_withdrawal_with_fx() {
    let engine = engine().await;
    let card = asset(&engine, "Card", "UAH").await;

    let tx = engine
        .create_transaction(
            WithdrawalCmd::new(card.id, dec!(-765.76), "UAH", TxMeta::new(Utc::now()))
                .fx(dec!(-67.54), "PLN")
                .into(),
        )
        .await
        .unwrap();

    assert_eq!(tx.fx_source_currency.as_deref(), Some("PLN"));
    assert_eq!(tx.destination_currency, "USD");
    assert_eq!(tx.destination_amount, Some(dec!(18.45)));
    assert_eq!(tx.destination_amount_in_base_currency, Some(dec!(18.45)));
    assert_eq!(tx.source_amount_in_base_currency, Some(dec!(-18.45)));

    let entries = engine.double_entries(tx.id).await.unwrap();
    let debits: Decimal = entries
        .iter()
        .filter(|e| e.is_debit)
        .map(|e| e.amount_in_base_currency)
        .sum();
    let credits: Decimal = entries
        .iter()
        .filter(|e| !e.is_debit)
        .map(|e| e.amount_in_base_currency)
        .sum();
    assert_eq!(debits, credits);
    assert_eq!(
        engine.account(card.id).await.unwrap().current_balance,
        dec!(-765.76)
    );
}

#[tokio::test]
async fn transfer_between_currencies() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    let b = asset(&engine, "B", "PLN").await;
    deposit(&engine, &a, dec!(500), 0).await;

    let tx = engine
        .create_transaction(
            TransferCmd::new(
                (a.id, dec!(-120), "USD"),
                (b.id, dec!(480), "PLN"),
                TxMeta::new(Utc::now()),
            )
            .into(),
        )
        .await
        .unwrap();

    assert_eq!(engine.account(a.id).await.unwrap().current_balance, dec!(380));
    assert_eq!(engine.account(b.id).await.unwrap().current_balance, dec!(480));
    assert_eq!(day_balance(&engine, a.id, today()).await, dec!(380));
    assert_eq!(day_balance(&engine, b.id, today()).await, dec!(480));

    let entries = engine.double_entries(tx.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0].amount_in_base_currency,
        entries[1].amount_in_base_currency
    );
    assert_eq!(entries[0].amount_in_base_currency, dec!(120));
}

#[tokio::test]
async fn same_currency_transfer_with_unequal_sides_is_rejected() {
    let engine = engine().await;
    for currency in ["USD", "PLN"] {
        let a = asset(&engine, &format!("A {currency}"), currency).await;
        let b = asset(&engine, &format!("B {currency}"), currency).await;
        deposit(&engine, &a, dec!(50), 0).await;

        let err = engine
            .create_transaction(
                TransferCmd::new(
                    (a.id, dec!(-10), currency),
                    (b.id, dec!(9), currency),
                    TxMeta::new(Utc::now()),
                )
                .into(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::BusinessRule(_)), "{currency}: {err:?}");
        assert_eq!(engine.account(a.id).await.unwrap().current_balance, dec!(50));
        assert_eq!(engine.account(b.id).await.unwrap().current_balance, dec!(0));
    }
}

#[tokio::test]
async fn back_dated_transaction_updates_later_snapshots() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    deposit(&engine, &a, dec!(100), 3).await;
    deposit(&engine, &a, dec!(5), 1).await;
    spend(&engine, &a, dec!(-5), 1).await;
    assert_eq!(day_balance(&engine, a.id, days_ago(1)).await, dec!(100));

    spend(&engine, &a, dec!(-10), 2).await;

    assert_eq!(day_balance(&engine, a.id, days_ago(3)).await, dec!(100));
    assert_eq!(day_balance(&engine, a.id, days_ago(2)).await, dec!(90));
    assert_eq!(day_balance(&engine, a.id, days_ago(1)).await, dec!(90));
    assert_eq!(day_balance(&engine, a.id, today()).await, dec!(90));
}

#[tokio::test]
async fn new_write_fills_days_missing_since_the_last_snapshot() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    deposit(&engine, &a, dec!(100), 10).await;

    // Days that passed without writes have no rows yet.
    daily_stats::Entity::delete_many()
        .filter(daily_stats::Column::AccountId.eq(a.id))
        .filter(daily_stats::Column::Date.gt(days_ago(10)))
        .exec(engine.database())
        .await
        .unwrap();
    let renamed = Account {
        name: "A renamed".to_string(),
        ..engine.account(a.id).await.unwrap()
    };
    engine.update_account(renamed).await.unwrap();

    spend(&engine, &a, dec!(-30), 0).await;

    assert_eq!(day_balance(&engine, a.id, days_ago(9)).await, dec!(100));
    assert_eq!(day_balance(&engine, a.id, days_ago(1)).await, dec!(100));
    assert_eq!(day_balance(&engine, a.id, today()).await, dec!(70));
}

#[tokio::test]
async fn every_day_since_first_transaction_has_a_snapshot() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    deposit(&engine, &a, dec!(40), 6).await;
    spend(&engine, &a, dec!(-15), 2).await;

    let rows = engine.daily_stats(a.id, days_ago(10), today()).await.unwrap();
    assert_eq!(rows.len(), 7);
    assert_eq!(rows.first().unwrap(), &(days_ago(6), dec!(40)));
    assert_eq!(rows.last().unwrap(), &(today(), dec!(25)));
}

#[tokio::test]
async fn expense_with_positive_source_is_rejected() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;

    let err = engine
        .create_transaction(WithdrawalCmd::new(a.id, dec!(10), "USD", TxMeta::new(Utc::now())).into())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::BusinessRule(
            "source_amount must be negative for TRANSACTION_TYPE_EXPENSE".to_string()
        )
    );
}

#[tokio::test]
async fn currency_mismatch_is_rejected() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;

    let err = engine
        .create_transaction(
            WithdrawalCmd::new(a.id, dec!(-10), "UAH", TxMeta::new(Utc::now())).into(),
        )
        .await
        .unwrap_err();

    match err {
        EngineError::BusinessRule(message) => {
            assert!(message.contains("has currency USD, expected UAH"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_transaction_date_is_reported() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;

    let err = engine
        .create_transaction(WithdrawalCmd::new(a.id, dec!(-1), "USD", TxMeta::default()).into())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::MissingField("transaction_date".to_string())
    );
}

#[tokio::test]
async fn adjustment_is_balanced_against_default_adjustment_account() {
    let engine = engine().await;
    let a = asset(&engine, "A", "PLN").await;
    let adjustment = default_of(&engine, AccountType::Adjustment).await;

    let tx = engine
        .create_transaction(
            AdjustmentCmd::new(a.id, dec!(-10), "PLN", TxMeta::new(Utc::now())).into(),
        )
        .await
        .unwrap();

    assert_eq!(tx.source_account_id, Some(adjustment.id));
    assert_eq!(tx.source_amount, Some(dec!(2.50)));
    assert_eq!(engine.account(a.id).await.unwrap().current_balance, dec!(-10));
    assert_eq!(
        engine.account(adjustment.id).await.unwrap().current_balance,
        dec!(2.5)
    );
}

#[tokio::test]
async fn failing_rule_rolls_back_the_write() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    engine
        .create_rule(Rule::new("boom", "throw new Error('nope');"))
        .await
        .unwrap();

    let err = engine
        .create_transaction(
            WithdrawalCmd::new(a.id, dec!(-10), "USD", TxMeta::new(Utc::now())).into(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Script(_)));
    assert!(engine
        .list_transactions(&TransactionListFilter::default())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(engine.account(a.id).await.unwrap().current_balance, dec!(0));
}

#[tokio::test]
async fn rules_rewrite_before_storage() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    let tag = engine.create_tag("coffee").await.unwrap();
    engine
        .create_rule(Rule::new(
            "coffee",
            &format!(
                "if (tx.title.indexOf('Starbucks') >= 0) {{ tx.title = 'Coffee'; tx.addTag({}); }}",
                tag.id
            ),
        ))
        .await
        .unwrap();

    let tx = engine
        .create_transaction(
            WithdrawalCmd::new(a.id, dec!(-4.5), "USD", TxMeta::new(Utc::now()).title("Starbucks #12"))
                .into(),
        )
        .await
        .unwrap();

    assert_eq!(tx.title, "Coffee");
    assert!(tx.tag_ids.contains(&tag.id));
    let stored = engine.transaction(tx.id).await.unwrap();
    assert_eq!(stored.title, "Coffee");
}

#[tokio::test]
async fn rule_that_breaks_the_shape_is_rejected() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    engine
        .create_rule(Rule::new("flip", "tx.destinationCurrency = 'PLN';"))
        .await
        .unwrap();

    let err = engine
        .create_transaction(
            WithdrawalCmd::new(a.id, dec!(-1), "USD", TxMeta::new(Utc::now())).into(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BusinessRule(_)));
}

#[tokio::test]
async fn dry_run_reports_without_storing() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    spend(&engine, &a, dec!(-3), 0).await;
    let stored = engine
        .list_transactions(&TransactionListFilter::default())
        .await
        .unwrap()
        .remove(0);

    let result = engine
        .dry_run_rule("tx.notes = 'checked';", Some(stored.id))
        .await
        .unwrap();

    assert!(result.modified);
    assert_eq!(result.after.notes, "checked");
    assert_eq!(result.before, stored);
    assert_eq!(engine.transaction(stored.id).await.unwrap().notes, "");
}

type Snapshot = (
    Vec<(i64, i32, bool, Decimal)>,
    Vec<(i32, Decimal)>,
    Vec<Vec<(NaiveDate, Decimal)>>,
    Vec<Vec<(NaiveDate, Decimal)>>,
);

async fn snapshot(engine: &Engine) -> Snapshot {
    let txs = engine
        .list_transactions(&TransactionListFilter::default())
        .await
        .unwrap();
    let mut entries = Vec::new();
    for tx in &txs {
        for e in engine.double_entries(tx.id).await.unwrap() {
            entries.push((e.transaction_id, e.account_id, e.is_debit, e.amount_in_base_currency));
        }
    }
    let mut balances = Vec::new();
    let mut daily = Vec::new();
    let mut monthly = Vec::new();
    for account in engine.list_accounts().await.unwrap() {
        balances.push((account.id, account.current_balance));
        daily.push(engine.daily_stats(account.id, days_ago(40), today()).await.unwrap());
        monthly.push(engine.monthly_stats(account.id, days_ago(40), today()).await.unwrap());
    }
    (entries, balances, daily, monthly)
}

#[tokio::test]
async fn recalculate_is_idempotent() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    let b = asset(&engine, "B", "UAH").await;
    deposit(&engine, &a, dec!(100), 5).await;
    spend(&engine, &a, dec!(-12.34), 3).await;
    spend(&engine, &b, dec!(-765.76), 2).await;
    engine
        .create_transaction(
            TransferCmd::new(
                (a.id, dec!(-10), "USD"),
                (b.id, dec!(415), "UAH"),
                TxMeta::new(Utc::now() - Duration::days(1)),
            )
            .into(),
        )
        .await
        .unwrap();

    let before = snapshot(&engine).await;
    assert_eq!(engine.recalculate_all().await.unwrap(), 4);
    let first = snapshot(&engine).await;
    engine.recalculate_all().await.unwrap();
    let second = snapshot(&engine).await;

    assert_eq!(first, second);
    assert_eq!(before.0, first.0);
    assert_eq!(before.1, first.1);
    assert_eq!(engine.account(a.id).await.unwrap().current_balance, dec!(77.66));
}

#[tokio::test]
async fn storage_failure_names_the_operation() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    deposit(&engine, &a, dec!(10), 0).await;
    engine
        .database()
        .execute_unprepared("DROP TABLE daily_stats")
        .await
        .unwrap();

    let err = engine.recalculate_all().await.unwrap_err();

    let EngineError::Internal(message) = err else {
        panic!("expected internal error, got {err:?}");
    };
    assert!(message.starts_with("recalculate_all: "), "{message}");
}

#[tokio::test]
async fn fix_daily_gaps_fills_accounts_without_transactions() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;

    engine.fix_daily_gaps().await.unwrap();

    assert_eq!(day_balance(&engine, a.id, today()).await, dec!(0));
}

#[tokio::test]
async fn exchange_rounds_to_target_currency() {
    let engine = engine().await;
    assert_eq!(
        engine.exchange("UAH", "USD", dec!(100)).await.unwrap(),
        dec!(2.41)
    );
    let err = engine.delete_currency("USD").await.unwrap_err();
    assert!(matches!(err, EngineError::BusinessRule(_)));
}

#[tokio::test]
async fn scheduled_rule_writes_a_transaction() {
    let engine = engine().await;
    let a = asset(&engine, "A", "USD").await;
    let rent = default_of(&engine, AccountType::ExpenseCategory).await;
    let rule = engine
        .create_schedule_rule(ScheduleRule::new(
            "rent",
            &format!(
                "tx.transactionType = 'expense';
                 tx.title = 'Rent';
                 tx.sourceAccountId = {};
                 tx.sourceCurrency = 'USD';
                 tx.sourceAmount = 700;
                 tx.destinationAccountId = {};
                 tx.destinationCurrency = 'USD';
                 tx.destinationAmount = 700;",
                a.id, rent.id
            ),
            "0 9 1 * *",
        ))
        .await
        .unwrap();

    let tx = engine.run_schedule_rule(&rule).await.unwrap();

    let stored = engine.transaction(tx.id).await.unwrap();
    assert_eq!(stored.transaction_type, TransactionType::Expense);
    assert_eq!(stored.title, "Rent");
    assert_eq!(stored.source_amount, Some(dec!(-700)));
    assert_eq!(stored.destination_account_id, Some(rent.id));
    assert_eq!(engine.double_entries(tx.id).await.unwrap().len(), 2);
    assert_eq!(engine.account(a.id).await.unwrap().current_balance, dec!(-700));
    assert!(engine.schedule_rule(rule.id).await.unwrap().last_run_at.is_some());
}

#[tokio::test]
async fn scheduled_rule_with_incomplete_transaction_stores_nothing() {
    let engine = engine().await;
    let rule = engine
        .create_schedule_rule(ScheduleRule::new("half", "tx.title = 'Half';", "0 9 * * *"))
        .await
        .unwrap();

    let err = engine.run_schedule_rule(&rule).await.unwrap_err();

    assert!(matches!(err, EngineError::BusinessRule(_)), "{err:?}");
    assert!(engine.schedule_rule(rule.id).await.unwrap().last_run_at.is_none());
    assert!(engine
        .list_transactions(&TransactionListFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn scheduler_runs_only_enabled_valid_rules() {
    let engine = Arc::new(engine().await);
    engine
        .create_schedule_rule(ScheduleRule::new("on", "tx.title = 'x';", "0 0 1 1 *"))
        .await
        .unwrap();
    let mut off = ScheduleRule::new("off", "tx.title = 'x';", "0 0 1 1 *");
    off.enabled = false;
    engine.create_schedule_rule(off).await.unwrap();
    // Stored directly: the engine refuses to save a bad expression.
    schedule_rules::ActiveModel::from(&ScheduleRule::new("bad", "tx.title = 'x';", "whenever"))
        .insert(engine.database())
        .await
        .unwrap();

    let scheduler = RuleScheduler::new(Arc::clone(&engine));
    assert_eq!(scheduler.reinit().await.unwrap(), 1);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn scheduled_rule_is_refused_after_shutdown() {
    let engine = engine().await;
    let rule = engine
        .create_schedule_rule(ScheduleRule::new("late", "tx.title = 'x';", "0 9 * * *"))
        .await
        .unwrap();
    engine.shutdown();
    assert_eq!(
        engine.run_schedule_rule(&rule).await.unwrap_err(),
        EngineError::Cancelled
    );
}
