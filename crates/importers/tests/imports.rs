use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::Database;

use engine::{
    Account, AccountType, Engine, ExchangeRateRow, TransactionListFilter, TransactionType,
};
use importers::{ImportError, ImportRequest, ImportService, monobank};
use migration::MigratorTrait;

async fn engine() -> Arc<Engine> {
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
        .upsert_exchange_rates(vec![ExchangeRateRow {
            id: "UAH".to_string(),
            rate: dec!(41.5),
            decimal_places: 2,
            is_active: true,
        }])
        .await
        .unwrap();
    Arc::new(engine)
}

async fn account(
    engine: &Engine,
    name: &str,
    currency: &str,
    kind: AccountType,
    numbers: &str,
) -> Account {
    engine
        .create_account(Account::new(name, currency, kind).account_number(numbers))
        .await
        .unwrap()
}

fn request(source: &str, payload: &str) -> ImportRequest {
    ImportRequest {
        source: source.to_string(),
        content: vec![STANDARD.encode(payload)],
        skip_rules: false,
        tags: Vec::new(),
    }
}

async fn balance(engine: &Engine, id: i32) -> Decimal {
    engine.account(id).await.unwrap().current_balance
}

const PRIVAT_EXPORT: &str = "PrivatBank, [1/15/2024 10:41 PM]\n\
    1100.00USD Переказ зі своєї карти\n\
    4*59 22:40\n\
    Бал. 1.21USD\n\
    \n\
    1100.00USD Зарахування переказу на картку\n\
    4*71 22:40\n\
    Бал. 1.60USD\n";

#[tokio::test]
async fn privat24_own_card_messages_import_as_one_transfer() {
    let engine = engine().await;
    let from = account(&engine, "Universal", "USD", AccountType::Asset, "4*59").await;
    let to = account(&engine, "Savings card", "USD", AccountType::Asset, "4*71").await;
    let service = ImportService::new(Arc::clone(&engine)).unwrap();

    let summary = service
        .import(request("privat24", PRIVAT_EXPORT))
        .await
        .unwrap();
    assert_eq!(summary.imported_count, 1);
    let stored = engine
        .list_transactions(&TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].transaction_type,
        TransactionType::TransferBetweenAccounts
    );
    assert_eq!(stored[0].source_account_id, Some(from.id));
    assert_eq!(stored[0].destination_account_id, Some(to.id));
    assert_eq!(balance(&engine, from.id).await, dec!(-1100));
    assert_eq!(balance(&engine, to.id).await, dec!(1100));

    let again = service
        .import(request("privat24", PRIVAT_EXPORT))
        .await
        .unwrap();
    assert_eq!(again.imported_count, 0);
    assert_eq!(again.duplicate_count, 1);
}

fn firefly_export() -> String {
    let mut csv = String::from(
        "user_id,group_id,journal_id,created_at,updated_at,group_title,type,currency_code,amount,foreign_currency_code,foreign_amount,primary_currency_code,description,date,source_name,source_iban,source_type,destination_name,destination_iban,destination_type,reconciled,category,budget,bill,tags,notes\n",
    );
    // Newest first, as Firefly writes it.
    for journal in (1..=10).rev() {
        let line = if journal % 2 == 0 {
            format!(
                "1,{journal},{journal},,,,Withdrawal,USD,-{journal}.25,,,USD,Shop {journal},2024-03-{journal:02}T12:00:00+00:00,Checking,,Asset account,Groceries,,Expense account,false,,,,,\n"
            )
        } else {
            format!(
                "1,{journal},{journal},,,,Deposit,USD,{journal}00.00,,,USD,Pay {journal},2024-03-{journal:02}T09:00:00+00:00,Employer,,Revenue account,Checking,,Asset account,false,,,,,\n"
            )
        };
        csv.push_str(&line);
    }
    csv
}

#[tokio::test]
async fn firefly_import_is_idempotent() {
    let engine = engine().await;
    let checking = account(&engine, "Checking", "USD", AccountType::Asset, "").await;
    account(&engine, "Groceries", "USD", AccountType::ExpenseCategory, "").await;
    account(&engine, "Employer", "USD", AccountType::IncomeCategory, "").await;
    let service = ImportService::new(Arc::clone(&engine)).unwrap();
    let export = firefly_export();

    let first = service.import(request("firefly", &export)).await.unwrap();
    assert_eq!(first.imported_count, 10);
    assert_eq!(first.duplicate_count, 0);
    // 100 + 300 + 500 + 700 + 900 in, 2.25 + 4.25 + 6.25 + 8.25 + 10.25 out.
    assert_eq!(balance(&engine, checking.id).await, dec!(2468.75));

    let second = service.import(request("firefly", &export)).await.unwrap();
    assert_eq!(second.imported_count, 0);
    assert_eq!(second.duplicate_count, 10);
    let stored = engine
        .list_transactions(&TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 10);
    assert_eq!(balance(&engine, checking.id).await, dec!(2468.75));
}

#[tokio::test]
async fn failed_parse_stores_nothing() {
    let engine = engine().await;
    account(&engine, "Checking", "USD", AccountType::Asset, "").await;
    let service = ImportService::new(Arc::clone(&engine)).unwrap();
    // Groceries does not exist.
    let err = service
        .import(request("firefly", &firefly_export()))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Row { .. }));
    assert!(
        engine
            .list_transactions(&TransactionListFilter::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn monobank_import_applies_batch_tags() {
    let engine = engine().await;
    let card = account(
        &engine,
        "Mono black",
        "UAH",
        AccountType::Asset,
        monobank::CARD_IDENTIFIER,
    )
    .await;
    let service = ImportService::new(Arc::clone(&engine)).unwrap();
    let statement = "Дата i час операції,Деталі операції,MCC,Сума в валюті картки (UAH),Сума в валюті операції,Валюта,Курс,Сума комісій (UAH),Сума кешбеку (UAH),Залишок після операції\n\
        15.01.2024 12:30:00,Сільпо,5411,-245.60,-245.60,UAH,—,0.00,0.00,10254.40\n";
    let mut import = request("monobank", statement);
    import.tags = vec!["groceries".to_string()];

    let summary = service.import(import).await.unwrap();
    assert_eq!(summary.imported_count, 1);
    let tx = &summary.transactions[0];
    assert_eq!(tx.source_account_id, Some(card.id));
    assert_eq!(tx.destination_amount, Some(dec!(5.92)));
    let tag = engine
        .list_tags()
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.name == "groceries")
        .unwrap();
    assert!(tx.tag_ids.contains(&tag.id));
}

#[tokio::test]
async fn monobank_foreign_spending_goes_to_the_currency_account() {
    let engine = engine().await;
    let card = account(
        &engine,
        "Mono black",
        "UAH",
        AccountType::Asset,
        monobank::CARD_IDENTIFIER,
    )
    .await;
    let subscriptions = account(
        &engine,
        "Subscriptions",
        "USD",
        AccountType::ExpenseCategory,
        "expense_USD",
    )
    .await;
    let service = ImportService::new(Arc::clone(&engine)).unwrap();
    let statement = "Дата i час операції,Деталі операції,MCC,Сума в валюті картки (UAH),Сума в валюті операції,Валюта,Курс,Сума комісій (UAH),Сума кешбеку (UAH),Залишок після операції\n\
        16.01.2024 08:00:00,Netflix,4899,-420.50,-10.99,USD,38.26,0.00,0.00,9833.90\n";

    let summary = service.import(request("monobank", statement)).await.unwrap();

    let tx = &summary.transactions[0];
    assert_eq!(tx.source_account_id, Some(card.id));
    assert_eq!(tx.destination_account_id, Some(subscriptions.id));
    assert_eq!(tx.destination_amount, Some(dec!(10.99)));
    assert_eq!(balance(&engine, subscriptions.id).await, dec!(10.99));
}

#[tokio::test]
async fn unknown_source_is_rejected() {
    let engine = engine().await;
    let service = ImportService::new(engine).unwrap();
    let err = service.import(request("mt940", "")).await.unwrap_err();
    assert!(matches!(err, ImportError::UnknownSource(_)));
}

#[tokio::test]
async fn bad_base64_is_rejected() {
    let engine = engine().await;
    let service = ImportService::new(engine).unwrap();
    let mut import = request("revolut", "");
    import.content = vec!["not base64!".to_string()];
    let err = service.import(import).await.unwrap_err();
    assert!(matches!(err, ImportError::Base64(_)));
}
