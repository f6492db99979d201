//! Initial schema migration - creates the ledger tables from scratch.
//!
//! - `currencies`: ISO currencies with their rate against the base currency
//! - `accounts`: assets, liabilities, income/expense categories, adjustment
//! - `transactions`: business events, one row per transaction
//! - `double_entries`: debit/credit legs in the base currency
//! - `daily_stats` / `monthly_stats`: end-of-period balance snapshots
//! - `rules` / `schedule_rules`: user scripts
//! - `import_deduplications`: imported source keys
//! - `tags` / `categories`: transaction labels

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Currencies {
    Table,
    Id,
    Rate,
    IsActive,
    DecimalPlaces,
    UpdatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    Name,
    Currency,
    AccountType,
    CurrentBalance,
    Flags,
    Extra,
    Note,
    Iban,
    AccountNumber,
    LiabilityPercent,
    DisplayOrder,
    FirstTransactionAt,
    CreatedAt,
    LastUpdatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    TransactionType,
    SourceAccountId,
    DestinationAccountId,
    SourceCurrency,
    DestinationCurrency,
    SourceAmount,
    DestinationAmount,
    FxSourceAmount,
    FxSourceCurrency,
    SourceAmountInBaseCurrency,
    DestinationAmountInBaseCurrency,
    TransactionDateTime,
    TransactionDateOnly,
    Title,
    Notes,
    Extra,
    TagIds,
    CategoryId,
    ReferenceNumber,
    InternalReferenceNumber,
    Flags,
    VoidedByTransactionId,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum DoubleEntries {
    Table,
    Id,
    TransactionId,
    AccountId,
    IsDebit,
    AmountInBaseCurrency,
    BaseCurrency,
    CreatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum DailyStats {
    Table,
    AccountId,
    Date,
    Amount,
}

#[derive(Iden)]
enum MonthlyStats {
    Table,
    AccountId,
    Date,
    Balance,
}

#[derive(Iden)]
enum Rules {
    Table,
    Id,
    Title,
    Script,
    InterpreterType,
    SortOrder,
    GroupName,
    Enabled,
    IsFinalRule,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum ScheduleRules {
    Table,
    Id,
    Title,
    Script,
    InterpreterType,
    CronExpression,
    Enabled,
    GroupName,
    LastRunAt,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum ImportDeduplications {
    Table,
    ImportSource,
    Key,
    TransactionId,
    CreatedAt,
}

#[derive(Iden)]
enum Tags {
    Table,
    Id,
    Name,
    CreatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
    CreatedAt,
    DeletedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Currencies
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Currencies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Currencies::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Currencies::Rate).decimal().not_null())
                    .col(
                        ColumnDef::new(Currencies::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Currencies::DecimalPlaces)
                            .integer()
                            .not_null()
                            .default(2),
                    )
                    .col(
                        ColumnDef::new(Currencies::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Currencies::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Currency).string().not_null())
                    .col(ColumnDef::new(Accounts::AccountType).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::CurrentBalance)
                            .decimal()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::Flags)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::Extra)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(ColumnDef::new(Accounts::Note).text().not_null().default(""))
                    .col(ColumnDef::new(Accounts::Iban).string().not_null().default(""))
                    .col(
                        ColumnDef::new(Accounts::AccountNumber)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Accounts::LiabilityPercent).decimal())
                    .col(ColumnDef::new(Accounts::DisplayOrder).integer())
                    .col(ColumnDef::new(Accounts::FirstTransactionAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::LastUpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Accounts::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-account_type")
                    .table(Accounts::Table)
                    .col(Accounts::AccountType)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TransactionType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::SourceAccountId).integer())
                    .col(ColumnDef::new(Transactions::DestinationAccountId).integer())
                    .col(
                        ColumnDef::new(Transactions::SourceCurrency)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Transactions::DestinationCurrency)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Transactions::SourceAmount).decimal())
                    .col(ColumnDef::new(Transactions::DestinationAmount).decimal())
                    .col(ColumnDef::new(Transactions::FxSourceAmount).decimal())
                    .col(ColumnDef::new(Transactions::FxSourceCurrency).string())
                    .col(ColumnDef::new(Transactions::SourceAmountInBaseCurrency).decimal())
                    .col(ColumnDef::new(Transactions::DestinationAmountInBaseCurrency).decimal())
                    .col(
                        ColumnDef::new(Transactions::TransactionDateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TransactionDateOnly)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Title)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Transactions::Notes)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Transactions::Extra)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Transactions::TagIds)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Transactions::CategoryId).integer())
                    .col(ColumnDef::new(Transactions::ReferenceNumber).string())
                    .col(ColumnDef::new(Transactions::InternalReferenceNumber).string())
                    .col(
                        ColumnDef::new(Transactions::Flags)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Transactions::VoidedByTransactionId).big_integer())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-source_account_id")
                            .from(Transactions::Table, Transactions::SourceAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-destination_account_id")
                            .from(Transactions::Table, Transactions::DestinationAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-date_time")
                    .table(Transactions::Table)
                    .col(Transactions::TransactionDateTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-source_account_id-date")
                    .table(Transactions::Table)
                    .col(Transactions::SourceAccountId)
                    .col(Transactions::TransactionDateOnly)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-destination_account_id-date")
                    .table(Transactions::Table)
                    .col(Transactions::DestinationAccountId)
                    .col(Transactions::TransactionDateOnly)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Double entries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(DoubleEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DoubleEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DoubleEntries::TransactionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DoubleEntries::AccountId).integer().not_null())
                    .col(ColumnDef::new(DoubleEntries::IsDebit).boolean().not_null())
                    .col(
                        ColumnDef::new(DoubleEntries::AmountInBaseCurrency)
                            .decimal()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DoubleEntries::BaseCurrency)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DoubleEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DoubleEntries::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-double_entries-transaction_id")
                            .from(DoubleEntries::Table, DoubleEntries::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-double_entries-transaction_id")
                    .table(DoubleEntries::Table)
                    .col(DoubleEntries::TransactionId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Daily / monthly stats
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(DailyStats::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DailyStats::AccountId).integer().not_null())
                    .col(ColumnDef::new(DailyStats::Date).date().not_null())
                    .col(ColumnDef::new(DailyStats::Amount).decimal().not_null())
                    .primary_key(
                        Index::create()
                            .col(DailyStats::AccountId)
                            .col(DailyStats::Date),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonthlyStats::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MonthlyStats::AccountId).integer().not_null())
                    .col(ColumnDef::new(MonthlyStats::Date).date().not_null())
                    .col(ColumnDef::new(MonthlyStats::Balance).decimal().not_null())
                    .primary_key(
                        Index::create()
                            .col(MonthlyStats::AccountId)
                            .col(MonthlyStats::Date),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Rules
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Rules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rules::Title).string().not_null())
                    .col(ColumnDef::new(Rules::Script).text().not_null())
                    .col(ColumnDef::new(Rules::InterpreterType).string().not_null())
                    .col(
                        ColumnDef::new(Rules::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Rules::GroupName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Rules::Enabled).boolean().not_null())
                    .col(ColumnDef::new(Rules::IsFinalRule).boolean().not_null())
                    .col(
                        ColumnDef::new(Rules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Rules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Rules::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScheduleRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduleRules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScheduleRules::Title).string().not_null())
                    .col(ColumnDef::new(ScheduleRules::Script).text().not_null())
                    .col(
                        ColumnDef::new(ScheduleRules::InterpreterType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduleRules::CronExpression)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduleRules::Enabled).boolean().not_null())
                    .col(
                        ColumnDef::new(ScheduleRules::GroupName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(ScheduleRules::LastRunAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ScheduleRules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduleRules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduleRules::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Import deduplication
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ImportDeduplications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ImportDeduplications::ImportSource)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ImportDeduplications::Key).string().not_null())
                    .col(
                        ColumnDef::new(ImportDeduplications::TransactionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImportDeduplications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ImportDeduplications::ImportSource)
                            .col(ImportDeduplications::Key),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Tags and categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tags::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tags::Name).string().not_null())
                    .col(
                        ColumnDef::new(Tags::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Tags::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(
                        ColumnDef::new(Categories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Categories::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ImportDeduplications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScheduleRules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MonthlyStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DailyStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DoubleEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Currencies::Table).to_owned())
            .await?;
        Ok(())
    }
}
