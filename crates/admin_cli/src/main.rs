use std::{error::Error, path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use engine::Engine;
use importers::ImportService;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "kopilka_admin")]
#[command(about = "Maintenance utilities for the kopilka ledger")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./kopilka.db?mode=rwc"
    )]
    database_url: String,

    /// Ledger base currency; must match the one the server runs with.
    #[arg(long, env = "KOPILKA__CURRENCY__BASE_CURRENCY", default_value = "USD")]
    base_currency: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay every transaction and rebuild entries and statistics.
    Recalculate,
    /// Fill missing daily and monthly snapshots up to today.
    FixGaps,
    /// Import statement files from one source.
    Import(ImportArgs),
    /// List accounts with their balances.
    Accounts,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[arg(long)]
    source: String,
    /// Tag added to every imported transaction; repeatable.
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long)]
    skip_rules: bool,
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

async fn connect_db(database_url: &str) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder()
        .database(db)
        .base_currency(&cli.base_currency)
        .build()
        .await?;
    engine.bootstrap().await?;

    match cli.command {
        Command::Recalculate => {
            let replayed = engine.recalculate_all().await?;
            println!("replayed {replayed} transactions");
        }
        Command::FixGaps => {
            let accounts = engine.fix_daily_gaps().await?;
            println!("fixed gaps of {accounts} accounts");
        }
        Command::Import(args) => {
            let mut payloads = Vec::with_capacity(args.files.len());
            for path in &args.files {
                match tokio::fs::read(path).await {
                    Ok(data) => payloads.push(data),
                    Err(err) => {
                        eprintln!("cannot read {}: {err}", path.display());
                        std::process::exit(2);
                    }
                }
            }
            let service = ImportService::new(Arc::new(engine))?;
            let summary = service
                .import_raw(&args.source, &payloads, args.skip_rules, &args.tags)
                .await?;
            println!(
                "imported {} transactions, skipped {} duplicates",
                summary.imported_count, summary.duplicate_count
            );
        }
        Command::Accounts => {
            for account in engine.list_accounts().await? {
                println!(
                    "{:>5}  {:<18}  {:<30}  {:>14} {}{}",
                    account.id,
                    account.account_type.as_str(),
                    account.name,
                    account.current_balance,
                    account.currency,
                    if account.is_default() { "  (default)" } else { "" }
                );
            }
        }
    }

    Ok(())
}
