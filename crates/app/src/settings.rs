//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and overridden by `KOPILKA__*` environment
//! variables, e.g. `KOPILKA__SERVER__PORT=8080`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    /// Port of the `/health` endpoint; disabled when unset.
    pub ops_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct Currency {
    pub base_currency: String,
    pub exchange_rates_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

fn default_pg_port() -> u16 {
    5432
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
    Url(String),
    Postgres(Postgres),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
            Database::Url(url) => url.clone(),
            Database::Postgres(pg) => format!(
                "postgres://{}:{}@{}:{}/{}",
                pg.user, pg.password, pg.host, pg.port, pg.database
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Maintenance {
    pub gap_fix_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub currency: Currency,
    /// Defaults to `kopilka.db` in the working directory.
    pub database: Option<Database>,
    pub maintenance: Maintenance,
}

impl Settings {
    pub fn database_url(&self) -> String {
        match &self.database {
            Some(database) => database.url(),
            None => Database::Sqlite("kopilka.db".to_string()).url(),
        }
    }

    pub fn new() -> Result<Self, ConfigError> {
        Self::from_config(
            Config::builder()
                .add_source(File::with_name("settings").required(false))
                .add_source(
                    Environment::with_prefix("KOPILKA")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    fn from_config(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings = builder
            .set_default("app.level", "info")?
            .set_default("server.port", 3000)?
            .set_default("currency.base_currency", "USD")?
            .set_default("maintenance.gap_fix_interval_secs", 3600)?
            .build()?;

        settings.try_deserialize()
    }
}
