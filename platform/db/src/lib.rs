//! Database connection settings and the shared connect helper.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Shared connection handle. sea-orm pools internally.
pub type DbPool = DatabaseConnection;

const DEFAULT_URL_KEY: &str = "DATABASE_URL";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (set {0})")]
    MissingUrl(String),
    #[error("failed to connect: {0}")]
    Connect(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
    #[serde(default)]
    log_statements: bool,
}

fn default_url_key() -> String {
    DEFAULT_URL_KEY.to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            env_key: default_url_key(),
            url: None,
            max_connections: default_max_connections(),
            log_statements: false,
        }
    }
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            ..Self::default()
        }
    }

    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_LOG_STATEMENTS`. A missing url surfaces as
    /// [`DbError::MissingUrl`] when connecting.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        settings.url = lookup(&settings.env_key).filter(|url| !url.trim().is_empty());
        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            match raw.trim().parse() {
                Ok(parsed) => settings.max_connections = parsed,
                Err(_) => warn!(value = %raw, "ignoring invalid DATABASE_MAX_CONNECTIONS"),
            }
        }
        settings.log_statements = lookup("DATABASE_LOG_STATEMENTS")
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        settings
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Explicit url wins over the environment.
    pub fn database_url(&self) -> DbResult<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl(self.env_key.clone()))
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(settings.max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(settings.log_statements);
    debug!(max_connections = settings.max_connections, "connecting to database");
    let pool = Database::connect(options).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_wins() {
        let settings = DatabaseSettings::new("PIPELINE_TEST_UNSET_URL").with_url("sqlite::memory:");
        assert_eq!(settings.database_url().unwrap(), "sqlite::memory:");
    }

    #[test]
    fn env_settings_have_no_built_in_url() {
        let unset = DatabaseSettings::from_lookup(|_| None);
        assert!(unset.url.is_none());
        assert_eq!(unset.max_connections(), 10);

        let set = DatabaseSettings::from_lookup(|key| match key {
            "DATABASE_URL" => Some("sqlite::memory:".into()),
            "DATABASE_MAX_CONNECTIONS" => Some(" 3 ".into()),
            _ => None,
        });
        assert_eq!(set.database_url().unwrap(), "sqlite::memory:");
        assert_eq!(set.max_connections(), 3);
    }

    #[test]
    fn missing_url_names_the_env_key() {
        let settings = DatabaseSettings::new("PIPELINE_TEST_UNSET_URL");
        let err = settings.database_url().unwrap_err();
        assert!(err.to_string().contains("PIPELINE_TEST_UNSET_URL"));
    }

    #[tokio::test]
    async fn connects_to_in_memory_sqlite() {
        let settings = DatabaseSettings::default()
            .with_url("sqlite::memory:")
            .with_max_connections(1);
        let pool = connect(&settings).await.unwrap();
        pool.ping().await.unwrap();
    }
}
