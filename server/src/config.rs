use std::net::SocketAddr;

use anyhow::{Context, Result};
use products_crm::board::DEFAULT_STUCK_AFTER_DAYS;

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_FORECAST_MONTHS: u32 = 6;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub cors_allowed_origins: Vec<String>,
    pub pipeline: PipelineSettings,
}

/// Defaults applied when a GraphQL caller leaves the matching argument out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    pub stuck_after_days: i64,
    pub forecast_months: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stuck_after_days: DEFAULT_STUCK_AFTER_DAYS,
            forecast_months: DEFAULT_FORECAST_MONTHS,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind = lookup("BIND")
            .unwrap_or_else(|| DEFAULT_BIND.into())
            .trim()
            .parse::<SocketAddr>()
            .context("invalid BIND address")?;

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let mut pipeline = PipelineSettings::default();
        if let Some(raw) = lookup("STUCK_AFTER_DAYS") {
            pipeline.stuck_after_days = raw
                .trim()
                .parse::<i64>()
                .context("STUCK_AFTER_DAYS must be a whole number of days")?
                .max(0);
        }
        if let Some(raw) = lookup("FORECAST_MONTHS") {
            let months = raw
                .trim()
                .parse::<u32>()
                .context("FORECAST_MONTHS must be a positive number")?;
            anyhow::ensure!(months > 0, "FORECAST_MONTHS must be at least 1");
            pipeline.forecast_months = months;
        }

        Ok(Self {
            bind,
            cors_allowed_origins,
            pipeline,
        })
    }
}
