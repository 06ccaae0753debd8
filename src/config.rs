use std::env;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_ORG_ID: i64 = 1;
const DEFAULT_EMAIL_DOMAIN: &str = "vishnu.edu.in";
const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Runtime settings for the dashboard, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub database_url: Option<String>,
    pub org_id: i64,
    pub email_domain: String,
    pub cache_ttl: Duration,
    pub log_level: String,
}

impl DashboardConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .or_else(|| compose_database_url(&lookup));

        let org_id = match lookup("DASHBOARD_ORG_ID") {
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: "DASHBOARD_ORG_ID",
                    value,
                })?,
            None => DEFAULT_ORG_ID,
        };

        let cache_ttl_secs = match lookup("DASHBOARD_CACHE_TTL_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: "DASHBOARD_CACHE_TTL_SECS",
                    value,
                })?,
            None => DEFAULT_CACHE_TTL_SECS,
        };

        let email_domain = lookup("DASHBOARD_EMAIL_DOMAIN")
            .map(|domain| domain.trim().trim_start_matches('@').to_string())
            .filter(|domain| !domain.is_empty())
            .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string());

        let log_level = lookup("DASHBOARD_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            database_url,
            org_id,
            email_domain,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            log_level,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)
    }
}

fn compose_database_url<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("DB_HOST")?;
    let port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());
    let name = lookup("DB_NAME")?;
    let user = lookup("DB_USER")?;
    let password = lookup("DB_PASSWORD").unwrap_or_default();
    Some(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
}
