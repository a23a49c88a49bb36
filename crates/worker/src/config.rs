//! Worker configuration, read once at startup

use studiodir_membership::AdminAllowlist;
use studiodir_shared::db::DEFAULT_MAX_CONNECTIONS;

/// Hourly, on the hour
pub const DEFAULT_ENFORCEMENT_CRON: &str = "0 0 * * * *";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub admins: AdminAllowlist,
    pub enforcement_cron: String,
    pub dry_run: bool,
    pub run_on_startup: bool,
    pub notification_webhook_url: Option<String>,
    pub notification_webhook_token: Option<String>,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let var = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                value: raw,
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            admins: var("ADMIN_EMAILS")
                .map(|raw| AdminAllowlist::from_csv(&raw))
                .unwrap_or_default(),
            enforcement_cron: var("ENFORCEMENT_CRON")
                .unwrap_or_else(|| DEFAULT_ENFORCEMENT_CRON.to_string()),
            dry_run: parse_flag("ENFORCEMENT_DRY_RUN", var("ENFORCEMENT_DRY_RUN"), false)?,
            run_on_startup: parse_flag(
                "ENFORCEMENT_RUN_ON_STARTUP",
                var("ENFORCEMENT_RUN_ON_STARTUP"),
                true,
            )?,
            notification_webhook_url: var("NOTIFICATION_WEBHOOK_URL"),
            notification_webhook_token: var("NOTIFICATION_WEBHOOK_TOKEN"),
        })
    }
}

fn parse_flag(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}
