use anyhow::Context;
use serde::Deserialize;
use time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub activation_ttl_hours: i64,
    pub authentication_ttl_hours: i64,
    /// Revoke earlier authentication tokens on every successful login.
    pub single_session: bool,
    /// Seconds between expired-token sweeps; 0 disables the sweeper.
    pub purge_interval_secs: u64,
}

impl TokenConfig {
    pub fn activation_ttl(&self) -> Duration {
        Duration::hours(self.activation_ttl_hours)
    }

    pub fn authentication_ttl(&self) -> Duration {
        Duration::hours(self.authentication_ttl_hours)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            activation_ttl_hours: 72,
            authentication_ttl_hours: 24,
            single_session: false,
            purge_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub tokens: TokenConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("APP_STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => anyhow::bail!("unknown APP_STORE value {other:?}"),
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when APP_STORE=postgres");
        }

        let defaults = TokenConfig::default();
        let tokens = TokenConfig {
            activation_ttl_hours: ttl_hours_var(
                "ACTIVATION_TOKEN_TTL_HOURS",
                defaults.activation_ttl_hours,
            )?,
            authentication_ttl_hours: ttl_hours_var(
                "AUTH_TOKEN_TTL_HOURS",
                defaults.authentication_ttl_hours,
            )?,
            single_session: parse_var("AUTH_SINGLE_SESSION")?.unwrap_or(defaults.single_session),
            purge_interval_secs: parse_var("TOKEN_PURGE_INTERVAL_SECS")?
                .unwrap_or(defaults.purge_interval_secs),
        };

        Ok(Self {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("APP_PORT")?.unwrap_or(4000),
            store,
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS")?.unwrap_or(10),
            tokens,
        })
    }
}

/// Longest token lifetime accepted from the environment: one year.
const MAX_TTL_HOURS: i64 = 24 * 365;

fn ttl_hours_var(key: &str, default: i64) -> anyhow::Result<i64> {
    let hours = parse_var(key)?.unwrap_or(default);
    check_ttl_hours(key, hours)
}

fn check_ttl_hours(key: &str, hours: i64) -> anyhow::Result<i64> {
    if !(1..=MAX_TTL_HOURS).contains(&hours) {
        anyhow::bail!("{key} must be between 1 and {MAX_TTL_HOURS} hours, got {hours}");
    }
    Ok(hours)
}

fn parse_var<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value for {key}")),
        Err(_) => Ok(None),
    }
}
