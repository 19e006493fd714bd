//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::time::Duration;

use serde::{Deserialize, Deserializer, de};

use crate::services::transfer_engine::OverdraftPolicy;

/// Which ledger store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Postgres,
    Memory,
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string, required for the postgres backend
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 8888
/// - `DB_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `LOCK_TIMEOUT_MS` (optional): bound on waiting for an account lock, defaults to 5000, must be non-zero
/// - `OVERDRAFT_POLICY` (optional): `permissive` (default) or `strict`
/// - `LEDGER_BACKEND` (optional): `postgres` (default) or `memory`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    #[serde(
        default = "default_lock_timeout_ms",
        deserialize_with = "deserialize_lock_timeout_ms"
    )]
    pub lock_timeout_ms: u64,

    #[serde(default)]
    pub overdraft_policy: OverdraftPolicy,

    #[serde(default = "default_backend")]
    pub ledger_backend: LedgerBackend,
}

fn default_port() -> u16 {
    8888
}

fn default_max_connections() -> u32 {
    5
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

/// PostgreSQL reads a zero `lock_timeout` as "wait forever", so a zero
/// bound is refused at load time.
fn deserialize_lock_timeout_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match u64::deserialize(deserializer)? {
        0 => Err(de::Error::custom("LOCK_TIMEOUT_MS must be greater than 0")),
        ms => Ok(ms),
    }
}

fn default_backend() -> LedgerBackend {
    LedgerBackend::Postgres
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed into
    /// expected types.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config: Config =
            envy::from_iter(vars(&[("DATABASE_URL", "postgres://localhost/ledger")])).unwrap();

        assert_eq!(config.server_port, 8888);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.overdraft_policy, OverdraftPolicy::Permissive);
        assert_eq!(config.ledger_backend, LedgerBackend::Postgres);
    }

    #[test]
    fn overrides_are_parsed() {
        let config: Config = envy::from_iter(vars(&[
            ("SERVER_PORT", "9000"),
            ("LOCK_TIMEOUT_MS", "250"),
            ("OVERDRAFT_POLICY", "strict"),
            ("LEDGER_BACKEND", "memory"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, None);
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.overdraft_policy, OverdraftPolicy::Strict);
        assert_eq!(config.ledger_backend, LedgerBackend::Memory);
    }

    #[test]
    fn zero_lock_timeout_is_rejected() {
        let result = envy::from_iter::<_, Config>(vars(&[("LOCK_TIMEOUT_MS", "0")]));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("LOCK_TIMEOUT_MS"), "{err}");

        let config: Config = envy::from_iter(vars(&[("LOCK_TIMEOUT_MS", "1")])).unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result = envy::from_iter::<_, Config>(vars(&[("OVERDRAFT_POLICY", "lenient")]));
        assert!(result.is_err());
    }
}
