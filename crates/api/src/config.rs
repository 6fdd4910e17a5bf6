//! Process configuration read from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use innkeep_billing::PricingPolicy;
use innkeep_core::Multiplier;
use innkeep_infra::EngineConfig;
use innkeep_notifications::HubConfig;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name}: cannot parse '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub engine: EngineConfig,
    pub hub: HubConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            engine: EngineConfig::default(),
            hub: HubConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults for everything but the signing secret.
    pub fn with_jwt_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parsed::<SocketAddr>(&lookup, "INNKEEP_BIND_ADDR")? {
            config.bind_addr = addr;
        }

        match lookup("JWT_SECRET") {
            Some(secret) if !secret.trim().is_empty() => config.jwt_secret = secret,
            _ => tracing::warn!("JWT_SECRET not set; using insecure dev default"),
        }

        if let Some(hours) = parsed::<i64>(&lookup, "INNKEEP_STALENESS_HOURS")? {
            config.engine = config.engine.with_staleness(chrono::Duration::hours(hours));
        }
        if let Some(retries) = parsed::<u32>(&lookup, "INNKEEP_COMMIT_RETRIES")? {
            config.engine = config.engine.with_commit_retries(retries);
        }
        if let Some(bps) = parsed::<u32>(&lookup, "INNKEEP_EXTRA_MARKUP_BPS")? {
            let pricing = PricingPolicy::standard().with_extra_markup(Multiplier::from_bps(bps));
            config.engine = config.engine.with_pricing(pricing);
        }

        if let Some(secs) = parsed::<u64>(&lookup, "INNKEEP_HANDSHAKE_TIMEOUT_SECS")? {
            config.hub.handshake_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "INNKEEP_HEARTBEAT_SECS")? {
            config.hub.heartbeat_interval = Duration::from_secs(secs);
            config.hub.heartbeat_timeout = Duration::from_secs(secs.saturating_mul(3));
        }

        Ok(config)
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn unset_environment_yields_defaults() {
        let config = from(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.engine.commit_retries, 5);
        assert_eq!(config.hub.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn overrides_are_applied() {
        let config = from(&[
            ("INNKEEP_BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("INNKEEP_STALENESS_HOURS", "6"),
            ("INNKEEP_COMMIT_RETRIES", "9"),
            ("INNKEEP_HEARTBEAT_SECS", "5"),
            ("INNKEEP_EXTRA_MARKUP_BPS", "20000"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.engine.staleness, chrono::Duration::hours(6));
        assert_eq!(config.engine.commit_retries, 9);
        assert_eq!(config.hub.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.hub.heartbeat_timeout, Duration::from_secs(15));
        assert_eq!(
            config.engine.pricing,
            PricingPolicy::standard().with_extra_markup(Multiplier::from_bps(20_000))
        );
    }

    #[test]
    fn malformed_values_are_reported_by_name() {
        let err = from(&[("INNKEEP_COMMIT_RETRIES", "many")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "INNKEEP_COMMIT_RETRIES",
                value: "many".to_string()
            }
        );
    }
}
