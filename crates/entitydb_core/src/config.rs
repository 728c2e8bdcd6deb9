//! Consistency-wait configuration.
//!
//! # Invariants
//! - `max_consistency_wait_ms == 0` disables visibility polling; negative
//!   budgets from env or JSON load as 0.
//! - A validated config never pairs a positive wait with a zero poll interval.

use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_MAX_CONSISTENCY_WAIT_MS: &str = "ENTITYDB_MAX_CONSISTENCY_WAIT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "ENTITYDB_POLL_INTERVAL_MS";

const DEFAULT_MAX_CONSISTENCY_WAIT_MS: u64 = 2_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { key: String, value: String },
    ZeroPollInterval,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "`{key}` must be an integer number of milliseconds, got `{value}`")
            }
            Self::ZeroPollInterval => write!(
                f,
                "poll_interval_ms must be positive when max_consistency_wait_ms is enabled"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Read-only settings for the consistency-wait protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Soft deadline for confirming visibility after a single-entity write.
    #[serde(deserialize_with = "deserialize_wait_budget")]
    pub max_consistency_wait_ms: u64,
    /// Fixed sleep between visibility probes.
    pub poll_interval_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_consistency_wait_ms: DEFAULT_MAX_CONSISTENCY_WAIT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl PersistenceConfig {
    /// Config that never polls after writes.
    pub fn without_wait() -> Self {
        Self {
            max_consistency_wait_ms: 0,
            ..Self::default()
        }
    }

    pub fn with_wait(max_consistency_wait: Duration, poll_interval: Duration) -> Self {
        Self {
            max_consistency_wait_ms: duration_to_ms(max_consistency_wait),
            poll_interval_ms: duration_to_ms(poll_interval),
        }
    }

    /// Loads overrides from `ENTITYDB_*` environment variables on top of defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads overrides through `lookup`; unset keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_MAX_CONSISTENCY_WAIT_MS) {
            config.max_consistency_wait_ms = parse_wait_budget(&value)?;
        }
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            config.poll_interval_ms = parse_ms(ENV_POLL_INTERVAL_MS, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_consistency_wait_ms > 0 && self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn max_consistency_wait(&self) -> Duration {
        Duration::from_millis(self.max_consistency_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_ms(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Negative budgets disable waiting instead of failing the load.
fn parse_wait_budget(value: &str) -> Result<u64, ConfigError> {
    let budget = value
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidNumber {
            key: ENV_MAX_CONSISTENCY_WAIT_MS.to_string(),
            value: value.to_string(),
        })?;
    Ok(clamp_wait_budget(budget))
}

fn clamp_wait_budget(budget: i64) -> u64 {
    u64::try_from(budget).unwrap_or(0)
}

fn deserialize_wait_budget<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(clamp_wait_budget)
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, PersistenceConfig, ENV_MAX_CONSISTENCY_WAIT_MS, ENV_POLL_INTERVAL_MS};
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_keys_keep_defaults() {
        let config = PersistenceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, PersistenceConfig::default());
    }

    #[test]
    fn lookup_overrides_are_parsed() {
        let config = PersistenceConfig::from_lookup(lookup_from(&[
            (ENV_MAX_CONSISTENCY_WAIT_MS, " 500 "),
            (ENV_POLL_INTERVAL_MS, "50"),
        ]))
        .unwrap();
        assert_eq!(config.max_consistency_wait(), Duration::from_millis(500));
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn negative_wait_budget_disables_waiting() {
        let config =
            PersistenceConfig::from_lookup(lookup_from(&[(ENV_MAX_CONSISTENCY_WAIT_MS, "-1")]))
                .unwrap();
        assert_eq!(config.max_consistency_wait_ms, 0);
        assert!(config.max_consistency_wait().is_zero());

        let json: PersistenceConfig =
            serde_json::from_str(r#"{ "max_consistency_wait_ms": -250 }"#).unwrap();
        assert_eq!(json.max_consistency_wait_ms, 0);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let error =
            PersistenceConfig::from_lookup(lookup_from(&[(ENV_MAX_CONSISTENCY_WAIT_MS, "soon")]))
                .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidNumber { .. }));

        let error = PersistenceConfig::from_lookup(lookup_from(&[(ENV_POLL_INTERVAL_MS, "-5")]))
            .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn zero_interval_is_rejected_only_when_waiting() {
        let error = PersistenceConfig::from_lookup(lookup_from(&[(ENV_POLL_INTERVAL_MS, "0")]))
            .unwrap_err();
        assert_eq!(error, ConfigError::ZeroPollInterval);

        let disabled = PersistenceConfig::from_lookup(lookup_from(&[
            (ENV_MAX_CONSISTENCY_WAIT_MS, "0"),
            (ENV_POLL_INTERVAL_MS, "0"),
        ]))
        .unwrap();
        assert_eq!(disabled.max_consistency_wait_ms, 0);
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let config: PersistenceConfig =
            serde_json::from_str(r#"{ "max_consistency_wait_ms": 100 }"#).unwrap();
        assert_eq!(config.max_consistency_wait_ms, 100);
        assert_eq!(config.poll_interval_ms, 20);
    }
}
