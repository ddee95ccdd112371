// Audit and validator configuration
//
// Both configs can be:
// - Created directly with defaults and adjusted with `with_*` setters
// - Loaded from environment variables via `from_env`
//
// Environment parsing never fails: missing or malformed values fall back to
// the defaults with a warning.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RangerError, Result};

/// Default cap on buffered audit events per correlation key
pub const DEFAULT_MAX_EVENTS_PER_INVOCATION: usize = 100;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Configuration for the audit event bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditConfig {
    /// Maximum events buffered per correlation key (oldest evicted first)
    #[serde(default = "default_max_events_per_invocation")]
    pub max_events_per_invocation: usize,
}

fn default_max_events_per_invocation() -> usize {
    DEFAULT_MAX_EVENTS_PER_INVOCATION
}

impl AuditConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RANGER_AUDIT_MAX_EVENTS`: per-invocation event cap (default: 100, must be > 0)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_events_per_invocation =
            parse_var(&lookup, "RANGER_AUDIT_MAX_EVENTS", |v: &usize| *v > 0)
                .unwrap_or(DEFAULT_MAX_EVENTS_PER_INVOCATION);

        Self {
            max_events_per_invocation,
        }
    }

    /// Set the per-invocation event cap
    pub fn with_max_events_per_invocation(mut self, max_events: usize) -> Self {
        self.max_events_per_invocation = max_events;
        self
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_events_per_invocation == 0 {
            return Err(RangerError::config(
                "max_events_per_invocation must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_events_per_invocation: DEFAULT_MAX_EVENTS_PER_INVOCATION,
        }
    }
}

/// Configuration for the tool-invocation validator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before each retry
    #[serde(default, with = "duration_millis")]
    pub retry_delay: Duration,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl ValidatorConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RANGER_VALIDATOR_MAX_RETRIES`: retries after the first attempt (default: 2)
    /// - `RANGER_VALIDATOR_RETRY_DELAY_MS`: delay before each retry (default: 0)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_retries = parse_var(&lookup, "RANGER_VALIDATOR_MAX_RETRIES", |_: &u32| true)
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let retry_delay = parse_var(&lookup, "RANGER_VALIDATOR_RETRY_DELAY_MS", |_: &u64| true)
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO);

        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Set the number of retries after the first attempt
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before each retry
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Total number of attempts, including the first
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Read and parse `key`; a present but unusable value is logged and ignored
fn parse_var<T, L>(lookup: &L, key: &str, valid: impl Fn(&T) -> bool) -> Option<T>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => Some(value),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid configuration value, using default");
            None
        }
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_audit_config_defaults() {
        let config = AuditConfig::from_lookup(lookup(&[]));
        assert_eq!(config, AuditConfig::default());
        assert_eq!(config.max_events_per_invocation, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_audit_config_from_lookup() {
        let config = AuditConfig::from_lookup(lookup(&[("RANGER_AUDIT_MAX_EVENTS", "25")]));
        assert_eq!(config.max_events_per_invocation, 25);
    }

    #[test]
    fn test_audit_config_rejects_zero_and_garbage() {
        let zero = AuditConfig::from_lookup(lookup(&[("RANGER_AUDIT_MAX_EVENTS", "0")]));
        assert_eq!(zero.max_events_per_invocation, 100);

        let garbage = AuditConfig::from_lookup(lookup(&[("RANGER_AUDIT_MAX_EVENTS", "lots")]));
        assert_eq!(garbage.max_events_per_invocation, 100);
    }

    #[test]
    fn test_audit_config_validate_zero_cap() {
        let config = AuditConfig::default().with_max_events_per_invocation(0);
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "Configuration");
    }

    #[test]
    fn test_validator_config_from_lookup() {
        let config = ValidatorConfig::from_lookup(lookup(&[
            ("RANGER_VALIDATOR_MAX_RETRIES", "4"),
            ("RANGER_VALIDATOR_RETRY_DELAY_MS", "250"),
        ]));
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.total_attempts(), 5);
    }

    #[test]
    fn test_validator_config_bad_values_fall_back() {
        let config = ValidatorConfig::from_lookup(lookup(&[
            ("RANGER_VALIDATOR_MAX_RETRIES", "-1"),
            ("RANGER_VALIDATOR_RETRY_DELAY_MS", "soon"),
        ]));
        assert_eq!(config, ValidatorConfig::default());
    }

    #[test]
    fn test_rejected_values_are_logged() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::Layer;

        struct CountWarnings(Arc<AtomicUsize>);

        impl<S: tracing::Subscriber> Layer<S> for CountWarnings {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                if *event.metadata().level() == tracing::Level::WARN {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber =
            tracing_subscriber::registry().with(CountWarnings(Arc::clone(&warnings)));

        tracing::subscriber::with_default(subscriber, || {
            ValidatorConfig::from_lookup(lookup(&[
                ("RANGER_VALIDATOR_MAX_RETRIES", "3"),
                ("RANGER_VALIDATOR_RETRY_DELAY_MS", "soon"),
            ]));
            AuditConfig::from_lookup(lookup(&[("RANGER_AUDIT_MAX_EVENTS", "0")]));
            AuditConfig::from_lookup(lookup(&[]));
        });

        assert_eq!(warnings.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let config = ValidatorConfig::default().with_max_retries(0);
        assert_eq!(config.total_attempts(), 1);
    }

    #[test]
    fn test_validator_config_serde() {
        let config: ValidatorConfig =
            serde_json::from_str(r#"{"max_retries": 1, "retry_delay": 1500}"#).unwrap();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_delay, Duration::from_millis(1500));

        let defaults: ValidatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, ValidatorConfig::default());
    }
}
