//! Engine configuration.

use std::env::VarError;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default maximum number of identifiers per mutation request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Configuration for a [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Maximum identifiers per batched mutation call.
    pub max_batch_size: usize,

    /// Backoff and wall-clock budget applied to every batch.
    pub retry: RetryPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

impl ReconcileConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Unset variables fall back to the defaults.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let defaults = Self::default();

        let max_batch_size = parse_or(&reader, "MEMBERSYNC_BATCH_SIZE", defaults.max_batch_size)?;

        let timeout = parse_or(
            &reader,
            "MEMBERSYNC_RETRY_TIMEOUT_SECS",
            defaults.retry.timeout.as_secs(),
        )
        .map(Duration::from_secs)?;

        let base_delay = parse_or(
            &reader,
            "MEMBERSYNC_RETRY_BASE_DELAY_MS",
            millis(defaults.retry.base_delay),
        )
        .map(Duration::from_millis)?;

        let max_delay = parse_or(
            &reader,
            "MEMBERSYNC_RETRY_MAX_DELAY_MS",
            millis(defaults.retry.max_delay),
        )
        .map(Duration::from_millis)?;

        let jitter_factor = parse_or(
            &reader,
            "MEMBERSYNC_RETRY_JITTER",
            defaults.retry.jitter_factor,
        )?;

        let config = Self {
            max_batch_size,
            retry: RetryPolicy {
                base_delay,
                max_delay,
                jitter_factor,
                timeout,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "MEMBERSYNC_BATCH_SIZE".into(),
                "must be at least 1".into(),
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ConfigError::InvalidValue(
                "MEMBERSYNC_RETRY_MAX_DELAY_MS".into(),
                "must not be smaller than the base delay".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ConfigError::InvalidValue(
                "MEMBERSYNC_RETRY_JITTER".into(),
                format!("{} is outside [0, 1]", self.retry.jitter_factor),
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match reader(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_reader(vars: HashMap<&str, &str>) -> impl Fn(&str) -> Result<String, VarError> {
        let owned: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| owned.get(key).cloned().ok_or(VarError::NotPresent)
    }

    #[test]
    fn test_defaults() {
        let config = ReconcileConfig::from_reader(make_reader(HashMap::new())).unwrap();
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.retry.timeout, Duration::from_secs(300));
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
        assert_eq!(config.retry.max_delay, Duration::from_secs(30));
        assert!((config.retry.jitter_factor - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_values() {
        let reader = make_reader(HashMap::from([
            ("MEMBERSYNC_BATCH_SIZE", "10"),
            ("MEMBERSYNC_RETRY_TIMEOUT_SECS", "60"),
            ("MEMBERSYNC_RETRY_BASE_DELAY_MS", "200"),
            ("MEMBERSYNC_RETRY_MAX_DELAY_MS", "5000"),
            ("MEMBERSYNC_RETRY_JITTER", "0"),
        ]));

        let config = ReconcileConfig::from_reader(reader).unwrap();
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.retry.timeout, Duration::from_secs(60));
        assert_eq!(config.retry.base_delay, Duration::from_millis(200));
        assert_eq!(config.retry.max_delay, Duration::from_millis(5000));
        assert_eq!(config.retry.jitter_factor, 0.0);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let reader = make_reader(HashMap::from([("MEMBERSYNC_BATCH_SIZE", "0")]));
        let err = ReconcileConfig::from_reader(reader).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
        assert!(err.to_string().contains("MEMBERSYNC_BATCH_SIZE"));
    }

    #[tokio::test]
    async fn test_huge_retry_timeout_is_usable() {
        use crate::error::{classify_remote, RemoteError};
        use tokio_util::sync::CancellationToken;

        let max = u64::MAX.to_string();
        let reader = make_reader(HashMap::from([("MEMBERSYNC_RETRY_TIMEOUT_SECS", max.as_str())]));
        let config = ReconcileConfig::from_reader(reader).unwrap();

        let result = config
            .retry
            .execute("op", &CancellationToken::new(), classify_remote, || async {
                Ok::<_, RemoteError>(1)
            })
            .await
            .unwrap();
        assert_eq!(result.value, 1);
    }

    #[test]
    fn test_unparseable_value_rejected() {
        let reader = make_reader(HashMap::from([("MEMBERSYNC_RETRY_TIMEOUT_SECS", "soon")]));
        let err = ReconcileConfig::from_reader(reader).unwrap_err();
        assert!(err.to_string().contains("MEMBERSYNC_RETRY_TIMEOUT_SECS"));
    }

    #[test]
    fn test_max_delay_below_base_rejected() {
        let reader = make_reader(HashMap::from([
            ("MEMBERSYNC_RETRY_BASE_DELAY_MS", "2000"),
            ("MEMBERSYNC_RETRY_MAX_DELAY_MS", "1000"),
        ]));
        let err = ReconcileConfig::from_reader(reader).unwrap_err();
        assert!(err.to_string().contains("MEMBERSYNC_RETRY_MAX_DELAY_MS"));
    }

    #[test]
    fn test_jitter_out_of_range_rejected() {
        let reader = make_reader(HashMap::from([("MEMBERSYNC_RETRY_JITTER", "1.5")]));
        let err = ReconcileConfig::from_reader(reader).unwrap_err();
        assert!(err.to_string().contains("MEMBERSYNC_RETRY_JITTER"));
    }
}
