//! Controller configuration, read from environment variables at startup.

use crate::error::ControllerError;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings for the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Namespace to watch; all namespaces when `None`
    pub namespace: Option<String>,
    /// Periodic requeue after a successful pass
    pub resync_interval: Option<Duration>,
    /// Passes running at once across different gateways
    pub concurrency: u16,
    /// Quiet period after the last event before a pass starts
    pub debounce: Duration,
    pub backoff_min_minutes: u64,
    pub backoff_max_minutes: u64,
    /// Requeue delay after an optimistic concurrency conflict
    pub conflict_requeue: Duration,
    pub metrics_addr: SocketAddr,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            resync_interval: None,
            concurrency: 3,
            debounce: Duration::from_secs(5),
            backoff_min_minutes: 1,
            backoff_max_minutes: 10,
            conflict_requeue: Duration::from_secs(5),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unset or empty variables fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            namespace: get("WATCH_NAMESPACE"),
            resync_interval: parse::<u64>("RESYNC_INTERVAL_SECS", get("RESYNC_INTERVAL_SECS"))?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            concurrency: parse("CONTROLLER_CONCURRENCY", get("CONTROLLER_CONCURRENCY"))?
                .unwrap_or(defaults.concurrency),
            debounce: parse("DEBOUNCE_SECS", get("DEBOUNCE_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.debounce),
            backoff_min_minutes: parse("BACKOFF_MIN_MINUTES", get("BACKOFF_MIN_MINUTES"))?
                .unwrap_or(defaults.backoff_min_minutes),
            backoff_max_minutes: parse("BACKOFF_MAX_MINUTES", get("BACKOFF_MAX_MINUTES"))?
                .unwrap_or(defaults.backoff_max_minutes),
            conflict_requeue: parse("CONFLICT_REQUEUE_SECS", get("CONFLICT_REQUEUE_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.conflict_requeue),
            metrics_addr: parse("METRICS_ADDR", get("METRICS_ADDR"))?
                .unwrap_or(defaults.metrics_addr),
        };

        if config.concurrency == 0 {
            return Err(ControllerError::InvalidConfig("CONTROLLER_CONCURRENCY must be at least 1".to_string()));
        }
        if config.backoff_min_minutes == 0 {
            return Err(ControllerError::InvalidConfig("BACKOFF_MIN_MINUTES must be at least 1".to_string()));
        }
        if config.backoff_max_minutes < config.backoff_min_minutes {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MAX_MINUTES ({}) is below BACKOFF_MIN_MINUTES ({})",
                config.backoff_max_minutes, config.backoff_min_minutes
            )));
        }
        Ok(config)
    }
}

fn parse<T>(key: &str, value: Option<String>) -> Result<Option<T>, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| {
                ControllerError::InvalidConfig(format!("{}={:?}: {}", key, v, e))
            })
        })
        .transpose()
}
