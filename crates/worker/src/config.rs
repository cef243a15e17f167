//! Worker configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use saga::RetryPolicy;

use crate::error::{Result, WorkerError};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL` — PostgreSQL connection string (default: unset, in-memory store)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `METRICS_ADDR` — Prometheus listener address (default: unset, no exporter)
/// - `DELIVERY_MAX_RETRIES` — retries per event (default: `10`)
/// - `DELIVERY_INITIAL_BACKOFF_MS` — first retry delay (default: `100`)
/// - `DELIVERY_MAX_BACKOFF_MS` — retry delay cap (default: `1000`)
/// - `DELIVERY_QUEUE_CAPACITY` — events buffered between intake and delivery (default: `1024`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_addr: Option<SocketAddr>,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub queue_capacity: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Unset and empty keys take their default; set keys that do not parse
    /// are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid("LOG_FORMAT", other)),
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            metrics_addr: parse_opt(&get, "METRICS_ADDR")?,
            max_retries: parse_opt(&get, "DELIVERY_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            initial_backoff_ms: parse_opt(&get, "DELIVERY_INITIAL_BACKOFF_MS")?
                .unwrap_or(defaults.initial_backoff_ms),
            max_backoff_ms: parse_opt(&get, "DELIVERY_MAX_BACKOFF_MS")?
                .unwrap_or(defaults.max_backoff_ms),
            queue_capacity: match parse_opt(&get, "DELIVERY_QUEUE_CAPACITY")? {
                Some(0) => return Err(invalid("DELIVERY_QUEUE_CAPACITY", "0")),
                Some(capacity) => capacity,
                None => defaults.queue_capacity,
            },
        })
    }

    /// Returns the delivery retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_addr: None,
            max_retries: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            queue_capacity: 1024,
        }
    }
}

fn parse_opt<T, G>(get: &G, key: &'static str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| value.trim().parse().map_err(|_| invalid(key, &value)))
        .transpose()
}

fn invalid(key: &'static str, value: &str) -> WorkerError {
    WorkerError::InvalidConfig {
        key,
        value: value.to_string(),
    }
}
