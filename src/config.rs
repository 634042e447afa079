//! Configuration for the buffered shipping client

use crate::record::Level;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::time::Duration;

/// Entries buffered before a size-triggered flush.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Interval between timer-triggered flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Request timeout applied to the HTTP transport.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ingestion token, substituted into the bulk endpoint template
    pub token: String,

    /// Endpoint override; derived from the token when unset
    pub endpoint: Option<String>,

    /// Severity floor carried as plain configuration
    pub level: Level,

    /// Number of buffered entries that triggers an async flush
    pub buffer_size: usize,

    /// Interval of the periodic flush loop
    pub flush_interval: Duration,

    /// Timeout for each transport request
    pub http_timeout: Duration,

    /// Fields filled into every record that does not set them itself
    pub defaults: Map<String, Value>,

    /// Tags applied to every outbound batch
    pub tags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            endpoint: None,
            level: Level::Info,
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            defaults: Map::new(),
            tags: Vec::new(),
        }
    }
}

impl Config {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(token) = env::var("LOGGLY_TOKEN") {
            config.token = token;
        }

        if let Ok(endpoint) = env::var("LOGGLY_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        if let Ok(level) = env::var("LOGGLY_LEVEL") {
            config.level = Level::from(level.as_str());
        }

        if let Ok(buffer_size) = env::var("LOGGLY_BUFFER_SIZE") {
            if let Ok(size) = buffer_size.parse() {
                config.buffer_size = size;
            }
        }

        if let Ok(flush_interval) = env::var("LOGGLY_FLUSH_INTERVAL_MS") {
            if let Ok(ms) = flush_interval.parse::<u64>() {
                config.flush_interval = Duration::from_millis(ms);
            }
        }

        if let Ok(timeout) = env::var("LOGGLY_HTTP_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                config.http_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(tags) = env::var("LOGGLY_TAGS") {
            config.tags = tags
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.token.is_empty() && self.endpoint.is_none() {
            return Err("token cannot be empty".to_string());
        }

        if self.buffer_size == 0 {
            return Err("buffer_size must be greater than 0".to_string());
        }

        if self.flush_interval.is_zero() {
            return Err("flush_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}
