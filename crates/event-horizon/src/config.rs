//! Configuration for the Event Horizon client.

use crate::backoff::Backoff;
use crate::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::error::{HorizonError, HorizonResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default collector endpoint.
pub const DEFAULT_COLLECTOR_URL: &str = "wss://collector.invalid/events";

/// Query parameter carrying the auth token.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Default capacity of the supervisor command queue.
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Default capacity of a connection's outbound frame queue.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 100;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonConfig {
    /// Collector WebSocket URL (e.g., wss://collector.example.com/events).
    #[serde(default = "default_collector_url")]
    pub collector_url: String,
    /// Events held while disconnected before the oldest are dropped.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Backoff added per failed attempt, in seconds.
    #[serde(default = "default_backoff_step_secs")]
    pub backoff_step_secs: u64,
    /// Backoff ceiling, in seconds.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    /// Platform tag stamped on every event.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// User-type tag sent with every event.
    #[serde(default = "default_user_type")]
    pub user_type: String,
    /// Anonymous installation identifier sent with every event.
    #[serde(default = "default_anonymous_id")]
    pub anonymous_id: String,
    /// Supervisor command queue capacity.
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
    /// Per-connection outbound frame queue capacity.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

fn default_collector_url() -> String {
    DEFAULT_COLLECTOR_URL.to_string()
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_backoff_step_secs() -> u64 {
    15
}

fn default_backoff_max_secs() -> u64 {
    60
}

fn default_platform() -> String {
    "rust".to_string()
}

fn default_user_type() -> String {
    "anon".to_string()
}

fn default_anonymous_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_command_queue_capacity() -> usize {
    DEFAULT_COMMAND_QUEUE_CAPACITY
}

fn default_outbound_queue_capacity() -> usize {
    DEFAULT_OUTBOUND_QUEUE_CAPACITY
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            collector_url: default_collector_url(),
            buffer_capacity: default_buffer_capacity(),
            backoff_step_secs: default_backoff_step_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            platform: default_platform(),
            user_type: default_user_type(),
            anonymous_id: default_anonymous_id(),
            command_queue_capacity: default_command_queue_capacity(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

impl HorizonConfig {
    /// Create a config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from a JSON file, then override from environment.
    pub fn load(path: &Path) -> HorizonResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&contents)
            .map_err(|e| HorizonError::Config(format!("{}: {}", path.display(), e)))?;
        config.load_from_env();
        Ok(config)
    }

    /// Apply `HORIZON_*` environment overrides.
    pub fn load_from_env(&mut self) {
        if let Ok(url) = std::env::var("HORIZON_URL") {
            self.collector_url = url;
        }
        if let Some(capacity) = env_parse("HORIZON_BUFFER_CAPACITY") {
            self.buffer_capacity = capacity;
        }
        if let Some(step) = env_parse("HORIZON_BACKOFF_STEP_SECS") {
            self.backoff_step_secs = step;
        }
        if let Some(max) = env_parse("HORIZON_BACKOFF_MAX_SECS") {
            self.backoff_max_secs = max;
        }
        if let Ok(platform) = std::env::var("HORIZON_PLATFORM") {
            self.platform = platform;
        }
        if let Ok(user_type) = std::env::var("HORIZON_USER_TYPE") {
            self.user_type = user_type;
        }
        if let Ok(anonymous_id) = std::env::var("HORIZON_ANONYMOUS_ID") {
            self.anonymous_id = anonymous_id;
        }
    }

    /// Reconnect backoff policy described by this config.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_secs(self.backoff_step_secs),
            Duration::from_secs(self.backoff_max_secs),
        )
    }

    /// Collector URL with the auth token appended as a query parameter.
    pub fn connection_url(&self, token: &str) -> HorizonResult<Url> {
        let mut url = Url::parse(&self.collector_url)?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(HorizonError::Config(format!(
                    "collector URL must use ws or wss, got {}",
                    other
                )))
            }
        }
        url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
        Ok(url)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
