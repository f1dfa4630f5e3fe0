//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::Client`].
///
/// All durations are expressed in milliseconds so the struct deserializes
/// cleanly from JSON config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server URL, e.g. `ws://127.0.0.1:9000`.
    pub url: String,

    /// Protocol version stamped on every outgoing request.
    #[serde(default = "default_version")]
    pub version: String,

    /// How long a caller waits for a response. Sub-second values are
    /// treated as a misconfiguration and clamped to the default.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Write attempts per request before it is failed with a
    /// retries-exhausted response.
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Capacity of the outgoing request queue. A full queue makes `send`
    /// wait (bounded by its deadline) rather than grow without limit.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Base delay between reconnect attempts; the actual delay grows
    /// linearly with consecutive dial failures.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    /// Interval between heartbeat pings. `0` means use the response
    /// timeout.
    #[serde(default)]
    pub heartbeat_interval_ms: u64,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_response_timeout_ms() -> u64 {
    30_000
}

fn default_max_tries() -> u32 {
    1
}

fn default_queue_capacity() -> usize {
    100
}

fn default_reconnect_base_delay_ms() -> u64 {
    2_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            version: default_version(),
            response_timeout_ms: default_response_timeout_ms(),
            max_tries: default_max_tries(),
            queue_capacity: default_queue_capacity(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            heartbeat_interval_ms: 0,
        }
    }

    /// The effective response deadline, with sub-second values clamped.
    pub fn response_timeout(&self) -> Duration {
        let ms = if self.response_timeout_ms < 1_000 {
            default_response_timeout_ms()
        } else {
            self.response_timeout_ms
        };
        Duration::from_millis(ms)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    /// Heartbeat interval, falling back to the response timeout.
    pub fn heartbeat_interval(&self) -> Duration {
        if self.heartbeat_interval_ms == 0 {
            self.response_timeout()
        } else {
            Duration::from_millis(self.heartbeat_interval_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("ws://localhost:9000");
        assert_eq!(config.version, "1.0");
        assert_eq!(config.response_timeout_ms, 30_000);
        assert_eq!(config.max_tries, 1);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.reconnect_base_delay_ms, 2_000);
        assert_eq!(config.heartbeat_interval(), config.response_timeout());
    }

    #[test]
    fn sub_second_timeout_is_clamped() {
        let mut config = ClientConfig::new("ws://localhost:9000");
        config.response_timeout_ms = 500;
        assert_eq!(config.response_timeout(), Duration::from_secs(30));

        config.response_timeout_ms = 1_000;
        assert_eq!(config.response_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"url":"ws://h:1","max_tries":3}"#).unwrap();
        assert_eq!(config.url, "ws://h:1");
        assert_eq!(config.max_tries, 3);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.heartbeat_interval_ms, 0);
    }

    #[test]
    fn explicit_heartbeat_interval() {
        let mut config = ClientConfig::new("ws://h:1");
        config.heartbeat_interval_ms = 5_000;
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(5_000));
    }
}
