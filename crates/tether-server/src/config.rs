use serde::{Deserialize, Serialize};

/// Per-connection server tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Capacity of the outgoing frame queue. A client that cannot keep up
    /// loses frames rather than stalling its handlers.
    #[serde(default = "default_write_queue_capacity")]
    pub write_queue_capacity: usize,

    /// How many queued frames the writer drains per wakeup.
    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,
}

fn default_write_queue_capacity() -> usize {
    256
}

fn default_write_batch_size() -> usize {
    16
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            write_queue_capacity: default_write_queue_capacity(),
            write_batch_size: default_write_batch_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.write_queue_capacity, 256);
        assert_eq!(config.write_batch_size, 16);
    }

    #[test]
    fn deserializes_empty_object() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.write_queue_capacity, 256);
    }
}
