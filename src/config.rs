//! Connection settings and worker identity.

use std::time::Duration;

use serde::Deserialize;
use validator::Validate;

use crate::error::BrokerError;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_BUFFER_BYTES: usize = 1024 * 1024;
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "keelson";

/// Settings applied to every broker connection a worker opens.
///
/// Supplied once when the cache is created and immutable afterwards.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct BrokerClientConfig {
    /// Upper bound on connection establishment, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,

    /// Receive buffer size, in bytes, for each connection.
    #[serde(default = "default_buffer_bytes")]
    #[validate(range(min = 1))]
    pub buffer_bytes: usize,

    /// Leading component of the client identifier embedded in every
    /// connection for remote-side attribution.
    #[serde(default = "default_client_id_prefix")]
    #[validate(length(min = 1))]
    pub client_id_prefix: String,

    /// When set, connections not used for this many seconds are dropped
    /// from the cache and closed in the background. Unset means entries
    /// live until refreshed or shut down.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

impl Default for BrokerClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            buffer_bytes: default_buffer_bytes(),
            client_id_prefix: default_client_id_prefix(),
            idle_timeout_secs: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_buffer_bytes() -> usize {
    DEFAULT_BUFFER_BYTES
}

fn default_client_id_prefix() -> String {
    DEFAULT_CLIENT_ID_PREFIX.to_string()
}

impl BrokerClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Fail fast on out-of-range settings before any connection is opened.
    pub fn ensure_valid(&self) -> Result<(), BrokerError> {
        self.validate()
            .map_err(|e| BrokerError::ConfigError(e.to_string()))
    }
}

/// Stable identity of the worker process using the cache.
///
/// `instance_id` distinguishes connector/session instances, `node_id`
/// distinguishes processes; both end up in the per-connection client
/// identifier so that the remote side can attribute traffic in its logs.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct WorkerIdentity {
    #[validate(length(min = 1))]
    pub instance_id: String,

    #[validate(length(min = 1))]
    pub node_id: String,
}

impl WorkerIdentity {
    pub fn new(instance_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            node_id: node_id.into(),
        }
    }

    /// Client identifier string: `<prefix>-<instance-id>-<node-id>`.
    pub fn client_id(&self, prefix: &str) -> String {
        format!("{}-{}-{}", prefix, self.instance_id, self.node_id)
    }

    pub fn ensure_valid(&self) -> Result<(), BrokerError> {
        self.validate()
            .map_err(|e| BrokerError::ConfigError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let config: BrokerClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
        assert_eq!(config.buffer_bytes, DEFAULT_BUFFER_BYTES);
        assert_eq!(config.client_id_prefix, DEFAULT_CLIENT_ID_PREFIX);
        assert_eq!(config.idle_timeout_secs, None);
        assert!(config.ensure_valid().is_ok());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config: BrokerClientConfig = serde_json::from_str(
            r#"{
                "connect_timeout_ms": 1000,
                "buffer_bytes": 65536,
                "client_id_prefix": "worker",
                "idle_timeout_secs": 300
            }"#,
        )
        .unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_millis(1000));
        assert_eq!(config.buffer_bytes, 65536);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = BrokerClientConfig {
            connect_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.ensure_valid(),
            Err(BrokerError::ConfigError(_))
        ));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let config = BrokerClientConfig {
            client_id_prefix: String::new(),
            ..Default::default()
        };
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn client_id_combines_prefix_instance_and_node() {
        let identity = WorkerIdentity::new("kafka-1", "node-7");
        assert_eq!(identity.client_id("worker"), "worker-kafka-1-node-7");
    }

    #[test]
    fn blank_identity_is_rejected() {
        assert!(WorkerIdentity::new("", "node-7").ensure_valid().is_err());
        assert!(WorkerIdentity::new("kafka-1", "").ensure_valid().is_err());
        assert!(WorkerIdentity::new("kafka-1", "node-7")
            .ensure_valid()
            .is_ok());
    }
}
