//! Error types for broker connection management.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::endpoint::BrokerAddr;

/// Errors raised while building, using, or releasing broker connections.
///
/// The enum is `Clone` so that a single in-flight construction failure can
/// be handed to every caller that coalesced onto it; I/O causes are kept
/// behind `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Connection establishment exceeded the configured connect timeout.
    #[error("connection to {endpoint} timed out after {timeout_ms} ms")]
    ConnectTimeout { endpoint: BrokerAddr, timeout_ms: u64 },

    /// Connection establishment failed (refused, reset, resolution error).
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: BrokerAddr,
        #[source]
        source: Arc<io::Error>,
    },

    /// Name resolution succeeded but produced no usable addresses.
    #[error("no addresses resolved for {endpoint}")]
    Unresolvable { endpoint: BrokerAddr },

    /// A broker address failed to parse or validate.
    #[error("invalid broker address: {0}")]
    InvalidAddress(String),

    /// Connection settings or worker identity failed validation.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// I/O on an established connection failed.
    #[error("i/o failure on connection to {endpoint}: {source}")]
    Io {
        endpoint: BrokerAddr,
        #[source]
        source: Arc<io::Error>,
    },

    /// Closing a connection failed. Swallowed (and logged) during the
    /// shutdown sweep, surfaced when `close` is called directly.
    #[error("failed to close connection to {endpoint}: {source}")]
    Close {
        endpoint: BrokerAddr,
        #[source]
        source: Arc<io::Error>,
    },
}

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
