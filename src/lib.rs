//! Broker connection management for Keelson query workers.
//!
//! A worker addresses a dynamically-discovered set of broker nodes, one
//! long-lived connection per node. This crate provides the pieces that
//! make that cheap and safe:
//! - **Addressing**: value-typed broker endpoints (`endpoint`).
//! - **Configuration**: connection settings and worker identity (`config`).
//! - **Transport**: the trait seam and TCP client behind it (`transport`).
//! - **Caching**: the lazily-populated, concurrency-safe connection cache
//!   with per-key construction coalescing, explicit refresh, and
//!   best-effort shutdown (`cache`).
//! - **Errors**: one structured error type across all of it (`error`).

pub mod cache;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod transport;

pub use cache::ConnectionCache;
pub use config::{BrokerClientConfig, WorkerIdentity};
pub use endpoint::BrokerAddr;
pub use error::{BrokerError, Result};
pub use transport::{
    BrokerConnection, BrokerTransport, ConnectParams, TcpBrokerConnection, TcpTransport,
};
