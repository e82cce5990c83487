//! Endpoint-keyed cache of live broker connections.
//!
//! A query worker may need to talk to many broker nodes over the course of
//! a query. The cache opens one connection per broker, lazily, and serves
//! repeated lookups from the map without reconnecting. Concurrent lookups
//! for the same missing broker coalesce onto a single construction;
//! lookups for distinct brokers proceed independently.

use std::sync::Arc;

use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::{debug, info, warn};

use crate::config::{BrokerClientConfig, WorkerIdentity};
use crate::endpoint::BrokerAddr;
use crate::error::{BrokerError, Result};
use crate::transport::{BrokerConnection, BrokerTransport, ConnectParams, TcpTransport};

/// Lazily-populated map of broker address to live connection.
///
/// Created once per worker session alongside the settings and identity it
/// needs, and kept for the lifetime of that session. Cached entries are
/// assumed usable; staleness is discovered by the caller's I/O failing, at
/// which point the caller invokes [`refresh`](Self::refresh).
pub struct ConnectionCache<T: BrokerTransport> {
    transport: Arc<T>,
    connections: Cache<BrokerAddr, Arc<T::Conn>>,
    config: BrokerClientConfig,
    client_id: String,
}

impl ConnectionCache<TcpTransport> {
    /// Cache wired to the plain TCP transport.
    pub fn with_tcp(config: BrokerClientConfig, identity: WorkerIdentity) -> Result<Self> {
        Self::new(config, identity, Arc::new(TcpTransport))
    }
}

impl<T: BrokerTransport> ConnectionCache<T> {
    /// Validate settings and identity, then build an empty cache.
    ///
    /// No connection is opened here; entries are created on first `get`.
    pub fn new(
        config: BrokerClientConfig,
        identity: WorkerIdentity,
        transport: Arc<T>,
    ) -> Result<Self> {
        config.ensure_valid()?;
        identity.ensure_valid()?;
        let client_id = identity.client_id(&config.client_id_prefix);

        let mut builder = Cache::builder().eviction_listener(
            |addr: Arc<BrokerAddr>, conn: Arc<T::Conn>, cause: RemovalCause| {
                // Explicit removals (refresh, shutdown) close at the call
                // site; the listener handles policy-driven ones.
                if matches!(cause, RemovalCause::Explicit) {
                    return;
                }
                debug!(endpoint = %addr, ?cause, "evicting broker connection");
                tokio::spawn(async move {
                    if let Err(e) = conn.close().await {
                        warn!(endpoint = %addr, error = %e, "failed to close evicted connection");
                    }
                });
            },
        );
        if let Some(idle) = config.idle_timeout() {
            builder = builder.time_to_idle(idle);
        }

        Ok(Self {
            transport,
            connections: builder.build(),
            config,
            client_id,
        })
    }

    /// The cached connection for `endpoint`, constructing it on a miss.
    ///
    /// Concurrent callers for the same missing broker coalesce: exactly one
    /// construction runs, and every waiter receives its result — the shared
    /// connection on success, the shared cause on failure. Failures are not
    /// cached; the next call retries construction.
    pub async fn get(&self, endpoint: &BrokerAddr) -> Result<Arc<T::Conn>> {
        let params = ConnectParams {
            connect_timeout: self.config.connect_timeout(),
            buffer_bytes: self.config.buffer_bytes,
            client_id: self.client_id.clone(),
        };
        let transport = Arc::clone(&self.transport);
        let addr = endpoint.clone();

        self.connections
            .try_get_with(endpoint.clone(), async move {
                info!(endpoint = %addr, client_id = %params.client_id, "opening broker connection");
                transport.connect(&addr, params).await
            })
            .await
            .map_err(|e: Arc<BrokerError>| (*e).clone())
    }

    /// Drop the cached entry for `endpoint` (if any) so the next `get`
    /// builds a new connection.
    ///
    /// The superseded connection is handed to a background close; callers
    /// must not assume its resources are released synchronously.
    pub async fn refresh(&self, endpoint: &BrokerAddr) {
        if let Some(conn) = self.connections.get(endpoint).await {
            self.connections.invalidate(endpoint).await;
            debug!(endpoint = %endpoint, "refreshing broker connection");
            let addr = endpoint.clone();
            tokio::spawn(async move {
                if let Err(e) = conn.close().await {
                    warn!(endpoint = %addr, error = %e, "failed to close superseded connection");
                }
            });
        }
    }

    /// Best-effort shutdown sweep: close every held connection.
    ///
    /// A failure closing one entry is logged and does not stop the sweep;
    /// nothing is propagated to the caller. The cache is empty afterwards —
    /// a later `get` would open a fresh connection.
    pub async fn shutdown(&self) {
        let entries: Vec<(Arc<BrokerAddr>, Arc<T::Conn>)> = self.connections.iter().collect();
        info!(connections = entries.len(), "closing broker connections");

        for (addr, conn) in entries {
            if let Err(e) = conn.close().await {
                warn!(endpoint = %addr, error = %e, "failed to close connection during shutdown");
            }
        }

        self.connections.invalidate_all();
        self.connections.run_pending_tasks().await;
    }

    /// Client identifier embedded in every connection this cache opens.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn contains(&self, endpoint: &BrokerAddr) -> bool {
        self.connections.contains_key(endpoint)
    }

    /// Approximate number of live entries.
    pub fn len(&self) -> u64 {
        self.connections.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run deferred cache housekeeping (idle expiry, eviction
    /// notifications) immediately instead of waiting for it to piggyback
    /// on later cache activity.
    pub async fn run_pending_tasks(&self) {
        self.connections.run_pending_tasks().await;
    }
}
