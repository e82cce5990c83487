//! Transport seam between the connection cache and the wire client.
//!
//! The cache never opens sockets itself; it asks a [`BrokerTransport`] to
//! build a [`BrokerConnection`] from an address plus the per-connection
//! parameters. Production workers use [`TcpTransport`]; tests substitute
//! their own implementations.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::sync::Mutex;
use tracing::debug;

use crate::endpoint::BrokerAddr;
use crate::error::{BrokerError, Result};

/// Inputs handed to the transport when a new connection is built.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub connect_timeout: Duration,
    pub buffer_bytes: usize,
    pub client_id: String,
}

/// A live client connection bound to exactly one broker.
///
/// Handed out behind `Arc`, so a single connection may be used by many
/// callers at once; implementations are responsible for making that safe.
#[async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    fn endpoint(&self) -> &BrokerAddr;

    fn client_id(&self) -> &str;

    fn is_closed(&self) -> bool;

    /// Release the underlying resources. Closing an already-closed
    /// connection is a no-op returning `Ok(())`.
    async fn close(&self) -> Result<()>;
}

/// Builds connections on behalf of the cache.
#[async_trait]
pub trait BrokerTransport: Send + Sync + 'static {
    type Conn: BrokerConnection;

    async fn connect(
        &self,
        endpoint: &BrokerAddr,
        params: ConnectParams,
    ) -> Result<Arc<Self::Conn>>;
}

/// Plain TCP transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

#[async_trait]
impl BrokerTransport for TcpTransport {
    type Conn = TcpBrokerConnection;

    async fn connect(
        &self,
        endpoint: &BrokerAddr,
        params: ConnectParams,
    ) -> Result<Arc<TcpBrokerConnection>> {
        let addr = resolve(endpoint).await?;

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| connect_error(endpoint, e))?;

        let buffer = params.buffer_bytes.min(u32::MAX as usize) as u32;
        socket
            .set_recv_buffer_size(buffer)
            .map_err(|e| connect_error(endpoint, e))?;

        let stream = tokio::time::timeout(params.connect_timeout, socket.connect(addr))
            .await
            .map_err(|_| BrokerError::ConnectTimeout {
                endpoint: endpoint.clone(),
                timeout_ms: params.connect_timeout.as_millis() as u64,
            })?
            .map_err(|e| connect_error(endpoint, e))?;

        debug!(endpoint = %endpoint, client_id = %params.client_id, "tcp connection established");

        Ok(Arc::new(TcpBrokerConnection {
            endpoint: endpoint.clone(),
            client_id: params.client_id,
            closed: AtomicBool::new(false),
            stream: Mutex::new(stream),
        }))
    }
}

async fn resolve(endpoint: &BrokerAddr) -> Result<SocketAddr> {
    let mut addrs = lookup_host((endpoint.host(), endpoint.port()))
        .await
        .map_err(|e| connect_error(endpoint, e))?;
    addrs.next().ok_or_else(|| BrokerError::Unresolvable {
        endpoint: endpoint.clone(),
    })
}

fn connect_error(endpoint: &BrokerAddr, source: io::Error) -> BrokerError {
    BrokerError::Connect {
        endpoint: endpoint.clone(),
        source: Arc::new(source),
    }
}

/// TCP-backed broker connection.
///
/// The stream sits behind a `tokio::sync::Mutex`, so concurrent callers
/// serialize on individual `send`/`recv` operations. Framing and protocol
/// are the caller's concern; this type moves raw bytes.
pub struct TcpBrokerConnection {
    endpoint: BrokerAddr,
    client_id: String,
    closed: AtomicBool,
    stream: Mutex<TcpStream>,
}

impl TcpBrokerConnection {
    /// Write raw bytes to the broker.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let mut stream = self.stream.lock().await;
        stream
            .write_all(payload)
            .await
            .map_err(|e| self.io_error(e))?;
        stream.flush().await.map_err(|e| self.io_error(e))
    }

    /// Read raw bytes from the broker into `buf`, returning the number of
    /// bytes read. Zero means the peer closed the stream.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let mut stream = self.stream.lock().await;
        stream.read(buf).await.map_err(|e| self.io_error(e))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(self.io_error(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed",
            )));
        }
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> BrokerError {
        BrokerError::Io {
            endpoint: self.endpoint.clone(),
            source: Arc::new(source),
        }
    }
}

#[async_trait]
impl BrokerConnection for TcpBrokerConnection {
    fn endpoint(&self) -> &BrokerAddr {
        &self.endpoint
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        debug!(endpoint = %self.endpoint, "closing tcp connection");
        let mut stream = self.stream.lock().await;
        match stream.shutdown().await {
            Ok(()) => Ok(()),
            // The peer hanging up first still counts as closed.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(BrokerError::Close {
                endpoint: self.endpoint.clone(),
                source: Arc::new(e),
            }),
        }
    }
}
