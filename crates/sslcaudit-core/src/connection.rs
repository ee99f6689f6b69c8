//! Client connections handed to auditors.
//!
//! [`ClientConnection`] is the seam between the accept loop and the auditors:
//! anything that can report its peer address and move bytes can be audited.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::error::{AuditError, Result};

/// An accepted client connection under audit.
#[async_trait]
pub trait ClientConnection: Send + Sync {
    /// Remote peer address as reported at accept time, empty if unknown.
    fn peer_addr(&self) -> &str;

    /// Local address the connection was accepted on.
    fn local_addr(&self) -> &str;

    /// Reads available bytes into `buf`, returning how many were read (0 on EOF).
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Writes the whole buffer to the peer.
    async fn write_all(&self, buf: &[u8]) -> Result<()>;
}

/// TCP client connection with independently lockable read and write halves.
pub struct TcpClientConnection {
    read: Mutex<OwnedReadHalf>,
    write: Mutex<OwnedWriteHalf>,
    peer_addr: String,
    local_addr: String,
    read_timeout: Option<Duration>,
}

impl TcpClientConnection {
    /// Wraps an accepted stream, optionally enabling TCP_NODELAY.
    pub fn from_stream(stream: tokio::net::TcpStream, nodelay: bool) -> Result<Self> {
        if nodelay {
            stream.set_nodelay(true)?;
        }
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_default();
        let local_addr = stream
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default();
        let (read, write) = stream.into_split();
        Ok(Self {
            read: Mutex::new(read),
            write: Mutex::new(write),
            peer_addr,
            local_addr,
            read_timeout: None,
        })
    }

    /// Bounds every `read` to `timeout`; an idle peer yields [`AuditError::ReadTimeout`].
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for TcpClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClientConnection")
            .field("peer_addr", &self.peer_addr)
            .field("local_addr", &self.local_addr)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

#[async_trait]
impl ClientConnection for TcpClientConnection {
    fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    fn local_addr(&self) -> &str {
        &self.local_addr
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut read = self.read.lock().await;
        match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read.read(buf))
                .await
                .map_err(|_| AuditError::ReadTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })?
                .map_err(AuditError::Io),
            None => Ok(read.read(buf).await?),
        }
    }

    async fn write_all(&self, buf: &[u8]) -> Result<()> {
        let mut write = self.write.lock().await;
        write.write_all(buf).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                AuditError::ConnectionClosed
            }
            _ => AuditError::Io(e),
        })?;
        write.flush().await?;
        Ok(())
    }
}
