//! TCP accept loop feeding the dispatcher, one task per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::AuditConfig;
use crate::connection::{ClientConnection, TcpClientConnection};
use crate::dispatcher::AuditDispatcher;
use crate::error::Result;
use crate::state::StepOutcome;

/// Pause after a failed accept so persistent errors (EMFILE) do not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    failed: AtomicU64,
    active: AtomicUsize,
}

/// Counts one in-flight audit; released on drop, including when the task panics.
struct ActiveGuard(Arc<Counters>);

impl ActiveGuard {
    fn enter(counters: Arc<Counters>) -> Self {
        counters.active.fetch_add(1, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Snapshot of server statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    /// Connections accepted so far.
    pub accepted: u64,
    /// Connections whose dispatch returned an error.
    pub failed: u64,
    /// Connections currently being audited.
    pub active: usize,
}

/// Listening socket plus the dispatcher it feeds.
pub struct AuditServer {
    listener: TcpListener,
    dispatcher: AuditDispatcher,
    nodelay: bool,
    read_timeout: Duration,
    counters: Arc<Counters>,
}

impl AuditServer {
    /// Binds `config.listen_addr`.
    pub async fn bind(config: &AuditConfig, dispatcher: AuditDispatcher) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "audit server listening");
        Ok(Self {
            listener,
            dispatcher,
            nodelay: config.nodelay,
            read_timeout: config.read_timeout(),
            counters: Arc::new(Counters::default()),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Dispatcher connections are handed to.
    pub fn dispatcher(&self) -> &AuditDispatcher {
        &self.dispatcher
    }

    /// Current statistics.
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            accepted: self.counters.accepted.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            active: self.counters.active.load(Ordering::SeqCst),
        }
    }

    async fn accept_conn(&self) -> Result<TcpClientConnection> {
        let (stream, _) = self.listener.accept().await?;
        self.counters.accepted.fetch_add(1, Ordering::SeqCst);
        Ok(TcpClientConnection::from_stream(stream, self.nodelay)?
            .with_read_timeout(self.read_timeout))
    }

    /// Accepts a single connection and audits it inline.
    pub async fn accept_one(&self) -> Result<StepOutcome> {
        let conn = self.accept_conn().await?;
        let result = self.dispatcher.on_connection(&conn).await;
        if result.is_err() {
            self.counters.failed.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    /// Accepts connections until `shutdown` resolves, auditing each on its own task.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let conn = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("audit server shutting down");
                    return Ok(());
                }
                conn = self.accept_conn() => conn,
            };
            let conn = match conn {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let dispatcher = self.dispatcher.clone();
            let guard = ActiveGuard::enter(Arc::clone(&self.counters));
            tokio::spawn(async move {
                if let Err(e) = dispatcher.on_connection(&conn).await {
                    guard.0.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(peer_addr = conn.peer_addr(), error = %e, "connection not audited");
                }
                drop(guard);
            });
        }
    }
}
