//! Per-connection entry point.

use std::sync::Arc;

use crate::auditor::AuditorSet;
use crate::connection::ClientConnection;
use crate::error::Result;
use crate::identity::ClientId;
use crate::registry::ClientAuditRegistry;
use crate::sink::EventPublisher;
use crate::state::StepOutcome;

/// Routes each accepted connection to its client's state machine.
#[derive(Clone)]
pub struct AuditDispatcher {
    registry: Arc<ClientAuditRegistry>,
    events: EventPublisher,
}

impl AuditDispatcher {
    /// Creates a dispatcher with its own registry over `auditors`.
    pub fn new(auditors: AuditorSet, events: EventPublisher) -> Self {
        Self::with_registry(Arc::new(ClientAuditRegistry::new(auditors)), events)
    }

    /// Creates a dispatcher over an existing registry.
    pub fn with_registry(registry: Arc<ClientAuditRegistry>, events: EventPublisher) -> Self {
        Self { registry, events }
    }

    /// Registry backing this dispatcher.
    pub fn registry(&self) -> &Arc<ClientAuditRegistry> {
        &self.registry
    }

    /// Handles one accepted connection.
    ///
    /// Identity failures are logged and returned without touching any state.
    /// Auditor faults are returned unchanged; the client will retry the same
    /// auditor on its next connection.
    pub async fn on_connection(&self, conn: &dyn ClientConnection) -> Result<StepOutcome> {
        let client_id = match ClientId::of(conn) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(peer_addr = conn.peer_addr(), error = %e, "dropping connection");
                return Err(e);
            }
        };

        let state = self.registry.resolve(&client_id);
        // per-client lock, held across the whole step
        let mut state = state.lock().await;
        match state.step(conn, &self.events).await {
            Ok(StepOutcome::AlreadyExhausted) => {
                tracing::debug!(client_id = %client_id, "ignoring connection from exhausted client");
                Ok(StepOutcome::AlreadyExhausted)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(
                    client_id = %client_id,
                    auditor = state.next_auditor().unwrap_or_default(),
                    error = %e,
                    "auditor failed, will retry on next connection"
                );
                Err(e)
            }
        }
    }
}
