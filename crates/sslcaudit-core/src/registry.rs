//! Registry of per-client audit state.
//!
//! Append-only: a client's state lives for the whole process, which is what
//! keeps an exhausted client exhausted. Eviction is not implemented.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::auditor::AuditorSet;
use crate::identity::ClientId;
use crate::state::ClientAuditState;

/// Shared handle to one client's state; hold the lock for a whole `step`.
pub type SharedClientState = Arc<Mutex<ClientAuditState>>;

/// Maps client identities to their audit state.
pub struct ClientAuditRegistry {
    auditors: AuditorSet,
    clients: DashMap<ClientId, SharedClientState>,
}

impl ClientAuditRegistry {
    /// Creates an empty registry that starts every new client on `auditors`.
    pub fn new(auditors: AuditorSet) -> Self {
        Self {
            auditors,
            clients: DashMap::new(),
        }
    }

    /// Returns the state for `client_id`, creating a fresh one on first sight.
    ///
    /// The map shard lock is only held for the lookup or insert.
    pub fn resolve(&self, client_id: &ClientId) -> SharedClientState {
        if let Some(existing) = self.clients.get(client_id) {
            return Arc::clone(existing.value());
        }
        let entry = self.clients.entry(client_id.clone()).or_insert_with(|| {
            tracing::debug!(client_id = %client_id, auditors = self.auditors.len(), "new client");
            Arc::new(Mutex::new(ClientAuditState::new(
                client_id.clone(),
                self.auditors.sequence(),
            )))
        });
        Arc::clone(entry.value())
    }

    /// True if `client_id` has been seen.
    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Number of clients seen so far.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True when no client has connected yet.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Identities of every client seen, sorted.
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.clients.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Auditor configuration new clients start from.
    pub fn auditors(&self) -> &AuditorSet {
        &self.auditors
    }
}
