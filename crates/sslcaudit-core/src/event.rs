//! Audit events and the per-client aggregate result.

use serde::{Deserialize, Serialize};

use crate::identity::ClientId;

/// What one auditor concluded about one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOutcome {
    /// Name of the auditor that produced this outcome.
    pub auditor: String,
    /// Peer address of the connection that was audited.
    pub peer_addr: String,
    /// Auditor-specific verdict, opaque to the orchestration layer.
    pub result: String,
}

impl AuditOutcome {
    /// Creates an outcome record.
    pub fn new(auditor: &str, peer_addr: &str, result: impl Into<String>) -> Self {
        Self {
            auditor: auditor.to_string(),
            peer_addr: peer_addr.to_string(),
            result: result.into(),
        }
    }
}

/// Accumulated outcomes for one client, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAuditResult {
    /// Client these outcomes belong to.
    pub client_id: ClientId,
    /// Every recorded outcome, oldest first.
    pub outcomes: Vec<AuditOutcome>,
}

impl ClientAuditResult {
    /// Creates an empty result for `client_id`.
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            outcomes: Vec::new(),
        }
    }

    /// Appends one outcome.
    pub fn add(&mut self, outcome: AuditOutcome) {
        self.outcomes.push(outcome);
    }

    /// Number of recorded outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Looks up the outcome produced by the named auditor.
    pub fn outcome_of(&self, auditor: &str) -> Option<&AuditOutcome> {
        self.outcomes.iter().find(|o| o.auditor == auditor)
    }
}

/// Everything published on the output stream.
///
/// Per client the stream carries `Start, Outcome*, End, Result`, or a lone
/// `Result` when the client had no auditors configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// First connection from a client; `auditor` is the one about to run.
    Start {
        /// Client being audited.
        client_id: ClientId,
        /// First auditor in the sequence.
        auditor: String,
    },
    /// One connection was audited.
    Outcome {
        /// Client the connection came from.
        client_id: ClientId,
        /// What the auditor reported.
        outcome: AuditOutcome,
    },
    /// The auditor sequence for this client is exhausted.
    End {
        /// Client whose audit finished.
        client_id: ClientId,
    },
    /// Final aggregate for the client.
    Result(ClientAuditResult),
}

impl AuditEvent {
    /// Client the event refers to.
    pub fn client_id(&self) -> &ClientId {
        match self {
            AuditEvent::Start { client_id, .. }
            | AuditEvent::Outcome { client_id, .. }
            | AuditEvent::End { client_id } => client_id,
            AuditEvent::Result(result) => &result.client_id,
        }
    }

    /// Short lowercase name of the variant, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::Start { .. } => "start",
            AuditEvent::Outcome { .. } => "outcome",
            AuditEvent::End { .. } => "end",
            AuditEvent::Result(_) => "result",
        }
    }
}
