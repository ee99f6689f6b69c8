//! Per-client audit state machine.
//!
//! Each client walks the flattened auditor sequence one connection at a time:
//!
//! ```text
//! Fresh --first conn--> Active --conn--> Active ... --last conn--> Exhausted
//!   \--first conn, no auditors configured----------------------> Exhausted
//! ```
//!
//! The next auditor is prefetched right after the current one completes, so
//! exhaustion is detected on the connection that ran the last auditor rather
//! than on the one after it. Callers must serialize `step` per client; the
//! registry hands the state out behind a mutex for that purpose.

use std::fmt;
use std::sync::Arc;

use crate::auditor::Auditor;
use crate::connection::ClientConnection;
use crate::error::Result;
use crate::event::{AuditEvent, ClientAuditResult};
use crate::identity::ClientId;
use crate::sink::EventPublisher;

/// Where a client is in its audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditPhase {
    /// No connection seen yet.
    Fresh,
    /// An auditor is prefetched for the next connection.
    Active,
    /// Sequence exhausted; further connections are ignored.
    Exhausted,
}

/// What a single `step` did with its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The client had no auditors; only the empty aggregate was published.
    NoAuditors,
    /// `auditor` ran and more auditors remain.
    Audited {
        /// Auditor that handled the connection.
        auditor: String,
    },
    /// `auditor` ran and was the last one; end and aggregate were published.
    Completed {
        /// Auditor that handled the connection.
        auditor: String,
    },
    /// The client was already exhausted; the connection was not used.
    AlreadyExhausted,
}

/// Progress and accumulated results for one client.
pub struct ClientAuditState {
    client_id: ClientId,
    sequence: Arc<[Arc<dyn Auditor>]>,
    /// index of the next element to pull from `sequence`
    cursor: usize,
    /// index of the prefetched auditor
    next: Option<usize>,
    result: ClientAuditResult,
    used: usize,
    done: bool,
}

impl ClientAuditState {
    /// Creates a fresh state that will walk `sequence` from the start.
    pub fn new(client_id: ClientId, sequence: Arc<[Arc<dyn Auditor>]>) -> Self {
        let result = ClientAuditResult::new(client_id.clone());
        Self {
            client_id,
            sequence,
            cursor: 0,
            next: None,
            result,
            used: 0,
            done: false,
        }
    }

    /// Client this state belongs to.
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Current phase.
    pub fn phase(&self) -> AuditPhase {
        if self.done {
            AuditPhase::Exhausted
        } else if self.next.is_some() {
            AuditPhase::Active
        } else {
            AuditPhase::Fresh
        }
    }

    /// True once no further auditor will run for this client.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of auditors that completed on a connection.
    pub fn auditors_used(&self) -> usize {
        self.used
    }

    /// Number of auditors pulled from the sequence so far, including the prefetched one.
    pub fn fetched(&self) -> usize {
        self.cursor
    }

    /// Name of the auditor that will handle the next connection.
    pub fn next_auditor(&self) -> Option<&str> {
        self.next.map(|i| self.sequence[i].name())
    }

    /// Outcomes accumulated so far.
    pub fn result(&self) -> &ClientAuditResult {
        &self.result
    }

    fn pull(&mut self) -> Option<usize> {
        if self.cursor < self.sequence.len() {
            let idx = self.cursor;
            self.cursor += 1;
            Some(idx)
        } else {
            None
        }
    }

    /// Advances the audit by one connection, publishing events to `events`.
    ///
    /// An auditor error is returned as-is and leaves the prefetched auditor in
    /// place, so the next connection from this client retries it.
    pub async fn step(
        &mut self,
        conn: &dyn ClientConnection,
        events: &EventPublisher,
    ) -> Result<StepOutcome> {
        if self.done {
            tracing::debug!(client_id = %self.client_id, peer_addr = conn.peer_addr(), "no more tests for client");
            return Ok(StepOutcome::AlreadyExhausted);
        }

        let idx = match self.next {
            Some(idx) => idx,
            None => match self.pull() {
                Some(idx) => {
                    events.publish(AuditEvent::Start {
                        client_id: self.client_id.clone(),
                        auditor: self.sequence[idx].name().to_string(),
                    });
                    self.next = Some(idx);
                    idx
                }
                None => {
                    tracing::debug!(client_id = %self.client_id, "no tests configured for client");
                    self.done = true;
                    events.publish(AuditEvent::Result(self.result.clone()));
                    return Ok(StepOutcome::NoAuditors);
                }
            },
        };

        let auditor = Arc::clone(&self.sequence[idx]);
        let outcome = auditor.handle(conn).await?;
        tracing::debug!(
            client_id = %self.client_id,
            peer_addr = conn.peer_addr(),
            auditor = auditor.name(),
            result = %outcome.result,
            "connection audited"
        );

        self.used += 1;
        self.result.add(outcome.clone());
        events.publish(AuditEvent::Outcome {
            client_id: self.client_id.clone(),
            outcome,
        });

        let name = auditor.name().to_string();
        match self.pull() {
            Some(next) => {
                self.next = Some(next);
                Ok(StepOutcome::Audited { auditor: name })
            }
            None => {
                tracing::debug!(client_id = %self.client_id, auditors = self.used, "auditor sequence exhausted");
                self.next = None;
                self.done = true;
                events.publish(AuditEvent::End {
                    client_id: self.client_id.clone(),
                });
                events.publish(AuditEvent::Result(self.result.clone()));
                Ok(StepOutcome::Completed { auditor: name })
            }
        }
    }
}

impl fmt::Debug for ClientAuditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAuditState")
            .field("client_id", &self.client_id)
            .field("phase", &self.phase())
            .field("next_auditor", &self.next_auditor())
            .field("used", &self.used)
            .field("total", &self.sequence.len())
            .finish()
    }
}
