//! Shared fakes for dispatcher integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sslcaudit_core::{
    AuditError, AuditEvent, AuditOutcome, Auditor, AuditorBattery, AuditorSet, ClientConnection,
    Result,
};

/// In-memory connection that only knows its peer address.
pub struct FakeConnection {
    peer_addr: String,
}

impl FakeConnection {
    pub fn new(peer_addr: &str) -> Self {
        Self {
            peer_addr: peer_addr.to_string(),
        }
    }
}

#[async_trait]
impl ClientConnection for FakeConnection {
    fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    fn local_addr(&self) -> &str {
        "127.0.0.1:8443"
    }

    async fn read(&self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    async fn write_all(&self, _buf: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Tracks how many auditors run at once across a group.
#[derive(Default)]
pub struct Overlap {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Overlap {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Scripted auditor: fixed result, optional delay, optional leading failures.
pub struct FakeAuditor {
    name: String,
    delay: Option<Duration>,
    failures_left: AtomicUsize,
    runs: AtomicUsize,
    overlap: Option<Arc<Overlap>>,
}

impl FakeAuditor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: None,
            failures_left: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            overlap: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(self, times: usize) -> Self {
        self.failures_left.store(times, Ordering::SeqCst);
        self
    }

    pub fn with_overlap(mut self, overlap: Arc<Overlap>) -> Self {
        self.overlap = Some(overlap);
        self
    }

    /// Completed (successful) runs.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn expected_result(name: &str) -> String {
        format!("{}-result", name)
    }
}

#[async_trait]
impl Auditor for FakeAuditor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, conn: &dyn ClientConnection) -> Result<AuditOutcome> {
        if let Some(overlap) = &self.overlap {
            let now = overlap.current.fetch_add(1, Ordering::SeqCst) + 1;
            overlap.peak.fetch_max(now, Ordering::SeqCst);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(overlap) = &self.overlap {
            overlap.current.fetch_sub(1, Ordering::SeqCst);
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AuditError::fault(&self.name, "scripted failure"));
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(AuditOutcome::new(
            &self.name,
            conn.peer_addr(),
            Self::expected_result(&self.name),
        ))
    }
}

/// Builds a set from battery shapes, returning the concrete auditors too.
pub fn auditor_set(batteries: &[(&str, &[&str])]) -> (AuditorSet, Vec<Arc<FakeAuditor>>) {
    let mut all = Vec::new();
    let batteries = batteries
        .iter()
        .map(|(name, auditors)| {
            let auditors = auditors
                .iter()
                .map(|a| {
                    let fake = Arc::new(FakeAuditor::new(a));
                    all.push(Arc::clone(&fake));
                    fake as Arc<dyn Auditor>
                })
                .collect();
            AuditorBattery::new(name, auditors)
        })
        .collect();
    (AuditorSet::new(batteries), all)
}

/// Event kinds, for compact sequence assertions.
pub fn kinds(events: &[AuditEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}

/// Events for one client, in arrival order.
pub fn events_for<'a>(events: &'a [AuditEvent], client: &str) -> Vec<&'a AuditEvent> {
    events
        .iter()
        .filter(|e| e.client_id().as_str() == client)
        .collect()
}
