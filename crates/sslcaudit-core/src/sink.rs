//! Output stream shared by every client state machine.
//!
//! Many publishers, one receiver. Delivery is FIFO per publisher call site;
//! since a client only publishes while holding its own lock, each client's
//! events arrive in causal order.

use tokio::sync::mpsc;

use crate::event::AuditEvent;

/// Creates a connected publisher/receiver pair.
pub fn event_channel() -> (EventPublisher, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventPublisher { tx }, EventReceiver { rx })
}

/// Producer side of the event stream.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl EventPublisher {
    /// Hands `event` to the consumer. A closed stream drops the event.
    pub fn publish(&self, event: AuditEvent) {
        let kind = event.kind();
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            tracing::warn!(
                client_id = %event.client_id(),
                kind,
                "event consumer is gone, dropping event"
            );
        }
    }

    /// True once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the event stream.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<AuditEvent>,
}

impl EventReceiver {
    /// Waits for the next event; `None` once every publisher is dropped.
    pub async fn recv(&mut self) -> Option<AuditEvent> {
        self.rx.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<AuditEvent> {
        self.rx.try_recv().ok()
    }

    /// Collects every event queued right now.
    pub fn drain(&mut self) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
