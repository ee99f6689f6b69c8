#![warn(missing_docs)]

//! sslcaudit core: per-client audit orchestration over repeated connections

pub mod auditor;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod identity;
pub mod probe;
pub mod registry;
pub mod server;
pub mod sink;
pub mod state;

pub use auditor::{Auditor, AuditorBattery, AuditorSet};
pub use config::{AuditConfig, BatteryConfig};
pub use connection::{ClientConnection, TcpClientConnection};
pub use dispatcher::AuditDispatcher;
pub use error::{AuditError, Result};
pub use event::{AuditEvent, AuditOutcome, ClientAuditResult};
pub use identity::ClientId;
pub use registry::ClientAuditRegistry;
pub use server::AuditServer;
pub use sink::{event_channel, EventPublisher, EventReceiver};
pub use state::{AuditPhase, ClientAuditState, StepOutcome};
