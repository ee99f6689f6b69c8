//! Error types for the sslcaudit orchestration core

use thiserror::Error;

/// Errors surfaced by identity extraction, auditor execution and configuration.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The connection did not expose a usable peer address.
    #[error("client identity unavailable for peer address {peer_addr:?}")]
    IdentityUnavailable {
        /// The raw peer address reported by the connection.
        peer_addr: String,
    },

    /// An auditor failed while handling a connection.
    #[error("auditor {auditor} faulted: {reason}")]
    AuditorFault {
        /// Name of the auditor that failed.
        auditor: String,
        /// Human-readable failure description.
        reason: String,
    },

    /// The peer sent nothing within the configured read timeout.
    #[error("read timed out after {timeout_ms}ms")]
    ReadTimeout {
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying socket error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AuditError {
    /// Builds an [`AuditError::AuditorFault`] for the named auditor.
    pub fn fault(auditor: &str, reason: impl Into<String>) -> Self {
        AuditError::AuditorFault {
            auditor: auditor.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        let err = AuditError::fault("expired-cert", "handshake stalled");
        assert_eq!(err.to_string(), "auditor expired-cert faulted: handshake stalled");
    }

    #[test]
    fn test_identity_unavailable_display() {
        let err = AuditError::IdentityUnavailable {
            peer_addr: String::new(),
        };
        assert!(err.to_string().contains("identity unavailable"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: AuditError = io.into();
        assert!(matches!(err, AuditError::Io(_)));
    }
}
