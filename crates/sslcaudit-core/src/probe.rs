//! Built-in auditor that classifies the first bytes a client sends.

use async_trait::async_trait;

use crate::auditor::Auditor;
use crate::connection::ClientConnection;
use crate::error::{AuditError, Result};
use crate::event::AuditOutcome;

const RECORD_HEADER_LEN: usize = 5;
const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const MAJOR_VERSION_TLS: u8 = 0x03;

/// Reports whether the client opened with a TLS handshake record.
#[derive(Debug, Clone)]
pub struct ClientHelloProbe {
    name: String,
}

impl ClientHelloProbe {
    /// Auditor name the binary maps to this probe.
    pub const NAME: &'static str = "client-hello-probe";

    /// Creates a probe under its default name.
    pub fn new() -> Self {
        Self::named(Self::NAME)
    }

    /// Creates a probe reporting under `name`.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Classifies a record header prefix.
    ///
    /// Only a complete five-byte header counts as a handshake; a shorter
    /// prefix that opens like one is `truncated`.
    pub fn classify(header: &[u8]) -> &'static str {
        match header {
            [] => "no-data",
            [CONTENT_TYPE_HANDSHAKE, MAJOR_VERSION_TLS, _, _, _, ..] => "tls-client-hello",
            [CONTENT_TYPE_HANDSHAKE, ..] if header.len() < RECORD_HEADER_LEN => "truncated",
            _ => "not-tls",
        }
    }
}

impl Default for ClientHelloProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Auditor for ClientHelloProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, conn: &dyn ClientConnection) -> Result<AuditOutcome> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        let mut filled = 0;
        while filled < RECORD_HEADER_LEN {
            let n = match conn.read(&mut header[filled..]).await {
                Ok(n) => n,
                Err(AuditError::ReadTimeout { timeout_ms }) => {
                    tracing::debug!(peer_addr = conn.peer_addr(), timeout_ms, filled, "client went quiet");
                    if filled == 0 {
                        return Ok(AuditOutcome::new(&self.name, conn.peer_addr(), "timeout"));
                    }
                    break;
                }
                Err(e) => return Err(e),
            };
            if n == 0 {
                break;
            }
            filled += n;
        }
        let verdict = Self::classify(&header[..filled]);
        Ok(AuditOutcome::new(&self.name, conn.peer_addr(), verdict))
    }
}
