//! Client identity derived from a connection's peer address.
//!
//! A client is keyed by the host portion of its peer address only, so every
//! connection from one host lands on the same audit state regardless of the
//! ephemeral source port it happened to use.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::connection::ClientConnection;
use crate::error::{AuditError, Result};

/// Stable key identifying a logical client under audit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wraps an already-derived key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the identity from a peer address string (`ip:port`, `[v6]:port` or a bare host).
    pub fn from_peer_addr(peer_addr: &str) -> Result<Self> {
        let unavailable = || AuditError::IdentityUnavailable {
            peer_addr: peer_addr.to_string(),
        };

        let addr = peer_addr.trim();
        if addr.is_empty() {
            return Err(unavailable());
        }

        if let Ok(sock) = addr.parse::<SocketAddr>() {
            return Ok(Self(sock.ip().to_string()));
        }

        let host = if let Some(rest) = addr.strip_prefix('[') {
            rest.split_once(']').map(|(host, _)| host).unwrap_or(rest)
        } else {
            match addr.rsplit_once(':') {
                // a second colon means a bare IPv6 literal, keep it whole
                Some((host, _)) if !host.contains(':') => host,
                _ => addr,
            }
        };

        if host.is_empty() {
            return Err(unavailable());
        }
        Ok(Self(host.to_string()))
    }

    /// Derives the identity of whoever is on the other end of `conn`.
    pub fn of(conn: &dyn ClientConnection) -> Result<Self> {
        Self::from_peer_addr(conn.peer_addr())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
