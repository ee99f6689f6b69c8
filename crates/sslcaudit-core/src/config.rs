//! Audit server configuration

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// One named battery: auditor names in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryConfig {
    /// Unique battery name.
    pub name: String,
    /// Auditor names, resolved when the auditor set is built.
    #[serde(default)]
    pub auditors: Vec<String>,
}

impl BatteryConfig {
    /// Creates a battery entry.
    pub fn new(name: &str, auditors: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            auditors: auditors.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Top-level configuration, immutable once the server starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Address the audit server listens on (default: 0.0.0.0:8443).
    pub listen_addr: SocketAddr,
    /// Whether to enable TCP_NODELAY on accepted sockets (default: true).
    pub nodelay: bool,
    /// Upper bound on a single read from a client, in milliseconds (default: 10000).
    pub read_timeout_ms: u64,
    /// Batteries in execution order.
    pub batteries: Vec<BatteryConfig>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8443)),
            nodelay: true,
            read_timeout_ms: 10_000,
            batteries: Vec::new(),
        }
    }
}

impl AuditConfig {
    /// Loads a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: AuditConfig = match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents).map_err(|e| AuditError::Config(e.to_string()))?,
            "json" => {
                serde_json::from_str(&contents).map_err(|e| AuditError::Config(e.to_string()))?
            }
            _ => {
                return Err(AuditError::Config(format!(
                    "unsupported config file extension: {:?}",
                    ext
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects unnamed and duplicate batteries.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        if self.read_timeout_ms == 0 {
            return Err(AuditError::Config("read_timeout_ms must be positive".into()));
        }
        for battery in &self.batteries {
            if battery.name.trim().is_empty() {
                return Err(AuditError::Config("battery name must not be empty".into()));
            }
            if !seen.insert(battery.name.as_str()) {
                return Err(AuditError::Config(format!(
                    "duplicate battery {:?}",
                    battery.name
                )));
            }
        }
        Ok(())
    }

    /// Read timeout applied to accepted connections.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Total number of auditor entries across batteries.
    pub fn auditor_count(&self) -> usize {
        self.batteries.iter().map(|b| b.auditors.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with_suffix(suffix: &str) -> NamedTempFile {
        tempfile::Builder::new().suffix(suffix).tempfile().unwrap()
    }

    #[test]
    fn test_default_values() {
        let config = AuditConfig::default();
        assert_eq!(config.listen_addr, SocketAddr::from(([0, 0, 0, 0], 8443)));
        assert!(config.nodelay);
        assert_eq!(config.read_timeout(), Duration::from_secs(10));
        assert!(config.batteries.is_empty());
        assert_eq!(config.auditor_count(), 0);
    }

    #[test]
    fn test_load_toml() {
        let mut file = temp_with_suffix(".toml");
        writeln!(
            file,
            r#"
listen_addr = "127.0.0.1:4433"
read_timeout_ms = 250

[[batteries]]
name = "certs"
auditors = ["a", "b"]

[[batteries]]
name = "probe"
auditors = ["c"]
"#
        )
        .unwrap();
        let config = AuditConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen_addr, SocketAddr::from(([127, 0, 0, 1], 4433)));
        assert_eq!(config.read_timeout_ms, 250);
        assert!(config.nodelay);
        assert_eq!(config.batteries[0], BatteryConfig::new("certs", &["a", "b"]));
        assert_eq!(config.auditor_count(), 3);
    }

    #[test]
    fn test_load_json() {
        let mut file = temp_with_suffix(".json");
        write!(
            file,
            r#"{{"nodelay": false, "batteries": [{{"name": "x", "auditors": ["a"]}}]}}"#
        )
        .unwrap();
        let config = AuditConfig::from_file(file.path()).unwrap();
        assert!(!config.nodelay);
        assert_eq!(config.batteries.len(), 1);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = temp_with_suffix(".yaml");
        assert!(matches!(
            AuditConfig::from_file(file.path()),
            Err(AuditError::Config(_))
        ));
    }

    #[test]
    fn test_duplicate_battery_rejected() {
        let config = AuditConfig {
            batteries: vec![BatteryConfig::new("a", &[]), BatteryConfig::new("a", &["x"])],
            ..AuditConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_battery_name_rejected() {
        let config = AuditConfig {
            batteries: vec![BatteryConfig::new(" ", &["x"])],
            ..AuditConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_read_timeout_rejected() {
        let config = AuditConfig {
            read_timeout_ms: 0,
            ..AuditConfig::default()
        };
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));
    }
}
