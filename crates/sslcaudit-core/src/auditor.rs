//! Auditor units and the ordered batteries they are grouped into.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AuditConfig;
use crate::connection::ClientConnection;
use crate::error::{AuditError, Result};
use crate::event::AuditOutcome;

/// A single protocol test applied to exactly one client connection.
///
/// Implementations may block on the connection for as long as the test
/// requires. A returned error is treated as an auditor fault and propagated
/// to the dispatcher's caller untouched.
#[async_trait]
pub trait Auditor: Send + Sync {
    /// Stable name reported in events.
    fn name(&self) -> &str;

    /// Runs the test against `conn`.
    async fn handle(&self, conn: &dyn ClientConnection) -> Result<AuditOutcome>;
}

/// Named, ordered group of auditors.
#[derive(Clone)]
pub struct AuditorBattery {
    name: String,
    auditors: Vec<Arc<dyn Auditor>>,
}

impl AuditorBattery {
    /// Creates a battery from auditors in execution order.
    pub fn new(name: &str, auditors: Vec<Arc<dyn Auditor>>) -> Self {
        Self {
            name: name.to_string(),
            auditors,
        }
    }

    /// Battery name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Auditors in execution order.
    pub fn auditors(&self) -> &[Arc<dyn Auditor>] {
        &self.auditors
    }
}

impl fmt::Debug for AuditorBattery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.auditors.iter().map(|a| a.name()).collect();
        f.debug_struct("AuditorBattery")
            .field("name", &self.name)
            .field("auditors", &names)
            .finish()
    }
}

/// Immutable configured batteries, concatenated into one linear sequence.
#[derive(Clone)]
pub struct AuditorSet {
    batteries: Vec<AuditorBattery>,
    sequence: Arc<[Arc<dyn Auditor>]>,
}

impl AuditorSet {
    /// Flattens `batteries` in order.
    pub fn new(batteries: Vec<AuditorBattery>) -> Self {
        let sequence: Vec<Arc<dyn Auditor>> = batteries
            .iter()
            .flat_map(|b| b.auditors.iter().cloned())
            .collect();
        Self {
            batteries,
            sequence: sequence.into(),
        }
    }

    /// A set with no auditors at all.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Builds the set described by `config`, resolving each auditor name through `resolve`.
    pub fn from_config<F>(config: &AuditConfig, mut resolve: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<Arc<dyn Auditor>>,
    {
        config.validate()?;
        let mut batteries = Vec::with_capacity(config.batteries.len());
        for battery in &config.batteries {
            let mut auditors = Vec::with_capacity(battery.auditors.len());
            for name in &battery.auditors {
                let auditor = resolve(name).ok_or_else(|| {
                    AuditError::Config(format!(
                        "unknown auditor {:?} in battery {:?}",
                        name, battery.name
                    ))
                })?;
                auditors.push(auditor);
            }
            batteries.push(AuditorBattery::new(&battery.name, auditors));
        }
        Ok(Self::new(batteries))
    }

    /// Configured batteries.
    pub fn batteries(&self) -> &[AuditorBattery] {
        &self.batteries
    }

    /// Shared handle to the flattened sequence.
    pub fn sequence(&self) -> Arc<[Arc<dyn Auditor>]> {
        Arc::clone(&self.sequence)
    }

    /// Total number of auditors across all batteries.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// True when no battery contains any auditor.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

impl fmt::Debug for AuditorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditorSet")
            .field("batteries", &self.batteries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatteryConfig;

    struct Named(&'static str);

    #[async_trait]
    impl Auditor for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn handle(&self, conn: &dyn ClientConnection) -> Result<AuditOutcome> {
            Ok(AuditOutcome::new(self.0, conn.peer_addr(), "ok"))
        }
    }

    fn named(name: &'static str) -> Arc<dyn Auditor> {
        Arc::new(Named(name))
    }

    #[test]
    fn test_flatten_preserves_order() {
        let set = AuditorSet::new(vec![
            AuditorBattery::new("first", vec![named("a"), named("b")]),
            AuditorBattery::new("empty", vec![]),
            AuditorBattery::new("second", vec![named("c")]),
        ]);
        let seq = set.sequence();
        let names: Vec<&str> = seq.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.batteries().len(), 3);
    }

    #[test]
    fn test_empty_set() {
        let set = AuditorSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.sequence().len(), 0);
    }

    #[test]
    fn test_from_config_resolves_names() {
        let config = AuditConfig {
            batteries: vec![
                BatteryConfig::new("certs", &["a", "b"]),
                BatteryConfig::new("protocols", &["c"]),
            ],
            ..AuditConfig::default()
        };
        let set = AuditorSet::from_config(&config, |name| match name {
            "a" => Some(named("a")),
            "b" => Some(named("b")),
            "c" => Some(named("c")),
            _ => None,
        })
        .unwrap();
        let seq = set.sequence();
        let names: Vec<&str> = seq.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(set.batteries()[1].name(), "protocols");
    }

    #[test]
    fn test_from_config_unknown_auditor() {
        let config = AuditConfig {
            batteries: vec![BatteryConfig::new("certs", &["missing"])],
            ..AuditConfig::default()
        };
        let err = AuditorSet::from_config(&config, |_| None).unwrap_err();
        assert!(matches!(err, AuditError::Config(msg) if msg.contains("missing")));
    }

    #[test]
    fn test_debug_lists_names() {
        let set = AuditorSet::new(vec![AuditorBattery::new("certs", vec![named("a")])]);
        let debug_str = format!("{:?}", set);
        assert!(debug_str.contains("certs"));
        assert!(debug_str.contains("\"a\""));
    }
}
