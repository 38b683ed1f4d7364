//! Agent configuration, loaded from an optional TOML file.
//!
//! Every field has a default, so an empty file (or none at all) yields a
//! working agent.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub monitor: MonitorConfig,
    pub identity: IdentityConfig,
}

/// Thresholds, timing and failover policy for the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Signal below this (and above zero) counts as degraded; a switch only
    /// succeeds when the new link reaches it.
    pub min_signal_percent: u8,
    /// Mean latency above this counts as degraded.
    pub max_avg_ping_ms: u32,
    pub ping_host: String,
    pub check_interval_secs: u64,
    /// Wait after a connect request before re-reading status.
    pub settle_delay_secs: u64,
    /// Deadline for every capability call and the probe.
    pub command_timeout_secs: u64,
    /// Passive failover candidates, first listed first tried.
    pub preferred_profiles: Vec<String>,
    /// Apply the settle delay and signal check in scan mode too.
    pub verify_scan_connect: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_signal_percent: 60,
            max_avg_ping_ms: 120,
            ping_host: "8.8.8.8".into(),
            check_interval_secs: 10,
            settle_delay_secs: 7,
            command_timeout_secs: 15,
            preferred_profiles: vec![
                "esperance".into(),
                "KIIT-WIFI-DU".into(),
                "OPPO A9 2020".into(),
            ],
            verify_scan_connect: true,
        }
    }
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }
}

/// Labels stamped onto every metric event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Defaults to the hostname.
    pub device_id: Option<String>,
    /// Defaults to the bound profile name.
    pub user_id: Option<String>,
    pub domain: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            user_id: None,
            domain: "laptop".into(),
        }
    }
}

impl AgentConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = AgentConfig::parse("").unwrap();
        assert_eq!(cfg.monitor.min_signal_percent, 60);
        assert_eq!(cfg.monitor.max_avg_ping_ms, 120);
        assert_eq!(cfg.monitor.ping_host, "8.8.8.8");
        assert_eq!(cfg.monitor.check_interval(), Duration::from_secs(10));
        assert_eq!(cfg.monitor.settle_delay(), Duration::from_secs(7));
        assert!(cfg.monitor.verify_scan_connect);
        assert_eq!(
            cfg.monitor.preferred_profiles,
            ["esperance", "KIIT-WIFI-DU", "OPPO A9 2020"]
        );
        assert_eq!(cfg.identity.domain, "laptop");
    }

    #[test]
    fn partial_sections_override_only_given_fields() {
        let cfg = AgentConfig::parse(
            r#"
[monitor]
min_signal_percent = 50
preferred_profiles = ["esperance", "KIIT-WIFI-DU", "OPPO A9 2020"]

[identity]
device_id = "lab-laptop"
"#,
        )
        .unwrap();
        assert_eq!(cfg.monitor.min_signal_percent, 50);
        assert_eq!(cfg.monitor.max_avg_ping_ms, 120);
        assert_eq!(cfg.monitor.preferred_profiles.len(), 3);
        assert_eq!(cfg.identity.device_id.as_deref(), Some("lab-laptop"));
        assert_eq!(cfg.identity.domain, "laptop");
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(AgentConfig::parse("[monitor]\nmin_signal_percent = \"high\"").is_err());
    }
}
