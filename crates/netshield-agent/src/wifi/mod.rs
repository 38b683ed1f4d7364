//! Network capability — the narrow contract the monitor uses to read and
//! control the wireless interface.
//!
//! Each platform adapter owns its own text parsing; the monitor only ever
//! sees the typed records below.
//!
//! - [`netsh::NetshCapability`] drives `netsh wlan` on Windows
//! - [`nmcli::NmcliCapability`] drives NetworkManager everywhere else
//! - [`simulated::SimulatedRadio`] is an in-memory radio for `--simulate`

pub mod netsh;
pub mod nmcli;
pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Records ─────────────────────────────────────────────────────────

/// A saved network profile as known to the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Name exactly as the OS stores it; used when requesting a connection.
    pub raw_identifier: String,
    /// Trimmed display form; used for matching against configuration.
    pub clean_identifier: String,
}

impl NetworkProfile {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw_identifier = raw.into();
        let clean_identifier = raw_identifier.trim().to_string();
        Self {
            raw_identifier,
            clean_identifier,
        }
    }

    /// True when `name` refers to this profile by either of its forms.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        !name.is_empty() && (self.clean_identifier == name || self.raw_identifier.trim() == name)
    }
}

/// Point-in-time read of the wireless interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub interface_name: String,
    pub ssid: String,
    pub profile: String,
    /// 0–100; 0 means the adapter did not report a value.
    pub signal_percent: u8,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "interface={} ssid={} profile={} signal={}%",
            self.interface_name, self.ssid, self.profile, self.signal_percent
        )
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{command} failed: {reason}")]
    CommandFailed { command: String, reason: String },
    #[error("no active wireless interface found")]
    NoActiveInterface,
    #[error("profile not available: {0}")]
    UnknownProfile(String),
    #[error("no answer within {0:?}")]
    Timeout(std::time::Duration),
}

// ── Capability ──────────────────────────────────────────────────────

/// Query and control the single wireless interface this agent manages.
#[async_trait]
pub trait NetworkCapability: Send + Sync {
    /// Saved profiles; re-read on every call because they change externally.
    async fn list_profiles(&self) -> Result<Vec<NetworkProfile>, CapabilityError>;

    /// Current connection; fails when no interface is associated.
    async fn current_status(&self) -> Result<ConnectionStatus, CapabilityError>;

    /// Ask the OS to associate with `profile`. Returns once the request is
    /// accepted, not once the link is up.
    async fn connect(&self, profile: &NetworkProfile) -> Result<(), CapabilityError>;

    /// Network identifiers currently visible over the air.
    async fn visible_networks(&self) -> Result<Vec<String>, CapabilityError>;
}

/// Pick the capability for the running platform.
pub fn platform_default(simulate: bool) -> Arc<dyn NetworkCapability> {
    if simulate {
        return Arc::new(simulated::SimulatedRadio::default());
    }
    if cfg!(windows) {
        Arc::new(netsh::NetshCapability)
    } else {
        Arc::new(nmcli::NmcliCapability)
    }
}

/// Find a saved profile by its display name.
pub fn find_profile<'a>(profiles: &'a [NetworkProfile], name: &str) -> Option<&'a NetworkProfile> {
    profiles.iter().find(|p| p.matches(name))
}

/// Run an external tool and return its stdout, mapping failures into
/// [`CapabilityError::CommandFailed`].
pub(crate) async fn run_tool(program: &str, args: &[&str]) -> Result<String, CapabilityError> {
    let command = format!("{program} {}", args.join(" "));
    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CapabilityError::CommandFailed {
            command: command.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(CapabilityError::CommandFailed {
            command,
            reason: format!(
                "{} | stderr: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
