//! Windows adapter over `netsh wlan`.

use async_trait::async_trait;

use super::{CapabilityError, ConnectionStatus, NetworkCapability, NetworkProfile, run_tool};

/// Drives the WLAN AutoConfig service through `netsh`.
pub struct NetshCapability;

#[async_trait]
impl NetworkCapability for NetshCapability {
    async fn list_profiles(&self) -> Result<Vec<NetworkProfile>, CapabilityError> {
        let out = run_tool("netsh", &["wlan", "show", "profiles"]).await?;
        Ok(parse_profiles(&out))
    }

    async fn current_status(&self) -> Result<ConnectionStatus, CapabilityError> {
        let out = run_tool("netsh", &["wlan", "show", "interfaces"]).await?;
        parse_interfaces(&out).ok_or(CapabilityError::NoActiveInterface)
    }

    async fn connect(&self, profile: &NetworkProfile) -> Result<(), CapabilityError> {
        let name = format!("name={}", profile.raw_identifier);
        run_tool("netsh", &["wlan", "connect", &name]).await?;
        Ok(())
    }

    async fn visible_networks(&self) -> Result<Vec<String>, CapabilityError> {
        let out = run_tool("netsh", &["wlan", "show", "networks", "mode=bssid"]).await?;
        Ok(parse_visible_networks(&out))
    }
}

/// Parse `netsh wlan show profiles`.
///
/// The raw name keeps any trailing whitespace the OS stored; only the single
/// separator space after the colon is dropped.
pub fn parse_profiles(output: &str) -> Vec<NetworkProfile> {
    output
        .lines()
        .filter(|line| line.contains("All User Profile"))
        .filter_map(|line| line.trim_end_matches(['\r', '\n']).split_once(':'))
        .map(|(_, raw)| NetworkProfile::new(raw.strip_prefix(' ').unwrap_or(raw)))
        .collect()
}

/// Parse `netsh wlan show interfaces`. Returns `None` unless both an
/// interface name and an SSID are present.
pub fn parse_interfaces(output: &str) -> Option<ConnectionStatus> {
    let mut interface_name = String::new();
    let mut ssid = String::new();
    let mut profile = String::new();
    let mut signal_percent = 0u8;

    for line in output.lines().map(str::trim) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "Name" if interface_name.is_empty() => interface_name = value.to_string(),
            "SSID" => ssid = value.to_string(),
            "Profile" => profile = value.to_string(),
            "Signal" => {
                if let Ok(v) = value.trim_end_matches('%').trim().parse::<u8>() {
                    signal_percent = v.min(100);
                }
            }
            _ => {}
        }
    }

    if interface_name.is_empty() || ssid.is_empty() {
        return None;
    }
    Some(ConnectionStatus {
        interface_name,
        ssid,
        profile,
        signal_percent,
    })
}

/// Parse `netsh wlan show networks mode=bssid` into distinct SSIDs, in the
/// order they were listed.
pub fn parse_visible_networks(output: &str) -> Vec<String> {
    let mut ssids: Vec<String> = Vec::new();
    for line in output.lines().map(str::trim) {
        if !line.starts_with("SSID ") {
            continue;
        }
        if let Some((_, name)) = line.split_once(" : ") {
            let name = name.trim();
            if !name.is_empty() && !ssids.iter().any(|s| s == name) {
                ssids.push(name.to_string());
            }
        }
    }
    ssids
}
