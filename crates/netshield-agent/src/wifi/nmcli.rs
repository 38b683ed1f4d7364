//! NetworkManager adapter over `nmcli` terse output.

use async_trait::async_trait;

use super::{CapabilityError, ConnectionStatus, NetworkCapability, NetworkProfile, run_tool};

const WIRELESS_TYPE: &str = "802-11-wireless";

/// Drives NetworkManager through `nmcli -t`.
pub struct NmcliCapability;

#[async_trait]
impl NetworkCapability for NmcliCapability {
    async fn list_profiles(&self) -> Result<Vec<NetworkProfile>, CapabilityError> {
        let out = run_tool("nmcli", &["-t", "-f", "NAME,TYPE", "connection", "show"]).await?;
        Ok(parse_profiles(&out))
    }

    async fn current_status(&self) -> Result<ConnectionStatus, CapabilityError> {
        let wifi = run_tool(
            "nmcli",
            &["-t", "-f", "ACTIVE,SSID,SIGNAL,DEVICE", "device", "wifi", "list"],
        )
        .await?;
        let (ssid, signal_percent, interface_name) =
            parse_active_wifi(&wifi).ok_or(CapabilityError::NoActiveInterface)?;

        let active = run_tool(
            "nmcli",
            &["-t", "-f", "NAME,DEVICE", "connection", "show", "--active"],
        )
        .await?;
        let profile = parse_active_connection(&active, &interface_name).unwrap_or_default();

        Ok(ConnectionStatus {
            interface_name,
            ssid,
            profile,
            signal_percent,
        })
    }

    async fn connect(&self, profile: &NetworkProfile) -> Result<(), CapabilityError> {
        run_tool("nmcli", &["connection", "up", "id", &profile.raw_identifier]).await?;
        Ok(())
    }

    async fn visible_networks(&self) -> Result<Vec<String>, CapabilityError> {
        let out = run_tool("nmcli", &["-t", "-f", "SSID", "device", "wifi", "list"]).await?;
        let mut ssids: Vec<String> = Vec::new();
        for line in out.lines() {
            let ssid = split_terse(line).into_iter().next().unwrap_or_default();
            if !ssid.is_empty() && !ssids.contains(&ssid) {
                ssids.push(ssid);
            }
        }
        Ok(ssids)
    }
}

/// Split one line of `nmcli -t` output on unescaped colons.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.trim_end_matches('\r').chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Wireless connection profiles from `connection show`.
pub fn parse_profiles(output: &str) -> Vec<NetworkProfile> {
    output
        .lines()
        .filter_map(|line| match split_terse(line).as_slice() {
            [name, kind] if kind == WIRELESS_TYPE && !name.is_empty() => {
                Some(NetworkProfile::new(name.clone()))
            }
            _ => None,
        })
        .collect()
}

/// The associated access point from `device wifi list`: (ssid, signal, device).
pub fn parse_active_wifi(output: &str) -> Option<(String, u8, String)> {
    output.lines().find_map(|line| match split_terse(line).as_slice() {
        [active, ssid, signal, device] if active == "yes" && !ssid.is_empty() => {
            let signal = signal.parse::<u8>().unwrap_or(0).min(100);
            Some((ssid.clone(), signal, device.clone()))
        }
        _ => None,
    })
}

/// Name of the active connection bound to `device`.
pub fn parse_active_connection(output: &str, device: &str) -> Option<String> {
    output.lines().find_map(|line| match split_terse(line).as_slice() {
        [name, dev] if dev == device => Some(name.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terse_split_honours_escapes() {
        assert_eq!(split_terse(r"a\:b:c"), vec!["a:b", "c"]);
        assert_eq!(split_terse(r"back\\slash:"), vec![r"back\slash", ""]);
    }

    #[test]
    fn profiles_keep_only_wireless() {
        let out = "esperance:802-11-wireless\nWired connection 1:802-3-ethernet\nlo:loopback\nCafe\\: Free:802-11-wireless\n";
        let profiles = parse_profiles(out);
        let names: Vec<_> = profiles.iter().map(|p| p.clean_identifier.as_str()).collect();
        assert_eq!(names, vec!["esperance", "Cafe: Free"]);
    }

    #[test]
    fn active_wifi_row_is_found() {
        let out = "no:KIIT-WIFI-DU:70:wlp2s0\nyes:esperance:84:wlp2s0\nno::40:wlp2s0\n";
        assert_eq!(
            parse_active_wifi(out),
            Some(("esperance".to_string(), 84, "wlp2s0".to_string()))
        );
        assert_eq!(parse_active_wifi("no:x:10:wlp2s0\n"), None);
    }

    #[test]
    fn active_connection_matches_device() {
        let out = "Wired connection 1:enp3s0\nesperance:wlp2s0\n";
        assert_eq!(parse_active_connection(out, "wlp2s0").as_deref(), Some("esperance"));
        assert_eq!(parse_active_connection(out, "wlan9"), None);
    }
}
