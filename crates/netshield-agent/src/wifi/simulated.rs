//! In-memory radio for `--simulate` and local development.
//!
//! Generates a realistic, jittering signal for the bound network so the
//! monitor, failover and telemetry paths can be exercised on any machine.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;

use super::{CapabilityError, ConnectionStatus, NetworkCapability, NetworkProfile};

/// A saved network with the signal range it reports when bound.
struct SimNetwork {
    profile: NetworkProfile,
    visible: bool,
    signal: std::ops::RangeInclusive<u8>,
}

pub struct SimulatedRadio {
    networks: Vec<SimNetwork>,
    bound: Mutex<usize>,
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        let net = |name: &str, visible: bool, signal| SimNetwork {
            profile: NetworkProfile::new(name),
            visible,
            signal,
        };
        Self {
            networks: vec![
                net("esperance", true, 35..=75),
                net("KIIT-WIFI-DU", true, 60..=95),
                net("OPPO A9 2020", false, 70..=90),
            ],
            bound: Mutex::new(0),
        }
    }
}

impl SimulatedRadio {
    fn bound_index(&self) -> usize {
        // A poisoned lock still holds a valid index.
        *self.bound.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NetworkCapability for SimulatedRadio {
    async fn list_profiles(&self) -> Result<Vec<NetworkProfile>, CapabilityError> {
        Ok(self.networks.iter().map(|n| n.profile.clone()).collect())
    }

    async fn current_status(&self) -> Result<ConnectionStatus, CapabilityError> {
        let net = &self.networks[self.bound_index()];
        let signal_percent = rand::rng().random_range(net.signal.clone());
        Ok(ConnectionStatus {
            interface_name: "wlan0".into(),
            ssid: net.profile.clean_identifier.clone(),
            profile: net.profile.raw_identifier.clone(),
            signal_percent,
        })
    }

    async fn connect(&self, profile: &NetworkProfile) -> Result<(), CapabilityError> {
        let idx = self
            .networks
            .iter()
            .position(|n| n.profile == *profile)
            .ok_or_else(|| CapabilityError::UnknownProfile(profile.clean_identifier.clone()))?;
        *self.bound.lock().unwrap_or_else(|e| e.into_inner()) = idx;
        tracing::debug!(profile = %profile.clean_identifier, "simulated radio switched");
        Ok(())
    }

    async fn visible_networks(&self) -> Result<Vec<String>, CapabilityError> {
        Ok(self
            .networks
            .iter()
            .filter(|n| n.visible)
            .map(|n| n.profile.clean_identifier.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_moves_the_bound_profile() {
        let radio = SimulatedRadio::default();
        let before = radio.current_status().await.unwrap();
        assert_eq!(before.profile, "esperance");

        let target = NetworkProfile::new("KIIT-WIFI-DU");
        radio.connect(&target).await.unwrap();

        let after = radio.current_status().await.unwrap();
        assert_eq!(after.ssid, "KIIT-WIFI-DU");
        assert!((60..=95).contains(&after.signal_percent));
    }

    #[tokio::test]
    async fn unknown_profiles_are_rejected() {
        let radio = SimulatedRadio::default();
        let err = radio.connect(&NetworkProfile::new("nope")).await.unwrap_err();
        assert!(matches!(err, CapabilityError::UnknownProfile(_)));
    }
}
