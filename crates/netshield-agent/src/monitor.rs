//! Health monitor — the periodic evaluation loop and failover state machine.
//!
//! Each tick reads the interface, probes latency, scores the link, publishes
//! a [`HealthSnapshot`] and emits one metric. A degraded link then triggers
//! either passive failover over the configured preferred profiles, or an
//! active reconnect to any visible saved network when
//! `switch_automatically` is on.
//!
//! Every external call is bounded by `command_timeout` and degrades to
//! "log and skip"; only cancellation ends the loop.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tokio::time::MissedTickBehavior;

use netshield_common::protocol::MetricEvent;

use crate::config::MonitorConfig;
use crate::probe::{LatencyProbe, ProbeError};
use crate::score::score;
use crate::telemetry::MetricSink;
use crate::wifi::{CapabilityError, ConnectionStatus, NetworkCapability, NetworkProfile, find_profile};

/// Externally visible result of the latest cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub ssid: String,
    pub profile: String,
    pub signal_percent: u8,
    pub avg_ping_ms: Option<u32>,
    pub score: u8,
    /// `None` until the first cycle completes; never moves backwards.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Labels stamped onto every emitted metric.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub device_id: String,
    /// Falls back to the bound profile name when unset.
    pub user_id: Option<String>,
    pub domain: String,
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("get current status: {0}")]
    Status(#[source] CapabilityError),
    #[error("list profiles: {0}")]
    Profiles(#[source] CapabilityError),
    #[error("list visible networks: {0}")]
    VisibleNetworks(#[source] CapabilityError),
    #[error("no suitable alternative profile found or all failed")]
    NoSuitableAlternative,
}

/// How a cycle that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Neither signal nor latency crossed a threshold.
    Healthy,
    /// Degraded, and a verified switch to `profile` succeeded.
    Switched { profile: String },
    /// Degraded in unverified scan mode; a connect to `profile` was issued.
    ConnectRequested { profile: String },
    /// Degraded in scan mode, but no visible network has a saved profile.
    NoCandidate,
}

pub struct Monitor {
    wifi: Arc<dyn NetworkCapability>,
    probe: Arc<dyn LatencyProbe>,
    sink: Option<Arc<dyn MetricSink>>,
    config: MonitorConfig,
    identity: AgentIdentity,
    switch_automatically: AtomicBool,
    snapshot: RwLock<HealthSnapshot>,
}

impl Monitor {
    pub fn new(
        wifi: Arc<dyn NetworkCapability>,
        probe: Arc<dyn LatencyProbe>,
        config: MonitorConfig,
        identity: AgentIdentity,
    ) -> Self {
        Self {
            wifi,
            probe,
            sink: None,
            config,
            identity,
            switch_automatically: AtomicBool::new(false),
            snapshot: RwLock::new(HealthSnapshot::default()),
        }
    }

    /// Attach a metric sink. Without one the monitor runs standalone.
    pub fn with_sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn is_standalone(&self) -> bool {
        self.sink.is_none()
    }

    /// Copy of the latest snapshot.
    pub async fn snapshot(&self) -> HealthSnapshot {
        self.snapshot.read().await.clone()
    }

    pub fn switch_automatically(&self) -> bool {
        self.switch_automatically.load(Ordering::Relaxed)
    }

    pub fn set_switch_automatically(&self, enabled: bool) {
        self.switch_automatically.store(enabled, Ordering::Relaxed);
    }

    /// Flip the failover mode and return the new value.
    pub fn toggle_switch_automatically(&self) -> bool {
        !self.switch_automatically.fetch_xor(true, Ordering::Relaxed)
    }

    /// Run cycles on every tick until `shutdown` flips to true or its sender
    /// is dropped. Cancellation is only observed between cycles.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_s = self.config.check_interval().as_secs(),
            standalone = self.is_standalone(),
            "health monitor started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.check_once().await {
                        Ok(outcome) => tracing::debug!(?outcome, "cycle complete"),
                        Err(e) => tracing::warn!(error = %e, "cycle failed"),
                    }
                }
            }
        }

        tracing::info!("health monitor stopped");
    }

    /// One evaluation cycle.
    pub async fn check_once(&self) -> Result<CycleOutcome, MonitorError> {
        let status = self
            .bounded(self.wifi.current_status())
            .await
            .map_err(MonitorError::Status)?;

        let latency = match self.measure_latency().await {
            Ok(ms) => Some(ms),
            Err(e) => {
                tracing::warn!(host = %self.config.ping_host, error = %e, "latency probe failed");
                None
            }
        };

        let score = self.publish(&status, latency).await;
        self.emit(&status, latency, score).await;

        let bad_signal =
            status.signal_percent > 0 && status.signal_percent < self.config.min_signal_percent;
        let bad_latency = latency.is_some_and(|ms| ms > self.config.max_avg_ping_ms);
        if !bad_signal && !bad_latency {
            return Ok(CycleOutcome::Healthy);
        }

        tracing::warn!(
            profile = %status.profile,
            signal = status.signal_percent,
            latency_ms = ?latency,
            bad_signal,
            bad_latency,
            "connection degraded"
        );

        if self.switch_automatically() {
            self.reconnect_visible(&status).await
        } else {
            self.failover(&status).await
        }
    }

    // ── Cycle steps ─────────────────────────────────────────────────

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CapabilityError>>,
    ) -> Result<T, CapabilityError> {
        let limit = self.config.command_timeout();
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(CapabilityError::Timeout(limit)))
    }

    async fn measure_latency(&self) -> Result<u32, ProbeError> {
        let limit = self.config.command_timeout();
        tokio::time::timeout(limit, self.probe.measure())
            .await
            .unwrap_or(Err(ProbeError::Timeout(limit)))
    }

    /// Replace the snapshot with one built from `status`; returns its score.
    async fn publish(&self, status: &ConnectionStatus, latency: Option<u32>) -> u8 {
        let score = score(status.signal_percent, latency);
        let now = Utc::now();

        let mut current = self.snapshot.write().await;
        let last_updated = match current.last_updated {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        *current = HealthSnapshot {
            ssid: status.ssid.clone(),
            profile: status.profile.clone(),
            signal_percent: status.signal_percent,
            avg_ping_ms: latency,
            score,
            last_updated: Some(last_updated),
        };
        score
    }

    async fn emit(&self, status: &ConnectionStatus, latency: Option<u32>, score: u8) {
        let Some(sink) = &self.sink else {
            tracing::trace!("standalone mode, metric not sent");
            return;
        };

        let metric = MetricEvent {
            device_id: self.identity.device_id.clone(),
            user_id: self
                .identity
                .user_id
                .clone()
                .unwrap_or_else(|| status.profile.clone()),
            domain: self.identity.domain.clone(),
            timestamp_unix: Utc::now().timestamp(),
            ssid: status.ssid.clone(),
            interface_name: status.interface_name.clone(),
            signal_percent: status.signal_percent,
            avg_latency_ms: latency,
            experience_score: score,
        };

        // A stuck send only costs this step; the rest of the cycle still runs.
        match tokio::time::timeout(self.config.command_timeout(), sink.report(&metric)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to report metric"),
            Err(_) => tracing::warn!("metric report timed out"),
        }
    }

    /// Passive mode: walk the preferred list in order.
    async fn failover(&self, current: &ConnectionStatus) -> Result<CycleOutcome, MonitorError> {
        let profiles = self
            .bounded(self.wifi.list_profiles())
            .await
            .map_err(MonitorError::Profiles)?;

        for preferred in &self.config.preferred_profiles {
            if is_bound(current, preferred) {
                continue;
            }
            let Some(candidate) = find_profile(&profiles, preferred) else {
                tracing::debug!(profile = %preferred, "preferred profile not saved on this device");
                continue;
            };
            if let Some(after) = self.try_switch(candidate).await {
                self.publish(&after, None).await;
                return Ok(CycleOutcome::Switched {
                    profile: candidate.clean_identifier.clone(),
                });
            }
        }

        Err(MonitorError::NoSuitableAlternative)
    }

    /// Scan mode: any visible network with a saved profile, in scan order.
    async fn reconnect_visible(
        &self,
        current: &ConnectionStatus,
    ) -> Result<CycleOutcome, MonitorError> {
        let visible = self
            .bounded(self.wifi.visible_networks())
            .await
            .map_err(MonitorError::VisibleNetworks)?;
        let saved = self
            .bounded(self.wifi.list_profiles())
            .await
            .map_err(MonitorError::Profiles)?;

        tracing::debug!(?visible, "visible networks");

        let candidates: Vec<&NetworkProfile> = visible
            .iter()
            .filter_map(|ssid| {
                let found = find_profile(&saved, ssid);
                if found.is_none() {
                    tracing::debug!(ssid = %ssid, "visible network has no saved profile");
                }
                found
            })
            .filter(|p| !is_bound(current, &p.clean_identifier))
            .collect();

        if candidates.is_empty() {
            return Ok(CycleOutcome::NoCandidate);
        }

        if !self.config.verify_scan_connect {
            for candidate in candidates {
                tracing::info!(profile = %candidate.clean_identifier, "attempting connect");
                match self.bounded(self.wifi.connect(candidate)).await {
                    Ok(()) => {
                        return Ok(CycleOutcome::ConnectRequested {
                            profile: candidate.clean_identifier.clone(),
                        });
                    }
                    Err(e) => tracing::warn!(profile = %candidate.clean_identifier, error = %e, "connect failed"),
                }
            }
            return Ok(CycleOutcome::NoCandidate);
        }

        for candidate in candidates {
            if let Some(after) = self.try_switch(candidate).await {
                self.publish(&after, None).await;
                return Ok(CycleOutcome::Switched {
                    profile: candidate.clean_identifier.clone(),
                });
            }
        }
        Err(MonitorError::NoSuitableAlternative)
    }

    /// Connect, wait for the link to settle, and verify it. Returns the
    /// post-switch status on success.
    async fn try_switch(&self, candidate: &NetworkProfile) -> Option<ConnectionStatus> {
        tracing::info!(profile = %candidate.clean_identifier, "attempting switch");
        if let Err(e) = self.bounded(self.wifi.connect(candidate)).await {
            tracing::warn!(profile = %candidate.clean_identifier, error = %e, "connect failed");
            return None;
        }

        tokio::time::sleep(self.config.settle_delay()).await;

        let after = match self.bounded(self.wifi.current_status()).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "after-switch status read failed");
                return None;
            }
        };
        tracing::info!(status = %after, "after switch");

        let bound = candidate.matches(&after.profile) || candidate.matches(&after.ssid);
        if bound && after.signal_percent >= self.config.min_signal_percent {
            tracing::info!(profile = %candidate.clean_identifier, signal = after.signal_percent, "failover successful");
            Some(after)
        } else {
            tracing::warn!(
                profile = %candidate.clean_identifier,
                bound,
                signal = after.signal_percent,
                "switch did not verify"
            );
            None
        }
    }
}

/// Whether `name` is the profile or network the interface is bound to now.
fn is_bound(current: &ConnectionStatus, name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && (name == current.profile.trim() || name == current.ssid.trim())
}
