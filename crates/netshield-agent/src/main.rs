//! NetShield Agent
//!
//! Long-running daemon on each managed laptop.
//!
//! - Scores Wi-Fi link health every cycle from signal and ping latency
//! - Fails over to a preferred (or any visible saved) network when degraded
//! - Streams one metric per cycle to the collector over WebSocket
//! - Serves the latest snapshot on a loopback HTTP facade
//! - In `--simulate` mode, drives an in-memory radio instead of the OS

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use netshield_agent::config::AgentConfig;
use netshield_agent::monitor::{AgentIdentity, Monitor};
use netshield_agent::probe::PingProbe;
use netshield_agent::telemetry::TelemetryChannel;
use netshield_agent::{status, wifi};
use netshield_common::protocol::AgentHello;

/// NetShield Wi-Fi health agent.
#[derive(Parser, Debug)]
#[command(name = "netshield-agent", about = "Wi-Fi health monitor with automatic failover")]
struct Cli {
    /// TOML config file. Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Collector WebSocket URL.
    #[arg(long, default_value = "ws://localhost:8082/agent/ws")]
    collector_url: String,

    /// Status facade listen address.
    #[arg(long, default_value = "127.0.0.1:9090")]
    status_addr: String,

    /// Device hostname override.
    #[arg(long)]
    hostname: Option<String>,

    /// Run against a simulated radio instead of the OS.
    #[arg(long, default_value_t = false)]
    simulate: bool,

    /// Start in scan mode (reconnect to any visible saved network).
    #[arg(long, default_value_t = false)]
    scan_mode: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    let hostname = cli
        .hostname
        .unwrap_or_else(|| gethostname().unwrap_or_else(|| "netshield-agent".into()));
    let status_addr: SocketAddr = cli.status_addr.parse()?;

    let identity = AgentIdentity {
        device_id: config
            .identity
            .device_id
            .clone()
            .unwrap_or_else(|| hostname.clone()),
        user_id: config.identity.user_id.clone(),
        domain: config.identity.domain.clone(),
    };

    tracing::info!(
        hostname = %hostname,
        device_id = %identity.device_id,
        simulate = cli.simulate,
        collector_url = %cli.collector_url,
        "netshield-agent starting"
    );

    let radio = wifi::platform_default(cli.simulate);
    let probe = Arc::new(PingProbe::new(config.monitor.ping_host.clone()));

    let hello = AgentHello {
        device_id: identity.device_id.clone(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        hostname: hostname.clone(),
        arch: std::env::consts::ARCH.to_string(),
    };
    let connect_timeout = config.monitor.command_timeout();

    let mut monitor = Monitor::new(radio, probe, config.monitor, identity);
    match TelemetryChannel::connect(&cli.collector_url, &hello, connect_timeout).await {
        Ok(channel) => monitor = monitor.with_sink(Arc::new(channel)),
        Err(e) => tracing::warn!(error = %e, "collector unavailable, running standalone"),
    }
    monitor.set_switch_automatically(cli.scan_mode);
    let monitor = Arc::new(monitor);

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Task 1: Health monitor ─────────────────────────────────
    let monitor_handle = tokio::spawn(monitor.clone().run(shutdown_rx));

    // ── Task 2: Status facade (HTTP) ───────────────────────────
    // A facade failure is logged by the task; monitoring carries on.
    let _status_handle = status::spawn(monitor, status_addr);

    // ── Shutdown handling ───────────────────────────────────────
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("waiting for SIGINT failed: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("received SIGINT, shutting down");

    let _ = shutdown_tx.send(true);
    if let Err(e) = monitor_handle.await {
        tracing::error!("monitor task failed: {e}");
    }

    tracing::info!("netshield-agent stopped");
    Ok(())
}

fn gethostname() -> Option<String> {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
