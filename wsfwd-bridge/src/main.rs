//! wsfwd bridge for a Linux/desktop host
//!
//! Connects to the controller's node endpoint over WebSocket and relays
//! commands to a BLE peripheral found by name.

mod ble;
mod ws;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use log::*;
use tokio::time::MissedTickBehavior;
use wsfwd_node::{Bridge, BridgeConfig, Clock};

use ble::BleLink;
use ws::{WsEvent, WsTransport};

#[derive(Parser, Debug)]
#[command(name = "wsfwd-bridge")]
#[command(about = "Relay controller commands from a WebSocket to a BLE peripheral")]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Controller URL (ws://host:port/path)
    #[arg(short, long)]
    url: Option<String>,
    /// Auth token sent to the controller
    #[arg(short, long)]
    token: Option<String>,
    /// Node identifier sent with the token
    #[arg(long)]
    node_id: Option<String>,
    /// Advertised name (or part of it) of the peripheral
    #[arg(short, long)]
    device: Option<String>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => BridgeConfig::default(),
        };

        if let Some(url) = self.url {
            config.server_url = url;
        }
        if let Some(token) = self.token {
            config.token = token;
        }
        if let Some(node_id) = self.node_id {
            config.node_id = node_id;
        }
        if let Some(device) = self.device {
            config.device_name = device;
        }
        Ok(config)
    }
}

/// Milliseconds since process start
struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config()?;
    if config.token.is_empty() {
        warn!("No auth token configured");
    }

    let link = BleLink::new();
    let (transport, outbox) = WsTransport::new();
    let mut bridge = Bridge::new(&config, link.clone(), link.clone(), transport, MonotonicClock::new())?;
    bridge.dump_config();

    let adapter = ble::get_adapter().await?;
    tokio::spawn(link.run(adapter, config.device_name.clone()));

    let mut events = ws::spawn(
        bridge.endpoint().to_string(),
        Duration::from_millis(config.reconnect_interval_ms),
        outbox,
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(WsEvent::Connected) => bridge.on_connected(),
                Some(WsEvent::Disconnected) => bridge.on_disconnected(),
                Some(WsEvent::Text(text)) => bridge.on_text(&text),
                None => anyhow::bail!("transport task stopped"),
            },
            _ = ticker.tick() => bridge.poll(),
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
