//! feederlink — simulated feeder session.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                   │
//! │                                                            │
//! │  ChannelTransport   MemoryStore   LogNotifier  SystemClock │
//! │  (TransportPort)    (StorePort)   (Notices)    (ClockPort) │
//! │                                                            │
//! │  ─────────────── Port Trait Boundary ──────────────────    │
//! │                                                            │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │            Coordinator (pure logic)                  │  │
//! │  │  Classifier · Liveness · Dispatcher · Reconciler     │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                                                            │
//! │  SimulatedFeeder (device side) · runtime (async driver)    │
//! └────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use feederlink::cli::Cli;
use feederlink::config::CoordinatorConfig;
use feederlink::runtime::{self, SimulationOptions};

fn setup_logging() {
    // RUST_LOG, when set, refines the info default.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let mut config =
        CoordinatorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(id) = cli.device_id {
        config.device_id = id;
        config.validate().context("Invalid --device-id")?;
    }

    info!("feederlink v{} starting for '{}'", env!("CARGO_PKG_VERSION"), config.device_id);

    let report = runtime::run(
        config,
        SimulationOptions {
            duration: Duration::from_secs(cli.duration_secs),
            drop_acks: cli.drop_acks,
            ..SimulationOptions::default()
        },
    );

    println!("Event log (newest first):");
    for entry in &report.entries {
        println!("  #{:<3} {:>15}  {:<16} {}", entry.id, entry.at, entry.label, entry.detail);
    }
    println!();
    println!(
        "Device: {} (last event '{}', rssi {:?})",
        if report.liveness.online { "online" } else { "offline" },
        report.liveness.last_event_label,
        report.liveness.last_signal,
    );
    println!("Status: {:?}", report.status);
    println!("Schedule: {}", report.persisted.schedule);
    println!(
        "Feeds dispensed by device: {} (last confirmed: {})",
        report.device_feeds,
        report
            .persisted
            .last_feed_at
            .map_or_else(|| "never".to_string(), |t| t.to_string()),
    );
    Ok(())
}
