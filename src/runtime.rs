//! Async simulation runtime — drives one coordinator session end to end.
//!
//! Runs on the calling thread using `edge-executor` for cooperative
//! multi-task scheduling and `async-io-mini` for reactor-driven timers.
//! Four concurrent futures share the session through `Rc<RefCell<_>>`:
//!
//! 1. **Tick** — fires coordinator deadlines every `tick_interval_ms`
//! 2. **Inbound** — truly async via `to_coordinator.receive().await`
//! 3. **Device** — the simulated feeder, polled every 50ms
//! 4. **Operator** — a scripted sequence of [`OperatorCommand`]s
//!
//! ```text
//!  ┌───────────────────────────────────────────────────────────┐
//!  │  futures_lite::block_on                                   │
//!  │  ┌─────────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                       │  │
//!  │  │  ┌────────┐ ┌───────────┐ ┌────────┐ ┌──────────┐   │  │
//!  │  │  │  Tick  │ │  Inbound  │ │ Device │ │ Operator │   │  │
//!  │  │  │ 250ms  │ │ wake-on-  │ │ 50ms   │ │ scripted │   │  │
//!  │  │  │        │ │ send      │ │        │ │          │   │  │
//!  │  │  └────────┘ └───────────┘ └────────┘ └──────────┘   │  │
//!  │  └─────────────────────────────────────────────────────┘  │
//!  └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Borrows of the session never span an `.await`.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

// Host time driver behind every `async_io_mini::Timer`.
use embassy_time as _;
use log::{info, warn};

use crate::adapters::channel_transport::{ChannelTransport, Link, Message};
use crate::adapters::log_sink::LogNotifier;
use crate::adapters::memory_store::MemoryStore;
use crate::adapters::sim_device::{SimOptions, SimulatedFeeder};
use crate::adapters::time::SystemClock;
use crate::app::commands::OperatorCommand;
use crate::app::ports::ClockPort;
use crate::app::service::{Coordinator, FeederStatus};
use crate::config::CoordinatorConfig;
use crate::connection::{ConnectionChange, ConnectionState};
use crate::event_log::EventLogEntry;
use crate::liveness::DeviceLiveness;
use crate::model::{DeviceConfig, PersistedDeviceState};
use crate::protocol::InboundPayload;

/// Device poll period.
const DEVICE_POLL: Duration = Duration::from_millis(50);

pub type SimCoordinator = Coordinator<ChannelTransport, MemoryStore, LogNotifier>;

type SharedCoordinator = Rc<RefCell<SimCoordinator>>;
type SharedClock = Rc<SystemClock>;

/// One scripted operator action, issued `after` the previous one.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub after: Duration,
    pub command: OperatorCommand,
}

impl ScriptStep {
    pub fn new(after_ms: u64, command: OperatorCommand) -> Self {
        Self {
            after: Duration::from_millis(after_ms),
            command,
        }
    }
}

/// Simulation parameters beyond the coordinator configuration.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub duration: Duration,
    pub drop_acks: bool,
    pub script: Vec<ScriptStep>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
            drop_acks: false,
            script: default_script(),
        }
    }
}

/// Feed, save a schedule, save a config, then feed again.
pub fn default_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::new(2_000, OperatorCommand::FeedNow),
        ScriptStep::new(
            2_000,
            OperatorCommand::SaveSchedule(vec!["20:00".into(), "8:00".into()]),
        ),
        ScriptStep::new(
            2_000,
            OperatorCommand::SaveConfig(DeviceConfig {
                feed_ms: 600,
                ..DeviceConfig::default()
            }),
        ),
        ScriptStep::new(2_000, OperatorCommand::FeedNow),
    ]
}

/// What the session looked like when the simulation ended.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Newest first.
    pub entries: Vec<EventLogEntry>,
    pub liveness: DeviceLiveness,
    pub persisted: PersistedDeviceState,
    pub status: FeederStatus,
    pub device_feeds: u32,
}

// ── Tasks ────────────────────────────────────────────────────

async fn tick_loop(coord: SharedCoordinator, clock: SharedClock, period: Duration) {
    loop {
        coord.borrow_mut().tick(clock.now());
        async_io_mini::Timer::after(period).await;
    }
}

/// Deliver device events to the session.  Wakes as soon as the device
/// side sends; no polling.
async fn inbound_loop(coord: SharedCoordinator, link: Rc<Link>, clock: SharedClock) {
    loop {
        let msg = link.to_coordinator.receive().await;
        let mut c = coord.borrow_mut();
        if !c.transport().is_subscribed(&msg.topic) {
            continue;
        }
        c.handle_inbound(&InboundPayload::from(msg.payload), clock.now());
    }
}

async fn device_loop(
    feeder: Rc<RefCell<SimulatedFeeder>>,
    link: Rc<Link>,
    clock: SharedClock,
    cmd_topic: String,
    evt_topic: String,
) {
    loop {
        let now = clock.now();
        {
            let mut f = feeder.borrow_mut();
            while let Ok(msg) = link.to_device.try_receive() {
                if msg.topic == cmd_topic {
                    f.on_command(&msg.payload, now);
                }
            }
            for payload in f.poll(now) {
                let msg = Message {
                    topic: evt_topic.clone(),
                    payload,
                };
                if link.to_coordinator.try_send(msg).is_err() {
                    warn!("SimFeeder: event channel full, dropping event");
                }
            }
        }
        async_io_mini::Timer::after(DEVICE_POLL).await;
    }
}

async fn operator_loop(coord: SharedCoordinator, clock: SharedClock, script: Vec<ScriptStep>) {
    for step in script {
        async_io_mini::Timer::after(step.after).await;
        let now = clock.now();
        match coord.borrow_mut().handle_command(step.command.clone(), now) {
            Ok(outcome) => info!("Operator: {:?} -> {:?}", step.command, outcome),
            Err(e) => warn!("Operator: {:?} failed: {}", step.command, e),
        }
    }
}

// ── Entry point ──────────────────────────────────────────────

/// Run a simulated session for `options.duration` and report its final state.
pub fn run(config: CoordinatorConfig, options: SimulationOptions) -> SimulationReport {
    let clock: SharedClock = Rc::new(SystemClock::new());
    let link = Rc::new(Link::new());

    let sim = SimOptions {
        heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms),
        drop_acks: options.drop_acks,
        ..SimOptions::default()
    };
    let feeder = Rc::new(RefCell::new(SimulatedFeeder::new(sim)));

    let tick = config.tick_interval();
    let coordinator = Coordinator::new(
        config,
        ChannelTransport::new(link.clone()),
        MemoryStore::new(),
        LogNotifier::new(),
    );
    let coord: SharedCoordinator = Rc::new(RefCell::new(coordinator));
    let (cmd_topic, evt_topic) = {
        let c = coord.borrow();
        (c.topics().command.clone(), c.topics().event.clone())
    };

    {
        let mut c = coord.borrow_mut();
        let now = clock.now();
        link.set_up(true);
        c.on_connection_change(ConnectionChange::new(ConnectionState::Connecting), now);
        c.on_connection_change(ConnectionChange::new(ConnectionState::Connected), now);
        if let Err(e) = c.start(now) {
            warn!("Runtime: session start failed: {}", e);
        }
    }

    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    executor
        .spawn(tick_loop(coord.clone(), clock.clone(), tick))
        .detach();
    executor
        .spawn(inbound_loop(coord.clone(), link.clone(), clock.clone()))
        .detach();
    executor
        .spawn(device_loop(feeder.clone(), link.clone(), clock.clone(), cmd_topic, evt_topic))
        .detach();
    executor
        .spawn(operator_loop(coord.clone(), clock.clone(), options.script))
        .detach();

    info!("Runtime: simulation started ({}s)", options.duration.as_secs());
    futures_lite::future::block_on(executor.run(async_io_mini::Timer::after(options.duration)));

    let mut c = coord.borrow_mut();
    c.shutdown();
    link.set_up(false);
    info!("Runtime: simulation finished");

    SimulationReport {
        entries: c.event_log().iter().cloned().collect(),
        liveness: c.liveness().clone(),
        persisted: c.persisted().clone(),
        status: c.status(),
        device_feeds: feeder.borrow().feeds(),
    }
}
