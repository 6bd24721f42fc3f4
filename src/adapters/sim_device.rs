//! Simulated feeder firmware.
//!
//! Plays the device side of the wire protocol for demos and tests:
//!
//! - announces `device_online` at boot,
//! - sends `{"type":"hb","rssi":..}` every heartbeat interval,
//! - answers `feed_now` with `feed_done` after the servo hold time,
//! - echoes `schedule_saved` / `schedule_cleared` / `config_saved`.
//!
//! The simulator is a plain state machine driven by [`SimulatedFeeder::poll`];
//! the runtime moves its output onto the transport.  `drop_acks` swallows
//! every `feed_done`, which is how an at-most-once transport looks when
//! the acknowledgment is lost.

use core::time::Duration;
use std::collections::VecDeque;

use log::{debug, info, warn};
use serde_json::Value;

use crate::model::{DeviceConfig, Timestamp};
use crate::schedule::Schedule;

/// Simulator behaviour knobs.
#[derive(Debug, Clone)]
pub struct SimOptions {
    pub heartbeat_interval: Duration,
    /// Extra delay on top of the configured servo hold before `feed_done`.
    pub ack_delay: Duration,
    pub drop_acks: bool,
    pub rssi: i32,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(20),
            ack_delay: Duration::from_millis(1_500),
            drop_acks: false,
            rssi: -62,
        }
    }
}

pub struct SimulatedFeeder {
    options: SimOptions,
    schedule: Schedule,
    config: DeviceConfig,
    booted: bool,
    next_heartbeat: Option<Timestamp>,
    feed_done_at: Option<Timestamp>,
    /// Echoes waiting for the next poll.
    outbox: VecDeque<String>,
    feeds: u32,
}

impl SimulatedFeeder {
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            schedule: Schedule::new(),
            config: DeviceConfig::default(),
            booted: false,
            next_heartbeat: None,
            feed_done_at: None,
            outbox: VecDeque::new(),
            feeds: 0,
        }
    }

    /// Handle one payload received on the command channel.
    pub fn on_command(&mut self, payload: &str, now: Timestamp) {
        let payload = payload.trim();
        if payload == "feed_now" {
            self.start_feed(now);
            return;
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!("SimFeeder: unparseable command '{}': {}", payload, e);
                return;
            }
        };
        match value.get("type").and_then(Value::as_str) {
            Some("set_schedule") => {
                let csv = value.get("times").and_then(Value::as_str).unwrap_or("");
                match Schedule::from_csv(csv) {
                    Ok(s) => {
                        self.schedule = s;
                        self.outbox.push_back("schedule_saved".to_string());
                    }
                    Err(e) => warn!("SimFeeder: bad schedule '{}': {}", csv, e),
                }
            }
            Some("clear_schedule") => {
                self.schedule.clear();
                self.outbox.push_back("schedule_cleared".to_string());
            }
            Some("set_config") => match serde_json::from_value::<DeviceConfig>(value) {
                Ok(c) => {
                    self.config = c;
                    self.outbox.push_back("config_saved".to_string());
                }
                Err(e) => warn!("SimFeeder: bad config: {}", e),
            },
            other => warn!("SimFeeder: unknown command {:?}", other),
        }
    }

    fn start_feed(&mut self, now: Timestamp) {
        if self.feed_done_at.is_some() {
            debug!("SimFeeder: feed already running, ignoring");
            return;
        }
        let hold = Duration::from_millis(u64::from(self.config.feed_ms));
        self.feed_done_at = Some(now.after(hold + self.options.ack_delay));
        info!("SimFeeder: dispensing ({}ms hold)", self.config.feed_ms);
    }

    /// Collect every event payload due at `now`, oldest first.
    pub fn poll(&mut self, now: Timestamp) -> Vec<String> {
        let mut out = Vec::new();

        if !self.booted {
            self.booted = true;
            self.next_heartbeat = Some(now.after(self.options.heartbeat_interval));
            out.push("device_online".to_string());
        }

        out.extend(self.outbox.drain(..));

        if let Some(due) = self.feed_done_at {
            if now >= due {
                self.feed_done_at = None;
                self.feeds += 1;
                if self.options.drop_acks {
                    info!("SimFeeder: feed finished, ack dropped");
                } else {
                    out.push("feed_done".to_string());
                }
            }
        }

        if let Some(due) = self.next_heartbeat {
            if now >= due {
                self.next_heartbeat = Some(now.after(self.options.heartbeat_interval));
                out.push(format!(r#"{{"type":"hb","rssi":{}}}"#, self.options.rssi));
            }
        }
        out
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Feeds physically completed, acknowledged or not.
    pub fn feeds(&self) -> u32 {
        self.feeds
    }
}
