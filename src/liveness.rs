//! Liveness tracker — online/offline signal derived from event recency.
//!
//! Every classified event (heartbeats included) pushes the staleness
//! deadline to `at + threshold` and marks the device online.  When a
//! [`LivenessInput::Tick`] observes the deadline has passed with the device
//! still online, the tracker flips offline exactly once.
//!
//! The offline transition is a debounce: the threshold must comfortably
//! exceed the heartbeat interval (see
//! [`CoordinatorConfig::validate`](crate::config::CoordinatorConfig::validate)).

use core::time::Duration;

use log::{debug, info};

use crate::model::Timestamp;

/// Snapshot of what the coordinator knows about device liveness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLiveness {
    pub online: bool,
    pub last_seen_at: Option<Timestamp>,
    /// Tag of the most recent event (`"—"` before any event).
    pub last_event_label: String,
    pub last_signal: Option<i32>,
    /// When the device will be declared offline; `None` when no timer is armed.
    pub stale_deadline: Option<Timestamp>,
}

impl Default for DeviceLiveness {
    fn default() -> Self {
        Self {
            online: false,
            last_seen_at: None,
            last_event_label: "—".to_string(),
            last_signal: None,
            stale_deadline: None,
        }
    }
}

/// Inputs to the tracker's transition function.
#[derive(Debug, Clone, Copy)]
pub enum LivenessInput<'a> {
    /// A classified event arrived.
    Observed {
        at: Timestamp,
        label: &'a str,
        signal: Option<i32>,
    },
    /// Time advanced; fire the staleness deadline if due.
    Tick { now: Timestamp },
}

/// Transitions worth surfacing to the rest of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEffect {
    CameOnline,
    WentOffline { last_seen_at: Option<Timestamp> },
}

/// Owns [`DeviceLiveness`] and its staleness deadline.
pub struct LivenessTracker {
    state: DeviceLiveness,
    threshold: Duration,
}

impl LivenessTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            state: DeviceLiveness::default(),
            threshold,
        }
    }

    /// The single state-transition function for liveness.
    pub fn apply(&mut self, input: LivenessInput<'_>) -> Option<LivenessEffect> {
        match input {
            LivenessInput::Observed { at, label, signal } => {
                let was_online = self.state.online;
                let deadline = at.after(self.threshold);

                self.state.online = true;
                self.state.last_seen_at = Some(self.state.last_seen_at.map_or(at, |s| s.max(at)));
                self.state.last_event_label = label.to_string();
                if signal.is_some() {
                    self.state.last_signal = signal;
                }
                // Late deliveries never pull the deadline backwards.
                self.state.stale_deadline =
                    Some(self.state.stale_deadline.map_or(deadline, |d| d.max(deadline)));

                debug!("Liveness: '{}' seen, stale at {}", label, deadline);
                (!was_online).then_some(LivenessEffect::CameOnline)
            }

            LivenessInput::Tick { now } => match self.state.stale_deadline {
                Some(deadline) if self.state.online && now >= deadline => {
                    self.state.online = false;
                    self.state.stale_deadline = None;
                    info!(
                        "Liveness: no events for {}ms, device offline",
                        self.threshold.as_millis()
                    );
                    Some(LivenessEffect::WentOffline {
                        last_seen_at: self.state.last_seen_at,
                    })
                }
                _ => None,
            },
        }
    }

    /// Disarm the staleness deadline (session teardown).
    pub fn cancel(&mut self) {
        self.state.stale_deadline = None;
    }

    pub fn state(&self) -> &DeviceLiveness {
        &self.state
    }

    pub fn is_online(&self) -> bool {
        self.state.online
    }

    pub fn has_deadline(&self) -> bool {
        self.state.stale_deadline.is_some()
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}
