//! Command dispatcher — single-in-flight feed discipline and ack deadline.
//!
//! ```text
//!            FeedRequested                 AckObserved (before deadline)
//!   (none) ───────────────▶ Pending ─────────────────────────────▶ Acknowledged
//!                              │  Tick (now >= deadline)
//!                              ├──────────────────────────────────▶ TimedOut
//!                              │  PublishFailed
//!                              └──────────────────────────────────▶ Abandoned
//! ```
//!
//! Acknowledgment is correlated by kind only: the device sends no request
//! id, so any `feed_done` while a feed is pending acknowledges it.  A
//! `feed_done` with nothing pending (duplicate delivery, device-scheduled
//! feed) leaves the dispatcher untouched.
//!
//! A timeout is evidence of a missing confirmation, not proof of failure.

use core::time::Duration;

use log::{info, warn};

use crate::model::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Feed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Pending,
    Acknowledged,
    TimedOut,
    /// The publish itself failed; no acknowledgment can arrive.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    pub kind: CommandKind,
    pub issued_at: Timestamp,
    pub deadline: Timestamp,
    pub status: CommandStatus,
}

/// Inputs to the dispatcher's transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchInput {
    FeedRequested { now: Timestamp },
    AckObserved { now: Timestamp },
    PublishFailed,
    Tick { now: Timestamp },
}

/// What the coordinator must do in response to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEffect {
    /// A feed is now pending; publish `feed_now`.
    Dispatched { deadline: Timestamp },
    /// A feed is already pending; nothing changed.
    Rejected,
    Acknowledged { at: Timestamp, latency: Duration },
    TimedOut { issued_at: Timestamp },
    Abandoned,
    /// `feed_done` with nothing pending.
    Unsolicited { at: Timestamp },
}

/// Owns the in-flight feed command and its acknowledgment deadline.
pub struct CommandDispatcher {
    ack_timeout: Duration,
    in_flight: Option<PendingCommand>,
    last_settled: Option<PendingCommand>,
}

impl CommandDispatcher {
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            ack_timeout,
            in_flight: None,
            last_settled: None,
        }
    }

    /// The single state-transition function for feed commands.
    pub fn apply(&mut self, input: DispatchInput) -> Option<DispatchEffect> {
        match input {
            DispatchInput::FeedRequested { now } => {
                if self.in_flight.is_some() {
                    warn!("Dispatcher: feed rejected, one already pending");
                    return Some(DispatchEffect::Rejected);
                }
                let deadline = now.after(self.ack_timeout);
                self.in_flight = Some(PendingCommand {
                    kind: CommandKind::Feed,
                    issued_at: now,
                    deadline,
                    status: CommandStatus::Pending,
                });
                info!("Dispatcher: feed pending, ack deadline {}", deadline);
                Some(DispatchEffect::Dispatched { deadline })
            }

            DispatchInput::AckObserved { now } => match self.settle(CommandStatus::Acknowledged) {
                Some(cmd) => {
                    let latency = now.since(cmd.issued_at);
                    info!("Dispatcher: feed acknowledged after {}ms", latency.as_millis());
                    Some(DispatchEffect::Acknowledged { at: now, latency })
                }
                None => Some(DispatchEffect::Unsolicited { at: now }),
            },

            DispatchInput::PublishFailed => self
                .settle(CommandStatus::Abandoned)
                .map(|_| DispatchEffect::Abandoned),

            DispatchInput::Tick { now } => match self.in_flight {
                Some(cmd) if now >= cmd.deadline => {
                    self.settle(CommandStatus::TimedOut);
                    warn!("Dispatcher: no feed_done by {}, timed out", cmd.deadline);
                    Some(DispatchEffect::TimedOut {
                        issued_at: cmd.issued_at,
                    })
                }
                _ => None,
            },
        }
    }

    /// Drop any pending command without reporting (session teardown).
    pub fn cancel(&mut self) {
        self.in_flight = None;
    }

    pub fn in_flight(&self) -> Option<&PendingCommand> {
        self.in_flight.as_ref()
    }

    pub fn is_feed_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The most recently settled command, with its final status.
    pub fn last_settled(&self) -> Option<&PendingCommand> {
        self.last_settled.as_ref()
    }

    fn settle(&mut self, status: CommandStatus) -> Option<PendingCommand> {
        let mut cmd = self.in_flight.take()?;
        cmd.status = status;
        self.last_settled = Some(cmd);
        Some(cmd)
    }
}
