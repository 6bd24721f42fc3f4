//! Inbound operator commands to the coordinator.
//!
//! These represent actions requested by the operator-facing surface
//! (CLI, UI bridge, scripted driver) that the
//! [`Coordinator`](super::service::Coordinator) interprets and acts upon.

use crate::model::DeviceConfig;
use crate::schedule::FeedTime;

/// Commands that adapters can send into the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Dispense food now and wait for `feed_done`.
    FeedNow,

    /// Persist and push the given times (loosely formatted `H:MM`).
    SaveSchedule(Vec<String>),

    /// Persist and push the draft schedule.
    SaveDraftSchedule,

    /// Persist and push an empty schedule.
    ClearSchedule,

    /// Persist and push a device configuration.
    SaveConfig(DeviceConfig),

    /// Persist and push the draft configuration.
    SaveDraftConfig,

    /// Add a time to the draft schedule.
    AddTime(String),

    /// Remove a time from the draft schedule.
    RemoveTime(FeedTime),

    /// Re-read the authoritative state from the backing store.
    Refresh,

    /// Empty the event log.
    ClearLog,
}
