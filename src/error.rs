//! Unified error types for the feeder coordinator.
//!
//! Every operator-facing operation funnels into [`Error`], so the session
//! can surface any failure the same way: a log entry plus a transient
//! notice.  None of these variants is fatal to the session.

use core::fmt;

use crate::app::ports::{StoreError, TransportError};
use crate::config::ConfigError;
use crate::connection::ConnectionFault;
use crate::schedule::ScheduleError;

// ---------------------------------------------------------------------------
// Top-level coordinator error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport is not in the `Connected` state.
    NotConnected,
    /// Transport is up but the device has not been heard from recently.
    DeviceOffline,
    /// A manual feed is already waiting for its acknowledgment.
    FeedInFlight,
    /// The acknowledgment deadline elapsed.  The device may still have fed.
    CommandTimeout,
    /// The backing store rejected a write.  The prior cached value was restored.
    Persistence(StoreError),
    /// Publishing to the command channel failed.
    Publish(TransportError),
    /// Transport reported `Suspended` or `Failed`.
    Connection(ConnectionFault),
    /// A schedule time was malformed, out of range, or duplicated.
    Schedule(ScheduleError),
    /// A configuration value failed validation.
    Config(ConfigError),
    /// `saveSchedule` was asked to persist an empty schedule.
    EmptySchedule,
    /// The session was shut down.
    SessionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::DeviceOffline => write!(f, "device offline"),
            Self::FeedInFlight => write!(f, "feed already in progress"),
            Self::CommandTimeout => write!(f, "no response from device (timeout)"),
            Self::Persistence(e) => write!(f, "persistence: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Connection(e) => write!(f, "connection: {e}"),
            Self::Schedule(e) => write!(f, "schedule: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::EmptySchedule => write!(f, "add at least one time"),
            Self::SessionClosed => write!(f, "session closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Persistence(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Publish(e)
    }
}

impl From<ConnectionFault> for Error {
    fn from(e: ConnectionFault) -> Self {
        Self::Connection(e)
    }
}

impl From<ScheduleError> for Error {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
