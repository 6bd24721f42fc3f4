//! Port traits — the hexagonal boundary between coordinator logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Coordinator (domain)
//! ```
//!
//! The transport client, the backing-store client and the notification
//! surface are black boxes to the coordinator.  Adapters implement these
//! traits; the [`Coordinator`](super::service::Coordinator) owns one of
//! each for the lifetime of a device session.

use core::fmt;

use crate::model::{DeviceConfig, StoreSnapshot, Timestamp};

use super::events::Notice;

// ───────────────────────────────────────────────────────────────
// Transport port (coordinator ↔ publish/subscribe channel)
// ───────────────────────────────────────────────────────────────

/// At-most-once publish/subscribe transport.
///
/// Inbound messages are delivered by the adapter calling
/// [`Coordinator::handle_inbound`](super::service::Coordinator::handle_inbound);
/// connection-state changes arrive through
/// [`Coordinator::on_connection_change`](super::service::Coordinator::on_connection_change).
pub trait TransportPort {
    /// Publish a payload.  Returning `Ok` means the transport accepted it,
    /// not that the device received it.
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError>;

    /// Start delivering messages for `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Stop delivering messages for `topic`.
    fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Backing-store port (coordinator ↔ authoritative state)
// ───────────────────────────────────────────────────────────────

/// Request/response client for the authoritative device state.
///
/// Saves are idempotent upserts and return the updated snapshot.
pub trait BackingStorePort {
    fn get_state(&mut self, device_id: &str) -> Result<StoreSnapshot, StoreError>;

    fn save_schedule(&mut self, device_id: &str, schedule_csv: &str)
    -> Result<StoreSnapshot, StoreError>;

    fn save_config(&mut self, device_id: &str, config: &DeviceConfig)
    -> Result<StoreSnapshot, StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Notification port (coordinator → operator)
// ───────────────────────────────────────────────────────────────

/// Transient, non-blocking operator notifications.
pub trait NotificationSink {
    fn notify(&mut self, notice: &Notice);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for drivers.  The coordinator itself takes `now`
/// as an argument so tests can run it on synthetic time.
pub trait ClockPort {
    fn now(&self) -> Timestamp;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`TransportPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No live connection to publish on.
    NotConnected,
    /// Outbound buffer full; the message was not queued.
    Busy,
    /// Transport-specific failure text.
    Failed(String),
}

/// Errors from [`BackingStorePort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (network, timeout).
    Unavailable(String),
    /// The store answered and refused the write.
    Rejected(String),
    /// The store answered with something we could not interpret.
    Malformed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "transport not connected"),
            Self::Busy => write!(f, "outbound queue full"),
            Self::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            Self::Rejected(msg) => write!(f, "store rejected write: {}", msg),
            Self::Malformed(msg) => write!(f, "malformed store response: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}
impl std::error::Error for StoreError {}
