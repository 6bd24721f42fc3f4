//! Connection supervisor — mirrors the transport's connection state.
//!
//! The state is driven entirely by the transport's change notifications;
//! the rest of the coordinator only reads it.  `Suspended` and `Failed`
//! produce a [`ConnectionFault`] for the caller to surface.  Recovery is
//! left to the transport's own reconnection policy.

use core::fmt;

use log::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Initializing,
    Connecting,
    Connected,
    Suspended,
    Failed,
}

impl ConnectionState {
    /// Map a transport's state label onto ours.
    pub fn from_transport(label: &str) -> Option<Self> {
        match label {
            "initialized" | "init" => Some(Self::Initializing),
            "connecting" | "disconnected" => Some(Self::Connecting),
            "connected" => Some(Self::Connected),
            "suspended" => Some(Self::Suspended),
            "failed" | "closed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Suspended => "suspended",
            Self::Failed => "failed",
        }
    }

    pub fn is_fault(self) -> bool {
        matches!(self, Self::Suspended | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A state-change notification from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChange {
    pub state: ConnectionState,
    pub reason: Option<String>,
}

impl ConnectionChange {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    pub fn with_reason(state: ConnectionState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: Some(reason.into()),
        }
    }
}

/// Transport entered `Suspended` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFault {
    pub state: ConnectionState,
    pub reason: String,
}

impl fmt::Display for ConnectionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.state, self.reason)
    }
}

#[derive(Debug, Default)]
pub struct ConnectionSupervisor {
    state: ConnectionState,
    last_error: Option<String>,
}

impl ConnectionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, change: ConnectionChange) -> Option<ConnectionFault> {
        let prev = self.state;
        self.state = change.state;

        if change.state.is_fault() {
            let reason = change
                .reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "Connection issue".to_string());
            warn!("Connection {} -> {} ({})", prev, change.state, reason);
            self.last_error = Some(reason.clone());
            Some(ConnectionFault {
                state: change.state,
                reason,
            })
        } else {
            if prev != change.state {
                info!("Connection {} -> {}", prev, change.state);
            }
            self.last_error = None;
            None
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
