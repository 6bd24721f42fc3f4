//! Wire protocol between coordinator and device.
//!
//! ```text
//!   coordinator ── <id>/cmd ──▶ device      "feed_now" | {"type":"set_schedule",...}
//!   coordinator ◀── <id>/evt ── device      "hb"       | {"type":"hb","rssi":-62}
//! ```
//!
//! Outbound commands are a closed sum type, encoded once here.  Inbound
//! payloads are decoded to text here and classified in
//! [`classifier`](crate::classifier).

use std::borrow::Cow;

use serde_json::json;

use crate::model::DeviceConfig;
use crate::schedule::Schedule;

// ───────────────────────────────────────────────────────────────
// Channel naming
// ───────────────────────────────────────────────────────────────

/// The two logical channels of one device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub command: String,
    pub event: String,
}

impl Topics {
    pub fn for_device(device_id: &str) -> Self {
        Self {
            command: format!("{device_id}/cmd"),
            event: format!("{device_id}/evt"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Outbound commands
// ───────────────────────────────────────────────────────────────

/// Commands published on the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    FeedNow,
    SetSchedule(Schedule),
    ClearSchedule,
    SetConfig(DeviceConfig),
}

impl DeviceCommand {
    /// Encode to the payload the device firmware expects.
    pub fn encode(&self) -> String {
        match self {
            Self::FeedNow => "feed_now".to_string(),
            Self::SetSchedule(schedule) => json!({
                "type": "set_schedule",
                "times": schedule.to_csv(),
            })
            .to_string(),
            Self::ClearSchedule => json!({ "type": "clear_schedule" }).to_string(),
            Self::SetConfig(c) => json!({
                "type": "set_config",
                "idle_angle": c.idle_angle,
                "feed_angle": c.feed_angle,
                "feed_ms": c.feed_ms,
                "oled": u8::from(c.oled_on),
            })
            .to_string(),
        }
    }

    /// Short human description for the event log (`"set_schedule 08:00"`).
    pub fn describe(&self) -> String {
        match self {
            Self::FeedNow => "feed_now".to_string(),
            Self::SetSchedule(s) => format!("set_schedule {}", s.to_csv()),
            Self::ClearSchedule => "clear_schedule".to_string(),
            Self::SetConfig(c) => format!(
                "set_config idle={} feed={} ms={} oled={}",
                c.idle_angle,
                c.feed_angle,
                c.feed_ms,
                u8::from(c.oled_on)
            ),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound payloads
// ───────────────────────────────────────────────────────────────

/// A message delivered on the event channel, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    Text(String),
    Bytes(Vec<u8>),
}

impl InboundPayload {
    /// Decode to text.  Invalid UTF-8 is replaced, never rejected.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Bytes(b) => String::from_utf8_lossy(b),
        }
    }
}

impl From<&str> for InboundPayload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for InboundPayload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for InboundPayload {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}
