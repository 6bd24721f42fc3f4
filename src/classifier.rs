//! Event classifier — raw inbound payload → typed device event.
//!
//! Accepts either a bare tag (`"feed_done"`) or an object carrying a
//! `type` tag and an optional numeric `rssi`.  Tags are matched exactly;
//! `"feed_done_v2"` is [`EventKind::Other`], never `FeedDone`.
//!
//! Structured payloads that fail to parse fail open: the whole trimmed
//! text becomes the tag and [`ClassifiedEvent::malformed`] is set so the
//! caller can log it.

use serde_json::Value;

use crate::protocol::InboundPayload;

/// Semantic kind of a device event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Heartbeat,
    DeviceOnline,
    FeedDone,
    ScheduleSaved,
    ScheduleCleared,
    ConfigSaved,
    Other,
}

impl EventKind {
    /// Exact-match a wire tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "hb" | "heartbeat" => Self::Heartbeat,
            "device_online" => Self::DeviceOnline,
            "feed_done" => Self::FeedDone,
            "schedule_saved" => Self::ScheduleSaved,
            "schedule_cleared" => Self::ScheduleCleared,
            "config_saved" => Self::ConfigSaved,
            _ => Self::Other,
        }
    }

    /// Device echo confirming a previously pushed value took effect.
    pub fn is_echo(self) -> bool {
        matches!(
            self,
            Self::ScheduleSaved | Self::ScheduleCleared | Self::ConfigSaved
        )
    }
}

/// Result of classifying one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    /// The tag the kind was derived from.
    pub tag: String,
    /// Signal strength reading (dBm), if the payload carried a numeric `rssi`.
    pub signal: Option<i32>,
    /// Trimmed decoded text.
    pub raw: String,
    /// A structured payload failed to parse and fell back to raw text.
    pub malformed: bool,
}

/// Classify an inbound payload.  Never fails.
pub fn classify(payload: &InboundPayload) -> ClassifiedEvent {
    let raw = payload.as_text().trim().to_string();

    let mut tag = None;
    let mut signal = None;
    let mut malformed = false;

    if raw.starts_with('{') && raw.ends_with('}') {
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(obj)) => {
                tag = obj
                    .get("type")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string);
                signal = obj.get("rssi").and_then(signal_from);
            }
            Ok(_) | Err(_) => malformed = true,
        }
    }

    let tag = tag.unwrap_or_else(|| raw.clone());
    ClassifiedEvent {
        kind: EventKind::from_tag(&tag),
        tag,
        signal,
        raw,
        malformed,
    }
}

fn signal_from(v: &Value) -> Option<i32> {
    if let Some(i) = v.as_i64() {
        return Some(i.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32);
    }
    v.as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32)
}
