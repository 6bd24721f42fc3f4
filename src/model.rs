//! Device-state data model shared by the reconciler, the store port and
//! the wire protocol.

use core::fmt;
use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::schedule::{Schedule, ScheduleError};

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Milliseconds since the Unix epoch.
///
/// All coordinator deadlines are expressed in this unit so tests can drive
/// the session with a synthetic clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// `self + d`, saturating at the far future.
    pub fn after(self, d: Duration) -> Self {
        let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(ms))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ---------------------------------------------------------------------------
// Device configuration
// ---------------------------------------------------------------------------

pub const ANGLE_MAX: u8 = 180;
pub const FEED_MS_MIN: u16 = 50;
pub const FEED_MS_MAX: u16 = 10_000;

/// Servo and display settings pushed to the feeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Servo angle at rest (0–180).
    pub idle_angle: u8,
    /// Servo angle while dispensing (0–180).
    pub feed_angle: u8,
    /// How long the servo holds the feed angle (50–10000 ms).
    pub feed_ms: u16,
    /// OLED display power.  Encoded as `0|1` on the wire.
    #[serde(rename = "oled", with = "flag")]
    pub oled_on: bool,
    /// Whether the store should e-mail the operator on feeds.
    #[serde(default)]
    pub email_notify: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            idle_angle: 0,
            feed_angle: 150,
            feed_ms: 500,
            oled_on: true,
            email_notify: false,
        }
    }
}

impl DeviceConfig {
    /// Build from raw edit-surface values, clamping each into range.
    pub fn clamped(
        idle_angle: i64,
        feed_angle: i64,
        feed_ms: i64,
        oled_on: bool,
        email_notify: bool,
    ) -> Self {
        Self {
            idle_angle: idle_angle.clamp(0, i64::from(ANGLE_MAX)) as u8,
            feed_angle: feed_angle.clamp(0, i64::from(ANGLE_MAX)) as u8,
            feed_ms: feed_ms.clamp(i64::from(FEED_MS_MIN), i64::from(FEED_MS_MAX)) as u16,
            oled_on,
            email_notify,
        }
    }

    /// Range-check every field.  Out-of-range values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_angle > ANGLE_MAX {
            return Err(ConfigError::ValidationFailed("idle_angle must be 0..=180"));
        }
        if self.feed_angle > ANGLE_MAX {
            return Err(ConfigError::ValidationFailed("feed_angle must be 0..=180"));
        }
        if !(FEED_MS_MIN..=FEED_MS_MAX).contains(&self.feed_ms) {
            return Err(ConfigError::ValidationFailed("feed_ms must be 50..=10000"));
        }
        Ok(())
    }
}

/// `bool` encoded as `0|1`; accepts either form when decoding.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Bool(bool),
            Num(i64),
        }
        Ok(match Flag::deserialize(d)? {
            Flag::Bool(b) => b,
            Flag::Num(n) => n != 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Backing-store snapshot (wire shape)
// ---------------------------------------------------------------------------

/// What the backing store returns from `getState` and from every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub last_seen: Option<Timestamp>,
    #[serde(default)]
    pub last_feed: Option<Timestamp>,
    #[serde(default)]
    pub rssi: Option<i32>,
    #[serde(default)]
    pub schedule_csv: String,
    #[serde(default)]
    pub config: DeviceConfig,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Reconciled views
// ---------------------------------------------------------------------------

/// The authoritative configuration, as last confirmed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedDeviceState {
    pub schedule: Schedule,
    pub config: DeviceConfig,
    pub last_feed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl TryFrom<&StoreSnapshot> for PersistedDeviceState {
    type Error = ScheduleError;

    fn try_from(s: &StoreSnapshot) -> Result<Self, Self::Error> {
        Ok(Self {
            schedule: Schedule::from_csv(&s.schedule_csv)?,
            config: s.config,
            last_feed_at: s.last_feed,
            updated_at: s.updated_at,
        })
    }
}

impl Default for PersistedDeviceState {
    fn default() -> Self {
        Self {
            schedule: Schedule::new(),
            config: DeviceConfig::default(),
            last_feed_at: None,
            updated_at: Timestamp::ZERO,
        }
    }
}

/// Operator-local edits that have not been saved yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftState {
    pub schedule: Schedule,
    pub config: DeviceConfig,
}

impl From<&PersistedDeviceState> for DraftState {
    fn from(p: &PersistedDeviceState) -> Self {
        Self {
            schedule: p.schedule.clone(),
            config: p.config,
        }
    }
}
