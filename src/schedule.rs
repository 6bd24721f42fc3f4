//! Feed schedule: validated times of day and the ordered set that holds them.
//!
//! Times are zero-padded 24-hour `HH:MM` strings on the wire, so the
//! lexicographic order of the encoded form equals chronological order.
//! The set rejects duplicates at insertion; encoding never has to dedupe.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeSet;

// ═══════════════════════════════════════════════════════════════
//  FeedTime
// ═══════════════════════════════════════════════════════════════

/// A time of day with minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedTime {
    hour: u8,
    minute: u8,
}

impl FeedTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::OutOfRange);
        }
        Ok(Self { hour, minute })
    }

    /// Parse `H:MM` or `HH:MM`.  No surrounding whitespace is accepted.
    pub fn parse(text: &str) -> Result<Self, ScheduleError> {
        let (h, m) = text.split_once(':').ok_or(ScheduleError::Malformed)?;

        let h_ok = (1..=2).contains(&h.len()) && h.bytes().all(|b| b.is_ascii_digit());
        let m_ok = m.len() == 2 && m.bytes().all(|b| b.is_ascii_digit());
        if !h_ok || !m_ok {
            return Err(ScheduleError::Malformed);
        }

        // Both fields are at most two ASCII digits, so these cannot overflow.
        let hour: u8 = h.parse().map_err(|_| ScheduleError::Malformed)?;
        let minute: u8 = m.parse().map_err(|_| ScheduleError::Malformed)?;
        Self::new(hour, minute)
    }

    /// Parse and re-encode in canonical `HH:MM` form.
    pub fn normalize(text: &str) -> Result<String, ScheduleError> {
        Self::parse(text).map(|t| t.to_string())
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }
}

impl fmt::Display for FeedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for FeedTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Schedule
// ═══════════════════════════════════════════════════════════════

/// Ordered, duplicate-free set of feed times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    times: BTreeSet<FeedTime>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from loosely formatted operator input.  Each entry is
    /// normalized; duplicates after normalization are rejected.
    pub fn from_times<I, S>(times: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut schedule = Self::new();
        for t in times {
            schedule.insert(FeedTime::parse(t.as_ref())?)?;
        }
        Ok(schedule)
    }

    /// Decode the comma-separated wire form.  Entries are trimmed and
    /// empty segments skipped, so `""` decodes to an empty schedule.
    pub fn from_csv(csv: &str) -> Result<Self, ScheduleError> {
        Self::from_times(csv.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Insert a time.  Fails with [`ScheduleError::Duplicate`] if present.
    pub fn insert(&mut self, time: FeedTime) -> Result<(), ScheduleError> {
        if self.times.insert(time) {
            Ok(())
        } else {
            Err(ScheduleError::Duplicate)
        }
    }

    /// Remove a time.  Returns whether it was present.
    pub fn remove(&mut self, time: FeedTime) -> bool {
        self.times.remove(&time)
    }

    pub fn clear(&mut self) {
        self.times.clear();
    }

    pub fn contains(&self, time: FeedTime) -> bool {
        self.times.contains(&time)
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Times in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = FeedTime> + '_ {
        self.times.iter().copied()
    }

    /// Comma-separated ascending `HH:MM` list.
    pub fn to_csv(&self) -> String {
        self.iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csv())
    }
}

// ───────────────────────────────────────────────────────────────
// Error type
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// Not of the form `H:MM` / `HH:MM`.
    Malformed,
    /// Hour above 23 or minute above 59.
    OutOfRange,
    /// Time already present in the schedule.
    Duplicate,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "pick a valid time (HH:MM)"),
            Self::OutOfRange => write!(f, "time out of range"),
            Self::Duplicate => write!(f, "already added"),
        }
    }
}

impl std::error::Error for ScheduleError {}
