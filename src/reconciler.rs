//! State reconciler — persisted, draft and device-confirmed views.
//!
//! ```text
//!   BackingStorePort ──save──▶ persisted ──resync (if clean)──▶ draft ◀── operator edits
//!                                  ▲
//!   device echoes ─────────────────┴── feedback only, never written
//! ```
//!
//! Rules:
//! - `persisted` changes only when a store call returns successfully
//!   (our own save, or an external refresh).  Writes are optimistic:
//!   the previous value is snapshotted, the new value applied, and the
//!   snapshot restored if the store rejects the write.
//! - The draft is resynchronized from `persisted` per section
//!   (schedule, config) only while that section has no unsaved edits.
//! - Device echoes (`schedule_saved`, ...) produce log text only.

use log::{error, info, warn};

use crate::app::ports::{BackingStorePort, StoreError};
use crate::classifier::EventKind;
use crate::config::ConfigError;
use crate::model::{DeviceConfig, DraftState, PersistedDeviceState, StoreSnapshot, Timestamp};
use crate::schedule::{FeedTime, Schedule, ScheduleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Schedule,
    Config,
}

/// What an external refresh did to the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// Persisted value did not change.
    Unchanged,
    /// Persisted value changed and the draft followed it.
    Resynced,
    /// Persisted value changed but unsaved draft edits were kept.
    DraftKept,
}

pub struct StateReconciler {
    device_id: String,
    persisted: PersistedDeviceState,
    draft: DraftState,
    schedule_dirty: bool,
    config_dirty: bool,
    /// Last schedule pushed to the device, for echo feedback.
    last_pushed_schedule: Option<Schedule>,
}

impl StateReconciler {
    pub fn new(device_id: &str) -> Self {
        let persisted = PersistedDeviceState::default();
        Self {
            device_id: device_id.to_string(),
            draft: DraftState::from(&persisted),
            persisted,
            schedule_dirty: false,
            config_dirty: false,
            last_pushed_schedule: None,
        }
    }

    // ── External changes ──────────────────────────────────────

    /// Adopt a snapshot fetched from the store (initial load or refresh).
    pub fn apply_external(&mut self, snapshot: &StoreSnapshot) -> Result<ResyncOutcome, StoreError> {
        let incoming = PersistedDeviceState::try_from(snapshot)
            .map_err(|e| StoreError::Malformed(format!("scheduleCsv: {e}")))?;
        Ok(self.adopt(incoming, None))
    }

    /// Replace `persisted` with `incoming` and carry each changed section
    /// into the draft unless it holds unsaved edits.  `written` is the
    /// section our own save just wrote; its draft is settled by the caller.
    fn adopt(&mut self, mut incoming: PersistedDeviceState, written: Option<Section>) -> ResyncOutcome {
        // A feed we observed locally is not undone by a lagging store.
        incoming.last_feed_at = incoming.last_feed_at.max(self.persisted.last_feed_at);

        if incoming == self.persisted {
            return ResyncOutcome::Unchanged;
        }
        let previous = core::mem::replace(&mut self.persisted, incoming);

        let mut kept = false;
        if written != Some(Section::Schedule) && previous.schedule != self.persisted.schedule {
            if self.schedule_dirty && self.draft.schedule != self.persisted.schedule {
                kept = true;
            } else {
                self.draft.schedule = self.persisted.schedule.clone();
                self.schedule_dirty = false;
            }
        }
        if written != Some(Section::Config) && previous.config != self.persisted.config {
            if self.config_dirty && self.draft.config != self.persisted.config {
                kept = true;
            } else {
                self.draft.config = self.persisted.config;
                self.config_dirty = false;
            }
        }

        if kept {
            warn!("Reconciler: persisted state changed underneath unsaved edits; draft kept");
            ResyncOutcome::DraftKept
        } else {
            info!("Reconciler: draft resynced from persisted state");
            ResyncOutcome::Resynced
        }
    }

    // ── Store writes (phase 1 of a two-phase save) ────────────

    /// Persist a schedule.  On rejection the previous cached value is restored.
    ///
    /// The returned outcome describes what the store's snapshot did to the
    /// config section, which another client may have changed meanwhile.
    pub fn persist_schedule(
        &mut self,
        store: &mut impl BackingStorePort,
        schedule: &Schedule,
        now: Timestamp,
    ) -> Result<ResyncOutcome, StoreError> {
        let previous = self.persisted.clone();
        self.persisted.schedule = schedule.clone();
        self.persisted.updated_at = now;

        match store.save_schedule(&self.device_id, &schedule.to_csv()) {
            Ok(snapshot) => {
                let outcome = self.commit(&snapshot, Section::Schedule);
                self.draft.schedule = schedule.clone();
                self.schedule_dirty = false;
                Ok(outcome)
            }
            Err(e) => {
                error!("Reconciler: schedule save failed ({}), rolled back", e);
                self.persisted = previous;
                Err(e)
            }
        }
    }

    /// Persist a device config.  On rejection the previous cached value is restored.
    pub fn persist_config(
        &mut self,
        store: &mut impl BackingStorePort,
        config: &DeviceConfig,
        now: Timestamp,
    ) -> Result<ResyncOutcome, StoreError> {
        let previous = self.persisted.clone();
        self.persisted.config = *config;
        self.persisted.updated_at = now;

        match store.save_config(&self.device_id, config) {
            Ok(snapshot) => {
                let outcome = self.commit(&snapshot, Section::Config);
                self.draft.config = *config;
                self.config_dirty = false;
                Ok(outcome)
            }
            Err(e) => {
                error!("Reconciler: config save failed ({}), rolled back", e);
                self.persisted = previous;
                Err(e)
            }
        }
    }

    /// Adopt the store's post-write snapshot.  If it cannot be decoded the
    /// optimistic value stays, since the store did accept the write.
    fn commit(&mut self, snapshot: &StoreSnapshot, written: Section) -> ResyncOutcome {
        match PersistedDeviceState::try_from(snapshot) {
            Ok(confirmed) => self.adopt(confirmed, Some(written)),
            Err(e) => {
                warn!("Reconciler: store returned undecodable schedule ({}), keeping local value", e);
                ResyncOutcome::Unchanged
            }
        }
    }

    /// Record a confirmed feed completion.
    pub fn record_feed(&mut self, at: Timestamp) {
        self.persisted.last_feed_at = Some(self.persisted.last_feed_at.map_or(at, |t| t.max(at)));
    }

    // ── Draft editing ─────────────────────────────────────────

    /// Normalize and add a time to the draft schedule.
    pub fn add_time(&mut self, text: &str) -> Result<FeedTime, ScheduleError> {
        let time = FeedTime::parse(text)?;
        self.draft.schedule.insert(time)?;
        self.schedule_dirty = true;
        Ok(time)
    }

    pub fn remove_time(&mut self, time: FeedTime) -> bool {
        let removed = self.draft.schedule.remove(time);
        if removed {
            self.schedule_dirty = true;
        }
        removed
    }

    pub fn clear_draft_times(&mut self) {
        self.draft.schedule.clear();
        self.schedule_dirty = true;
    }

    pub fn set_draft_config(&mut self, config: DeviceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.draft.config = config;
        self.config_dirty = true;
        Ok(())
    }

    /// Throw away unsaved edits.
    pub fn discard_draft(&mut self) {
        self.draft = DraftState::from(&self.persisted);
        self.schedule_dirty = false;
        self.config_dirty = false;
    }

    // ── Device echoes ─────────────────────────────────────────

    pub fn note_pushed_schedule(&mut self, schedule: Option<&Schedule>) {
        self.last_pushed_schedule = schedule.cloned();
    }

    /// Log detail for a device echo.  Echoes never modify `persisted`.
    pub fn echo_detail(&self, kind: EventKind) -> Option<String> {
        match kind {
            EventKind::ScheduleSaved => {
                let schedule = self
                    .last_pushed_schedule
                    .as_ref()
                    .unwrap_or(&self.persisted.schedule);
                Some(format!("Saved: {}", schedule.to_csv()))
            }
            EventKind::ScheduleCleared => Some("Schedule cleared on device".to_string()),
            EventKind::ConfigSaved => Some("Config applied on device".to_string()),
            _ => None,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn persisted(&self) -> &PersistedDeviceState {
        &self.persisted
    }

    pub fn draft(&self) -> &DraftState {
        &self.draft
    }

    pub fn draft_is_dirty(&self) -> bool {
        self.schedule_dirty || self.config_dirty
    }
}
