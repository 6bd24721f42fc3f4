//! In-memory backing store.
//!
//! Implements [`BackingStorePort`] with one [`StoreSnapshot`] per device
//! id.  Saves are upserts: an unknown device starts from the default
//! snapshot.  Every accepted write bumps `updatedAt`.
//!
//! Failures can be injected, either one-shot ([`MemoryStore::fail_next`])
//! or for every write ([`MemoryStore::set_reject_writes`]), so the
//! simulator and tests can exercise the rollback path.

use std::collections::HashMap;

use log::debug;

use crate::app::ports::{BackingStorePort, StoreError};
use crate::model::{DeviceConfig, StoreSnapshot, Timestamp};
use crate::schedule::Schedule;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, StoreSnapshot>,
    fail_next: Option<StoreError>,
    reject_writes: bool,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a device record, as if another client had written it.
    pub fn with_snapshot(mut self, device_id: &str, snapshot: StoreSnapshot) -> Self {
        self.records.insert(device_id.to_string(), snapshot);
        self
    }

    /// Fail the next call (read or write) with `error`.
    pub fn fail_next(&mut self, error: StoreError) {
        self.fail_next = Some(error);
    }

    /// Reject every write until cleared.
    pub fn set_reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }

    /// Number of accepted writes.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn snapshot(&self, device_id: &str) -> Option<&StoreSnapshot> {
        self.records.get(device_id)
    }

    /// Overwrite the schedule as a different client would, bypassing
    /// failure injection.
    pub fn external_schedule_write(&mut self, device_id: &str, schedule_csv: &str) {
        let record = self.record(device_id);
        record.schedule_csv = schedule_csv.to_string();
        Self::bump(record);
    }

    /// Overwrite the config as a different client would.
    pub fn external_config_write(&mut self, device_id: &str, config: DeviceConfig) {
        let record = self.record(device_id);
        record.config = config;
        Self::bump(record);
    }

    fn take_failure(&mut self) -> Result<(), StoreError> {
        match self.fail_next.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn check_write(&mut self) -> Result<(), StoreError> {
        self.take_failure()?;
        if self.reject_writes {
            return Err(StoreError::Rejected("writes disabled".into()));
        }
        Ok(())
    }

    fn record(&mut self, device_id: &str) -> &mut StoreSnapshot {
        self.records
            .entry(device_id.to_string())
            .or_insert_with(empty_snapshot)
    }

    fn bump(record: &mut StoreSnapshot) {
        record.updated_at = Timestamp::from_millis(record.updated_at.as_millis() + 1);
    }
}

fn empty_snapshot() -> StoreSnapshot {
    StoreSnapshot {
        online: false,
        last_seen: None,
        last_feed: None,
        rssi: None,
        schedule_csv: String::new(),
        config: DeviceConfig::default(),
        updated_at: Timestamp::ZERO,
    }
}

impl BackingStorePort for MemoryStore {
    fn get_state(&mut self, device_id: &str) -> Result<StoreSnapshot, StoreError> {
        self.take_failure()?;
        Ok(self
            .records
            .get(device_id)
            .cloned()
            .unwrap_or_else(empty_snapshot))
    }

    fn save_schedule(
        &mut self,
        device_id: &str,
        schedule_csv: &str,
    ) -> Result<StoreSnapshot, StoreError> {
        self.check_write()?;
        Schedule::from_csv(schedule_csv)
            .map_err(|e| StoreError::Rejected(format!("scheduleCsv: {e}")))?;

        self.writes += 1;
        let record = self.record(device_id);
        record.schedule_csv = schedule_csv.to_string();
        Self::bump(record);
        debug!("MemoryStore: schedule for '{}' = '{}'", device_id, schedule_csv);
        Ok(record.clone())
    }

    fn save_config(
        &mut self,
        device_id: &str,
        config: &DeviceConfig,
    ) -> Result<StoreSnapshot, StoreError> {
        self.check_write()?;
        config
            .validate()
            .map_err(|e| StoreError::Rejected(format!("config: {e}")))?;

        self.writes += 1;
        let record = self.record(device_id);
        record.config = *config;
        Self::bump(record);
        debug!("MemoryStore: config for '{}' updated", device_id);
        Ok(record.clone())
    }
}
