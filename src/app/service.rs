//! Coordinator — the hexagonal core of one device session.
//!
//! [`Coordinator`] owns the connection supervisor, liveness tracker,
//! command dispatcher, state reconciler and event log, plus the one
//! transport handle, store client and notification sink of the session.
//! Both timer classes (staleness deadline, ack deadline) live inside the
//! components as plain deadlines and fire from [`Coordinator::tick`], so
//! dropping or shutting down the session leaves no callback behind.
//!
//! ```text
//!  TransportPort ──inbound──▶ ┌─────────────────────────────┐ ──▶ NotificationSink
//!                             │        Coordinator          │
//!  TransportPort ◀──publish── │ Classifier · Liveness ·     │ ◀─▶ BackingStorePort
//!                             │ Dispatcher · Reconciler ·   │
//!        operator ──────────▶ │ EventLog · Connection       │
//!                             └─────────────────────────────┘
//! ```
//!
//! Every method takes `now` explicitly; the session never reads a clock.

use log::{debug, info, warn};

use crate::classifier::{self, EventKind};
use crate::config::CoordinatorConfig;
use crate::connection::{ConnectionChange, ConnectionState, ConnectionSupervisor};
use crate::dispatcher::{CommandDispatcher, DispatchEffect, DispatchInput, PendingCommand};
use crate::error::{Error, Result};
use crate::event_log::EventLog;
use crate::liveness::{DeviceLiveness, LivenessEffect, LivenessInput, LivenessTracker};
use crate::model::{DeviceConfig, DraftState, PersistedDeviceState, Timestamp};
use crate::protocol::{DeviceCommand, InboundPayload, Topics};
use crate::reconciler::{ResyncOutcome, StateReconciler};
use crate::schedule::{FeedTime, Schedule};

use super::commands::OperatorCommand;
use super::events::Notice;
use super::ports::{BackingStorePort, NotificationSink, StoreError, TransportError, TransportPort};

// ───────────────────────────────────────────────────────────────
// Outcomes
// ───────────────────────────────────────────────────────────────

/// Operator-facing feeder status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederStatus {
    Ready,
    Feeding,
}

/// Result of a two-phase save whose store write succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Persisted and pushed to the device.
    Synced,
    /// Persisted; the push was skipped because the device is unreachable
    /// ([`Error::NotConnected`] or [`Error::DeviceOffline`]).
    Deferred(Error),
    /// Persisted; the push failed.  The persisted value stands.
    PushFailed(TransportError),
}

/// Result of [`Coordinator::handle_command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    Saved(SaveOutcome),
    Refreshed(ResyncOutcome),
}

// ───────────────────────────────────────────────────────────────
// Coordinator
// ───────────────────────────────────────────────────────────────

pub struct Coordinator<T, S, N>
where
    T: TransportPort,
    S: BackingStorePort,
    N: NotificationSink,
{
    config: CoordinatorConfig,
    topics: Topics,
    transport: T,
    store: S,
    notifier: N,
    connection: ConnectionSupervisor,
    liveness: LivenessTracker,
    dispatcher: CommandDispatcher,
    reconciler: StateReconciler,
    log: EventLog,
    /// When the next periodic store refresh is due.
    next_refresh: Option<Timestamp>,
    refresh_failing: bool,
    closed: bool,
}

impl<T, S, N> Coordinator<T, S, N>
where
    T: TransportPort,
    S: BackingStorePort,
    N: NotificationSink,
{
    /// Construct a session.  Does **not** subscribe — call [`start`](Self::start) next.
    pub fn new(config: CoordinatorConfig, transport: T, store: S, notifier: N) -> Self {
        let topics = Topics::for_device(&config.device_id);
        let liveness = LivenessTracker::new(config.offline_threshold());
        let dispatcher = CommandDispatcher::new(config.feed_ack_timeout());
        let reconciler = StateReconciler::new(&config.device_id);

        Self {
            config,
            topics,
            transport,
            store,
            notifier,
            connection: ConnectionSupervisor::new(),
            liveness,
            dispatcher,
            reconciler,
            log: EventLog::new(),
            next_refresh: None,
            refresh_failing: false,
            closed: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Subscribe to the event channel and load the persisted state.
    ///
    /// A failed initial load is surfaced but does not fail the session;
    /// the periodic refresh retries it.
    pub fn start(&mut self, now: Timestamp) -> Result<()> {
        self.ensure_open()?;

        if let Err(e) = self.transport.subscribe(&self.topics.event) {
            self.record(now, "error", &format!("subscribe failed: {e}"));
            self.notifier.notify(&Notice::error(format!("Subscribe failed: {e}")));
            return Err(e.into());
        }
        let detail = format!("Listening on {}", self.topics.event);
        self.record(now, "subscribed", &detail);
        info!("Coordinator: session started for '{}'", self.config.device_id);

        let _ = self.refresh(now);
        self.next_refresh = self.config.store_refresh_interval().map(|d| now.after(d));
        Ok(())
    }

    /// Cancel every timer and release the subscription.  Idempotent.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.liveness.cancel();
        self.dispatcher.cancel();
        self.next_refresh = None;
        if let Err(e) = self.transport.unsubscribe(&self.topics.event) {
            warn!("Coordinator: unsubscribe failed during shutdown: {}", e);
        }
        self.closed = true;
        info!("Coordinator: session for '{}' shut down", self.config.device_id);
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Process one message from the event channel.
    pub fn handle_inbound(&mut self, payload: &InboundPayload, now: Timestamp) -> Option<EventKind> {
        if self.closed {
            debug!("Coordinator: inbound after shutdown ignored");
            return None;
        }

        let event = classifier::classify(payload);
        if event.malformed {
            warn!("Coordinator: malformed structured payload, classified as raw text: {}", event.raw);
        }

        if let Some(LivenessEffect::CameOnline) = self.liveness.apply(LivenessInput::Observed {
            at: now,
            label: &event.tag,
            signal: event.signal,
        }) {
            info!("Coordinator: device '{}' online", self.config.device_id);
        }

        match event.kind {
            EventKind::Heartbeat => {
                debug!("Coordinator: heartbeat (rssi {:?})", event.signal);
            }
            EventKind::DeviceOnline => {
                self.record(now, "device_online", "Device is online");
                self.notifier.notify(&Notice::success("Device online"));
            }
            EventKind::FeedDone => self.on_feed_done(now),
            EventKind::ScheduleSaved | EventKind::ScheduleCleared | EventKind::ConfigSaved => {
                let detail = self.reconciler.echo_detail(event.kind).unwrap_or_default();
                self.record(now, &event.tag, &detail);
                let notice = match event.kind {
                    EventKind::ScheduleSaved => Notice::success("Schedule saved on device"),
                    EventKind::ScheduleCleared => Notice::info("Schedule cleared"),
                    _ => Notice::success("Config saved on device"),
                };
                self.notifier.notify(&notice);
            }
            EventKind::Other => {
                let detail = if event.raw.is_empty() { "(empty)" } else { event.raw.as_str() };
                self.record(now, "evt", detail);
            }
        }
        Some(event.kind)
    }

    fn on_feed_done(&mut self, now: Timestamp) {
        match self.dispatcher.apply(DispatchInput::AckObserved { now }) {
            Some(DispatchEffect::Acknowledged { at, .. }) => {
                self.reconciler.record_feed(at);
                self.record(now, "feed_done", "Feed completed");
                self.notifier.notify(&Notice::success("Feeding done"));
            }
            _ => {
                self.reconciler.record_feed(now);
                self.record(now, "feed_done", "Feed completed (no pending command)");
                self.notifier.notify(&Notice::info("Device reported a feed"));
            }
        }
    }

    /// Process a connection-state notification from the transport.
    ///
    /// Returns the surfaced [`Error::Connection`] when the transport
    /// entered `Suspended` or `Failed`.  Recovery is the transport's job.
    pub fn on_connection_change(&mut self, change: ConnectionChange, now: Timestamp) -> Option<Error> {
        if self.closed {
            return None;
        }
        let fault = self.connection.apply(change)?;
        self.record(now, fault.state.label(), &fault.reason);
        self.notifier.notify(&Notice::error(fault.reason.clone()));
        Some(fault.into())
    }

    // ── Timers ────────────────────────────────────────────────

    /// Fire every deadline that is due at `now`.
    pub fn tick(&mut self, now: Timestamp) {
        if self.closed {
            return;
        }

        if let Some(LivenessEffect::WentOffline { .. }) =
            self.liveness.apply(LivenessInput::Tick { now })
        {
            self.record(now, "offline", "No device events recently");
            self.notifier.notify(&Notice::warning("Device offline"));
        }

        if let Some(DispatchEffect::TimedOut { .. }) = self.dispatcher.apply(DispatchInput::Tick { now }) {
            self.record(now, "no_ack", "No feed_done received (timeout)");
            let e = Error::CommandTimeout;
            warn!("Coordinator: {}", e);
            self.notifier.notify(&Notice::error(capitalize(&e.to_string())));
        }

        if let Some(due) = self.next_refresh {
            if now >= due {
                let _ = self.refresh(now);
                self.next_refresh = self.config.store_refresh_interval().map(|d| now.after(d));
            }
        }
    }

    // ── Device-directed actions ───────────────────────────────

    /// Dispense food now.  At most one feed may await acknowledgment.
    pub fn feed_now(&mut self, now: Timestamp) -> Result<()> {
        if let Err(e) = self.ensure_device_reachable() {
            self.notifier.notify(&Notice::error(capitalize(&e.to_string())));
            return Err(e);
        }

        match self.dispatcher.apply(DispatchInput::FeedRequested { now }) {
            Some(DispatchEffect::Dispatched { .. }) => {}
            _ => {
                self.notifier.notify(&Notice::info("Feed already in progress"));
                return Err(Error::FeedInFlight);
            }
        }

        match self.publish(&DeviceCommand::FeedNow) {
            Ok(()) => {
                self.record(now, "cmd", "feed_now");
                self.notifier.notify(&Notice::info("Feed command sent"));
                Ok(())
            }
            Err(e) => {
                self.dispatcher.apply(DispatchInput::PublishFailed);
                self.record(now, "error", &format!("feed_now publish failed: {e}"));
                self.notifier
                    .notify(&Notice::error(format!("Failed to send feed command: {e}")));
                Err(e.into())
            }
        }
    }

    /// Persist `times` and push them to the device.
    pub fn save_schedule<I, Str>(&mut self, times: I, now: Timestamp) -> Result<SaveOutcome>
    where
        I: IntoIterator<Item = Str>,
        Str: AsRef<str>,
    {
        self.ensure_open()?;
        let schedule = match Schedule::from_times(times) {
            Ok(s) => s,
            Err(e) => {
                self.notifier.notify(&Notice::error(capitalize(&e.to_string())));
                return Err(e.into());
            }
        };
        self.save_schedule_value(schedule, now)
    }

    /// Persist and push the draft schedule.
    pub fn save_draft_schedule(&mut self, now: Timestamp) -> Result<SaveOutcome> {
        self.ensure_open()?;
        let schedule = self.reconciler.draft().schedule.clone();
        self.save_schedule_value(schedule, now)
    }

    fn save_schedule_value(&mut self, schedule: Schedule, now: Timestamp) -> Result<SaveOutcome> {
        if schedule.is_empty() {
            self.notifier.notify(&Notice::error("Add at least one time"));
            return Err(Error::EmptySchedule);
        }

        self.persist(now, "schedule", |r, store| r.persist_schedule(store, &schedule, now))?;
        self.reconciler.note_pushed_schedule(Some(&schedule));
        Ok(self.push_after_persist(&DeviceCommand::SetSchedule(schedule), now, "Schedule sent"))
    }

    /// Persist an empty schedule and tell the device to drop its schedule.
    pub fn clear_schedule(&mut self, now: Timestamp) -> Result<SaveOutcome> {
        self.ensure_open()?;
        let empty = Schedule::new();
        self.persist(now, "schedule", |r, store| r.persist_schedule(store, &empty, now))?;
        self.reconciler.note_pushed_schedule(None);
        Ok(self.push_after_persist(&DeviceCommand::ClearSchedule, now, "Schedule cleared"))
    }

    /// Persist a device configuration and push it to the device.
    pub fn save_config(&mut self, config: DeviceConfig, now: Timestamp) -> Result<SaveOutcome> {
        self.ensure_open()?;
        if let Err(e) = config.validate() {
            self.notifier.notify(&Notice::error(format!("Invalid config: {e}")));
            return Err(e.into());
        }

        self.persist(now, "config", |r, store| r.persist_config(store, &config, now))?;
        Ok(self.push_after_persist(&DeviceCommand::SetConfig(config), now, "Config sent"))
    }

    /// Persist and push the draft configuration.
    pub fn save_draft_config(&mut self, now: Timestamp) -> Result<SaveOutcome> {
        let config = self.reconciler.draft().config;
        self.save_config(config, now)
    }

    /// Phase 1: store write.  Failure aborts the save.
    fn persist<F>(&mut self, now: Timestamp, what: &str, write: F) -> Result<()>
    where
        F: FnOnce(&mut StateReconciler, &mut S) -> core::result::Result<ResyncOutcome, StoreError>,
    {
        match write(&mut self.reconciler, &mut self.store) {
            Ok(outcome) => {
                info!("Coordinator: {} persisted", what);
                if outcome == ResyncOutcome::DraftKept {
                    self.report_draft_conflict(now);
                }
                Ok(())
            }
            Err(e) => {
                self.record(now, "error", &format!("{what} save failed: {e}"));
                self.notifier
                    .notify(&Notice::error(format!("Failed to save {what}: {e}")));
                Err(e.into())
            }
        }
    }

    /// Phase 2: best-effort device push.  Never rolls back phase 1.
    fn push_after_persist(&mut self, command: &DeviceCommand, now: Timestamp, sent: &str) -> SaveOutcome {
        if let Err(reason) = self.ensure_device_reachable() {
            info!("Coordinator: saved; push of '{}' deferred ({})", command.describe(), reason);
            self.notifier.notify(&Notice::info(format!(
                "Saved. Device will be updated when reachable ({reason})"
            )));
            return SaveOutcome::Deferred(reason);
        }

        match self.publish(command) {
            Ok(()) => {
                self.record(now, "cmd", &command.describe());
                self.notifier.notify(&Notice::success(sent));
                SaveOutcome::Synced
            }
            Err(e) => {
                self.record(now, "error", &format!("{} push failed: {e}", command.describe()));
                self.notifier
                    .notify(&Notice::error(format!("Saved, but device push failed: {e}")));
                SaveOutcome::PushFailed(e)
            }
        }
    }

    // ── Store refresh ─────────────────────────────────────────

    /// Re-read the authoritative state and reconcile the draft.
    pub fn refresh(&mut self, now: Timestamp) -> Result<ResyncOutcome> {
        self.ensure_open()?;

        let outcome = self
            .store
            .get_state(&self.config.device_id)
            .and_then(|snapshot| self.reconciler.apply_external(&snapshot));

        match outcome {
            Ok(outcome) => {
                if self.refresh_failing {
                    self.refresh_failing = false;
                    info!("Coordinator: store reachable again");
                }
                if outcome == ResyncOutcome::DraftKept {
                    self.report_draft_conflict(now);
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!("Coordinator: store refresh failed: {}", e);
                if !self.refresh_failing {
                    self.refresh_failing = true;
                    self.record(now, "error", &format!("refresh failed: {e}"));
                    self.notifier
                        .notify(&Notice::error(format!("Could not load device state: {e}")));
                }
                Err(e.into())
            }
        }
    }

    fn report_draft_conflict(&mut self, now: Timestamp) {
        self.record(
            now,
            "draft_conflict",
            "Saved values changed elsewhere; unsaved edits kept",
        );
        self.notifier
            .notify(&Notice::warning("Saved values changed elsewhere"));
    }

    // ── Draft editing ─────────────────────────────────────────

    pub fn add_time(&mut self, text: &str) -> Result<FeedTime> {
        self.reconciler.add_time(text).map_err(|e| {
            self.notifier.notify(&Notice::error(capitalize(&e.to_string())));
            e.into()
        })
    }

    pub fn remove_time(&mut self, time: FeedTime) -> bool {
        self.reconciler.remove_time(time)
    }

    pub fn clear_draft_times(&mut self) {
        self.reconciler.clear_draft_times();
    }

    pub fn set_draft_config(&mut self, config: DeviceConfig) -> Result<()> {
        self.reconciler.set_draft_config(config).map_err(Error::from)
    }

    pub fn discard_draft(&mut self) {
        self.reconciler.discard_draft();
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    // ── Command routing ───────────────────────────────────────

    /// Route an [`OperatorCommand`] to the matching operation.
    pub fn handle_command(&mut self, cmd: OperatorCommand, now: Timestamp) -> Result<CommandOutcome> {
        self.ensure_open()?;
        match cmd {
            OperatorCommand::FeedNow => self.feed_now(now).map(|()| CommandOutcome::Done),
            OperatorCommand::SaveSchedule(times) => {
                self.save_schedule(&times, now).map(CommandOutcome::Saved)
            }
            OperatorCommand::SaveDraftSchedule => {
                self.save_draft_schedule(now).map(CommandOutcome::Saved)
            }
            OperatorCommand::ClearSchedule => self.clear_schedule(now).map(CommandOutcome::Saved),
            OperatorCommand::SaveConfig(config) => {
                self.save_config(config, now).map(CommandOutcome::Saved)
            }
            OperatorCommand::SaveDraftConfig => {
                self.save_draft_config(now).map(CommandOutcome::Saved)
            }
            OperatorCommand::AddTime(text) => self.add_time(&text).map(|_| CommandOutcome::Done),
            OperatorCommand::RemoveTime(time) => {
                self.remove_time(time);
                Ok(CommandOutcome::Done)
            }
            OperatorCommand::Refresh => self.refresh(now).map(CommandOutcome::Refreshed),
            OperatorCommand::ClearLog => {
                self.clear_log();
                Ok(CommandOutcome::Done)
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection_error(&self) -> Option<&str> {
        self.connection.last_error()
    }

    pub fn liveness(&self) -> &DeviceLiveness {
        self.liveness.state()
    }

    pub fn status(&self) -> FeederStatus {
        if self.dispatcher.is_feed_pending() {
            FeederStatus::Feeding
        } else {
            FeederStatus::Ready
        }
    }

    pub fn pending_feed(&self) -> Option<&PendingCommand> {
        self.dispatcher.in_flight()
    }

    pub fn last_settled_feed(&self) -> Option<&PendingCommand> {
        self.dispatcher.last_settled()
    }

    /// Armed liveness and acknowledgment deadlines.
    pub fn pending_timers(&self) -> usize {
        usize::from(self.liveness.has_deadline()) + usize::from(self.dispatcher.is_feed_pending())
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn persisted(&self) -> &PersistedDeviceState {
        self.reconciler.persisted()
    }

    pub fn draft(&self) -> &DraftState {
        self.reconciler.draft()
    }

    pub fn draft_is_dirty(&self) -> bool {
        self.reconciler.draft_is_dirty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    // ── Internal ──────────────────────────────────────────────

    fn ensure_open(&self) -> Result<()> {
        if self.closed { Err(Error::SessionClosed) } else { Ok(()) }
    }

    /// Precondition of every device-directed action.
    fn ensure_device_reachable(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.connection.is_connected() {
            return Err(Error::NotConnected);
        }
        if !self.liveness.is_online() {
            return Err(Error::DeviceOffline);
        }
        Ok(())
    }

    fn publish(&mut self, command: &DeviceCommand) -> core::result::Result<(), TransportError> {
        self.transport.publish(&self.topics.command, &command.encode())
    }

    fn record(&mut self, now: Timestamp, label: &str, detail: &str) {
        self.log.append(now, label, detail);
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
