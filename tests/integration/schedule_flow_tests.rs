//! Two-phase saves, draft editing and store reconciliation.

use feederlink::Error;
use feederlink::app::commands::OperatorCommand;
use feederlink::app::events::NoticeLevel;
use feederlink::app::ports::{StoreError, TransportError};
use feederlink::app::service::{CommandOutcome, SaveOutcome};
use feederlink::model::DeviceConfig;
use feederlink::reconciler::ResyncOutcome;
use feederlink::schedule::{FeedTime, ScheduleError};

use crate::mock_ports::{
    CMD_TOPIC, connected_coordinator, coordinator, deliver, ms, online_coordinator,
};

// ── Schedule saves ────────────────────────────────────────────

#[test]
fn save_schedule_sorts_persists_and_pushes() {
    let mut c = online_coordinator();
    let outcome = c.save_schedule(["20:00", "08:00"], ms(10)).unwrap();

    assert_eq!(outcome, SaveOutcome::Synced);
    assert_eq!(c.persisted().schedule.to_csv(), "08:00,20:00");
    assert_eq!(c.store().snapshot("feeder01").unwrap().schedule_csv, "08:00,20:00");

    let (topic, _) = c.transport().published.last().unwrap();
    assert_eq!(topic, CMD_TOPIC);
    let sent = c.transport().last_json();
    assert_eq!(sent["type"], "set_schedule");
    assert_eq!(sent["times"], "08:00,20:00");
}

#[test]
fn loose_input_is_normalized() {
    let mut c = online_coordinator();
    c.save_schedule(["7:05", "19:30"], ms(10)).unwrap();
    assert_eq!(c.persisted().schedule.to_csv(), "07:05,19:30");
}

#[test]
fn offline_device_still_persists_without_publish() {
    let mut c = connected_coordinator();
    let outcome = c.save_schedule(["20:00", "08:00"], ms(10)).unwrap();

    assert_eq!(outcome, SaveOutcome::Deferred(Error::DeviceOffline));
    assert_eq!(c.persisted().schedule.to_csv(), "08:00,20:00");
    assert!(c.transport().published.is_empty());
}

#[test]
fn disconnected_transport_still_persists_without_publish() {
    let mut c = coordinator();
    c.start(ms(0)).unwrap();
    let outcome = c.save_schedule(["08:00"], ms(10)).unwrap();

    assert_eq!(outcome, SaveOutcome::Deferred(Error::NotConnected));
    assert_eq!(c.store().writes(), 1);
    assert!(c.transport().published.is_empty());
}

#[test]
fn store_failure_blocks_push_and_restores_value() {
    let mut c = online_coordinator();
    c.save_schedule(["08:00"], ms(10)).unwrap();
    let before = c.persisted().clone();
    let published = c.transport().published.len();

    c.store_mut().fail_next(StoreError::Rejected("quota".into()));
    let err = c.save_schedule(["09:00"], ms(20)).unwrap_err();

    assert!(matches!(err, Error::Persistence(StoreError::Rejected(_))));
    assert_eq!(*c.persisted(), before);
    assert_eq!(c.transport().published.len(), published);
    assert_eq!(c.event_log().newest().unwrap().label, "error");
    assert_eq!(c.notifier().last().unwrap().level, NoticeLevel::Error);
}

#[test]
fn push_failure_keeps_persisted_value() {
    let mut c = online_coordinator();
    c.transport_mut().fail_next = Some(TransportError::Busy);

    let outcome = c.save_schedule(["08:00"], ms(10)).unwrap();
    assert_eq!(outcome, SaveOutcome::PushFailed(TransportError::Busy));
    assert_eq!(c.persisted().schedule.to_csv(), "08:00");
    assert_eq!(c.store().snapshot("feeder01").unwrap().schedule_csv, "08:00");
    assert_eq!(c.event_log().newest().unwrap().label, "error");
}

#[test]
fn empty_schedule_is_rejected_before_any_write() {
    let mut c = online_coordinator();
    assert_eq!(
        c.save_schedule(Vec::<&str>::new(), ms(10)),
        Err(Error::EmptySchedule)
    );
    assert_eq!(c.store().writes(), 0);
    assert!(c.transport().published.is_empty());
}

#[test]
fn invalid_times_are_rejected() {
    let mut c = online_coordinator();
    assert_eq!(
        c.save_schedule(["25:00"], ms(10)),
        Err(Error::Schedule(ScheduleError::OutOfRange))
    );
    assert_eq!(
        c.save_schedule(["08:00", "8:00"], ms(10)),
        Err(Error::Schedule(ScheduleError::Duplicate))
    );
    assert_eq!(c.store().writes(), 0);
}

#[test]
fn clear_schedule_persists_empty_and_pushes_clear() {
    let mut c = online_coordinator();
    c.save_schedule(["08:00"], ms(10)).unwrap();
    assert_eq!(c.clear_schedule(ms(20)).unwrap(), SaveOutcome::Synced);

    assert!(c.persisted().schedule.is_empty());
    assert_eq!(c.transport().last_json()["type"], "clear_schedule");
}

// ── Config saves ──────────────────────────────────────────────

#[test]
fn save_config_validates_then_pushes() {
    let mut c = online_coordinator();
    let bad = DeviceConfig {
        feed_ms: 20,
        ..DeviceConfig::default()
    };
    assert!(matches!(c.save_config(bad, ms(5)), Err(Error::Config(_))));
    assert_eq!(c.store().writes(), 0);

    let good = DeviceConfig {
        idle_angle: 10,
        feed_angle: 120,
        feed_ms: 700,
        oled_on: false,
        email_notify: true,
    };
    assert_eq!(c.save_config(good, ms(10)).unwrap(), SaveOutcome::Synced);
    assert_eq!(c.persisted().config, good);

    let sent = c.transport().last_json();
    assert_eq!(sent["type"], "set_config");
    assert_eq!(sent["idle_angle"], 10);
    assert_eq!(sent["feed_angle"], 120);
    assert_eq!(sent["feed_ms"], 700);
    assert_eq!(sent["oled"], 0);
}

// ── Drafts ────────────────────────────────────────────────────

#[test]
fn draft_edits_save_through_two_phase_path() {
    let mut c = online_coordinator();
    c.add_time("19:00").unwrap();
    c.add_time("7:30").unwrap();
    assert!(c.draft_is_dirty());
    assert!(matches!(
        c.add_time("07:30"),
        Err(Error::Schedule(ScheduleError::Duplicate))
    ));

    assert_eq!(c.save_draft_schedule(ms(10)).unwrap(), SaveOutcome::Synced);
    assert_eq!(c.persisted().schedule.to_csv(), "07:30,19:00");
    assert!(!c.draft_is_dirty());
}

#[test]
fn external_change_resyncs_clean_draft_on_refresh_tick() {
    let mut c = online_coordinator();
    c.store_mut().external_schedule_write("feeder01", "09:00");

    // First periodic refresh is due 2s after start.
    c.tick(ms(1_999));
    assert!(c.persisted().schedule.is_empty());
    c.tick(ms(2_000));
    assert_eq!(c.persisted().schedule.to_csv(), "09:00");
    assert_eq!(c.draft().schedule.to_csv(), "09:00");
}

#[test]
fn external_change_keeps_unsaved_edits() {
    let mut c = online_coordinator();
    c.add_time("06:00").unwrap();
    c.store_mut().external_schedule_write("feeder01", "09:00");

    assert_eq!(c.refresh(ms(100)).unwrap(), ResyncOutcome::DraftKept);
    assert_eq!(c.persisted().schedule.to_csv(), "09:00");
    assert_eq!(c.draft().schedule.to_csv(), "06:00");
    assert_eq!(c.event_log().count_label("draft_conflict"), 1);
    assert_eq!(c.notifier().last().unwrap().level, NoticeLevel::Warning);

    c.discard_draft();
    assert_eq!(c.draft().schedule.to_csv(), "09:00");
}

#[test]
fn schedule_save_carries_external_config_into_clean_draft() {
    let mut c = online_coordinator();
    let elsewhere = DeviceConfig {
        feed_ms: 900,
        ..DeviceConfig::default()
    };
    c.store_mut().external_config_write("feeder01", elsewhere);

    c.save_schedule(["08:00"], ms(10)).unwrap();
    assert_eq!(c.persisted().config.feed_ms, 900);
    assert_eq!(c.draft().config.feed_ms, 900);
    assert!(!c.draft_is_dirty());
    assert_eq!(c.event_log().count_label("draft_conflict"), 0);

    assert_eq!(c.refresh(ms(20)).unwrap(), ResyncOutcome::Unchanged);
    c.save_draft_config(ms(30)).unwrap();
    assert_eq!(c.store().snapshot("feeder01").unwrap().config.feed_ms, 900);
}

#[test]
fn schedule_save_reports_conflict_with_unsaved_config_edits() {
    let mut c = online_coordinator();
    let mine = DeviceConfig {
        feed_ms: 700,
        ..DeviceConfig::default()
    };
    c.set_draft_config(mine).unwrap();
    c.store_mut().external_config_write(
        "feeder01",
        DeviceConfig {
            feed_ms: 900,
            ..DeviceConfig::default()
        },
    );

    assert_eq!(c.save_schedule(["08:00"], ms(10)).unwrap(), SaveOutcome::Synced);
    assert_eq!(c.persisted().config.feed_ms, 900);
    assert_eq!(c.draft().config.feed_ms, 700);
    assert_eq!(c.event_log().count_label("draft_conflict"), 1);
}

#[test]
fn external_change_to_untouched_section_is_not_a_conflict() {
    let mut c = online_coordinator();
    c.add_time("06:00").unwrap();
    c.store_mut().external_config_write(
        "feeder01",
        DeviceConfig {
            feed_ms: 900,
            ..DeviceConfig::default()
        },
    );

    assert_eq!(c.refresh(ms(100)).unwrap(), ResyncOutcome::Resynced);
    assert_eq!(c.draft().config.feed_ms, 900);
    assert_eq!(c.draft().schedule.to_csv(), "06:00");
    assert_eq!(c.event_log().count_label("draft_conflict"), 0);
}

#[test]
fn refresh_failure_is_reported_once_per_outage() {
    let mut c = online_coordinator();
    for t in [10, 20] {
        c.store_mut().fail_next(StoreError::Unavailable("timeout".into()));
        assert!(c.refresh(ms(t)).is_err());
    }
    assert_eq!(c.event_log().count_label("error"), 1);

    assert!(c.refresh(ms(30)).is_ok());
    c.store_mut().fail_next(StoreError::Unavailable("timeout".into()));
    assert!(c.refresh(ms(40)).is_err());
    assert_eq!(c.event_log().count_label("error"), 2);
}

// ── Device echoes ─────────────────────────────────────────────

#[test]
fn echoes_confirm_without_touching_persisted_state() {
    let mut c = online_coordinator();
    c.save_schedule(["08:00", "20:00"], ms(10)).unwrap();
    let persisted = c.persisted().clone();

    deliver(&mut c, "schedule_saved", 100);
    let newest = c.event_log().newest().unwrap();
    assert_eq!(newest.label, "schedule_saved");
    assert_eq!(newest.detail, "Saved: 08:00,20:00");

    deliver(&mut c, r#"{"type":"config_saved"}"#, 200);
    assert_eq!(c.event_log().newest().unwrap().detail, "Config applied on device");

    deliver(&mut c, "schedule_cleared", 300);
    assert_eq!(c.event_log().newest().unwrap().label, "schedule_cleared");

    assert_eq!(*c.persisted(), persisted);
}

// ── Command routing ───────────────────────────────────────────

#[test]
fn operator_commands_route_to_operations() {
    let mut c = online_coordinator();

    let out = c
        .handle_command(OperatorCommand::SaveSchedule(vec!["9:15".into()]), ms(10))
        .unwrap();
    assert_eq!(out, CommandOutcome::Saved(SaveOutcome::Synced));

    c.handle_command(OperatorCommand::AddTime("21:00".into()), ms(20))
        .unwrap();
    let nine_fifteen = FeedTime::parse("09:15").unwrap();
    c.handle_command(OperatorCommand::RemoveTime(nine_fifteen), ms(30))
        .unwrap();
    assert_eq!(c.draft().schedule.to_csv(), "21:00");

    let out = c
        .handle_command(OperatorCommand::SaveDraftSchedule, ms(40))
        .unwrap();
    assert_eq!(out, CommandOutcome::Saved(SaveOutcome::Synced));
    assert_eq!(c.persisted().schedule.to_csv(), "21:00");

    let out = c.handle_command(OperatorCommand::Refresh, ms(50)).unwrap();
    assert_eq!(out, CommandOutcome::Refreshed(ResyncOutcome::Unchanged));

    c.handle_command(OperatorCommand::ClearLog, ms(60)).unwrap();
    assert!(c.event_log().is_empty());

    c.handle_command(OperatorCommand::FeedNow, ms(70)).unwrap();
    assert_eq!(c.transport().payloads().last(), Some(&"feed_now"));
}
