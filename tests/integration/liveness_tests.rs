//! Online/offline derivation, heartbeat suppression and session teardown.

use feederlink::Error;
use feederlink::app::events::NoticeLevel;
use feederlink::classifier::EventKind;
use feederlink::protocol::InboundPayload;

use crate::mock_ports::{EVT_TOPIC, connected_coordinator, deliver, ms, online_coordinator};

#[test]
fn heartbeat_then_silence_goes_offline_once() {
    let mut c = online_coordinator();
    assert!(c.liveness().online);

    c.tick(ms(59_999));
    assert!(c.liveness().online);

    c.tick(ms(60_000));
    assert!(!c.liveness().online);
    assert_eq!(c.event_log().count_label("offline"), 1);
    assert_eq!(c.notifier().last().unwrap().level, NoticeLevel::Warning);

    c.tick(ms(90_000));
    c.tick(ms(120_000));
    assert_eq!(c.event_log().count_label("offline"), 1);
    assert_eq!(c.pending_timers(), 0);
}

#[test]
fn any_event_before_threshold_resets_deadline() {
    let mut c = online_coordinator();
    deliver(&mut c, "schedule_saved", 59_000);

    c.tick(ms(60_000));
    c.tick(ms(118_999));
    assert!(c.liveness().online);

    c.tick(ms(119_000));
    assert!(!c.liveness().online);
    assert_eq!(c.event_log().count_label("offline"), 1);
}

#[test]
fn heartbeats_update_liveness_but_never_log() {
    let mut c = connected_coordinator();
    let baseline = c.event_log().len();

    for i in 0..500u64 {
        let payload = if i % 2 == 0 {
            format!(r#"{{"type":"hb","rssi":-{}}}"#, 40 + i % 30)
        } else {
            "heartbeat".to_string()
        };
        deliver(&mut c, &payload, i * 1_000);
    }

    assert_eq!(c.event_log().len(), baseline);
    let l = c.liveness();
    assert!(l.online);
    assert_eq!(l.last_seen_at, Some(ms(499_000)));
    // Last reading came from i = 498: -(40 + 18).
    assert_eq!(l.last_signal, Some(-58));
    assert_eq!(l.last_event_label, "heartbeat");
}

#[test]
fn first_event_marks_device_online() {
    let mut c = connected_coordinator();
    assert!(!c.liveness().online);
    assert_eq!(c.liveness().last_event_label, "—");

    deliver(&mut c, "device_online", 500);
    assert!(c.liveness().online);
    assert_eq!(c.event_log().newest().unwrap().label, "device_online");
    assert_eq!(c.notifier().last().unwrap().message, "Device online");
}

#[test]
fn late_delivery_does_not_pull_deadline_back() {
    let mut c = online_coordinator();
    deliver(&mut c, "hb", 30_000);
    deliver(&mut c, "hb", 10_000);

    c.tick(ms(70_000));
    assert!(c.liveness().online);
    c.tick(ms(90_000));
    assert!(!c.liveness().online);
}

#[test]
fn malformed_structured_payload_fails_open() {
    let mut c = connected_coordinator();
    let kind = c.handle_inbound(&InboundPayload::from(r#"{"type": hb}"#), ms(5));

    assert_eq!(kind, Some(EventKind::Other));
    assert!(c.liveness().online);
    let newest = c.event_log().newest().unwrap();
    assert_eq!(newest.label, "evt");
    assert_eq!(newest.detail, r#"{"type": hb}"#);
}

#[test]
fn malformed_object_falls_back_to_raw_text_tag() {
    let mut c = connected_coordinator();
    let kind = c.handle_inbound(&InboundPayload::from("{feed_done}"), ms(5));
    assert_eq!(kind, Some(EventKind::Other));
    assert_eq!(c.liveness().last_event_label, "{feed_done}");
}

#[test]
fn empty_payload_is_logged_as_empty() {
    let mut c = connected_coordinator();
    deliver(&mut c, "   ", 5);
    assert_eq!(c.event_log().newest().unwrap().detail, "(empty)");
}

#[test]
fn binary_payload_is_decoded_lossily() {
    let mut c = connected_coordinator();
    let kind = c.handle_inbound(&InboundPayload::from(b"feed_done".to_vec()), ms(5));
    assert_eq!(kind, Some(EventKind::FeedDone));
}

#[test]
fn device_returning_after_offline_accepts_commands_again() {
    let mut c = online_coordinator();
    c.tick(ms(60_000));
    assert_eq!(c.feed_now(ms(61_000)), Err(Error::DeviceOffline));

    deliver(&mut c, "hb", 70_000);
    assert!(c.liveness().online);
    c.feed_now(ms(70_100)).unwrap();
}

#[test]
fn shutdown_cancels_everything() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();
    assert_eq!(c.pending_timers(), 2);
    let log_len = c.event_log().len();

    c.shutdown();
    assert!(c.is_closed());
    assert_eq!(c.pending_timers(), 0);
    assert!(!c.transport().subscriptions.iter().any(|t| t == EVT_TOPIC));

    c.tick(ms(1_000_000));
    assert_eq!(c.event_log().len(), log_len);
    assert_eq!(c.handle_inbound(&InboundPayload::from("hb"), ms(1_000_001)), None);
    assert_eq!(c.feed_now(ms(1_000_002)), Err(Error::SessionClosed));
    assert_eq!(c.refresh(ms(1_000_003)), Err(Error::SessionClosed));

    // Idempotent.
    c.shutdown();
}
