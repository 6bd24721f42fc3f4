//! Manual feed: dispatch, acknowledgment, timeout, rejection.

use feederlink::Error;
use feederlink::app::events::NoticeLevel;
use feederlink::app::ports::TransportError;
use feederlink::app::service::FeederStatus;
use feederlink::dispatcher::CommandStatus;

use crate::mock_ports::{
    CMD_TOPIC, connected_coordinator, coordinator, deliver, ms, online_coordinator, tick_through,
};

#[test]
fn feed_publishes_and_arms_deadline() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();

    assert_eq!(
        c.transport().published,
        vec![(CMD_TOPIC.to_string(), "feed_now".to_string())]
    );
    assert_eq!(c.status(), FeederStatus::Feeding);
    assert_eq!(c.pending_feed().unwrap().deadline, ms(12_000));
    assert_eq!(c.event_log().newest().unwrap().label, "cmd");
    // liveness + ack deadline
    assert_eq!(c.pending_timers(), 2);
}

#[test]
fn missing_ack_times_out_exactly_once() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();

    tick_through(&mut c, 0, 11_750);
    c.tick(ms(11_999));
    assert_eq!(c.event_log().count_label("no_ack"), 0);
    assert_eq!(c.status(), FeederStatus::Feeding);

    tick_through(&mut c, 11_750, 30_000);
    assert_eq!(c.event_log().count_label("no_ack"), 1);
    assert_eq!(
        c.event_log().iter().find(|e| e.label == "no_ack").unwrap().at,
        ms(12_000)
    );
    assert!(c.pending_feed().is_none());
    assert_eq!(c.last_settled_feed().unwrap().status, CommandStatus::TimedOut);
    assert_eq!(c.status(), FeederStatus::Ready);
    // Only the liveness deadline remains.
    assert_eq!(c.pending_timers(), 1);
    assert!(c.notifier().contains("No response from device (timeout)"));
}

#[test]
fn ack_before_deadline_cancels_timeout() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();
    deliver(&mut c, "feed_done", 3_000);

    assert_eq!(c.last_settled_feed().unwrap().status, CommandStatus::Acknowledged);
    assert_eq!(c.persisted().last_feed_at, Some(ms(3_000)));
    assert_eq!(c.event_log().newest().unwrap().label, "feed_done");
    assert_eq!(c.status(), FeederStatus::Ready);

    tick_through(&mut c, 3_000, 30_000);
    assert_eq!(c.event_log().count_label("no_ack"), 0);
    assert_eq!(c.pending_timers(), 1);
}

#[test]
fn structured_ack_is_recognized() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();
    deliver(&mut c, r#"{"type":"feed_done","rssi":-58}"#, 2_000);
    assert_eq!(c.last_settled_feed().unwrap().status, CommandStatus::Acknowledged);
    assert_eq!(c.liveness().last_signal, Some(-58));
}

#[test]
fn second_feed_while_pending_is_rejected() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();
    let log_len = c.event_log().len();

    assert_eq!(c.feed_now(ms(100)), Err(Error::FeedInFlight));
    assert_eq!(c.transport().published.len(), 1);
    assert_eq!(c.pending_feed().unwrap().issued_at, ms(0));
    assert_eq!(c.event_log().len(), log_len);
}

#[test]
fn feed_allowed_again_after_timeout() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();
    deliver(&mut c, "hb", 10_000);
    tick_through(&mut c, 0, 12_000);
    c.feed_now(ms(12_500)).unwrap();
    assert_eq!(c.transport().payloads(), vec!["feed_now", "feed_now"]);
}

#[test]
fn feed_requires_connection() {
    let mut c = coordinator();
    c.start(ms(0)).unwrap();
    deliver(&mut c, "hb", 0);

    assert_eq!(c.feed_now(ms(10)), Err(Error::NotConnected));
    assert!(c.transport().published.is_empty());
    assert_eq!(c.status(), FeederStatus::Ready);
    assert_eq!(c.notifier().last().unwrap().level, NoticeLevel::Error);
}

#[test]
fn feed_requires_online_device() {
    let mut c = connected_coordinator();
    assert_eq!(c.feed_now(ms(10)), Err(Error::DeviceOffline));
    assert!(c.transport().published.is_empty());
    assert_eq!(c.pending_timers(), 0);
}

#[test]
fn publish_failure_abandons_command() {
    let mut c = online_coordinator();
    c.transport_mut().fail_next = Some(TransportError::Failed("broker down".into()));

    let err = c.feed_now(ms(0)).unwrap_err();
    assert!(matches!(err, Error::Publish(TransportError::Failed(_))));
    assert_eq!(c.status(), FeederStatus::Ready);
    assert_eq!(c.last_settled_feed().unwrap().status, CommandStatus::Abandoned);
    assert_eq!(c.event_log().newest().unwrap().label, "error");

    // No deadline left behind, and the next attempt goes through.
    tick_through(&mut c, 0, 20_000);
    assert_eq!(c.event_log().count_label("no_ack"), 0);
    c.feed_now(ms(20_000)).unwrap();
}

#[test]
fn duplicate_ack_leaves_command_state_alone() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();
    deliver(&mut c, "feed_done", 1_000);
    let settled = *c.last_settled_feed().unwrap();

    deliver(&mut c, "feed_done", 1_500);
    assert_eq!(*c.last_settled_feed().unwrap(), settled);
    assert!(c.pending_feed().is_none());
    assert_eq!(c.persisted().last_feed_at, Some(ms(1_500)));
}

#[test]
fn late_ack_after_timeout_does_not_resurrect_command() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();
    tick_through(&mut c, 0, 12_000);
    deliver(&mut c, "feed_done", 14_000);

    assert_eq!(c.last_settled_feed().unwrap().status, CommandStatus::TimedOut);
    assert_eq!(c.persisted().last_feed_at, Some(ms(14_000)));
    assert_eq!(c.status(), FeederStatus::Ready);
}

#[test]
fn lookalike_tag_does_not_acknowledge() {
    let mut c = online_coordinator();
    c.feed_now(ms(0)).unwrap();
    deliver(&mut c, "feed_done_v2", 1_000);

    assert_eq!(c.status(), FeederStatus::Feeding);
    let newest = c.event_log().newest().unwrap();
    assert_eq!(newest.label, "evt");
    assert_eq!(newest.detail, "feed_done_v2");
}
