//! Connection supervision and event-log bounds through the session.

use feederlink::Error;
use feederlink::app::events::NoticeLevel;
use feederlink::connection::{ConnectionChange, ConnectionState};
use feederlink::event_log::EVENT_LOG_CAPACITY;

use crate::mock_ports::{deliver, ms, online_coordinator};

#[test]
fn suspension_is_logged_with_reason() {
    let mut c = online_coordinator();
    c.on_connection_change(
        ConnectionChange::with_reason(ConnectionState::Suspended, "network unreachable"),
        ms(1_000),
    );

    assert_eq!(c.connection_state(), ConnectionState::Suspended);
    assert_eq!(c.connection_error(), Some("network unreachable"));
    let newest = c.event_log().newest().unwrap();
    assert_eq!(newest.label, "suspended");
    assert_eq!(newest.detail, "network unreachable");
    assert_eq!(c.notifier().last().unwrap().level, NoticeLevel::Error);

    // Device is still "online" by recency, but the transport is not.
    assert_eq!(c.feed_now(ms(1_100)), Err(Error::NotConnected));
}

#[test]
fn failure_without_reason_uses_generic_text() {
    let mut c = online_coordinator();
    let err = c.on_connection_change(ConnectionChange::new(ConnectionState::Failed), ms(10));
    assert!(matches!(err, Some(Error::Connection(_))));
    assert_eq!(c.connection_error(), Some("Connection issue"));
    assert_eq!(c.event_log().newest().unwrap().label, "failed");
}

#[test]
fn reconnect_clears_error_and_restores_commands() {
    let mut c = online_coordinator();
    c.on_connection_change(ConnectionChange::new(ConnectionState::Failed), ms(10));
    c.on_connection_change(ConnectionChange::new(ConnectionState::Connecting), ms(20));
    c.on_connection_change(ConnectionChange::new(ConnectionState::Connected), ms(30));

    assert_eq!(c.connection_error(), None);
    assert_eq!(c.event_log().count_label("failed"), 1);
    c.feed_now(ms(40)).unwrap();
}

#[test]
fn transport_labels_map_onto_states() {
    assert_eq!(
        ConnectionState::from_transport("disconnected"),
        Some(ConnectionState::Connecting)
    );
    assert_eq!(
        ConnectionState::from_transport("closed"),
        Some(ConnectionState::Failed)
    );
    assert_eq!(ConnectionState::from_transport("sleeping"), None);
}

#[test]
fn session_log_is_bounded_newest_first() {
    let mut c = online_coordinator();
    for i in 0..(EVENT_LOG_CAPACITY as u64 + 10) {
        deliver(&mut c, &format!("note_{i}"), i);
    }

    assert_eq!(c.event_log().len(), EVENT_LOG_CAPACITY);
    let details: Vec<_> = c.event_log().iter().map(|e| e.detail.clone()).collect();
    assert_eq!(details.first().unwrap(), "note_69");
    assert_eq!(details.last().unwrap(), "note_10");

    c.clear_log();
    assert!(c.event_log().is_empty());
}
