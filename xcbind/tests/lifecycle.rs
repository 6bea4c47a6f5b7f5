//! End-to-end cookie and event behaviour through the public API.

#![allow(clippy::unwrap_used, clippy::panic, missing_docs)]

use std::rc::Rc;
use std::sync::Arc;

use xcbind::xproto::{self, GetInputFocusReply};
use xcbind::{
    Buffer, CallLog, ConnectOptions, Connection, Error, Event, EventRegistry, MemoryTransport,
    RawEvent, Resolved, event_bytes,
};

fn open() -> (Connection<MemoryTransport>, Rc<CallLog>) {
    let transport = MemoryTransport::new();
    let log = transport.log();
    (Connection::from_transport(transport).unwrap(), log)
}

fn focus_reply(sequence: u32, focus: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; 32];
    bytes[0] = 1;
    bytes[1] = 1;
    bytes[2..4].copy_from_slice(&u16::try_from(sequence).unwrap().to_ne_bytes());
    bytes[8..12].copy_from_slice(&focus.to_ne_bytes());
    bytes
}

#[test]
fn reply_request_resolves_to_typed_reply() {
    let (conn, log) = open();
    let seq = conn
        .with_transport(|t| {
            let seq = t.issue();
            t.push_reply(seq, focus_reply(seq, 0x0060_0001));
            seq
        })
        .unwrap();

    let mut cookie = conn.reply_cookie(seq, GetInputFocusReply::decode);
    let reply = cookie.resolve().unwrap().into_reply().unwrap();
    assert_eq!(reply.focus, 0x0060_0001);
    assert_eq!(u32::from(reply.sequence), seq);
    assert_eq!(log.reply_waits(), vec![seq]);
}

#[test]
fn checked_request_without_error_is_acknowledged() {
    let (conn, log) = open();
    let seq = conn.with_transport(MemoryTransport::issue).unwrap();
    let mut cookie = conn.checked_cookie(seq);
    assert_eq!(cookie.resolve().unwrap(), Resolved::Ack);
    assert_eq!(log.checks(), vec![seq]);
    assert!(log.reply_waits().is_empty());
}

#[test]
fn rejected_request_carries_the_injected_fault() {
    let (conn, _log) = open();
    let seq = conn
        .with_transport(|t| {
            let seq = t.issue();
            t.push_error(seq, 8, 0x0040_0002, 12);
            seq
        })
        .unwrap();

    let mut cookie = conn.reply_cookie(seq, GetInputFocusReply::decode);
    let err = cookie.resolve().unwrap_err();
    let protocol = err.protocol().unwrap();
    assert_eq!(protocol.error_code, 8);
    assert_eq!(protocol.error_label, "BadMatch");
    assert_eq!(protocol.full_sequence, seq);
    assert_eq!(protocol.resource_id, 0x0040_0002);
    assert_eq!(protocol.major_code, 12);
}

#[test]
fn second_resolve_is_always_used_twice() {
    let (conn, _log) = open();
    let ok = conn.with_transport(MemoryTransport::issue).unwrap();
    let failed = conn
        .with_transport(|t| {
            let seq = t.issue();
            t.push_error(seq, 2, 0, 1);
            seq
        })
        .unwrap();

    let mut first = conn.checked_cookie(ok);
    let mut second = conn.checked_cookie(failed);
    assert!(first.resolve().is_ok());
    assert!(second.resolve().is_err());
    for cookie in [&mut first, &mut second] {
        let err = cookie.resolve().unwrap_err();
        assert!(matches!(err, Error::CookieUsedTwice));
        assert_eq!(err.to_string(), "cookie used twice");
    }
}

#[test]
fn discard_is_idempotent() {
    let (conn, log) = open();
    let seq = conn
        .with_transport(|t| {
            let seq = t.issue();
            t.push_reply(seq, focus_reply(seq, 0));
            seq
        })
        .unwrap();

    let mut cookie = conn.reply_cookie(seq, GetInputFocusReply::decode);
    cookie.discard();
    cookie.discard();
    drop(cookie);
    assert_eq!(log.discards(), vec![seq]);
    assert!(!conn.with_transport(|t| t.is_buffered(seq)).unwrap());
}

#[test]
fn discard_after_disconnect_skips_the_transport() {
    let (conn, log) = open();
    let mut cookie = conn.checked_cookie(1);
    conn.disconnect().unwrap();
    cookie.discard();
    cookie.discard();
    assert!(log.discards().is_empty());
}

#[test]
fn dropped_cookie_discards_once_and_connection_stays_usable() {
    let (conn, log) = open();
    let abandoned = conn
        .with_transport(|t| {
            let seq = t.issue();
            t.push_reply(seq, focus_reply(seq, 0));
            seq
        })
        .unwrap();
    drop(conn.reply_cookie(abandoned, GetInputFocusReply::decode));
    assert_eq!(log.discards(), vec![abandoned]);

    let next = conn
        .with_transport(|t| {
            let seq = t.issue();
            t.push_reply(seq, focus_reply(seq, 7));
            seq
        })
        .unwrap();
    let mut cookie = conn.reply_cookie(next, GetInputFocusReply::decode);
    assert_eq!(cookie.resolve().unwrap().into_reply().unwrap().focus, 7);
    assert_eq!(log.discards(), vec![abandoned]);
}

#[test]
fn closed_connection_fails_without_transport_calls() {
    let (conn, log) = open();
    let seq = conn.with_transport(MemoryTransport::issue).unwrap();
    let mut reply = conn.reply_cookie(seq, GetInputFocusReply::decode);
    let mut checked = conn.checked_cookie(seq + 1);
    conn.disconnect().unwrap();

    let before = log.transport_calls();
    let err = reply.resolve().unwrap_err();
    assert_eq!(err.to_string(), "cookie used on closed connection");
    assert!(matches!(checked.resolve(), Err(Error::ClosedConnection)));
    drop(reply);
    drop(checked);
    assert_eq!(log.transport_calls(), before);
}

#[test]
fn cookies_keep_the_transport_alive() {
    let (conn, log) = open();
    let seq = conn.with_transport(MemoryTransport::issue).unwrap();
    let mut cookie = conn.checked_cookie(seq);
    drop(conn);
    assert_eq!(log.disconnects(), 0);
    assert!(cookie.resolve().unwrap().is_ack());
    drop(cookie);
    assert_eq!(log.disconnects(), 1);
}

#[test]
fn disconnect_twice_releases_once() {
    let (conn, log) = open();
    conn.disconnect().unwrap();
    conn.disconnect().unwrap();
    assert!(!conn.is_valid());
    drop(conn);
    assert_eq!(log.disconnects(), 1);
}

#[test]
fn idle_poll_is_a_plain_none() {
    let (conn, _log) = open();
    assert!(conn.poll_for_event().unwrap().is_none());
    assert!(conn.poll_for_event().unwrap().is_none());
}

#[test]
fn failed_wait_is_an_error() {
    let (conn, _log) = open();
    conn.with_transport(|t| t.set_failed(true)).unwrap();
    assert!(matches!(conn.wait_for_event(), Err(Error::WaitForEvent)));
}

#[test]
fn id_sentinel_is_never_returned() {
    let (conn, _log) = open();
    conn.with_transport(MemoryTransport::exhaust_ids).unwrap();
    let err = conn.generate_id().unwrap_err();
    assert_eq!(err.to_string(), "xcb_generate_id failed");
}

#[test]
fn unregistered_event_falls_back_to_header_fields() {
    let (conn, _log) = open();
    conn.with_transport(|t| t.push_event(event_bytes(0x80 | 33, 0x0001_0009)))
        .unwrap();
    let Event::Fallback(fallback) = conn.wait_for_event().unwrap() else {
        panic!("expected fallback");
    };
    assert_eq!(fallback.response_type, 0x80 | 33);
    assert_eq!(fallback.sequence, 9);
    assert_eq!(fallback.full_sequence, 0x0001_0009);
    let json = serde_json::to_value(fallback).unwrap();
    assert_eq!(json.as_object().unwrap().len(), 3);
}

#[test]
fn installed_registry_reaches_connections_opened_earlier() {
    let (early, _log) = open();
    early
        .with_transport(|t| t.push_event(event_bytes(xproto::EXPOSE, 3)))
        .unwrap();

    let mut registry = EventRegistry::new();
    xproto::register_events(&mut registry).unwrap();
    EventRegistry::install(registry).unwrap();
    assert!(EventRegistry::install(EventRegistry::new()).is_err());
    assert!(EventRegistry::global().is_registered(xproto::EXPOSE));

    let Some(Event::Decoded(event)) = early.poll_for_event().unwrap() else {
        panic!("expected decoded event");
    };
    assert!(event.is::<xproto::ExposeEvent>());

    let (late, _log) = open();
    late.with_transport(|t| t.push_event(event_bytes(xproto::CONFIGURE_NOTIFY, 4)))
        .unwrap();
    let Some(Event::Decoded(event)) = late.poll_for_event().unwrap() else {
        panic!("expected decoded event");
    };
    assert!(event.is::<xproto::ConfigureNotifyEvent>());
}

/// Runs `f` and returns how many in-memory blocks were adopted and released
/// while it ran.
fn blocks_during(f: impl FnOnce()) -> (usize, usize) {
    let before = Buffer::vec_tally();
    f();
    let delta = Buffer::vec_tally().since(&before);
    (delta.adopted, delta.released)
}

#[test]
fn protocol_error_with_reply_releases_both_blocks() {
    let (conn, _log) = open();
    let seq = conn
        .with_transport(|t| {
            let seq = t.issue();
            t.push_reply(seq, focus_reply(seq, 0x0060_0001));
            t.push_error(seq, 3, 0x0060_0001, 43);
            seq
        })
        .unwrap();
    let mut cookie = conn.reply_cookie(seq, GetInputFocusReply::decode);

    let blocks = blocks_during(|| {
        let err = cookie.resolve().unwrap_err();
        assert_eq!(err.protocol().unwrap().error_label, "BadWindow");
    });
    assert_eq!(blocks, (2, 2));
    assert!(!conn.with_transport(|t| t.is_buffered(seq)).unwrap());
}

#[test]
fn failed_reply_decode_releases_the_reply() {
    let (conn, _log) = open();
    let seq = conn
        .with_transport(|t| {
            let seq = t.issue();
            t.push_reply(seq, vec![1, 0, 0, 0, 0, 0, 0, 0]);
            seq
        })
        .unwrap();
    let mut cookie = conn.reply_cookie(seq, GetInputFocusReply::decode);

    let blocks = blocks_during(|| {
        let err = cookie.resolve().unwrap_err();
        assert!(matches!(err, Error::Decode { what: "xcb_get_input_focus_reply_t", .. }));
    });
    assert_eq!(blocks, (1, 1));
    assert!(matches!(cookie.resolve(), Err(Error::CookieUsedTwice)));
}

#[test]
fn short_error_block_is_released() {
    let (conn, _log) = open();
    let seq = conn
        .with_transport(|t| {
            let seq = t.issue();
            t.push_raw_error(seq, vec![0, 3, 1, 0, 0, 0]);
            seq
        })
        .unwrap();
    let mut checked = conn.checked_cookie(seq);

    let blocks = blocks_during(|| {
        let err = checked.resolve().unwrap_err();
        assert!(matches!(err, Error::Decode { what: "xcb_generic_error_t", .. }));
    });
    assert_eq!(blocks, (1, 1));
}

#[test]
fn rejected_event_blocks_are_released() {
    let mut registry = EventRegistry::new();
    registry
        .register(40, |_: &RawEvent| -> xcbind::Result<()> {
            Err(Error::Decode {
                what: "test_event",
                reason: "always fails".to_owned(),
            })
        })
        .unwrap();
    let conn = ConnectOptions::new()
        .events(Arc::new(registry))
        .open(MemoryTransport::new())
        .unwrap();
    conn.with_transport(|t| {
        t.push_event(vec![40; 10]);
        t.push_event(event_bytes(40, 1));
    })
    .unwrap();

    let blocks = blocks_during(|| {
        assert!(matches!(
            conn.poll_for_event(),
            Err(Error::Decode { what: "xcb_generic_event_t", .. })
        ));
        assert!(matches!(
            conn.wait_for_event(),
            Err(Error::Decode { what: "test_event", .. })
        ));
    });
    assert_eq!(blocks, (2, 2));
}
