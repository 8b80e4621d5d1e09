//! Event-stream handshake, broadcast and client lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::Method;
use parking_lot::Mutex;
use request_dispatch::config::HeaderConfig;
use request_dispatch::engine::RequestHead;
use request_dispatch::handler::EventSource;
use request_dispatch::http::{Outcome, ResponsePhase};
use request_dispatch::stream::format_event;

mod common;

use common::{inline_config, server, Client};

#[test]
fn test_frame_bytes() {
    assert_eq!(format_event(Some("hi"), None, 0, 0), "data: hi\r\n\r\n");
    assert_eq!(
        format_event(Some("hi"), Some("ping"), 5, 3000),
        "retry: 3000\r\nid: 5\r\nevent: ping\r\ndata: hi\r\n\r\n"
    );
    assert_eq!(format_event(None, Some("beat"), 0, 0), "event: beat\r\n\r\n");
}

#[test]
fn test_handshake_includes_default_headers() {
    let mut config = inline_config();
    config.default_headers.push(HeaderConfig {
        name: "Access-Control-Allow-Origin".into(),
        value: "*".into(),
    });
    let server = server(&config);
    server.on_handler("/events", Method::GET, Arc::new(EventSource::new()));

    let client = Client::new();
    let (outcome, recording) = client.send(&server, RequestHead::new(Method::GET, "/events"), "");
    assert_eq!(outcome.unwrap(), Outcome::Endpoint);
    assert!(recording.lock().head_sent);
    assert_eq!(
        client.socket.wire_text(),
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/event-stream\r\n\
         Cache-Control: no-cache\r\n\
         Connection: keep-alive\r\n\
         Access-Control-Allow-Origin: *\r\n\
         \r\n"
    );
}

#[test]
fn test_broadcast_and_close() {
    let server = server(&inline_config());
    let source = Arc::new(EventSource::new());
    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(Mutex::new(Vec::new()));
    let o = Arc::clone(&opened);
    source.on_open(move |_| {
        o.fetch_add(1, Ordering::SeqCst);
    });
    let c = Arc::clone(&closed);
    source.on_close(move |client| c.lock().push(client.id()));
    server.on_handler("/events", Method::GET, source.clone());

    let first = Client::new();
    let second = Client::new();
    first.get(&server, "/events");
    first.get(&server, "/events");
    second.get(&server, "/events");
    assert_eq!(opened.load(Ordering::SeqCst), 2);
    assert_eq!(source.count(), 2);

    first.socket.clear_wire();
    second.socket.clear_wire();
    assert_eq!(source.send("hello", Some("greet"), 1, 0), 2);
    assert_eq!(first.socket.wire_text(), "id: 1\r\nevent: greet\r\ndata: hello\r\n\r\n");
    assert_eq!(second.socket.wire(), first.socket.wire());

    assert!(server.connection_closed(first.id));
    assert_eq!(*closed.lock(), vec![first.id]);
    assert_eq!(source.count(), 1);
    assert!(first.socket.is_closed());

    second.socket.clear_wire();
    assert_eq!(source.send("again", None, 0, 0), 1);
    assert_eq!(second.socket.wire_text(), "data: again\r\n\r\n");
}

#[test]
fn test_resume_from_last_event_id() {
    let server = server(&inline_config());
    let source = Arc::new(EventSource::new());
    let seen = Arc::new(Mutex::new(None));
    let s = Arc::clone(&seen);
    source.on_open(move |client| *s.lock() = Some(client.last_id()));
    server.on_handler("/events", Method::GET, source.clone());

    let client = Client::new();
    let head = RequestHead::new(Method::GET, "/events").with_header("Last-Event-ID", "17");
    let (outcome, _) = client.send(&server, head, "");
    assert_eq!(outcome.unwrap(), Outcome::Endpoint);
    assert_eq!(*seen.lock(), Some(17));
    assert_eq!(source.client(client.id).unwrap().last_id(), 17);

    let garbage = Client::new();
    let head = RequestHead::new(Method::GET, "/events").with_header("Last-Event-ID", "soon");
    garbage.send(&server, head, "");
    assert_eq!(*seen.lock(), Some(0));
}

#[test]
fn test_client_send_retries_timeouts() {
    let server = server(&inline_config());
    let source = Arc::new(EventSource::new());
    server.on_handler("/events", Method::GET, source.clone());

    let client = Client::new();
    client.get(&server, "/events");
    client.socket.clear_wire();
    client.socket.inject_timeouts(5);

    let sent = source
        .client(client.id)
        .unwrap()
        .send(Some("late"), None, 0, 0);
    assert!(sent.is_ok());
    assert_eq!(client.socket.wire_text(), "data: late\r\n\r\n");
}

#[test]
fn test_event_stream_response_refuses_more_output() {
    let server = server(&inline_config());
    server.on_fn("/manual", Method::GET, |request| {
        request.response().open_event_stream()?;
        assert_eq!(request.response_phase(), ResponsePhase::EventStream);
        assert!(request.response().send("nope").is_err());
        assert!(request.response().write(b"nope").is_err());
        request
            .connection()
            .send(format_event(Some("direct"), None, 0, 0).as_bytes())?;
        Ok(())
    });

    let client = Client::new();
    client.get(&server, "/manual");
    assert!(client.socket.wire_text().ends_with("\r\n\r\ndata: direct\r\n\r\n"));
}
