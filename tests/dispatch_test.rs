//! Routing and response behaviour on the in-memory engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::Method;
use request_dispatch::engine::RequestHead;
use request_dispatch::handler::{Handler, WebHandler};
use request_dispatch::http::server::{NOT_FOUND_MESSAGE, NO_HANDLER_MESSAGE};
use request_dispatch::http::{Cookie, Outcome, ResponsePhase};
use request_dispatch::DispatchError;

mod common;

use common::{inline_config, server, Client};

#[test]
fn test_distinct_endpoints_never_cross() {
    let server = server(&inline_config());
    let hits = Arc::new([AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)]);
    for (index, (method, uri)) in [
        (Method::GET, "/items"),
        (Method::POST, "/items"),
        (Method::GET, "/items/*"),
    ]
    .into_iter()
    .enumerate()
    {
        let hits = Arc::clone(&hits);
        server.on_fn(uri, method, move |request| {
            hits[index].fetch_add(1, Ordering::SeqCst);
            request.reply(200, "text/plain", index.to_string())
        });
    }

    let client = Client::new();
    assert_eq!(client.get(&server, "/items").1.text(), "0");
    let (outcome, recording) = client.send(&server, RequestHead::new(Method::POST, "/items"), "");
    assert_eq!(outcome.unwrap(), Outcome::Endpoint);
    assert_eq!(recording.lock().text(), "1");
    assert_eq!(client.get(&server, "/items/42?x=1").1.text(), "2");

    let counts: Vec<_> = hits.iter().map(|h| h.load(Ordering::SeqCst)).collect();
    assert_eq!(counts, vec![1, 1, 1]);
}

#[test]
fn test_optional_trailing_character() {
    let server = server(&inline_config());
    server.on_fn("/docs/?", Method::GET, |request| {
        request.reply(200, "text/plain", "docs")
    });

    let client = Client::new();
    assert_eq!(client.get(&server, "/docs").0, Outcome::Endpoint);
    assert_eq!(client.get(&server, "/docs/").0, Outcome::Endpoint);
    assert_eq!(client.get(&server, "/docs/page").0, Outcome::Fallback);
}

#[test]
fn test_catch_all_then_fallback_then_404() {
    let server = server(&inline_config());
    let api = Arc::new(WebHandler::with_callback(|request| {
        request.reply(200, "text/plain", "api")
    }));
    api.core().set_filter(|request| request.path().starts_with("/api/"));
    server.add_handler(api);

    let client = Client::new();
    let (outcome, recording) = client.get(&server, "/api/anything");
    assert_eq!(outcome, Outcome::CatchAll);
    assert_eq!(recording.text(), "api");

    let (outcome, recording) = client.get(&server, "/elsewhere");
    assert_eq!(outcome, Outcome::Fallback);
    assert_eq!(recording.status_code(), Some(404));
    assert_eq!(recording.text(), NOT_FOUND_MESSAGE);

    server.router().set_fallback_handler(None);
    let (outcome, recording) = client.get(&server, "/elsewhere");
    assert_eq!(outcome, Outcome::NotFound);
    assert_eq!(recording.status.as_deref(), Some("404 Not Found"));
}

#[test]
fn test_custom_not_found() {
    let server = server(&inline_config());
    server.on_not_found(|request| {
        let body = format!("nothing at {}", request.path());
        request.reply(404, "text/plain", body)
    });

    let (_, recording) = Client::new().get(&server, "/gone?q=1");
    assert_eq!(recording.status_code(), Some(404));
    assert_eq!(recording.text(), "nothing at /gone");
}

#[test]
fn test_removed_catch_all_no_longer_consulted() {
    let server = server(&inline_config());
    let handler: Arc<dyn Handler> = Arc::new(WebHandler::with_callback(|request| {
        request.reply(200, "text/plain", "caught")
    }));
    server.add_handler(Arc::clone(&handler));
    assert_eq!(Client::new().get(&server, "/x").0, Outcome::CatchAll);

    assert!(server.remove_handler(&handler));
    assert_eq!(Client::new().get(&server, "/x").0, Outcome::Fallback);
}

#[test]
fn test_null_handler_answers_500() {
    let server = server(&inline_config());
    let endpoint = server.on("/detached");
    endpoint.clear_handler();

    let (outcome, recording) = Client::new().get(&server, "/detached");
    assert_eq!(outcome, Outcome::NoHandler);
    assert_eq!(recording.status_code(), Some(500));
    assert_eq!(recording.text(), NO_HANDLER_MESSAGE);
}

#[test]
fn test_chunked_write_then_end_rejects_more() {
    let server = server(&inline_config());
    server.on_fn("/stream", Method::GET, |request| {
        let mut response = request.response();
        response.set_content_type("text/plain");
        response.write(b"one,")?;
        response.write(b"two")?;
        response.write(b"")?;
        assert!(response.is_complete());
        assert!(matches!(
            response.write(b"three"),
            Err(DispatchError::ResponseFinished)
        ));
        assert!(matches!(response.end(), Err(DispatchError::ResponseFinished)));
        Ok(())
    });

    let (outcome, recording) = Client::new().get(&server, "/stream");
    assert_eq!(outcome, Outcome::Endpoint);
    assert_eq!(
        recording.chunks,
        vec![b"one,".to_vec(), b"two".to_vec(), Vec::new()]
    );
    assert!(recording.completed);
}

#[test]
fn test_headers_cookie_and_default_headers_order() {
    let mut config = inline_config();
    config.default_headers.push(request_dispatch::config::HeaderConfig {
        name: "Server".into(),
        value: "dispatchd".into(),
    });
    let server = server(&config);
    server.on_fn("/login", Method::POST, |request| {
        let mut response = request.response();
        response.set_header("X-Trace", "abc");
        response.set_cookie(&Cookie::new("sid", "42").max_age(3600).path("/"));
        response.send("ok")?;
        assert_eq!(response.phase(), ResponsePhase::Complete);
        Ok(())
    });

    let (outcome, recording) = Client::new().send(&server, RequestHead::new(Method::POST, "/login"), "");
    assert_eq!(outcome.unwrap(), Outcome::Endpoint);
    let recording = recording.lock();
    let names: Vec<_> = recording.headers.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Content-Type", "Server", "X-Trace", "Set-Cookie"]);
    assert_eq!(recording.header("Set-Cookie"), Some("sid=42; Max-Age=3600; Path=/"));
}

#[test]
fn test_redirect_and_form_params() {
    let server = server(&inline_config());
    server.on_fn("/form", Method::POST, |request| {
        let target = request
            .param("next")
            .filter(|p| p.is_form)
            .map(|p| p.value.clone())
            .unwrap_or_else(|| "/".into());
        request.redirect(&target)
    });

    let body = "next=%2Fhome&x=1";
    let head = RequestHead::new(Method::POST, "/form")
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_header("Content-Length", &body.len().to_string());
    let (outcome, recording) = Client::new().send(&server, head, body);
    assert_eq!(outcome.unwrap(), Outcome::Endpoint);
    let recording = recording.lock();
    assert_eq!(recording.status_code(), Some(302));
    assert_eq!(recording.header("Location"), Some("/home"));
}

#[test]
fn test_session_is_per_connection() {
    let server = server(&inline_config());
    server.on_fn("/count", Method::GET, |request| {
        let next = request
            .session_get("visits")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0)
            + 1;
        request.session_set("visits", next.to_string());
        request.reply(200, "text/plain", next.to_string())
    });

    let alice = Client::new();
    let bob = Client::new();
    assert_eq!(alice.get(&server, "/count").1.text(), "1");
    assert_eq!(alice.get(&server, "/count").1.text(), "2");
    assert_eq!(bob.get(&server, "/count").1.text(), "1");
}

fn send_with_timeouts(
    server: &request_dispatch::Server,
    uri: &str,
    timeouts: usize,
) -> (
    Result<Outcome, DispatchError>,
    Arc<parking_lot::Mutex<request_dispatch::engine::memory::Recording>>,
) {
    let client = Client::new();
    let (transport, recording) =
        request_dispatch::engine::memory::MemoryTransport::new(client.socket.clone());
    let transport = transport.with_send_timeouts(timeouts);
    let inbound = request_dispatch::engine::Inbound::new(
        client.id,
        RequestHead::new(Method::GET, uri),
        Box::new(transport),
    );
    (server.dispatch(inbound), recording)
}

#[test]
fn test_body_and_chunk_sends_retry_timeouts() {
    let server = server(&inline_config());
    server.on_fn("/whole", Method::GET, |request| {
        request.reply(200, "text/plain", "whole")
    });
    server.on_fn("/pieces", Method::GET, |request| {
        let mut response = request.response();
        response.write(b"one,")?;
        response.write(b"two")?;
        response.end()
    });

    let (outcome, recording) = send_with_timeouts(&server, "/whole", 3);
    assert_eq!(outcome.unwrap(), Outcome::Endpoint);
    assert_eq!(recording.lock().text(), "whole");

    let (outcome, recording) = send_with_timeouts(&server, "/pieces", 2);
    assert_eq!(outcome.unwrap(), Outcome::Endpoint);
    let recording = recording.lock();
    assert_eq!(
        recording.chunks,
        vec![b"one,".to_vec(), b"two".to_vec(), Vec::new()]
    );
    assert!(recording.completed);
}

#[test]
fn test_send_retries_are_bounded() {
    let mut config = inline_config();
    config.stream.max_send_retries = Some(1);
    let server = server(&config);
    server.on_fn("/pieces", Method::GET, |request| {
        let mut response = request.response();
        response.write(b"one")
    });

    let (outcome, recording) = send_with_timeouts(&server, "/pieces", 5);
    assert!(matches!(
        outcome,
        Err(DispatchError::Transport(request_dispatch::engine::TransportError::Timeout))
    ));
    assert!(recording.lock().chunks.is_empty());
}
