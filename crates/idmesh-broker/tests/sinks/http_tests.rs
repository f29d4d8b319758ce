// crates/idmesh-broker/tests/sinks/http_tests.rs
// ============================================================================
// Module: HTTP Sink Tests
// Description: Tests for the HTTP callback sink against a local server.
// Purpose: Validate POST delivery, scheme checks, and fail-closed status handling.
// Dependencies: idmesh-broker, idmesh-core, serde_json, tiny_http
// ============================================================================

//! ## Overview
//! Exercises [`idmesh_broker::HttpSink`] against a local `tiny_http` server:
//! happy-path POST delivery, scheme restrictions, and non-success status
//! handling.

use std::thread;

use idmesh_broker::HttpSink;
use idmesh_broker::Sink;
use idmesh_broker::SinkError;
use serde_json::Value;
use tiny_http::Response;
use tiny_http::Server;

use crate::common::node;
use crate::common::route;
use crate::common::sample_result_event;

#[test]
fn delivers_event_as_json_post() {
    let server = Server::http("127.0.0.1:0").expect("local server should bind");
    let addr = server.server_addr().to_ip().expect("ip listen address");
    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request should arrive");
        assert_eq!(request.method().as_str(), "POST");
        let content_type = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Content-Type"))
            .map(|header| header.value.as_str().to_string());
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let mut body = String::new();
        request.as_reader().read_to_string(&mut body).expect("body should read");
        let _ = request.respond(Response::empty(204));
        body
    });

    let sink = HttpSink::new().expect("sink should build");
    let event = sample_result_event("ref-1");
    let receipt = sink
        .deliver(&route(&format!("http://{addr}/callback")), &node("rp1"), &node("rp1"), &event)
        .expect("delivery should succeed");
    assert_eq!(receipt.delivery_id, "http-1");

    let body = handle.join().expect("server thread joins");
    let parsed: Value = serde_json::from_str(&body).expect("body should be json");
    assert_eq!(parsed["type"], "create_request_result");
    assert_eq!(parsed["reference_id"], "ref-1");
    assert_eq!(parsed["success"], true);
}

#[test]
fn non_success_status_fails_closed() {
    let server = Server::http("127.0.0.1:0").expect("local server should bind");
    let addr = server.server_addr().to_ip().expect("ip listen address");
    let handle = thread::spawn(move || {
        let request = server.recv().expect("request should arrive");
        let _ = request.respond(Response::empty(500));
    });

    let sink = HttpSink::new().expect("sink should build");
    let event = sample_result_event("ref-1");
    let result =
        sink.deliver(&route(&format!("http://{addr}/callback")), &node("rp1"), &node("rp1"), &event);
    assert!(matches!(result, Err(SinkError::DeliveryFailed(_))));
    handle.join().expect("server thread joins");
}

#[test]
fn redirects_are_refused() {
    let server = Server::http("127.0.0.1:0").expect("local server should bind");
    let addr = server.server_addr().to_ip().expect("ip listen address");
    let handle = thread::spawn(move || {
        let request = server.recv().expect("request should arrive");
        let response = Response::empty(302).with_header(
            tiny_http::Header::from_bytes(&b"Location"[..], &b"http://127.0.0.1:1/elsewhere"[..])
                .expect("header should build"),
        );
        let _ = request.respond(response);
    });

    let sink = HttpSink::new().expect("sink should build");
    let event = sample_result_event("ref-1");
    let result =
        sink.deliver(&route(&format!("http://{addr}/callback")), &node("rp1"), &node("rp1"), &event);
    assert!(matches!(result, Err(SinkError::DeliveryFailed(_))));
    handle.join().expect("server thread joins");
}

#[test]
fn non_http_scheme_is_rejected() {
    let sink = HttpSink::new().expect("sink should build");
    let event = sample_result_event("ref-1");
    let result = sink.deliver(&route("ftp://host/callback"), &node("rp1"), &node("rp1"), &event);
    assert!(matches!(result, Err(SinkError::UnsupportedScheme(scheme)) if scheme == "ftp"));
}

#[test]
fn malformed_url_is_rejected() {
    let sink = HttpSink::new().expect("sink should build");
    let event = sample_result_event("ref-1");
    let result = sink.deliver(&route("not a url"), &node("rp1"), &node("rp1"), &event);
    assert!(matches!(result, Err(SinkError::InvalidUrl(_))));
}
