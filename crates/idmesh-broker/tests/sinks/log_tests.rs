// crates/idmesh-broker/tests/sinks/log_tests.rs
// ============================================================================
// Module: Log Sink Tests
// Description: Tests for the log-only audit sink.
// Purpose: Validate JSON-line records and receipt correlation.
// Dependencies: idmesh-broker, idmesh-core, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Exercises [`idmesh_broker::LogSink`] record formatting against in-memory
//! and file-backed writers.

use std::fs;
use std::fs::File;

use idmesh_broker::LogSink;
use idmesh_broker::Sink;
use serde_json::Value;
use tempfile::tempdir;

use crate::common::node;
use crate::common::route;
use crate::common::sample_result_event;

#[test]
fn writes_one_json_line_per_delivery() {
    let mut buffer = Vec::new();
    {
        let sink = LogSink::new(&mut buffer);
        let event = sample_result_event("ref-1");
        sink.deliver(&route("log://audit"), &node("rp1"), &node("rp1"), &event)
            .expect("first delivery");
        sink.deliver(&route("log://audit"), &node("idp1"), &node("proxy1"), &event)
            .expect("second delivery");
    }
    let text = String::from_utf8(buffer).expect("log output is utf-8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: Value = serde_json::from_str(lines[0]).expect("first line is json");
    assert_eq!(first["delivery_id"], "log-1");
    assert_eq!(first["node_id"], "rp1");
    assert_eq!(first["transport_node_id"], "rp1");
    assert_eq!(first["url"], "log://audit");
    assert_eq!(first["event"]["type"], "create_request_result");
    let second: Value = serde_json::from_str(lines[1]).expect("second line is json");
    assert_eq!(second["delivery_id"], "log-2");
    assert_eq!(second["node_id"], "idp1");
    assert_eq!(second["transport_node_id"], "proxy1");
}

#[test]
fn receipt_matches_logged_record() {
    let mut buffer = Vec::new();
    let receipt = {
        let sink = LogSink::with_name(&mut buffer, "audit");
        let event = sample_result_event("ref-1");
        sink.deliver(&route("log://audit"), &node("rp1"), &node("rp1"), &event)
            .expect("delivery should succeed")
    };
    let text = String::from_utf8(buffer).expect("log output is utf-8");
    let record: Value = serde_json::from_str(text.trim()).expect("record is json");
    assert_eq!(record["delivery_id"], receipt.delivery_id.as_str());
    assert_eq!(record["delivered_at"], receipt.delivered_at.as_unix_millis());
}

#[test]
fn file_backed_writer_persists_records() {
    let dir = tempdir().expect("tempdir should create");
    let path = dir.path().join("deliveries.jsonl");
    {
        let file = File::create(&path).expect("log file should create");
        let sink = LogSink::new(file);
        let event = sample_result_event("ref-1");
        sink.deliver(&route("log://audit"), &node("rp1"), &node("rp1"), &event)
            .expect("delivery should succeed");
    }
    let text = fs::read_to_string(&path).expect("log file should read");
    let record: Value = serde_json::from_str(text.trim()).expect("record is json");
    assert_eq!(record["event"]["reference_id"], "ref-1");
}
