// crates/idmesh-broker/tests/sinks/channel_tests.rs
// ============================================================================
// Module: Channel Sink Tests
// Description: Tests for the in-process channel sink.
// Purpose: Validate message enqueueing, receipts, and failure modes.
// Dependencies: idmesh-broker, idmesh-core, tokio
// ============================================================================

//! ## Overview
//! Exercises [`idmesh_broker::ChannelSink`] delivery, receipt numbering, and
//! backpressure behavior.

use idmesh_broker::ChannelSink;
use idmesh_broker::Sink;
use idmesh_broker::SinkError;
use tokio::sync::mpsc;

use crate::common::node;
use crate::common::route;
use crate::common::sample_result_event;

#[test]
fn delivery_enqueues_message_with_matching_receipt() {
    let (sender, mut receiver) = mpsc::channel(8);
    let sink = ChannelSink::new(sender);
    let event = sample_result_event("ref-1");
    let receipt = sink
        .deliver(&route("channel://rp1"), &node("rp1"), &node("rp1"), &event)
        .expect("delivery should succeed");
    assert_eq!(receipt.delivery_id, "channel-1");
    let message = receiver.try_recv().expect("message should be enqueued");
    assert_eq!(message.node_id, node("rp1"));
    assert_eq!(message.transport_node_id, node("rp1"));
    assert_eq!(message.url, "channel://rp1");
    assert_eq!(message.event, event);
    assert_eq!(message.receipt, receipt);
}

#[test]
fn receipts_number_sequentially_per_sink() {
    let (sender, _receiver) = mpsc::channel(8);
    let sink = ChannelSink::with_name(sender, "test");
    let event = sample_result_event("ref-1");
    let first = sink
        .deliver(&route("channel://rp1"), &node("rp1"), &node("rp1"), &event)
        .expect("first delivery");
    let second = sink
        .deliver(&route("channel://rp1"), &node("rp1"), &node("rp1"), &event)
        .expect("second delivery");
    assert_eq!(first.delivery_id, "test-1");
    assert_eq!(second.delivery_id, "test-2");
}

#[test]
fn full_channel_fails_delivery() {
    let (sender, _receiver) = mpsc::channel(1);
    let sink = ChannelSink::new(sender);
    let event = sample_result_event("ref-1");
    assert!(sink.deliver(&route("channel://rp1"), &node("rp1"), &node("rp1"), &event).is_ok());
    let result = sink.deliver(&route("channel://rp1"), &node("rp1"), &node("rp1"), &event);
    assert!(matches!(result, Err(SinkError::DeliveryFailed(_))));
}

#[test]
fn dropped_receiver_fails_delivery() {
    let (sender, receiver) = mpsc::channel(8);
    drop(receiver);
    let sink = ChannelSink::new(sender);
    let event = sample_result_event("ref-1");
    let result = sink.deliver(&route("channel://rp1"), &node("rp1"), &node("rp1"), &event);
    assert!(matches!(result, Err(SinkError::DeliveryFailed(_))));
}

#[test]
fn transport_node_is_preserved_separately_from_logical_node() {
    let (sender, mut receiver) = mpsc::channel(8);
    let sink = ChannelSink::new(sender);
    let event = sample_result_event("ref-1");
    sink.deliver(&route("channel://proxy1"), &node("idp1"), &node("proxy1"), &event)
        .expect("delivery should succeed");
    let message = receiver.try_recv().expect("message should be enqueued");
    assert_eq!(message.node_id, node("idp1"));
    assert_eq!(message.transport_node_id, node("proxy1"));
}
