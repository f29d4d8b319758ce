// crates/idmesh-broker/src/sink/channel.rs
// ============================================================================
// Module: idmesh Channel Sink
// Description: Channel-based sink for in-process delivery.
// Purpose: Send callback events through a Tokio mpsc channel.
// Dependencies: idmesh-core, tokio
// ============================================================================

//! ## Overview
//! [`ChannelSink`] delivers events by sending [`crate::sink::DispatchMessage`]
//! values into a `tokio::sync::mpsc` channel. Hosts drain the channel into
//! per-party listeners or a correlation scope.
//!
//! Invariants:
//! - Each successful delivery enqueues exactly one message with a matching
//!   receipt.

// ============================================================================
// SECTION: Imports
// ============================================================================

use idmesh_core::CallbackEvent;
use idmesh_core::DeliveryReceipt;
use idmesh_core::NodeId;
use tokio::sync::mpsc::Sender;

use crate::broker::CallbackRoute;
use crate::sink::DispatchMessage;
use crate::sink::ReceiptFactory;
use crate::sink::Sink;
use crate::sink::SinkError;

// ============================================================================
// SECTION: Channel Sink
// ============================================================================

/// Channel-based callback sink.
///
/// # Invariants
/// - Each successful delivery emits a message with a matching receipt.
#[derive(Debug)]
pub struct ChannelSink {
    /// Sender used to enqueue dispatch messages.
    sender: Sender<DispatchMessage>,
    /// Receipt factory for deterministic delivery IDs.
    receipts: ReceiptFactory,
}

impl ChannelSink {
    /// Creates a channel sink with the default sink name.
    #[must_use]
    pub fn new(sender: Sender<DispatchMessage>) -> Self {
        Self {
            sender,
            receipts: ReceiptFactory::new("channel"),
        }
    }

    /// Creates a channel sink with a custom sink name.
    #[must_use]
    pub fn with_name(sender: Sender<DispatchMessage>, name: impl Into<String>) -> Self {
        Self {
            sender,
            receipts: ReceiptFactory::new(name),
        }
    }
}

impl Sink for ChannelSink {
    fn deliver(
        &self,
        route: &CallbackRoute,
        node_id: &NodeId,
        transport_node_id: &NodeId,
        event: &CallbackEvent,
    ) -> Result<DeliveryReceipt, SinkError> {
        let receipt = self.receipts.next(node_id, transport_node_id);
        let message = DispatchMessage {
            node_id: node_id.clone(),
            transport_node_id: transport_node_id.clone(),
            url: route.url.clone(),
            event: event.clone(),
            receipt: receipt.clone(),
        };
        self.sender.try_send(message).map_err(|err| SinkError::DeliveryFailed(err.to_string()))?;
        Ok(receipt)
    }
}
