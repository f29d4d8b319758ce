// crates/idmesh-broker/src/sink/log.rs
// ============================================================================
// Module: idmesh Log Sink
// Description: Log-only sink for audit-grade delivery records.
// Purpose: Persist delivery receipts without dispatching events.
// Dependencies: idmesh-core, serde_json, std
// ============================================================================

//! ## Overview
//! `LogSink` writes one JSON line per dispatch and returns the receipt. It
//! does not deliver events to external systems; hosts use it for audit trails
//! and dry runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;

use idmesh_core::CallbackEvent;
use idmesh_core::DeliveryReceipt;
use idmesh_core::NodeId;
use serde_json::json;

use crate::broker::CallbackRoute;
use crate::sink::ReceiptFactory;
use crate::sink::Sink;
use crate::sink::SinkError;

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// Log-only callback sink.
pub struct LogSink<W: Write + Send> {
    /// Output writer for log records.
    writer: Mutex<W>,
    /// Receipt factory for deterministic delivery IDs.
    receipts: ReceiptFactory,
}

impl<W: Write + Send> LogSink<W> {
    /// Creates a log sink with the default sink name.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            receipts: ReceiptFactory::new("log"),
        }
    }

    /// Creates a log sink with a custom sink name.
    pub fn with_name(writer: W, name: impl Into<String>) -> Self {
        Self {
            writer: Mutex::new(writer),
            receipts: ReceiptFactory::new(name),
        }
    }
}

impl<W: Write + Send> Sink for LogSink<W> {
    fn deliver(
        &self,
        route: &CallbackRoute,
        node_id: &NodeId,
        transport_node_id: &NodeId,
        event: &CallbackEvent,
    ) -> Result<DeliveryReceipt, SinkError> {
        let receipt = self.receipts.next(node_id, transport_node_id);
        let record = json!({
            "delivery_id": receipt.delivery_id,
            "node_id": node_id,
            "transport_node_id": transport_node_id,
            "url": route.url,
            "event": event,
            "delivered_at": receipt.delivered_at,
        });
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::LogWriteFailed("log writer mutex poisoned".to_string()))?;
        serde_json::to_writer(&mut *guard, &record)
            .map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        guard.write_all(b"\n").map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        drop(guard);
        Ok(receipt)
    }
}
