// crates/idmesh-broker/src/sink/mod.rs
// ============================================================================
// Module: idmesh Broker Sinks
// Description: Sink trait and reference implementations for callback delivery.
// Purpose: Deliver callback events to concrete transport endpoints.
// Dependencies: idmesh-core, thiserror, std
// ============================================================================

//! ## Overview
//! Sinks deliver [`idmesh_core::CallbackEvent`] values to a resolved
//! [`crate::broker::CallbackRoute`] and return
//! [`idmesh_core::DeliveryReceipt`] values for auditing. Implementations must
//! fail closed on delivery errors.
//!
//! Invariants:
//! - Receipts are returned only after successful delivery.
//! - Delivery failures must not emit partial side effects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use idmesh_core::CallbackEvent;
use idmesh_core::DeliveryReceipt;
use idmesh_core::NodeId;
use idmesh_core::Timestamp;
use thiserror::Error;

use crate::broker::CallbackRoute;

// ============================================================================
// SECTION: Sink Errors
// ============================================================================

/// Errors emitted by broker sinks.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink delivery failed.
    #[error("sink delivery failed: {0}")]
    DeliveryFailed(String),
    /// Event serialization failed.
    #[error("event encode failed: {0}")]
    Encode(String),
    /// Route URL failed to parse.
    #[error("invalid route url: {0}")]
    InvalidUrl(String),
    /// Route URL scheme is not supported by the sink.
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    /// Log sink failed to write.
    #[error("log write failed: {0}")]
    LogWriteFailed(String),
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Delivers callback events to a resolved route.
pub trait Sink: Send + Sync {
    /// Delivers one event over the route.
    ///
    /// `node_id` is the logical receiver; `transport_node_id` is the node the
    /// route actually belongs to (the proxy when a binding exists).
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when delivery fails.
    fn deliver(
        &self,
        route: &CallbackRoute,
        node_id: &NodeId,
        transport_node_id: &NodeId,
        event: &CallbackEvent,
    ) -> Result<DeliveryReceipt, SinkError>;
}

// ============================================================================
// SECTION: Dispatch Message
// ============================================================================

/// Delivery record emitted by channel-based sinks.
///
/// # Invariants
/// - `receipt` corresponds to the provided node and event.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchMessage {
    /// Logical receiver node.
    pub node_id: NodeId,
    /// Node the route belongs to (the proxy when bound).
    pub transport_node_id: NodeId,
    /// Route URL the event was addressed to.
    pub url: String,
    /// Delivered event.
    pub event: CallbackEvent,
    /// Delivery receipt.
    pub receipt: DeliveryReceipt,
}

// ============================================================================
// SECTION: Receipt Helpers
// ============================================================================

/// Builds deterministic delivery receipts.
#[derive(Debug)]
pub(crate) struct ReceiptFactory {
    /// Sink name embedded in delivery identifiers.
    sink: String,
    /// Monotonic counter used for deterministic IDs.
    counter: AtomicU64,
}

impl ReceiptFactory {
    /// Creates a receipt factory with the provided sink name.
    pub(crate) fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Returns the next receipt for the provided receiver pair.
    pub(crate) fn next(&self, node_id: &NodeId, transport_node_id: &NodeId) -> DeliveryReceipt {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        DeliveryReceipt {
            delivery_id: format!("{}-{}", self.sink, seq),
            node_id: node_id.clone(),
            transport_node_id: transport_node_id.clone(),
            delivered_at: now(),
        }
    }
}

/// Returns the current wall-clock timestamp.
fn now() -> Timestamp {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
    Timestamp::from_unix_millis(millis)
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod channel;
pub mod http;
pub mod log;

pub use channel::ChannelSink;
pub use http::HttpSink;
pub use log::LogSink;
