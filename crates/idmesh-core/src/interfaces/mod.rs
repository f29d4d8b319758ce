// crates/idmesh-core/src/interfaces/mod.rs
// ============================================================================
// Module: idmesh Interfaces
// Description: Backend-agnostic interfaces for callback dispatch.
// Purpose: Define the contract surfaces between the engine and its host.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the request engine reaches external systems without
//! embedding transport details. The engine emits every asynchronous effect
//! through [`CallbackDispatcher`]; hosts wire a broker that resolves node
//! routes (including proxy bindings) and delivers over a concrete transport.
//! Implementations must preserve per-request delivery order and fail closed
//! on unroutable nodes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::callback::CallbackEvent;
use crate::core::identifiers::NodeId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Dispatch Types
// ============================================================================

/// Receipt returned after a callback delivery.
///
/// # Invariants
/// - `delivery_id` is unique within the dispatcher's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Dispatcher-scoped delivery identifier.
    pub delivery_id: String,
    /// Logical node the event was delivered for.
    pub node_id: NodeId,
    /// Effective node the transport actually reached (proxy when bound).
    pub transport_node_id: NodeId,
    /// Delivery timestamp.
    pub delivered_at: Timestamp,
}

/// Dispatch errors for callback delivery.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No route is registered for the node.
    #[error("no callback route for node: {0}")]
    NoRoute(String),
    /// Transport-level delivery failed.
    #[error("callback delivery failed: {0}")]
    DeliveryFailed(String),
}

// ============================================================================
// SECTION: Callback Dispatcher
// ============================================================================

/// Delivers platform callback events to party nodes.
///
/// Implementations resolve the effective transport endpoint (following proxy
/// bindings at dispatch time) and must deliver each event at most once.
pub trait CallbackDispatcher: Send + Sync {
    /// Dispatches one event to the node's registered callback endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when no route exists or delivery fails.
    fn dispatch(
        &self,
        node_id: &NodeId,
        event: &CallbackEvent,
    ) -> Result<DeliveryReceipt, DispatchError>;
}
