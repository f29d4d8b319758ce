// crates/idmesh-broker/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for idmesh-broker tests.
// Purpose: Provide reusable event and route builders for broker tests.
// Dependencies: idmesh-core
// ============================================================================

//! ## Overview
//! Provides shared helper functions for broker sink and dispatcher tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use idmesh_broker::CallbackRoute;
use idmesh_core::CallbackEvent;
use idmesh_core::NodeId;
use idmesh_core::ReferenceId;
use idmesh_core::RequestId;

// ============================================================================
// SECTION: Event Helpers
// ============================================================================

/// Creates a sample result event keyed by a reference identifier.
pub fn sample_result_event(reference: &str) -> CallbackEvent {
    CallbackEvent::CreateRequestResult {
        reference_id: ReferenceId::new(reference),
        request_id: RequestId::new("req-1"),
        success: true,
        error: None,
        creation_block_height: None,
    }
}

/// Creates a route pointing at the given URL.
pub fn route(url: &str) -> CallbackRoute {
    CallbackRoute { url: url.to_string() }
}

/// Creates a node identifier.
pub fn node(id: &str) -> NodeId {
    NodeId::new(id)
}
