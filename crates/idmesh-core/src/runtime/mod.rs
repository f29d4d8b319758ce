// crates/idmesh-core/src/runtime/mod.rs
// ============================================================================
// Module: idmesh Runtime
// Description: Request lifecycle engine and in-memory request store.
// Purpose: Execute the request/consent/data-exchange state machine.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the request lifecycle. All external surfaces
//! (HTTP, in-process harnesses) must call into the same engine logic so
//! transition ordering and validation stay uniform.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod lifecycle;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use lifecycle::EngineConfig;
pub use lifecycle::RequestEngine;
pub use store::InMemoryRequestStore;
