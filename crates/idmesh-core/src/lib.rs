// crates/idmesh-core/src/lib.rs
// ============================================================================
// Module: idmesh Core Library
// Description: Public API surface for the idmesh platform core.
// Purpose: Expose core types, interfaces, and the request lifecycle engine.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! idmesh core provides the deterministic request/consent/data-exchange state
//! machine of a federated digital-identity platform. It is transport-agnostic
//! and integrates through explicit interfaces rather than embedding an HTTP
//! or message-queue stack.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CallbackDispatcher;
pub use interfaces::DeliveryReceipt;
pub use interfaces::DispatchError;
pub use runtime::EngineConfig;
pub use runtime::InMemoryRequestStore;
pub use runtime::RequestEngine;
