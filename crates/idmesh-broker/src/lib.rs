// crates/idmesh-broker/src/lib.rs
// ============================================================================
// Module: idmesh Broker Library
// Description: Callback routing, delivery sinks, and event correlation.
// Purpose: Deliver platform callback events to party nodes and correlate replies.
// Dependencies: idmesh-core, reqwest, tokio, url
// ============================================================================

//! ## Overview
//! The broker is the asynchronous seam between the request engine and party
//! nodes. [`CallbackBroker`] implements [`idmesh_core::CallbackDispatcher`]
//! by resolving the effective transport node (following proxy bindings at
//! dispatch time) and delivering the event through a configured [`Sink`].
//! [`CorrelationScope`] turns the resulting callback streams back into
//! awaitable promises for clients that need request/reply semantics.
//!
//! Invariants:
//! - Sinks return receipts only on successful delivery; delivery is
//!   at-most-once and failures are terminal.
//! - Proxy bindings are resolved per dispatch, never cached.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod broker;
pub mod correlator;
pub mod sink;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use broker::BrokerError;
pub use broker::CallbackBroker;
pub use broker::CallbackBrokerBuilder;
pub use broker::CallbackRoute;
pub use correlator::CorrelationScope;
pub use correlator::EventPromise;
pub use sink::ChannelSink;
pub use sink::DispatchMessage;
pub use sink::HttpSink;
pub use sink::LogSink;
pub use sink::Sink;
pub use sink::SinkError;
