// crates/idmesh-node/src/lib.rs
// ============================================================================
// Module: idmesh Node Library
// Description: Platform HTTP surfaces, callback ingress, and the sweeper.
// Purpose: Host the request engine and broker behind HTTP for all parties.
// Dependencies: idmesh-core, idmesh-broker, idmesh-config, axum, tokio
// ============================================================================

//! ## Overview
//! `idmesh-node` wires the deterministic request engine and the callback
//! broker into a running platform node: the platform API router for RP, IdP,
//! AS, and NDID operations, the per-party callback ingress listener, and the
//! timeout/settle sweeper that supplies the engine's clock.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod ingress;
pub mod server;
pub mod sweeper;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use ingress::AccessorKeyVault;
pub use ingress::PartyIngress;
pub use server::ApiError;
pub use server::NodeServerError;
pub use server::PlatformServer;
pub use server::ServerState;
pub use server::now_ms;
pub use server::platform_router;
pub use sweeper::Sweeper;
pub use telemetry::API_LATENCY_BUCKETS_MS;
pub use telemetry::ApiMetricEvent;
pub use telemetry::ApiOperation;
pub use telemetry::ApiOutcome;
pub use telemetry::NoopMetrics;
pub use telemetry::PlatformMetrics;
