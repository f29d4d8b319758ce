// system-tests/src/lib.rs
// ============================================================================
// Module: idmesh System Tests Library
// Description: Shared in-process platform harness for system test scenarios.
// Purpose: Provide common fixtures for idmesh system-test binaries.
// Dependencies: idmesh-core, idmesh-broker, idmesh-node
// ============================================================================

//! ## Overview
//! This crate hosts the in-process platform harness used by the system-test
//! binaries in `system-tests/tests`. Scenarios run the real engine, broker,
//! and correlator wired through a channel sink, with explicit timestamps so
//! every run is deterministic.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod harness;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use harness::ScenarioPlatform;
pub use harness::at;
