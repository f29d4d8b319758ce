// crates/idmesh-config/src/lib.rs
// ============================================================================
// Module: idmesh Config Library
// Description: Canonical config model and fail-closed validation.
// Purpose: Single source of truth for idmesh.toml semantics.
// Dependencies: idmesh-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `idmesh-config` defines the canonical configuration model for an idmesh
//! platform node. Loading is strict and fail-closed: oversized files,
//! non-UTF-8 content, unparseable TOML, and out-of-range values are all
//! rejected before the node starts serving.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
