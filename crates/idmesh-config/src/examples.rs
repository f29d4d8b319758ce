// crates/idmesh-config/src/examples.rs
// ============================================================================
// Module: idmesh Config Examples
// Description: Canonical example configuration document.
// Purpose: Keep the shipped example config in sync with the model.
// Dependencies: none
// ============================================================================

//! ## Overview
//! The example document is generated here and tested against the loader, so
//! it can never drift from what `NodeConfig` actually accepts.

/// Returns the canonical example `idmesh.toml` document.
#[must_use]
pub const fn config_toml_example() -> &'static str {
    r#"# idmesh node configuration

[platform]
chain_id = "idmesh-local"
auto_close_delay_ms = 1000
reserved_namespaces = ["requester"]

[server]
bind_addr = "127.0.0.1:8080"
max_body_bytes = 1048576

[sweeper]
interval_ms = 250

[callbacks]
delivery = "http"

[[routes]]
node_id = "rp1"
url = "http://127.0.0.1:9001/callback"

[[routes]]
node_id = "idp1"
url = "http://127.0.0.1:9002/callback"
"#
}

// ============================================================================
// SECTION: Tests
// ============================================================================
