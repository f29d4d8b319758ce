// crates/idmesh-core/src/core/proxy.rs
// ============================================================================
// Module: idmesh Proxy Bindings
// Description: Node-to-proxy associations and key custody configuration.
// Purpose: Remap transport endpoint and signing custody without changing identity.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! A proxy binding maps a real node to a proxy node plus a key-custody
//! configuration. Bindings change where callbacks are delivered and who signs
//! on the node's behalf, never the node's protocol identity. Route resolution
//! reads the table at dispatch time, so binding changes are observed by the
//! very next protocol message.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;

use crate::core::errors::PlatformError;
use crate::core::identifiers::NodeId;

// ============================================================================
// SECTION: Binding Types
// ============================================================================

/// Key custody configuration for a proxy binding.
///
/// # Invariants
/// - Wire form uses the platform's screaming-snake labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyKeyConfig {
    /// The proxy signs on the real node's behalf.
    KeyOnProxy,
    /// The node retains its own key material; the proxy is transport only.
    KeyOnNode,
}

/// Association of a real node with a proxy node.
///
/// # Invariants
/// - `node_id` and `proxy_node_id` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyBinding {
    /// Real node being proxied.
    pub node_id: NodeId,
    /// Proxy node carrying the transport.
    pub proxy_node_id: NodeId,
    /// Key custody configuration.
    pub config: ProxyKeyConfig,
}

// ============================================================================
// SECTION: Proxy Table
// ============================================================================

/// In-memory proxy binding table.
///
/// # Invariants
/// - At most one binding per real node.
#[derive(Debug, Default)]
pub struct ProxyTable {
    /// Bindings keyed by the real node.
    bindings: RwLock<BTreeMap<NodeId, ProxyBinding>>,
}

impl ProxyTable {
    /// Creates an empty proxy table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding for an unproxied node.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NodeAlreadyBehindProxy`] when a binding
    /// exists.
    pub fn add(&self, binding: ProxyBinding) -> Result<(), PlatformError> {
        let Ok(mut bindings) = self.bindings.write() else {
            return Err(PlatformError::ProxyNodeNotFound);
        };
        if bindings.contains_key(&binding.node_id) {
            return Err(PlatformError::NodeAlreadyBehindProxy);
        }
        bindings.insert(binding.node_id.clone(), binding);
        Ok(())
    }

    /// Updates the binding for an already-proxied node.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NodeNotBehindProxy`] when no binding exists.
    pub fn update(&self, binding: ProxyBinding) -> Result<(), PlatformError> {
        let Ok(mut bindings) = self.bindings.write() else {
            return Err(PlatformError::ProxyNodeNotFound);
        };
        if !bindings.contains_key(&binding.node_id) {
            return Err(PlatformError::NodeNotBehindProxy);
        }
        bindings.insert(binding.node_id.clone(), binding);
        Ok(())
    }

    /// Removes the binding for a node.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NodeNotBehindProxy`] when no binding exists.
    pub fn remove(&self, node_id: &NodeId) -> Result<ProxyBinding, PlatformError> {
        let Ok(mut bindings) = self.bindings.write() else {
            return Err(PlatformError::ProxyNodeNotFound);
        };
        bindings.remove(node_id).ok_or(PlatformError::NodeNotBehindProxy)
    }

    /// Returns the binding for a node when present.
    #[must_use]
    pub fn resolve(&self, node_id: &NodeId) -> Option<ProxyBinding> {
        self.bindings.read().ok().and_then(|bindings| bindings.get(node_id).cloned())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
