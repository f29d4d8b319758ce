// crates/idmesh-core/src/core/party.rs
// ============================================================================
// Module: idmesh Party Records
// Description: Node roles and the registered-node table.
// Purpose: Track which logical nodes exist, their roles, and capability caps.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! Every protocol participant is a registered node with a role and capability
//! caps. The engine consults the node table to reject unknown
//! `idp_id_list`/`as_id_list` entries and to bound IdP response assurance
//! levels by the node's registered maximums.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;

use crate::core::errors::PlatformError;
use crate::core::identifiers::AssuranceLevel;
use crate::core::identifiers::NodeId;

// ============================================================================
// SECTION: Node Role
// ============================================================================

/// Protocol role of a registered node.
///
/// # Invariants
/// - Variants are stable for serialization and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Relying party originating identity requests.
    Rp,
    /// Identity provider holding accessors and issuing consent.
    Idp,
    /// Accessor/attribute service supplying requested data.
    As,
    /// Network-governing authority node.
    Ndid,
    /// Transport/key-custody intermediary for real nodes.
    Proxy,
}

// ============================================================================
// SECTION: Node Record
// ============================================================================

/// Registered node record.
///
/// # Invariants
/// - `max_ial`/`max_aal` bound assurance levels the node may assert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node identifier.
    pub node_id: NodeId,
    /// Protocol role.
    pub role: NodeRole,
    /// Maximum IAL the node may assert.
    pub max_ial: AssuranceLevel,
    /// Maximum AAL the node may assert.
    pub max_aal: AssuranceLevel,
    /// Whether the node is active.
    pub active: bool,
}

// ============================================================================
// SECTION: Node Table
// ============================================================================

/// In-memory table of registered nodes.
///
/// # Invariants
/// - Registration is idempotent at the node identifier.
#[derive(Debug, Default)]
pub struct NodeTable {
    /// Registered nodes keyed by identifier.
    nodes: RwLock<BTreeMap<NodeId, NodeRecord>>,
}

impl NodeTable {
    /// Creates an empty node table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a node record.
    pub fn register(&self, record: NodeRecord) {
        if let Ok(mut nodes) = self.nodes.write() {
            nodes.insert(record.node_id.clone(), record);
        }
    }

    /// Returns the record for a node when registered.
    #[must_use]
    pub fn get(&self, node_id: &NodeId) -> Option<NodeRecord> {
        self.nodes.read().ok().and_then(|nodes| nodes.get(node_id).cloned())
    }

    /// Returns the record for an active node with the expected role.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NodeNotFound`] when the node is missing,
    /// inactive, or has a different role.
    pub fn require(&self, node_id: &NodeId, role: NodeRole) -> Result<NodeRecord, PlatformError> {
        self.get(node_id)
            .filter(|record| record.active && record.role == role)
            .ok_or_else(|| PlatformError::NodeNotFound(node_id.to_string()))
    }

    /// Returns true when the node exists and is active, regardless of role.
    #[must_use]
    pub fn is_active(&self, node_id: &NodeId) -> bool {
        self.get(node_id).is_some_and(|record| record.active)
    }

    /// Returns every active node registered under a role.
    #[must_use]
    pub fn active_by_role(&self, role: NodeRole) -> Vec<NodeId> {
        let Ok(nodes) = self.nodes.read() else {
            return Vec::new();
        };
        nodes
            .values()
            .filter(|record| record.active && record.role == role)
            .map(|record| record.node_id.clone())
            .collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
