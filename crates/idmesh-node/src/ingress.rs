// crates/idmesh-node/src/ingress.rs
// ============================================================================
// Module: Party Callback Ingress
// Description: Per-party callback listener and accessor key vault.
// Purpose: Receive platform callbacks and answer signing challenges.
// Dependencies: idmesh-core, idmesh-broker, axum, base64, ed25519-dalek
// ============================================================================

//! ## Overview
//! Each party runs one ingress listener. Posted callback events are published
//! into the party's [`CorrelationScope`] and acknowledged with
//! `204 No Content`. The IdP variant holds an [`AccessorKeyVault`] and answers
//! `accessor_sign` challenges synchronously with `200 {"signature": ...}`,
//! since the platform blocks request admission on that reply.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::RwLock;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use idmesh_broker::CorrelationScope;
use idmesh_core::AccessorId;
use idmesh_core::CallbackEvent;
use idmesh_core::NodeId;
use serde_json::json;

use crate::server::NodeServerError;

// ============================================================================
// SECTION: Accessor Key Vault
// ============================================================================

/// Locally held accessor signing keys.
///
/// # Invariants
/// - Private keys never leave the vault; only signatures are produced.
#[derive(Default)]
pub struct AccessorKeyVault {
    /// Signing keys keyed by accessor.
    keys: RwLock<BTreeMap<AccessorId, SigningKey>>,
}

impl AccessorKeyVault {
    /// Creates an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a signing key for an accessor.
    pub fn insert(&self, accessor_id: AccessorId, key: SigningKey) {
        if let Ok(mut keys) = self.keys.write() {
            keys.insert(accessor_id, key);
        }
    }

    /// Signs a base64 message with the accessor's key.
    ///
    /// Returns the base64 signature, or `None` when the accessor is unknown
    /// or the message is not valid base64.
    #[must_use]
    pub fn sign(&self, accessor_id: &AccessorId, sign_message: &str) -> Option<String> {
        let message = STANDARD.decode(sign_message).ok()?;
        let keys = self.keys.read().ok()?;
        let key = keys.get(accessor_id)?;
        Some(STANDARD.encode(key.sign(&message).to_bytes()))
    }
}

// ============================================================================
// SECTION: Party Ingress
// ============================================================================

/// Callback ingress for one party node.
pub struct PartyIngress {
    /// Logical node this ingress belongs to.
    node_id: NodeId,
    /// Correlation scope callbacks are published into.
    scope: Arc<CorrelationScope>,
    /// Accessor vault for signing challenges (IdP parties).
    vault: Option<Arc<AccessorKeyVault>>,
}

impl PartyIngress {
    /// Creates an ingress publishing into the given scope.
    #[must_use]
    pub fn new(node_id: NodeId, scope: Arc<CorrelationScope>) -> Self {
        Self {
            node_id,
            scope,
            vault: None,
        }
    }

    /// Attaches an accessor vault for synchronous signing replies.
    #[must_use]
    pub fn with_vault(mut self, vault: Arc<AccessorKeyVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    /// Returns the ingress router.
    #[must_use]
    pub fn router(self) -> Router {
        Router::new().route("/callback", post(handle_callback)).with_state(Arc::new(self))
    }

    /// Serves the ingress on the given address.
    ///
    /// # Errors
    ///
    /// Returns [`NodeServerError`] when binding or serving fails.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), NodeServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| NodeServerError::Transport("ingress bind failed".to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|_| NodeServerError::Transport("ingress server failed".to_string()))
    }
}

/// Handles one posted callback event.
async fn handle_callback(
    State(ingress): State<Arc<PartyIngress>>,
    Json(event): Json<CallbackEvent>,
) -> Response {
    if let CallbackEvent::AccessorSign {
        accessor_id,
        sign_message,
    } = &event
    {
        let signature = ingress
            .vault
            .as_ref()
            .and_then(|vault| vault.sign(accessor_id, sign_message));
        return match signature {
            Some(signature) => {
                (StatusCode::OK, Json(json!({ "signature": signature }))).into_response()
            }
            None => StatusCode::BAD_REQUEST.into_response(),
        };
    }
    ingress.scope.observe(&ingress.node_id, &event);
    StatusCode::NO_CONTENT.into_response()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
