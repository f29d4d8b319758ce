// crates/idmesh-node/src/ingress/tests.rs
// ============================================================================
// Module: Party Ingress Unit Tests
// Description: Unit tests for callback ingress and the accessor key vault.
// Purpose: Validate signing replies and correlation publication.
// Dependencies: idmesh-node
// ============================================================================

//! ## Overview
//! Exercises the ingress callback handler: synchronous `accessor_sign`
//! replies out of the vault, rejection of unknown accessors, and publication
//! of every other event into the correlation scope.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::body::to_bytes;
use ed25519_dalek::Signature;
use ed25519_dalek::Verifier;
use idmesh_core::ReferenceId;
use idmesh_core::RequestId;
use serde_json::Value;

use super::*;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

fn vault_with_key(accessor: &str) -> Arc<AccessorKeyVault> {
    let vault = Arc::new(AccessorKeyVault::new());
    vault.insert(AccessorId::new(accessor), signing_key());
    vault
}

fn result_event(reference: &str) -> CallbackEvent {
    CallbackEvent::CloseRequestResult {
        reference_id: ReferenceId::new(reference),
        request_id: RequestId::new("req-1"),
        success: true,
        error: None,
    }
}

// ============================================================================
// SECTION: Vault Tests
// ============================================================================

#[test]
fn vault_signatures_verify_against_the_public_key() {
    let vault = vault_with_key("acc-1");
    let message = b"challenge bytes";
    let encoded = STANDARD.encode(message);
    let signature = vault
        .sign(&AccessorId::new("acc-1"), &encoded)
        .expect("known accessor signs");
    let bytes = STANDARD.decode(signature).expect("signature is base64");
    let signature = Signature::from_slice(&bytes).expect("signature bytes are well formed");
    let verifying = signing_key().verifying_key();
    assert!(verifying.verify(message, &signature).is_ok());
}

#[test]
fn vault_rejects_unknown_accessors_and_bad_base64() {
    let vault = vault_with_key("acc-1");
    assert!(vault.sign(&AccessorId::new("acc-2"), "bWVzc2FnZQ==").is_none());
    assert!(vault.sign(&AccessorId::new("acc-1"), "not base64 !!").is_none());
}

// ============================================================================
// SECTION: Handler Tests
// ============================================================================

#[tokio::test]
async fn sign_challenges_are_answered_synchronously() {
    let scope = Arc::new(CorrelationScope::new());
    let ingress = Arc::new(
        PartyIngress::new(NodeId::new("idp1"), Arc::clone(&scope))
            .with_vault(vault_with_key("acc-1")),
    );
    let event = CallbackEvent::AccessorSign {
        accessor_id: AccessorId::new("acc-1"),
        sign_message: STANDARD.encode(b"prove it"),
    };
    let response = handle_callback(State(ingress), Json(event)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body: Value = serde_json::from_slice(&bytes).expect("reply is json");
    let signature = body["signature"].as_str().expect("signature is a string");
    let bytes = STANDARD.decode(signature).expect("signature is base64");
    let signature = Signature::from_slice(&bytes).expect("signature bytes are well formed");
    let verifying = signing_key().verifying_key();
    assert!(verifying.verify(b"prove it", &signature).is_ok());
    // Sign challenges never enter the correlation backlog.
    assert_eq!(scope.backlog_len(), 0);
}

#[tokio::test]
async fn sign_challenges_for_unknown_accessors_are_rejected() {
    let scope = Arc::new(CorrelationScope::new());
    let ingress = Arc::new(
        PartyIngress::new(NodeId::new("idp1"), Arc::clone(&scope))
            .with_vault(vault_with_key("acc-1")),
    );
    let event = CallbackEvent::AccessorSign {
        accessor_id: AccessorId::new("acc-9"),
        sign_message: STANDARD.encode(b"prove it"),
    };
    let response = handle_callback(State(ingress), Json(event)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sign_challenges_without_a_vault_are_rejected() {
    let scope = Arc::new(CorrelationScope::new());
    let ingress = Arc::new(PartyIngress::new(NodeId::new("rp1"), scope));
    let event = CallbackEvent::AccessorSign {
        accessor_id: AccessorId::new("acc-1"),
        sign_message: STANDARD.encode(b"prove it"),
    };
    let response = handle_callback(State(ingress), Json(event)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_events_are_published_into_the_scope() {
    let scope = Arc::new(CorrelationScope::new());
    let ingress = Arc::new(PartyIngress::new(NodeId::new("rp1"), Arc::clone(&scope)));
    let promise = scope.expect(|node_id, event| {
        node_id == &NodeId::new("rp1")
            && event.reference_id() == Some(&ReferenceId::new("ref-42"))
    });
    let response = handle_callback(State(ingress), Json(result_event("ref-42"))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let observed = promise.try_take().expect("event reaches the expectation");
    assert_eq!(observed.reference_id(), Some(&ReferenceId::new("ref-42")));
}
