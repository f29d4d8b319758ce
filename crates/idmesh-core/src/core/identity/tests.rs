// crates/idmesh-core/src/core/identity/tests.rs
// ============================================================================
// Module: Identity Registry Tests
// Description: Unit tests for subjects, accessors, namespaces, and checksums.
// Purpose: Validate registry idempotency, mode growth, and key validation.
// Dependencies: idmesh-core
// ============================================================================

//! ## Overview
//! Validates subject creation idempotency, monotonic mode growth, accessor
//! key validation, and the national-ID checksum scheme.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use super::AccessorRecord;
use super::IdentityRegistry;
use super::NamespaceRecord;
use super::decode_public_key;
use super::validate_national_id;
use crate::core::errors::PlatformError;
use crate::core::identifiers::AccessorId;
use crate::core::identifiers::AssuranceLevel;
use crate::core::identifiers::IdentityMode;
use crate::core::identifiers::NodeId;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

fn namespace(name: &str, validate_checksum: bool) -> NamespaceRecord {
    NamespaceRecord {
        name: name.to_string(),
        description: format!("{name} namespace"),
        active: true,
        validate_checksum,
    }
}

fn accessor(id: &str, owner: &str, mode: IdentityMode) -> AccessorRecord {
    let key = SigningKey::generate(&mut OsRng);
    AccessorRecord {
        accessor_id: AccessorId::new(id),
        accessor_type: "ed25519".to_string(),
        public_key: BASE64.encode(key.verifying_key().to_bytes()),
        owner: NodeId::new(owner),
        mode,
    }
}

fn registry_with_namespace(name: &str) -> IdentityRegistry {
    let registry = IdentityRegistry::new();
    registry.register_namespace(namespace(name, false)).expect("namespace registers");
    registry
}

// ============================================================================
// SECTION: Namespace Tests
// ============================================================================

#[test]
fn duplicate_namespace_is_rejected() {
    let registry = registry_with_namespace("passport");
    let err = registry.register_namespace(namespace("passport", false)).expect_err("duplicate");
    assert_eq!(err, PlatformError::DuplicateNamespace("passport".to_string()));
}

#[test]
fn disabled_namespace_fails_admission() {
    let registry = registry_with_namespace("passport");
    registry.set_namespace_active("passport", false).expect("disable succeeds");
    let err = registry.require_active_namespace("passport").expect_err("disabled");
    assert_eq!(err, PlatformError::InvalidNamespace("passport".to_string()));
}

// ============================================================================
// SECTION: Subject Tests
// ============================================================================

#[test]
fn create_identity_is_idempotent_at_subject_key() {
    let registry = registry_with_namespace("passport");
    let ial = AssuranceLevel::from_tenths(23);
    let first = registry
        .create_identity("passport", "AB123", ial, false, false, IdentityMode::Mode2, accessor("acc-1", "idp1", IdentityMode::Mode2))
        .expect("first create succeeds");
    let second = registry
        .create_identity("passport", "AB123", ial, false, false, IdentityMode::Mode3, accessor("acc-2", "idp2", IdentityMode::Mode3))
        .expect("second create succeeds");
    assert_eq!(first, second, "reference group code is stable");
    let subject = registry.get_subject("passport", "AB123").expect("subject exists");
    assert!(subject.mode_list.contains(&IdentityMode::Mode2));
    assert!(subject.mode_list.contains(&IdentityMode::Mode3));
    assert_eq!(subject.accessors.len(), 2);
}

#[test]
fn idps_for_subject_filters_by_mode() {
    let registry = registry_with_namespace("passport");
    let ial = AssuranceLevel::from_tenths(23);
    registry
        .create_identity("passport", "AB123", ial, false, false, IdentityMode::Mode2, accessor("acc-1", "idp1", IdentityMode::Mode2))
        .expect("create succeeds");
    let mode2 = registry.idps_for_subject("passport", "AB123", IdentityMode::Mode2);
    assert!(mode2.contains(&NodeId::new("idp1")));
    let mode3 = registry.idps_for_subject("passport", "AB123", IdentityMode::Mode3);
    assert!(mode3.is_empty(), "mode 3 capability has not been added");
}

#[test]
fn add_accessor_requires_existing_subject() {
    let registry = registry_with_namespace("passport");
    let err = registry
        .add_accessor("passport", "missing", IdentityMode::Mode2, accessor("acc-1", "idp1", IdentityMode::Mode2))
        .expect_err("missing subject");
    assert_eq!(err, PlatformError::IdentityNotFound);
}

// ============================================================================
// SECTION: Key Validation Tests
// ============================================================================

#[test]
fn decode_rejects_malformed_base64() {
    let err = decode_public_key("not base64!!").expect_err("invalid key");
    assert_eq!(err, PlatformError::InvalidPublicKey);
}

#[test]
fn decode_rejects_short_keys() {
    let short = BASE64.encode([0u8; 16]);
    let err = decode_public_key(&short).expect_err("short key");
    assert_eq!(err, PlatformError::KeyTooShort);
}

// ============================================================================
// SECTION: Checksum Tests
// ============================================================================

#[test]
fn national_id_checksum_accepts_valid_identifier() {
    // 12 leading digits with check digit computed by the mod-11 scheme.
    let digits = [1u32, 1, 0, 1, 7, 0, 0, 0, 2, 0, 7, 3];
    let sum: u32 = digits.iter().enumerate().map(|(i, d)| d * (13 - u32::try_from(i).unwrap())).sum();
    let check = (11 - (sum % 11)) % 10;
    let identifier: String =
        digits.iter().map(ToString::to_string).chain([check.to_string()]).collect();
    assert!(validate_national_id(&identifier).is_ok());
}

#[test]
fn national_id_checksum_rejects_bad_check_digit() {
    let digits = [1u32, 1, 0, 1, 7, 0, 0, 0, 2, 0, 7, 3];
    let sum: u32 = digits.iter().enumerate().map(|(i, d)| d * (13 - u32::try_from(i).unwrap())).sum();
    let bad_check = ((11 - (sum % 11)) % 10 + 1) % 10;
    let identifier: String =
        digits.iter().map(ToString::to_string).chain([bad_check.to_string()]).collect();
    let err = validate_national_id(&identifier).expect_err("bad check digit");
    assert_eq!(err, PlatformError::InvalidIdentifierChecksum);
}

#[test]
fn national_id_checksum_rejects_wrong_length() {
    let err = validate_national_id("12345").expect_err("wrong length");
    assert_eq!(err, PlatformError::InvalidIdentifierChecksum);
}
