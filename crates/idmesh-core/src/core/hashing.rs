// crates/idmesh-core/src/core/hashing.rs
// ============================================================================
// Module: idmesh Hashing
// Description: Salt derivation and message-hash computation for requests.
// Purpose: Let every party independently recompute identical hashes from shared entropy.
// Dependencies: sha2, base64, serde_jcs, serde_json
// ============================================================================

//! ## Overview
//! Request message hashes are derived from a client-supplied `initial_salt`
//! entropy root. Per-request and per-(request, service) salts are derived
//! deterministically with SHA-256, so the RP, every IdP, and every AS can
//! recompute the same hash without the plaintext parameters being
//! retransmitted. Mode 3 consent signatures cover the zero-padded 64-byte
//! digest; modes 1 and 2 cover the plain digest.
//!
//! Invariants:
//! - Derivation is a pure function of its inputs.
//! - Wire forms are standard base64.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::identifiers::RequestId;
use crate::core::identifiers::ServiceId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length in bytes of the mode 3 padded message hash.
pub const PADDED_HASH_LEN: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while hashing canonical JSON payloads.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HashingError {
    /// Canonical JSON serialization failed.
    #[error("canonical json serialization failed: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Digest and Salt Types
// ============================================================================

/// Base64-encoded SHA-256 digest.
///
/// # Invariants
/// - Wire form is standard base64 of 32 digest bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashDigest(String);

impl HashDigest {
    /// Returns the digest as a base64 string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the digest into raw bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        BASE64.decode(&self.0).ok()
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base64-encoded derived salt.
///
/// # Invariants
/// - Wire form is standard base64 of 32 derived bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Salt(String);

impl Salt {
    /// Returns the salt as a base64 string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Hash Functions
// ============================================================================

/// Hashes raw bytes into a base64 SHA-256 digest.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> HashDigest {
    let digest = Sha256::digest(bytes);
    HashDigest(BASE64.encode(digest))
}

/// Hashes a JSON value in canonical (JCS) form.
///
/// # Errors
///
/// Returns [`HashingError`] when canonical serialization fails.
pub fn hash_canonical_json(value: &Value) -> Result<HashDigest, HashingError> {
    let canonical =
        serde_jcs::to_vec(value).map_err(|err| HashingError::Canonicalization(err.to_string()))?;
    Ok(hash_bytes(&canonical))
}

// ============================================================================
// SECTION: Salt Derivation
// ============================================================================

/// Derives the per-request message salt from the entropy root.
#[must_use]
pub fn derive_request_salt(initial_salt: &str, request_id: &RequestId) -> Salt {
    let mut hasher = Sha256::new();
    hasher.update(initial_salt.as_bytes());
    hasher.update(request_id.as_str().as_bytes());
    Salt(BASE64.encode(hasher.finalize()))
}

/// Derives the per-(request, service) parameter salt from the entropy root.
#[must_use]
pub fn derive_service_salt(
    initial_salt: &str,
    request_id: &RequestId,
    service_id: &ServiceId,
) -> Salt {
    let mut hasher = Sha256::new();
    hasher.update(initial_salt.as_bytes());
    hasher.update(request_id.as_str().as_bytes());
    hasher.update(service_id.as_str().as_bytes());
    Salt(BASE64.encode(hasher.finalize()))
}

// ============================================================================
// SECTION: Message Hashes
// ============================================================================

/// Hashes a request message with its derived salt.
///
/// The digest covers `message ‖ salt` so a party holding only the salted hash
/// cannot recover or forge the plaintext association.
#[must_use]
pub fn hash_request_message(message: &str, salt: &Salt) -> HashDigest {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    hasher.update(salt.as_str().as_bytes());
    HashDigest(BASE64.encode(hasher.finalize()))
}

/// Returns the mode 3 padded form of a message hash.
///
/// The digest bytes are zero-extended to [`PADDED_HASH_LEN`] bytes. Returns
/// `None` when the digest is not valid base64.
#[must_use]
pub fn padded_message_hash(hash: &HashDigest) -> Option<Vec<u8>> {
    let mut bytes = hash.to_bytes()?;
    bytes.resize(PADDED_HASH_LEN, 0);
    Some(bytes)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
