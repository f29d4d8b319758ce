// crates/idmesh-core/src/core/identity.rs
// ============================================================================
// Module: idmesh Identity Registry
// Description: Subjects, accessors, namespaces, and their IdP associations.
// Purpose: Resolve which IdPs can answer for a subject and hold accessor key material.
// Dependencies: serde, ed25519-dalek, base64, std
// ============================================================================

//! ## Overview
//! The identity registry is a pure lookup/association store consumed by the
//! request engine. A subject is a (namespace, identifier) pair resolved to a
//! stable reference group code once any accessor exists for it. Accessors are
//! per-device ed25519 key pairs; the registry holds only public keys. The
//! subject's `mode_list` grows monotonically as accessors are added under new
//! modes.
//!
//! Invariants:
//! - Mutations are idempotent at the (namespace, identifier) key.
//! - Accessor private keys never enter the registry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::RwLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::PUBLIC_KEY_LENGTH;
use ed25519_dalek::Signature;
use ed25519_dalek::Verifier;
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use serde::Serialize;

use crate::core::errors::PlatformError;
use crate::core::hashing::hash_bytes;
use crate::core::identifiers::AccessorId;
use crate::core::identifiers::AssuranceLevel;
use crate::core::identifiers::IdentityMode;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ReferenceGroupCode;

// ============================================================================
// SECTION: Namespace Records
// ============================================================================

/// Administered namespace record.
///
/// # Invariants
/// - `name` is unique within the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRecord {
    /// Namespace name (for example `citizen_id`).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the namespace accepts new identities and requests.
    pub active: bool,
    /// Whether identifiers must pass the national-ID checksum.
    pub validate_checksum: bool,
}

// ============================================================================
// SECTION: Subject Records
// ============================================================================

/// Accessor bound to a subject.
///
/// # Invariants
/// - `public_key` is standard base64 of a 32-byte ed25519 key.
/// - `owner` is the IdP holding the corresponding private key off-platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessorRecord {
    /// Accessor identifier.
    pub accessor_id: AccessorId,
    /// Accessor key type label.
    pub accessor_type: String,
    /// Base64-encoded ed25519 public key.
    pub public_key: String,
    /// IdP node holding the private key.
    pub owner: NodeId,
    /// Protocol mode the accessor was registered under.
    pub mode: IdentityMode,
}

/// Subject record for one (namespace, identifier) pair.
///
/// # Invariants
/// - `mode_list` only grows; modes are never removed.
/// - `reference_group_code` is assigned once and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    /// Namespace of the subject identifier.
    pub namespace: String,
    /// Subject identifier within the namespace.
    pub identifier: String,
    /// Stable reference group code for the subject.
    pub reference_group_code: ReferenceGroupCode,
    /// Committed identity assurance level.
    pub ial: AssuranceLevel,
    /// Whether identity linkage assurance is asserted.
    pub lial: bool,
    /// Whether authentication linkage assurance is asserted.
    pub laal: bool,
    /// Modes the subject supports, grown monotonically.
    pub mode_list: BTreeSet<IdentityMode>,
    /// Accessors bound to the subject, keyed by accessor identifier.
    pub accessors: BTreeMap<AccessorId, AccessorRecord>,
}

impl SubjectRecord {
    /// Returns the distinct IdP nodes holding accessors for this subject.
    #[must_use]
    pub fn idp_nodes(&self) -> BTreeSet<NodeId> {
        self.accessors.values().map(|accessor| accessor.owner.clone()).collect()
    }
}

// ============================================================================
// SECTION: Key Validation
// ============================================================================

/// Decodes and validates an accessor public key.
///
/// # Errors
///
/// Returns [`PlatformError::InvalidPublicKey`] for malformed base64 or key
/// bytes, and [`PlatformError::KeyTooShort`] for undersized key material.
pub fn decode_public_key(public_key: &str) -> Result<VerifyingKey, PlatformError> {
    let bytes = BASE64.decode(public_key).map_err(|_| PlatformError::InvalidPublicKey)?;
    if bytes.len() < PUBLIC_KEY_LENGTH {
        return Err(PlatformError::KeyTooShort);
    }
    let bytes: [u8; PUBLIC_KEY_LENGTH] =
        bytes.try_into().map_err(|_| PlatformError::InvalidPublicKey)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| PlatformError::InvalidPublicKey)
}

/// Verifies an accessor signature over the provided message bytes.
#[must_use]
pub fn verify_accessor_signature(key: &VerifyingKey, message: &[u8], signature_b64: &str) -> bool {
    let Ok(bytes) = BASE64.decode(signature_b64) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

// ============================================================================
// SECTION: Checksum Validation
// ============================================================================

/// Validates a 13-digit national-ID identifier checksum (mod-11 scheme).
///
/// # Errors
///
/// Returns [`PlatformError::InvalidIdentifierChecksum`] when the identifier
/// is not 13 digits or the check digit does not match.
pub fn validate_national_id(identifier: &str) -> Result<(), PlatformError> {
    let digits: Vec<u32> = identifier.chars().filter_map(|ch| ch.to_digit(10)).collect();
    if digits.len() != 13 || identifier.chars().count() != 13 {
        return Err(PlatformError::InvalidIdentifierChecksum);
    }
    let sum: u32 = digits
        .iter()
        .take(12)
        .enumerate()
        .map(|(index, digit)| digit * (13 - u32::try_from(index).unwrap_or(0)))
        .sum();
    let check = (11 - (sum % 11)) % 10;
    if digits[12] == check {
        Ok(())
    } else {
        Err(PlatformError::InvalidIdentifierChecksum)
    }
}

// ============================================================================
// SECTION: Identity Registry
// ============================================================================

/// In-memory identity/accessor registry.
///
/// # Invariants
/// - Subject keys are (namespace, identifier) pairs.
/// - Namespace administration happens only through registry methods.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    /// Administered namespaces keyed by name.
    namespaces: RwLock<BTreeMap<String, NamespaceRecord>>,
    /// Subjects keyed by (namespace, identifier).
    subjects: RwLock<BTreeMap<(String, String), SubjectRecord>>,
}

impl IdentityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a namespace.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::DuplicateNamespace`] when the name exists.
    pub fn register_namespace(&self, record: NamespaceRecord) -> Result<(), PlatformError> {
        let Ok(mut namespaces) = self.namespaces.write() else {
            return Err(PlatformError::InvalidNamespace(record.name));
        };
        if namespaces.contains_key(&record.name) {
            return Err(PlatformError::DuplicateNamespace(record.name));
        }
        namespaces.insert(record.name.clone(), record);
        Ok(())
    }

    /// Enables or disables a namespace.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidNamespace`] when the name is unknown.
    pub fn set_namespace_active(&self, name: &str, active: bool) -> Result<(), PlatformError> {
        let Ok(mut namespaces) = self.namespaces.write() else {
            return Err(PlatformError::InvalidNamespace(name.to_string()));
        };
        let record = namespaces
            .get_mut(name)
            .ok_or_else(|| PlatformError::InvalidNamespace(name.to_string()))?;
        record.active = active;
        Ok(())
    }

    /// Validates that a namespace exists and is active for admission.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidNamespace`] for unknown or disabled
    /// namespaces.
    pub fn require_active_namespace(&self, name: &str) -> Result<NamespaceRecord, PlatformError> {
        self.namespaces
            .read()
            .ok()
            .and_then(|namespaces| namespaces.get(name).cloned())
            .filter(|record| record.active)
            .ok_or_else(|| PlatformError::InvalidNamespace(name.to_string()))
    }

    /// Creates a subject with its first accessor, or returns the existing
    /// subject's reference group code when the key already exists.
    ///
    /// # Errors
    ///
    /// Returns key or namespace validation errors; creation itself is
    /// idempotent at the subject key.
    pub fn create_identity(
        &self,
        namespace: &str,
        identifier: &str,
        ial: AssuranceLevel,
        lial: bool,
        laal: bool,
        mode: IdentityMode,
        accessor: AccessorRecord,
    ) -> Result<ReferenceGroupCode, PlatformError> {
        let namespace_record = self.require_active_namespace(namespace)?;
        if namespace_record.validate_checksum {
            validate_national_id(identifier)?;
        }
        if accessor.mode.requires_accessor() {
            decode_public_key(&accessor.public_key)?;
        }
        let Ok(mut subjects) = self.subjects.write() else {
            return Err(PlatformError::IdentityNotFound);
        };
        let key = (namespace.to_string(), identifier.to_string());
        let subject = subjects.entry(key).or_insert_with(|| SubjectRecord {
            namespace: namespace.to_string(),
            identifier: identifier.to_string(),
            reference_group_code: derive_reference_group_code(namespace, identifier),
            ial,
            lial,
            laal,
            mode_list: BTreeSet::new(),
            accessors: BTreeMap::new(),
        });
        subject.mode_list.insert(mode);
        subject.accessors.insert(accessor.accessor_id.clone(), accessor);
        Ok(subject.reference_group_code.clone())
    }

    /// Adds an accessor to an existing subject.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::IdentityNotFound`] for unknown subjects and
    /// key validation errors for malformed key material.
    pub fn add_accessor(
        &self,
        namespace: &str,
        identifier: &str,
        mode: IdentityMode,
        accessor: AccessorRecord,
    ) -> Result<ReferenceGroupCode, PlatformError> {
        decode_public_key(&accessor.public_key)?;
        let Ok(mut subjects) = self.subjects.write() else {
            return Err(PlatformError::IdentityNotFound);
        };
        let key = (namespace.to_string(), identifier.to_string());
        let subject = subjects.get_mut(&key).ok_or(PlatformError::IdentityNotFound)?;
        subject.mode_list.insert(mode);
        subject.accessors.insert(accessor.accessor_id.clone(), accessor);
        Ok(subject.reference_group_code.clone())
    }

    /// Returns a subject snapshot when registered.
    #[must_use]
    pub fn get_subject(&self, namespace: &str, identifier: &str) -> Option<SubjectRecord> {
        let key = (namespace.to_string(), identifier.to_string());
        self.subjects.read().ok().and_then(|subjects| subjects.get(&key).cloned())
    }

    /// Returns the IdP nodes able to answer for a subject in the given mode.
    #[must_use]
    pub fn idps_for_subject(
        &self,
        namespace: &str,
        identifier: &str,
        mode: IdentityMode,
    ) -> BTreeSet<NodeId> {
        self.get_subject(namespace, identifier)
            .filter(|subject| subject.mode_list.contains(&mode))
            .map(|subject| subject.idp_nodes())
            .unwrap_or_default()
    }

    /// Returns the accessor record for an accessor identifier.
    #[must_use]
    pub fn find_accessor(&self, accessor_id: &AccessorId) -> Option<AccessorRecord> {
        let subjects = self.subjects.read().ok()?;
        subjects
            .values()
            .find_map(|subject| subject.accessors.get(accessor_id).cloned())
    }
}

/// Derives a stable reference group code for a subject key.
fn derive_reference_group_code(namespace: &str, identifier: &str) -> ReferenceGroupCode {
    let seed = format!("{namespace}\u{1f}{identifier}");
    ReferenceGroupCode::new(hash_bytes(seed.as_bytes()).as_str())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
