// crates/idmesh-core/src/core/errors.rs
// ============================================================================
// Module: idmesh Error Taxonomy
// Description: Platform domain errors with stable numeric codes.
// Purpose: Provide the error surface shared by the engine, registries, and HTTP layers.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Domain errors carry stable numeric codes matching the platform error
//! taxonomy. Validation and state-conflict errors are rejected synchronously
//! before any state change; asynchronous business-outcome failures are
//! reported exactly once inside a `*_result` callback and never retried.
//!
//! Invariants:
//! - Codes are stable for programmatic handling; variants are append-only.
//! - `2xxxx` codes are request-plane errors; `25xxx` codes are
//!   administration/ledger errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Platform Errors
// ============================================================================

/// Domain errors raised by the platform.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Each variant maps to exactly one numeric code via [`PlatformError::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// A required field is missing or malformed.
    #[error("missing or invalid required field: {0}")]
    MissingField(String),
    /// Duplicate IdP response for one request.
    #[error("duplicate response for request")]
    DuplicateResponse,
    /// Request does not exist.
    #[error("request not found")]
    RequestNotFound,
    /// Namespace is unknown or disabled.
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    /// Subject does not exist for the namespace/identifier pair.
    #[error("identity not found")]
    IdentityNotFound,
    /// Response IAL exceeds the node's registered maximum.
    #[error("ial exceeds node max_ial")]
    IalExceedsNodeMax,
    /// Request has already been closed.
    #[error("request already closed")]
    RequestClosed,
    /// Request has timed out.
    #[error("request timed out")]
    RequestTimedOut,
    /// AS is not concerned by the service in this request.
    #[error("service not concerned for this node")]
    ServiceNotConcerned,
    /// IdP is not in the resolved receiver set for this request.
    #[error("idp not concerned for this request")]
    IdpNotConcerned,
    /// Service does not exist in the directory.
    #[error("service not found")]
    ServiceNotFound,
    /// Accessor public key is not valid base64 key material.
    #[error("invalid public key format")]
    InvalidPublicKey,
    /// Accessor public key is shorter than the required length.
    #[error("public key too short")]
    KeyTooShort,
    /// Reference identifier already used by an in-flight operation.
    #[error("duplicate reference id")]
    DuplicateReferenceId,
    /// AS-submitted data failed JSON-schema validation.
    #[error("data schema validation failed: {0}")]
    DataValidationFailed(String),
    /// A declared service data schema is not a valid JSON schema.
    #[error("invalid service data schema: {0}")]
    InvalidServiceSchema(String),
    /// IdP holds no accessor for the subject.
    #[error("idp not associated with subject")]
    IdpNotAssociated,
    /// National-ID style identifier failed its checksum.
    #[error("invalid identifier checksum")]
    InvalidIdentifierChecksum,
    /// Namespace is reserved for platform-internal use.
    #[error("reserved namespace: {0}")]
    ReservedNamespace(String),
    /// Node has no token account.
    #[error("token account not found")]
    TokenAccountNotFound,
    /// Node token balance is insufficient.
    #[error("insufficient token")]
    InsufficientToken,
    /// Namespace is already registered.
    #[error("duplicate namespace: {0}")]
    DuplicateNamespace(String),
    /// Node does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(String),
    /// Service definition does not exist at the NDID level.
    #[error("service definition not found")]
    ServiceDefinitionNotFound,
    /// AS is not approved to register the service.
    #[error("unauthorized service registration")]
    UnauthorizedServiceRegistration,
    /// Service price exceeds the platform price ceiling.
    #[error("service price exceeds ceiling")]
    PriceCeilingExceeded,
    /// Node is already associated with a proxy.
    #[error("node already associated with a proxy")]
    NodeAlreadyBehindProxy,
    /// Node is not associated with any proxy.
    #[error("node not associated with a proxy")]
    NodeNotBehindProxy,
    /// Proxy node does not exist or lacks the proxy role.
    #[error("proxy node not found")]
    ProxyNodeNotFound,
    /// A proxy node cannot itself be placed behind a proxy.
    #[error("node is a proxy node")]
    NodeIsProxy,
}

impl PlatformError {
    /// Returns the stable numeric code for this error.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::MissingField(_) => 20003,
            Self::DuplicateResponse => 20004,
            Self::RequestNotFound => 20012,
            Self::InvalidNamespace(_) => 20013,
            Self::IdentityNotFound => 20018,
            Self::IalExceedsNodeMax => 20021,
            Self::RequestClosed => 20025,
            Self::RequestTimedOut => 20026,
            Self::ServiceNotConcerned => 20037,
            Self::IdpNotConcerned => 20038,
            Self::ServiceNotFound => 20039,
            Self::InvalidPublicKey => 20040,
            Self::KeyTooShort => 20044,
            Self::DuplicateReferenceId => 20045,
            Self::DataValidationFailed(_) => 20059,
            Self::InvalidServiceSchema(_) => 20060,
            Self::IdpNotAssociated => 20071,
            Self::InvalidIdentifierChecksum => 20096,
            Self::ReservedNamespace(_) => 25005,
            Self::TokenAccountNotFound => 25006,
            Self::InsufficientToken => 25007,
            Self::DuplicateNamespace(_) => 25013,
            Self::NodeNotFound(_) => 25015,
            Self::ServiceDefinitionNotFound => 25018,
            Self::UnauthorizedServiceRegistration => 25028,
            Self::PriceCeilingExceeded => 25033,
            Self::NodeAlreadyBehindProxy => 25046,
            Self::NodeNotBehindProxy => 25047,
            Self::ProxyNodeNotFound => 25048,
            Self::NodeIsProxy => 25049,
        }
    }
}

// ============================================================================
// SECTION: Wire Error Detail
// ============================================================================

/// Error detail embedded in HTTP responses and `*_result` callbacks.
///
/// # Invariants
/// - `code` matches the [`PlatformError::code`] taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

impl From<&PlatformError> for ErrorDetail {
    fn from(error: &PlatformError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(PlatformError::RequestNotFound.code(), 20012);
        assert_eq!(PlatformError::DuplicateReferenceId.code(), 20045);
        assert_eq!(PlatformError::DataValidationFailed(String::new()).code(), 20059);
        assert_eq!(PlatformError::InsufficientToken.code(), 25007);
        assert_eq!(PlatformError::NodeNotFound(String::new()).code(), 25015);
    }

    #[test]
    fn detail_carries_code_and_message() {
        let detail = ErrorDetail::from(&PlatformError::RequestTimedOut);
        assert_eq!(detail.code, 20026);
        assert_eq!(detail.message, "request timed out");
    }
}
