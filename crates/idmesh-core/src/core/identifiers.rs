// crates/idmesh-core/src/core/identifiers.rs
// ============================================================================
// Module: idmesh Identifiers
// Description: Canonical opaque identifiers for requests, nodes, and subjects.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout idmesh.
//! Identifiers are opaque strings on the wire; no normalization is applied by
//! the types themselves. Construction boundaries (HTTP surfaces, registries)
//! are responsible for emptiness and format checks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Platform-assigned request identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; unique per created request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Creates a request identifier from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-assigned reference identifier used as an idempotency key.
///
/// # Invariants
/// - Opaque UTF-8 string; unique per (node, in-flight operation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    /// Creates a reference identifier from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical node identifier for RP, IdP, AS, NDID, and proxy nodes.
///
/// # Invariants
/// - Opaque UTF-8 string; stable across proxy rebinding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node identifier from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Service identifier for AS-offered services.
///
/// # Invariants
/// - Opaque UTF-8 string; unique within the service directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Creates a service identifier from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accessor identifier bound to a subject key pair.
///
/// # Invariants
/// - Opaque UTF-8 string; unique within the identity registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessorId(String);

impl AccessorId {
    /// Creates an accessor identifier from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference group code unifying all accessors for one real-world subject.
///
/// # Invariants
/// - Stable for the lifetime of the subject; assigned once by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceGroupCode(String);

impl ReferenceGroupCode {
    /// Creates a reference group code from a string value.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceGroupCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Protocol Mode
// ============================================================================

/// Consent-proof protocol mode for a request or identity.
///
/// # Invariants
/// - Wire form is the bare mode number (1, 2, or 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum IdentityMode {
    /// Legacy direct-subject flow with a plain message hash.
    Mode1,
    /// Accessor-challenge flow without a signature echo.
    Mode2,
    /// Accessor-challenge flow with a signed padded-hash message.
    Mode3,
}

impl IdentityMode {
    /// Returns the wire number for this mode.
    #[must_use]
    pub const fn as_number(self) -> u8 {
        match self {
            Self::Mode1 => 1,
            Self::Mode2 => 2,
            Self::Mode3 => 3,
        }
    }

    /// Returns true when the mode requires an accessor challenge.
    #[must_use]
    pub const fn requires_accessor(self) -> bool {
        matches!(self, Self::Mode2 | Self::Mode3)
    }
}

impl From<IdentityMode> for u8 {
    fn from(mode: IdentityMode) -> Self {
        mode.as_number()
    }
}

impl TryFrom<u8> for IdentityMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Mode1),
            2 => Ok(Self::Mode2),
            3 => Ok(Self::Mode3),
            other => Err(format!("invalid identity mode: {other}")),
        }
    }
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_number().fmt(f)
    }
}

// ============================================================================
// SECTION: Assurance Levels
// ============================================================================

/// Identity/authentication assurance level stored in tenths.
///
/// # Invariants
/// - Wire form is a decimal number (for example `2.3`).
/// - Internal representation is exact (tenths), so ordering is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct AssuranceLevel(u16);

impl AssuranceLevel {
    /// Creates an assurance level from tenths (for example 23 for 2.3).
    #[must_use]
    pub const fn from_tenths(tenths: u16) -> Self {
        Self(tenths)
    }

    /// Returns the level in tenths.
    #[must_use]
    pub const fn tenths(self) -> u16 {
        self.0
    }
}

impl From<AssuranceLevel> for f64 {
    fn from(level: AssuranceLevel) -> Self {
        Self::from(level.0) / 10.0
    }
}

impl TryFrom<f64> for AssuranceLevel {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let scaled = (value * 10.0).round();
        if !value.is_finite() || scaled < 0.0 || scaled > f64::from(u16::MAX) {
            return Err(format!("invalid assurance level: {value}"));
        }
        if (scaled - value * 10.0).abs() > 1e-9 {
            return Err(format!("assurance level not in tenths: {value}"));
        }
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "Range and sign are checked above."
        )]
        Ok(Self(scaled as u16))
    }
}

impl fmt::Display for AssuranceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}
