// crates/idmesh-core/src/core/time.rs
// ============================================================================
// Module: idmesh Time Model
// Description: Canonical timestamp representation for requests and callbacks.
// Purpose: Provide deterministic, replayable time values across idmesh records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! idmesh uses explicit time values embedded in operations and records to keep
//! replay deterministic. The core engine never reads wall-clock time directly;
//! hosts must supply timestamps on every operation, and the timeout/settle
//! sweeps are explicit host calls.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in idmesh records and callbacks.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns this timestamp advanced by the provided number of milliseconds.
    #[must_use]
    pub const fn plus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns true when `self` is strictly after `other`.
    #[must_use]
    pub const fn is_after(self, other: Self) -> bool {
        self.0 > other.0
    }
}
