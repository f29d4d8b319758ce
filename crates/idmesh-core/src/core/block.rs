// crates/idmesh-core/src/core/block.rs
// ============================================================================
// Module: idmesh Block Anchors
// Description: Opaque chain/height anchor tokens for committed events.
// Purpose: Provide the `"<chain>:<height>"` wire token and a logical chain source.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! Every committed platform event carries a block anchor in the opaque
//! `"<chain>:<height>"` form. Both colon-delimited segments are guaranteed
//! non-empty; consumers must treat the token as opaque and must not parse the
//! height as an integer. [`LogicalChain`] is the in-process anchor source used
//! when no external ledger is wired.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Block Height
// ============================================================================

/// Opaque block anchor in `"<chain>:<height>"` form.
///
/// # Invariants
/// - `chain_id` is non-empty and contains no `:` separator.
/// - The height segment is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BlockHeight {
    /// Chain identifier segment.
    chain_id: String,
    /// Height segment, kept as an opaque string on the wire.
    height: u64,
}

impl BlockHeight {
    /// Creates a block anchor from a chain identifier and a height.
    #[must_use]
    pub fn new(chain_id: impl Into<String>, height: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
        }
    }

    /// Returns the chain identifier segment.
    #[must_use]
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Returns the height segment.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.height)
    }
}

impl From<BlockHeight> for String {
    fn from(anchor: BlockHeight) -> Self {
        anchor.to_string()
    }
}

impl TryFrom<String> for BlockHeight {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (chain_id, height) = value
            .split_once(':')
            .ok_or_else(|| format!("block anchor missing separator: {value}"))?;
        if chain_id.is_empty() || height.is_empty() {
            return Err(format!("block anchor segment empty: {value}"));
        }
        let height = height.parse::<u64>().map_err(|err| format!("invalid block height: {err}"))?;
        Ok(Self::new(chain_id, height))
    }
}

// ============================================================================
// SECTION: Logical Chain
// ============================================================================

/// In-process block anchor source.
///
/// # Invariants
/// - Heights are strictly monotonic within the process lifetime.
/// - The chain identifier is fixed at construction and never empty.
#[derive(Debug)]
pub struct LogicalChain {
    /// Chain identifier embedded in every anchor.
    chain_id: String,
    /// Monotonic height counter.
    height: AtomicU64,
}

impl LogicalChain {
    /// Creates a logical chain with the provided identifier.
    #[must_use]
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            height: AtomicU64::new(0),
        }
    }

    /// Commits one event and returns its anchor.
    #[must_use]
    pub fn commit(&self) -> BlockHeight {
        let height = self.height.fetch_add(1, Ordering::Relaxed) + 1;
        BlockHeight::new(self.chain_id.clone(), height)
    }

    /// Returns the most recently committed anchor.
    #[must_use]
    pub fn current(&self) -> BlockHeight {
        BlockHeight::new(self.chain_id.clone(), self.height.load(Ordering::Relaxed))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_round_trips_as_string() {
        let anchor = BlockHeight::new("chain-a", 42);
        let wire = String::from(anchor.clone());
        assert_eq!(wire, "chain-a:42");
        let parsed = BlockHeight::try_from(wire);
        assert_eq!(parsed, Ok(anchor));
    }

    #[test]
    fn anchor_rejects_empty_segments() {
        assert!(BlockHeight::try_from(":1".to_string()).is_err());
        assert!(BlockHeight::try_from("chain:".to_string()).is_err());
        assert!(BlockHeight::try_from("chain".to_string()).is_err());
    }

    #[test]
    fn logical_chain_heights_are_monotonic() {
        let chain = LogicalChain::new("test");
        let first = chain.commit();
        let second = chain.commit();
        assert!(second.height() > first.height());
        assert_eq!(chain.current().height(), second.height());
    }
}
