// crates/idmesh-node/src/sweeper.rs
// ============================================================================
// Module: Request Sweeper
// Description: Periodic timeout and settle sweeps for the request engine.
// Purpose: Drive the engine's deadline clock from the host event loop.
// Dependencies: idmesh-core, tokio
// ============================================================================

//! ## Overview
//! The engine never reads wall-clock time; this sweeper supplies it. Each
//! tick runs `expire_due` and `settle_due` on the blocking pool, since both
//! may emit callbacks through a blocking delivery sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use idmesh_core::RequestEngine;
use idmesh_core::RequestId;
use idmesh_core::Timestamp;

use crate::server::now_ms;

// ============================================================================
// SECTION: Sweeper
// ============================================================================

/// Periodic timeout/settle sweeper.
pub struct Sweeper {
    /// Engine driven by the sweep.
    engine: Arc<RequestEngine>,
    /// Interval between sweeps.
    interval: Duration,
}

impl Sweeper {
    /// Creates a sweeper with the given interval.
    #[must_use]
    pub fn new(engine: Arc<RequestEngine>, interval_ms: u64) -> Self {
        Self {
            engine,
            interval: Duration::from_millis(interval_ms),
        }
    }

    /// Runs one sweep at the provided timestamp.
    ///
    /// Returns the requests that timed out and the requests that settled.
    #[must_use]
    pub fn sweep_at(&self, now: Timestamp) -> (Vec<RequestId>, Vec<RequestId>) {
        let expired = self.engine.expire_due(now);
        let settled = self.engine.settle_due(now);
        (expired, settled)
    }

    /// Runs the sweep loop until the task is dropped.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let engine = Arc::clone(&self.engine);
            let sweep = tokio::task::spawn_blocking(move || {
                let now = now_ms();
                let _ = engine.expire_due(now);
                let _ = engine.settle_due(now);
            });
            // A panicked sweep must not kill the loop.
            let _ = sweep.await;
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
