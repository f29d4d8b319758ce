// crates/idmesh-core/src/runtime/store.rs
// ============================================================================
// Module: idmesh Request Store
// Description: In-memory request state store with per-request serialization.
// Purpose: Hold request aggregates and the reference-id idempotency index.
// Dependencies: crate::core, std
// ============================================================================

//! ## Overview
//! Requests live behind per-request mutexes inside a shared map, so
//! processing for different requests runs fully in parallel while all
//! mutations and callback emissions for one request are strictly serialized.
//! The reference index provides the (node, reference) idempotency check and
//! is dropped for a request once it closes, making post-close reference
//! lookups fail.
//!
//! Invariants:
//! - One mutex per request; callers hold it across mutation and emission.
//! - Reference reservations are atomic check-and-insert.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

use crate::core::errors::PlatformError;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ReferenceId;
use crate::core::identifiers::RequestId;
use crate::core::request::RequestRecord;
use crate::core::request::RequestStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Request Store
// ============================================================================

/// In-memory request store.
///
/// # Invariants
/// - Request records are only reachable through [`InMemoryRequestStore::with_request`].
#[derive(Debug, Default)]
pub struct InMemoryRequestStore {
    /// Request aggregates behind per-request mutexes.
    requests: RwLock<BTreeMap<RequestId, Arc<Mutex<RequestRecord>>>>,
    /// Idempotency index keyed by (node, reference).
    reference_index: Mutex<BTreeMap<(NodeId, ReferenceId), RequestId>>,
}

impl InMemoryRequestStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserves a (node, reference) pair for a request.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::DuplicateReferenceId`] when the pair is
    /// already reserved by an in-flight request.
    pub fn reserve_reference(
        &self,
        node_id: &NodeId,
        reference_id: &ReferenceId,
        request_id: &RequestId,
    ) -> Result<(), PlatformError> {
        let Ok(mut index) = self.reference_index.lock() else {
            return Err(PlatformError::DuplicateReferenceId);
        };
        let key = (node_id.clone(), reference_id.clone());
        if index.contains_key(&key) {
            return Err(PlatformError::DuplicateReferenceId);
        }
        index.insert(key, request_id.clone());
        Ok(())
    }

    /// Releases a (node, reference) reservation.
    pub fn release_reference(&self, node_id: &NodeId, reference_id: &ReferenceId) {
        if let Ok(mut index) = self.reference_index.lock() {
            index.remove(&(node_id.clone(), reference_id.clone()));
        }
    }

    /// Returns the request reserved under a (node, reference) pair.
    #[must_use]
    pub fn request_id_by_reference(
        &self,
        node_id: &NodeId,
        reference_id: &ReferenceId,
    ) -> Option<RequestId> {
        self.reference_index
            .lock()
            .ok()
            .and_then(|index| index.get(&(node_id.clone(), reference_id.clone())).cloned())
    }

    /// Inserts a new request aggregate.
    pub fn insert(&self, record: RequestRecord) {
        if let Ok(mut requests) = self.requests.write() {
            requests.insert(record.request_id.clone(), Arc::new(Mutex::new(record)));
        }
    }

    /// Runs a closure under the request's mutex.
    ///
    /// All mutations and callback emissions for one request must happen
    /// inside this closure to preserve strict per-request ordering.
    pub fn with_request<T>(
        &self,
        request_id: &RequestId,
        f: impl FnOnce(&mut RequestRecord) -> T,
    ) -> Option<T> {
        let handle = self
            .requests
            .read()
            .ok()
            .and_then(|requests| requests.get(request_id).cloned())?;
        let mut record = handle.lock().ok()?;
        Some(f(&mut record))
    }

    /// Returns a cloned snapshot of a request aggregate.
    #[must_use]
    pub fn get(&self, request_id: &RequestId) -> Option<RequestRecord> {
        self.with_request(request_id, |record| record.clone())
    }

    /// Returns requests past their deadline that are not yet terminal.
    #[must_use]
    pub fn due_for_timeout(&self, now: Timestamp) -> Vec<RequestId> {
        self.collect_ids(|record| !record.is_terminal() && now.is_after(record.deadline))
    }

    /// Returns completed requests whose settle time has elapsed.
    #[must_use]
    pub fn due_for_settle(&self, now: Timestamp) -> Vec<RequestId> {
        self.collect_ids(|record| {
            record.status == RequestStatus::Completed
                && !record.is_terminal()
                && record.settle_at.is_some_and(|at| !at.is_after(now))
        })
    }

    /// Collects request identifiers matching a predicate.
    fn collect_ids(&self, predicate: impl Fn(&RequestRecord) -> bool) -> Vec<RequestId> {
        let Ok(requests) = self.requests.read() else {
            return Vec::new();
        };
        requests
            .iter()
            .filter_map(|(request_id, handle)| {
                let record = handle.lock().ok()?;
                predicate(&record).then(|| request_id.clone())
            })
            .collect()
    }
}
