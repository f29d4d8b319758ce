// crates/idmesh-broker/src/correlator.rs
// ============================================================================
// Module: idmesh Event Correlator
// Description: Promise-based correlation of asynchronous callback events.
// Purpose: Turn callback streams back into awaitable request/reply pairs.
// Dependencies: idmesh-core, std
// ============================================================================

//! ## Overview
//! Clients submit an operation, receive an accepted acknowledgement, and then
//! observe the outcome as a callback event. [`CorrelationScope`] bridges the
//! two halves: callers register a predicate and receive an [`EventPromise`];
//! a pump feeds observed events into the scope, which fulfills the first
//! matching expectation in registration order.
//!
//! Invariants:
//! - Each expectation is fulfilled at most once.
//! - Events observed before their expectation is registered are buffered, so
//!   registration order and delivery order may interleave freely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use idmesh_core::CallbackEvent;
use idmesh_core::NodeId;

// ============================================================================
// SECTION: Predicates
// ============================================================================

/// Predicate over a (receiver, event) pair.
type EventPredicate = Box<dyn Fn(&NodeId, &CallbackEvent) -> bool + Send>;

// ============================================================================
// SECTION: Event Promise
// ============================================================================

/// Fulfillment slot shared between a promise and its scope.
#[derive(Default)]
struct EventSlot {
    /// Fulfilled event, set at most once.
    state: Mutex<Option<CallbackEvent>>,
    /// Signaled when the slot is fulfilled.
    ready: Condvar,
}

impl EventSlot {
    /// Fulfills the slot once; later calls are ignored.
    fn fulfill(&self, event: CallbackEvent) {
        if let Ok(mut state) = self.state.lock() {
            if state.is_none() {
                *state = Some(event);
            }
        }
        self.ready.notify_all();
    }
}

/// Awaitable handle for one expected callback event.
///
/// # Invariants
/// - Yields its event at most once.
pub struct EventPromise {
    /// Shared fulfillment slot.
    slot: Arc<EventSlot>,
}

impl EventPromise {
    /// Waits for the expected event up to the provided timeout.
    ///
    /// Returns `None` on timeout; the expectation stays registered and a
    /// later wait can still succeed.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> Option<CallbackEvent> {
        let deadline = Instant::now().checked_add(timeout)?;
        let mut state = self.slot.state.lock().ok()?;
        while state.is_none() {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (next, result) = self.slot.ready.wait_timeout(state, remaining).ok()?;
            state = next;
            if result.timed_out() && state.is_none() {
                return None;
            }
        }
        state.take()
    }

    /// Returns the event without blocking when already fulfilled.
    #[must_use]
    pub fn try_take(&self) -> Option<CallbackEvent> {
        self.slot.state.lock().ok()?.take()
    }
}

// ============================================================================
// SECTION: Correlation Scope
// ============================================================================

/// One registered, unfulfilled expectation.
struct PendingExpectation {
    /// Match predicate.
    predicate: EventPredicate,
    /// Slot to fulfill on match.
    slot: Arc<EventSlot>,
}

/// Interior scope state.
#[derive(Default)]
struct ScopeState {
    /// Expectations in registration order.
    pending: Vec<PendingExpectation>,
    /// Events observed before any expectation matched them.
    backlog: Vec<(NodeId, CallbackEvent)>,
}

/// Correlation arena owning expectations and the unmatched-event backlog.
///
/// # Invariants
/// - The first registered matching expectation wins an observed event.
#[derive(Default)]
pub struct CorrelationScope {
    /// Shared scope state.
    inner: Mutex<ScopeState>,
}

impl CorrelationScope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an expectation and returns its promise.
    ///
    /// When a buffered event already matches, the promise is fulfilled
    /// immediately and the event leaves the backlog.
    pub fn expect(
        &self,
        predicate: impl Fn(&NodeId, &CallbackEvent) -> bool + Send + 'static,
    ) -> EventPromise {
        let slot = Arc::new(EventSlot::default());
        if let Ok(mut state) = self.inner.lock() {
            let matched = state
                .backlog
                .iter()
                .position(|(node_id, event)| predicate(node_id, event));
            if let Some(index) = matched {
                let (_, event) = state.backlog.remove(index);
                slot.fulfill(event);
            } else {
                state.pending.push(PendingExpectation {
                    predicate: Box::new(predicate),
                    slot: Arc::clone(&slot),
                });
            }
        }
        EventPromise { slot }
    }

    /// Feeds one observed delivery into the scope.
    ///
    /// The first matching expectation (in registration order) is fulfilled
    /// and removed; unmatched events are buffered.
    pub fn observe(&self, node_id: &NodeId, event: &CallbackEvent) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };
        let matched = state
            .pending
            .iter()
            .position(|expectation| (expectation.predicate)(node_id, event));
        if let Some(index) = matched {
            let expectation = state.pending.remove(index);
            expectation.slot.fulfill(event.clone());
        } else {
            state.backlog.push((node_id.clone(), event.clone()));
        }
    }

    /// Returns the number of unmatched buffered events.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.inner.lock().map_or(0, |state| state.backlog.len())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
