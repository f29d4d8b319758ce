// system-tests/src/harness.rs
// ============================================================================
// Module: Scenario Platform Harness
// Description: In-process platform wiring for end-to-end scenarios.
// Purpose: Run the engine, broker, and correlator against a channel sink.
// Dependencies: idmesh-core, idmesh-broker, idmesh-node, tokio
// ============================================================================

//! ## Overview
//! [`ScenarioPlatform`] wires the real request engine to a [`CallbackBroker`]
//! over a [`ChannelSink`] and drains delivered events into a
//! [`CorrelationScope`] plus an ordered event log. Engine operations emit
//! synchronously into the channel, so a `drain` call after each step observes
//! every callback deterministically. Scenarios drive time with explicit
//! timestamps through [`ScenarioPlatform::sweep`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use idmesh_broker::BrokerError;
use idmesh_broker::CallbackBroker;
use idmesh_broker::ChannelSink;
use idmesh_broker::CorrelationScope;
use idmesh_broker::DispatchMessage;
use idmesh_broker::EventPromise;
use idmesh_core::AssuranceLevel;
use idmesh_core::CallbackDispatcher;
use idmesh_core::CallbackEvent;
use idmesh_core::EngineConfig;
use idmesh_core::NodeId;
use idmesh_core::NodeRecord;
use idmesh_core::NodeRole;
use idmesh_core::ProxyTable;
use idmesh_core::RequestEngine;
use idmesh_core::RequestId;
use idmesh_core::RequestSnapshot;
use idmesh_core::Timestamp;
use idmesh_node::Sweeper;
use tokio::sync::mpsc;
use tokio::sync::mpsc::Receiver;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Capacity of the dispatch channel; scenarios never approach this.
const CHANNEL_CAPACITY: usize = 1024;

/// Settle delay used by scenarios unless overridden.
const DEFAULT_AUTO_CLOSE_DELAY_MS: i64 = 500;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Shorthand for a unix-millisecond timestamp.
#[must_use]
pub const fn at(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

// ============================================================================
// SECTION: Scenario Platform
// ============================================================================

/// In-process platform fixture for end-to-end scenarios.
///
/// # Invariants
/// - Every delivered event is observed by the correlation scope and appended
///   to the log in delivery order.
pub struct ScenarioPlatform {
    /// Request lifecycle engine under test.
    engine: Arc<RequestEngine>,
    /// Callback broker the engine dispatches through.
    broker: Arc<CallbackBroker>,
    /// Correlation scope fed by `drain`.
    scope: Arc<CorrelationScope>,
    /// Receiver side of the dispatch channel.
    receiver: Mutex<Receiver<DispatchMessage>>,
    /// Ordered log of every drained delivery.
    log: Mutex<Vec<DispatchMessage>>,
}

impl ScenarioPlatform {
    /// Creates a platform with the default settle delay.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when broker construction fails.
    pub fn new() -> Result<Self, BrokerError> {
        Self::with_auto_close_delay(DEFAULT_AUTO_CLOSE_DELAY_MS)
    }

    /// Creates a platform with an explicit settle delay.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when broker construction fails.
    pub fn with_auto_close_delay(auto_close_delay_ms: i64) -> Result<Self, BrokerError> {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let proxies = Arc::new(ProxyTable::new());
        let broker = Arc::new(
            CallbackBroker::builder()
                .sink(ChannelSink::new(sender))
                .proxies(Arc::clone(&proxies))
                .build()?,
        );
        let dispatcher: Arc<dyn CallbackDispatcher> = Arc::<CallbackBroker>::clone(&broker);
        let config = EngineConfig {
            chain_id: "scenario-chain".to_string(),
            auto_close_delay_ms,
            reserved_namespaces: vec!["requester".to_string()],
        };
        let engine = Arc::new(RequestEngine::new(config, proxies, dispatcher));
        Ok(Self {
            engine,
            broker,
            scope: Arc::new(CorrelationScope::new()),
            receiver: Mutex::new(receiver),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Returns the engine under test.
    #[must_use]
    pub fn engine(&self) -> &RequestEngine {
        &self.engine
    }

    /// Registers an active node and its callback route.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when route registration fails.
    pub fn register_node(&self, id: &str, role: NodeRole) -> Result<(), BrokerError> {
        self.engine.nodes().register(NodeRecord {
            node_id: NodeId::new(id),
            role,
            max_ial: AssuranceLevel::from_tenths(30),
            max_aal: AssuranceLevel::from_tenths(30),
            active: true,
        });
        self.broker.register_route(&NodeId::new(id), format!("http://{id}.internal/callback"))
    }

    /// Registers an expectation against future drained events.
    pub fn expect(
        &self,
        predicate: impl Fn(&NodeId, &CallbackEvent) -> bool + Send + 'static,
    ) -> EventPromise {
        self.scope.expect(predicate)
    }

    /// Drains every queued delivery into the scope and the log.
    pub fn drain(&self) {
        let Ok(mut receiver) = self.receiver.lock() else {
            return;
        };
        while let Ok(message) = receiver.try_recv() {
            self.scope.observe(&message.node_id, &message.event);
            if let Ok(mut log) = self.log.lock() {
                log.push(message);
            }
        }
    }

    /// Returns every drained event delivered to the node, in order.
    #[must_use]
    pub fn events_for(&self, node: &str) -> Vec<CallbackEvent> {
        let node_id = NodeId::new(node);
        self.log.lock().map_or_else(
            |_| Vec::new(),
            |log| {
                log.iter()
                    .filter(|message| message.node_id == node_id)
                    .map(|message| message.event.clone())
                    .collect()
            },
        )
    }

    /// Returns the drained status snapshots delivered to the node, in order.
    #[must_use]
    pub fn statuses_for(&self, node: &str) -> Vec<RequestSnapshot> {
        self.events_for(node)
            .into_iter()
            .filter_map(|event| match event {
                CallbackEvent::RequestStatus { snapshot } => Some(snapshot),
                _ => None,
            })
            .collect()
    }

    /// Runs one timeout/settle sweep at the given time and drains the output.
    pub fn sweep(&self, now: Timestamp) -> (Vec<RequestId>, Vec<RequestId>) {
        let sweeper = Sweeper::new(Arc::clone(&self.engine), 250);
        let swept = sweeper.sweep_at(now);
        self.drain();
        swept
    }
}
