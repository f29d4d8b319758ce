// crates/idmesh-broker/src/broker.rs
// ============================================================================
// Module: idmesh Callback Broker
// Description: Route-resolving dispatcher for platform callback events.
// Purpose: Resolve effective transport nodes and deliver through a sink.
// Dependencies: idmesh-core, url, thiserror
// ============================================================================

//! ## Overview
//! [`CallbackBroker`] implements [`idmesh_core::CallbackDispatcher`] on top
//! of a route table and a [`Sink`]. Routes map transport nodes to callback
//! URLs; proxy bindings are consulted at dispatch time, so a rebinding is
//! observed by the very next event without invalidating any cache.
//!
//! Invariants:
//! - Dispatch fails closed when no route exists for the effective node.
//! - Delivery is at-most-once; failures are terminal and never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;

use idmesh_core::CallbackDispatcher;
use idmesh_core::CallbackEvent;
use idmesh_core::DeliveryReceipt;
use idmesh_core::DispatchError;
use idmesh_core::NodeId;
use idmesh_core::ProxyTable;
use thiserror::Error;
use url::Url;

use crate::sink::Sink;
use crate::sink::SinkError;

// ============================================================================
// SECTION: Broker Errors
// ============================================================================

/// Errors returned by the callback broker.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Broker is missing a required sink.
    #[error("broker sink is not configured")]
    MissingSink,
    /// Callback URL failed to parse.
    #[error("invalid callback url: {0}")]
    InvalidUrl(String),
    /// No route is registered for the effective transport node.
    #[error("no callback route for node: {0}")]
    NoRoute(String),
    /// Sink failed to deliver the event.
    #[error("sink failure: {0}")]
    Sink(#[from] SinkError),
}

impl From<BrokerError> for DispatchError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NoRoute(node) => Self::NoRoute(node),
            other => Self::DeliveryFailed(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Callback Routes
// ============================================================================

/// Registered callback endpoint for one transport node.
///
/// # Invariants
/// - `url` parsed successfully at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRoute {
    /// Callback endpoint URL.
    pub url: String,
}

// ============================================================================
// SECTION: Broker Builder
// ============================================================================

/// Builder for a callback broker.
///
/// # Invariants
/// - `build` succeeds only when a sink is configured.
#[derive(Default)]
pub struct CallbackBrokerBuilder {
    /// Sink used to deliver events.
    sink: Option<Arc<dyn Sink>>,
    /// Proxy binding table shared with the engine.
    proxies: Option<Arc<ProxyTable>>,
}

impl CallbackBrokerBuilder {
    /// Registers the sink used for delivery.
    #[must_use]
    pub fn sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Shares a proxy binding table with the broker.
    #[must_use]
    pub fn proxies(mut self, proxies: Arc<ProxyTable>) -> Self {
        self.proxies = Some(proxies);
        self
    }

    /// Builds the callback broker.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MissingSink`] when no sink is configured.
    pub fn build(self) -> Result<CallbackBroker, BrokerError> {
        Ok(CallbackBroker {
            routes: RwLock::new(BTreeMap::new()),
            proxies: self.proxies.unwrap_or_else(|| Arc::new(ProxyTable::new())),
            sink: self.sink.ok_or(BrokerError::MissingSink)?,
        })
    }
}

// ============================================================================
// SECTION: Callback Broker
// ============================================================================

/// Route-resolving callback dispatcher.
///
/// # Invariants
/// - A sink is always configured for delivery.
/// - At most one route per transport node.
pub struct CallbackBroker {
    /// Routes keyed by transport node.
    routes: RwLock<BTreeMap<NodeId, CallbackRoute>>,
    /// Proxy binding table consulted per dispatch.
    proxies: Arc<ProxyTable>,
    /// Sink used to deliver events.
    sink: Arc<dyn Sink>,
}

impl CallbackBroker {
    /// Returns a builder for the callback broker.
    #[must_use]
    pub fn builder() -> CallbackBrokerBuilder {
        CallbackBrokerBuilder::default()
    }

    /// Registers or replaces the callback route for a transport node.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidUrl`] when the URL does not parse.
    pub fn register_route(
        &self,
        node_id: &NodeId,
        url: impl Into<String>,
    ) -> Result<(), BrokerError> {
        let url = url.into();
        Url::parse(&url).map_err(|err| BrokerError::InvalidUrl(err.to_string()))?;
        let Ok(mut routes) = self.routes.write() else {
            return Err(BrokerError::NoRoute(node_id.to_string()));
        };
        routes.insert(node_id.clone(), CallbackRoute { url });
        Ok(())
    }

    /// Removes the callback route for a transport node.
    pub fn remove_route(&self, node_id: &NodeId) {
        if let Ok(mut routes) = self.routes.write() {
            routes.remove(node_id);
        }
    }

    /// Resolves the effective transport node for a logical receiver.
    ///
    /// A node behind a proxy is reached through the proxy's route; the
    /// logical identity is preserved in the delivered event.
    #[must_use]
    pub fn effective_transport_node(&self, node_id: &NodeId) -> NodeId {
        self.proxies
            .resolve(node_id)
            .map_or_else(|| node_id.clone(), |binding| binding.proxy_node_id)
    }

    /// Returns the route registered for a transport node.
    #[must_use]
    pub fn route_for(&self, node_id: &NodeId) -> Option<CallbackRoute> {
        self.routes.read().ok().and_then(|routes| routes.get(node_id).cloned())
    }
}

impl CallbackDispatcher for CallbackBroker {
    fn dispatch(
        &self,
        node_id: &NodeId,
        event: &CallbackEvent,
    ) -> Result<DeliveryReceipt, DispatchError> {
        let transport_node_id = self.effective_transport_node(node_id);
        let route = self
            .route_for(&transport_node_id)
            .ok_or_else(|| BrokerError::NoRoute(transport_node_id.to_string()))?;
        let receipt = self
            .sink
            .deliver(&route, node_id, &transport_node_id, event)
            .map_err(BrokerError::from)?;
        Ok(receipt)
    }
}
