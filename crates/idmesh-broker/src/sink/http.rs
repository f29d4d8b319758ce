// crates/idmesh-broker/src/sink/http.rs
// ============================================================================
// Module: idmesh HTTP Sink
// Description: HTTP-backed sink for party callback delivery.
// Purpose: POST callback events to registered callback URLs.
// Dependencies: idmesh-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! [`HttpSink`] delivers events by POSTing their JSON form to `http://` and
//! `https://` callback URLs. Redirects are refused and non-success status
//! codes fail closed; the platform never retries a delivery.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use idmesh_core::CallbackEvent;
use idmesh_core::DeliveryReceipt;
use idmesh_core::NodeId;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use url::Url;

use crate::broker::CallbackRoute;
use crate::sink::ReceiptFactory;
use crate::sink::Sink;
use crate::sink::SinkError;

// ============================================================================
// SECTION: HTTP Sink
// ============================================================================

/// HTTP-backed callback sink.
#[derive(Debug)]
pub struct HttpSink {
    /// HTTP client used for callback requests.
    client: Client,
    /// Receipt factory for deterministic delivery IDs.
    receipts: ReceiptFactory,
}

impl HttpSink {
    /// Builds an HTTP sink with a default client.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, SinkError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| SinkError::DeliveryFailed(err.to_string()))?;
        Ok(Self {
            client,
            receipts: ReceiptFactory::new("http"),
        })
    }

    /// Creates an HTTP sink with a preconfigured client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            receipts: ReceiptFactory::new("http"),
        }
    }
}

impl Sink for HttpSink {
    fn deliver(
        &self,
        route: &CallbackRoute,
        node_id: &NodeId,
        transport_node_id: &NodeId,
        event: &CallbackEvent,
    ) -> Result<DeliveryReceipt, SinkError> {
        let url = Url::parse(&route.url).map_err(|err| SinkError::InvalidUrl(err.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(SinkError::UnsupportedScheme(scheme.to_string())),
        }
        let body = serde_json::to_vec(event).map_err(|err| SinkError::Encode(err.to_string()))?;
        let response = self
            .client
            .post(url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|err| SinkError::DeliveryFailed(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SinkError::DeliveryFailed(format!(
                "callback status {}",
                response.status()
            )));
        }
        Ok(self.receipts.next(node_id, transport_node_id))
    }
}
