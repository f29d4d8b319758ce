// crates/idmesh-node/src/telemetry.rs
// ============================================================================
// Module: Node Telemetry
// Description: Observability hooks for the platform API surfaces.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for platform API counters and
//! latency histograms. It is intentionally dependency-light so deployments can
//! plug in Prometheus or OpenTelemetry without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for API request histograms.
pub const API_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Platform API operation classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ApiOperation {
    /// RP request creation.
    CreateRequest,
    /// RP explicit close.
    CloseRequest,
    /// IdP consent response.
    IdpResponse,
    /// AS data submission.
    AsData,
    /// IdP identity creation.
    CreateIdentity,
    /// IdP accessor registration.
    AddAccessor,
    /// NDID administrative operation.
    Admin,
    /// Status or utility read.
    Read,
}

impl ApiOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateRequest => "create_request",
            Self::CloseRequest => "close_request",
            Self::IdpResponse => "idp_response",
            Self::AsData => "as_data",
            Self::CreateIdentity => "create_identity",
            Self::AddAccessor => "add_accessor",
            Self::Admin => "admin",
            Self::Read => "read",
        }
    }
}

/// Platform API request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ApiOutcome {
    /// Request accepted or answered.
    Ok,
    /// Request rejected with a platform error.
    Error,
}

impl ApiOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Platform API metric event payload.
///
/// # Invariants
/// - `error_code` is `None` for successful requests.
#[derive(Debug, Clone)]
pub struct ApiMetricEvent {
    /// Operation classification.
    pub operation: ApiOperation,
    /// Request outcome.
    pub outcome: ApiOutcome,
    /// Numeric platform error code when present.
    pub error_code: Option<u32>,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for platform API requests and latencies.
pub trait PlatformMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: ApiMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: ApiMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl PlatformMetrics for NoopMetrics {
    fn record_request(&self, _event: ApiMetricEvent) {}

    fn record_latency(&self, _event: ApiMetricEvent, _latency: Duration) {}
}
