// crates/idmesh-core/src/core/callback.rs
// ============================================================================
// Module: idmesh Callback Events
// Description: Tagged union of platform-originated callback payloads.
// Purpose: Replace string `type` switching with exhaustive matching.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every asynchronous effect the platform reports to a party is one of these
//! events, discriminated on the wire by the `type` field. Consumers match
//! exhaustively; adding a variant is a breaking change handled at compile
//! time rather than by silently ignored strings.
//!
//! Invariants:
//! - Each logical event is delivered at most once per receiver.
//! - `*_result` events with `success: false` are terminal for their
//!   operation; the platform never retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::block::BlockHeight;
use crate::core::errors::ErrorDetail;
use crate::core::hashing::HashDigest;
use crate::core::hashing::Salt;
use crate::core::identifiers::AccessorId;
use crate::core::identifiers::AssuranceLevel;
use crate::core::identifiers::IdentityMode;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ReferenceGroupCode;
use crate::core::identifiers::ReferenceId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::ServiceId;
use crate::core::request::RequestSnapshot;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Incoming Request Detail
// ============================================================================

/// Redacted service ask carried inside an incoming request.
///
/// # Invariants
/// - `request_params` plaintext is never included; only AS receivers get
///   parameters through their data request events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingDataRequest {
    /// Requested service.
    pub service_id: ServiceId,
    /// Explicit AS receiver list; empty means any offering AS.
    pub as_id_list: Vec<NodeId>,
    /// Minimum data responses required for completion.
    pub min_as: u32,
}

// ============================================================================
// SECTION: Callback Events
// ============================================================================

/// Platform-originated callback payload.
///
/// # Invariants
/// - The `type` tag is stable for wire compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallbackEvent {
    /// Result of a request creation, reported to the RP.
    CreateRequestResult {
        /// Client-assigned idempotency key.
        reference_id: ReferenceId,
        /// Assigned request identifier.
        request_id: RequestId,
        /// Whether creation committed.
        success: bool,
        /// Error detail when creation failed asynchronously.
        error: Option<ErrorDetail>,
        /// Block anchor of the creation commit.
        creation_block_height: Option<BlockHeight>,
    },
    /// Request status update, reported to the RP on every transition.
    RequestStatus {
        /// Consistent status snapshot.
        #[serde(flatten)]
        snapshot: RequestSnapshot,
    },
    /// New request distributed to a concerned IdP.
    IncomingRequest {
        /// Request identifier.
        request_id: RequestId,
        /// Requesting RP node.
        requester_node_id: NodeId,
        /// Protocol mode.
        mode: IdentityMode,
        /// Salted consent message hash.
        request_message_hash: HashDigest,
        /// Per-request message salt for independent recomputation.
        request_message_salt: Salt,
        /// Consent message shown to the subject.
        request_message: String,
        /// Subject namespace when the request targets a subject.
        namespace: Option<String>,
        /// Subject identifier when the request targets a subject.
        identifier: Option<String>,
        /// Redacted service asks.
        data_request_list: Vec<IncomingDataRequest>,
        /// Minimum identity assurance level.
        min_ial: AssuranceLevel,
        /// Minimum authentication assurance level.
        min_aal: AssuranceLevel,
        /// Request timeout in milliseconds from creation.
        request_timeout_ms: i64,
        /// Creation timestamp.
        creation_time: Timestamp,
        /// Block anchor of the creation commit.
        creation_block_height: BlockHeight,
    },
    /// Result of an IdP consent response, reported to the IdP.
    ResponseResult {
        /// Client-assigned idempotency key.
        reference_id: ReferenceId,
        /// Request identifier.
        request_id: RequestId,
        /// Whether the response was applied.
        success: bool,
        /// Error detail when the response failed asynchronously.
        error: Option<ErrorDetail>,
    },
    /// Data ask distributed to a concerned AS.
    DataRequest {
        /// Request identifier.
        request_id: RequestId,
        /// Requested service.
        service_id: ServiceId,
        /// Requesting RP node.
        requester_node_id: NodeId,
        /// Opaque request parameters for this service.
        request_params: Option<Value>,
        /// Per-(request, service) parameter salt.
        request_params_salt: Salt,
        /// Number of IdP consents collected when the ask was sent.
        answered_idp_count: u32,
        /// Hard deadline of the parent request.
        deadline: Timestamp,
    },
    /// Result of an AS data submission, reported to the AS.
    SendDataResult {
        /// Client-assigned idempotency key.
        reference_id: ReferenceId,
        /// Request identifier.
        request_id: RequestId,
        /// Whether the data was accepted.
        success: bool,
        /// Error detail when the submission failed asynchronously.
        error: Option<ErrorDetail>,
    },
    /// Result of an explicit close, reported to the RP.
    CloseRequestResult {
        /// Client-assigned idempotency key.
        reference_id: ReferenceId,
        /// Request identifier.
        request_id: RequestId,
        /// Whether the close committed.
        success: bool,
        /// Error detail when the close failed asynchronously.
        error: Option<ErrorDetail>,
    },
    /// Result of identity creation, reported to the IdP.
    CreateIdentityResult {
        /// Client-assigned idempotency key.
        reference_id: ReferenceId,
        /// Pseudo-request identifier.
        request_id: RequestId,
        /// Whether the identity was created.
        success: bool,
        /// Error detail when creation failed asynchronously.
        error: Option<ErrorDetail>,
        /// Stable subject reference group code.
        reference_group_code: Option<ReferenceGroupCode>,
    },
    /// Result of adding an accessor, reported to the IdP.
    AddAccessorResult {
        /// Client-assigned idempotency key.
        reference_id: ReferenceId,
        /// Pseudo-request identifier.
        request_id: RequestId,
        /// Whether the accessor was added.
        success: bool,
        /// Error detail when the operation failed asynchronously.
        error: Option<ErrorDetail>,
        /// Stable subject reference group code.
        reference_group_code: Option<ReferenceGroupCode>,
    },
    /// Synchronous signing challenge for a locally held accessor key.
    AccessorSign {
        /// Accessor whose key must sign.
        accessor_id: AccessorId,
        /// Base64 message bytes to sign.
        sign_message: String,
    },
}

impl CallbackEvent {
    /// Returns the reference identifier carried by result events.
    #[must_use]
    pub const fn reference_id(&self) -> Option<&ReferenceId> {
        match self {
            Self::CreateRequestResult { reference_id, .. }
            | Self::ResponseResult { reference_id, .. }
            | Self::SendDataResult { reference_id, .. }
            | Self::CloseRequestResult { reference_id, .. }
            | Self::CreateIdentityResult { reference_id, .. }
            | Self::AddAccessorResult { reference_id, .. } => Some(reference_id),
            Self::RequestStatus { .. }
            | Self::IncomingRequest { .. }
            | Self::DataRequest { .. }
            | Self::AccessorSign { .. } => None,
        }
    }

    /// Returns the request identifier carried by the event when present.
    #[must_use]
    pub const fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::CreateRequestResult { request_id, .. }
            | Self::ResponseResult { request_id, .. }
            | Self::SendDataResult { request_id, .. }
            | Self::CloseRequestResult { request_id, .. }
            | Self::CreateIdentityResult { request_id, .. }
            | Self::AddAccessorResult { request_id, .. }
            | Self::IncomingRequest { request_id, .. }
            | Self::DataRequest { request_id, .. } => Some(request_id),
            Self::RequestStatus { snapshot } => Some(&snapshot.request_id),
            Self::AccessorSign { .. } => None,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::PlatformError;

    #[test]
    fn result_events_tag_with_snake_case_type() {
        let event = CallbackEvent::CloseRequestResult {
            reference_id: ReferenceId::new("ref-1"),
            request_id: RequestId::new("req-1"),
            success: true,
            error: None,
        };
        let value = serde_json::to_value(&event).map_err(|err| err.to_string());
        let tag = value.ok().and_then(|value| value.get("type").cloned());
        assert_eq!(tag, Some(serde_json::Value::String("close_request_result".to_string())));
    }

    #[test]
    fn failed_results_carry_error_detail() {
        let error = PlatformError::InsufficientToken;
        let event = CallbackEvent::CreateRequestResult {
            reference_id: ReferenceId::new("ref-1"),
            request_id: RequestId::new("req-1"),
            success: false,
            error: Some(ErrorDetail::from(&error)),
            creation_block_height: None,
        };
        let matches_failure = matches!(
            &event,
            CallbackEvent::CreateRequestResult { success: false, error: Some(detail), .. }
                if detail.code == 25007
        );
        assert!(matches_failure, "expected a failed create_request_result with code 25007");
    }
}
