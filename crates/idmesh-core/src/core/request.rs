// crates/idmesh-core/src/core/request.rs
// ============================================================================
// Module: idmesh Request Model
// Description: Request aggregate, operation inputs, and progress records.
// Purpose: Capture the full request lifecycle state for replay and status callbacks.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The request is the central aggregate: created by an RP, answered by IdPs,
//! fed by AS nodes, and closed explicitly or by settling/timeout. All derived
//! state lives on [`RequestRecord`]; status callbacks carry immutable
//! [`RequestSnapshot`] views.
//!
//! Invariants:
//! - `closed` and `timed_out` are mutually exclusive terminal markers.
//! - `received_data_count <= signed_data_count` per service.
//! - Counters are monotonic; no transition is accepted after a terminal
//!   marker is set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::block::BlockHeight;
use crate::core::hashing::HashDigest;
use crate::core::hashing::Salt;
use crate::core::identifiers::AccessorId;
use crate::core::identifiers::AssuranceLevel;
use crate::core::identifiers::IdentityMode;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ReferenceId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::ServiceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Request Status
// ============================================================================

/// Request lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created and distributed; no consent collected yet.
    Pending,
    /// At least one valid consent received; data collection may be running.
    Confirmed,
    /// Completion criteria met for consents and data.
    Completed,
    /// Terminal failure reported through a result callback.
    ///
    /// Kept for wire compatibility with peer status payloads. The engine
    /// never produces it locally: a failed creation releases its reference
    /// reservation without persisting a record, so there is no aggregate
    /// left to carry the status.
    Errored,
}

/// IdP consent decision.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    /// Subject consented.
    Accept,
    /// Subject rejected.
    Reject,
}

// ============================================================================
// SECTION: Request Target
// ============================================================================

/// Receiver selection for a request.
///
/// # Invariants
/// - Subject targets are resolved through the identity registry; explicit
///   lists are validated against the node table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestTarget {
    /// Resolve IdPs holding accessors for a subject.
    Subject {
        /// Namespace of the subject identifier.
        namespace: String,
        /// Subject identifier within the namespace.
        identifier: String,
    },
    /// Explicit IdP receiver list.
    IdpList {
        /// IdP nodes to receive the request.
        idp_id_list: Vec<NodeId>,
    },
}

// ============================================================================
// SECTION: Data Request Specs
// ============================================================================

/// One service ask inside a request.
///
/// # Invariants
/// - An empty `as_id_list` means any AS offering the service may respond.
/// - `min_as = 0` marks the service's data as optional for completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequestSpec {
    /// Requested service.
    pub service_id: ServiceId,
    /// Explicit AS receiver list; empty means any offering AS.
    pub as_id_list: Vec<NodeId>,
    /// Minimum data responses required for completion.
    pub min_as: u32,
    /// Opaque request parameters forwarded to the AS.
    pub request_params: Option<Value>,
}

// ============================================================================
// SECTION: Operation Inputs
// ============================================================================

/// Input for request creation.
///
/// # Invariants
/// - `reference_id` is unique per node among in-flight requests.
/// - `initial_salt` seeds all derived salts for this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequestInput {
    /// Requesting RP node.
    pub node_id: NodeId,
    /// Client-assigned idempotency key.
    pub reference_id: ReferenceId,
    /// Protocol mode.
    pub mode: IdentityMode,
    /// Receiver selection.
    pub target: RequestTarget,
    /// Ordered service asks.
    pub data_request_list: Vec<DataRequestSpec>,
    /// Consent message shown to the subject.
    pub request_message: String,
    /// Minimum identity assurance level.
    pub min_ial: AssuranceLevel,
    /// Minimum authentication assurance level.
    pub min_aal: AssuranceLevel,
    /// Minimum number of accepting IdPs.
    pub min_idp: u32,
    /// Request timeout in milliseconds from creation.
    pub request_timeout_ms: i64,
    /// Entropy root for salt derivation.
    pub initial_salt: String,
}

/// Input for an IdP consent response.
///
/// # Invariants
/// - `accessor_id` and `signature` are required for modes 2 and 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpResponseInput {
    /// Responding IdP node.
    pub node_id: NodeId,
    /// Client-assigned idempotency key for this response.
    pub reference_id: ReferenceId,
    /// Request being answered.
    pub request_id: RequestId,
    /// Consent decision.
    pub status: ConsentStatus,
    /// Asserted identity assurance level.
    pub ial: AssuranceLevel,
    /// Asserted authentication assurance level.
    pub aal: AssuranceLevel,
    /// Accessor used to prove consent (modes 2 and 3).
    pub accessor_id: Option<AccessorId>,
    /// Base64 accessor signature over the (padded) message hash.
    pub signature: Option<String>,
}

/// Input for an AS data response.
///
/// # Invariants
/// - `data` must conform to the offering's declared schema when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsDataInput {
    /// Responding AS node.
    pub node_id: NodeId,
    /// Client-assigned idempotency key for this data response.
    pub reference_id: ReferenceId,
    /// Request being answered.
    pub request_id: RequestId,
    /// Service the data belongs to.
    pub service_id: ServiceId,
    /// Submitted data payload.
    pub data: Value,
    /// Optional base64 signature over the canonical data hash.
    pub signature: Option<String>,
}

/// Input for an explicit request close.
///
/// # Invariants
/// - Only the requester node may close its request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequestInput {
    /// Requesting RP node.
    pub node_id: NodeId,
    /// Client-assigned idempotency key for the close operation.
    pub reference_id: ReferenceId,
    /// Request to close.
    pub request_id: RequestId,
}

/// Accessor key material submitted with identity operations.
///
/// # Invariants
/// - `public_key` is standard base64; private keys stay with the IdP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessorInput {
    /// Accessor identifier.
    pub accessor_id: AccessorId,
    /// Accessor key type label.
    pub accessor_type: String,
    /// Base64-encoded public key.
    pub public_key: String,
}

/// Input for identity creation at an IdP.
///
/// # Invariants
/// - Spawns a pseudo-request observed as completed and closed with
///   `min_idp = 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIdentityInput {
    /// Registering IdP node.
    pub node_id: NodeId,
    /// Client-assigned idempotency key.
    pub reference_id: ReferenceId,
    /// Namespace of the subject identifier.
    pub namespace: String,
    /// Subject identifier within the namespace.
    pub identifier: String,
    /// Committed identity assurance level.
    pub ial: AssuranceLevel,
    /// Identity linkage assurance flag.
    pub lial: bool,
    /// Authentication linkage assurance flag.
    pub laal: bool,
    /// Protocol mode the identity is created under.
    pub mode: IdentityMode,
    /// First accessor for the subject.
    pub accessor: AccessorInput,
}

/// Input for adding an accessor to an existing subject.
///
/// # Invariants
/// - Spawns a pseudo-request observed as completed and closed with
///   `min_idp = 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAccessorInput {
    /// Registering IdP node.
    pub node_id: NodeId,
    /// Client-assigned idempotency key.
    pub reference_id: ReferenceId,
    /// Namespace of the subject identifier.
    pub namespace: String,
    /// Subject identifier within the namespace.
    pub identifier: String,
    /// Protocol mode the accessor is registered under.
    pub mode: IdentityMode,
    /// Accessor to add.
    pub accessor: AccessorInput,
}

// ============================================================================
// SECTION: Progress Records
// ============================================================================

/// Per-service data collection progress.
///
/// # Invariants
/// - `received_data_count <= signed_data_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProgress {
    /// Service identifier.
    pub service_id: ServiceId,
    /// Minimum data responses required for completion.
    pub min_as: u32,
    /// Data responses signed by AS nodes.
    pub signed_data_count: u32,
    /// Data responses received by the platform.
    pub received_data_count: u32,
}

/// Per-IdP response validation outcome.
///
/// # Invariants
/// - `valid_signature` is `None` for mode 1 responses (no accessor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseValidation {
    /// Responding IdP node.
    pub idp_id: NodeId,
    /// Signature validity against the accessor public key.
    pub valid_signature: Option<bool>,
    /// Whether the asserted IAL meets the subject's committed IAL.
    pub valid_ial: Option<bool>,
}

// ============================================================================
// SECTION: Request Record
// ============================================================================

/// Full request aggregate held by the engine.
///
/// # Invariants
/// - `responded_idps` grows monotonically; duplicates are rejected upstream.
/// - `deadline` is fixed at creation from `request_timeout_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Platform-assigned request identifier.
    pub request_id: RequestId,
    /// Requesting RP node.
    pub requester: NodeId,
    /// Client-assigned idempotency key.
    pub reference_id: ReferenceId,
    /// Protocol mode.
    pub mode: IdentityMode,
    /// Receiver selection as submitted.
    pub target: RequestTarget,
    /// Resolved IdP receiver set.
    pub idp_receivers: BTreeSet<NodeId>,
    /// Ordered service asks.
    pub data_request_list: Vec<DataRequestSpec>,
    /// Consent message shown to the subject.
    pub request_message: String,
    /// Derived per-request message salt.
    pub request_message_salt: Salt,
    /// Salted message hash shared with every IdP.
    pub request_message_hash: HashDigest,
    /// Entropy root for salt derivation.
    pub initial_salt: String,
    /// Minimum identity assurance level.
    pub min_ial: AssuranceLevel,
    /// Minimum authentication assurance level.
    pub min_aal: AssuranceLevel,
    /// Minimum number of accepting IdPs.
    pub min_idp: u32,
    /// Creation timestamp supplied by the host.
    pub creation_time: Timestamp,
    /// Hard deadline derived from the request timeout.
    pub deadline: Timestamp,
    /// Block anchor committed at creation.
    pub creation_block_height: BlockHeight,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Terminal closed marker.
    pub closed: bool,
    /// Terminal timeout marker.
    pub timed_out: bool,
    /// IdPs that already responded.
    pub responded_idps: BTreeSet<NodeId>,
    /// Number of accepting responses.
    pub accept_count: u32,
    /// Per-IdP validation outcomes in response order.
    pub response_valid_list: Vec<ResponseValidation>,
    /// Per-service data progress keyed by service.
    pub service_progress: BTreeMap<ServiceId, ServiceProgress>,
    /// AS nodes that already sent data, per service.
    pub data_senders: BTreeMap<ServiceId, BTreeSet<NodeId>>,
    /// Whether data requests have been fanned out to AS nodes.
    pub data_fanout_done: bool,
    /// Settle time after which the platform auto-closes a completed request.
    pub settle_at: Option<Timestamp>,
}

impl RequestRecord {
    /// Returns true when the request accepts no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.closed || self.timed_out
    }

    /// Returns the number of distinct responding IdPs.
    #[must_use]
    pub fn answered_idp_count(&self) -> u32 {
        u32::try_from(self.responded_idps.len()).unwrap_or(u32::MAX)
    }

    /// Returns true when consent and data completion criteria are met.
    #[must_use]
    pub fn completion_criteria_met(&self) -> bool {
        if self.accept_count < self.min_idp {
            return false;
        }
        self.service_progress
            .values()
            .all(|progress| progress.received_data_count >= progress.min_as)
    }

    /// Builds an immutable status snapshot with the provided anchor.
    #[must_use]
    pub fn snapshot(&self, block_height: BlockHeight) -> RequestSnapshot {
        RequestSnapshot {
            request_id: self.request_id.clone(),
            status: self.status,
            mode: self.mode,
            min_idp: self.min_idp,
            answered_idp_count: self.answered_idp_count(),
            closed: self.closed,
            timed_out: self.timed_out,
            service_list: self.service_progress.values().cloned().collect(),
            response_valid_list: self.response_valid_list.clone(),
            block_height,
        }
    }
}

// ============================================================================
// SECTION: Request Snapshot
// ============================================================================

/// Immutable request status view carried by status callbacks.
///
/// # Invariants
/// - Field values reflect one consistent point in the request's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    /// Request identifier.
    pub request_id: RequestId,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Protocol mode.
    pub mode: IdentityMode,
    /// Minimum number of accepting IdPs.
    pub min_idp: u32,
    /// Number of distinct responding IdPs.
    pub answered_idp_count: u32,
    /// Terminal closed marker.
    pub closed: bool,
    /// Terminal timeout marker.
    pub timed_out: bool,
    /// Per-service data progress.
    pub service_list: Vec<ServiceProgress>,
    /// Per-IdP validation outcomes.
    pub response_valid_list: Vec<ResponseValidation>,
    /// Block anchor for the observed state.
    pub block_height: BlockHeight,
}
