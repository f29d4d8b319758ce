// crates/idmesh-core/src/runtime/lifecycle.rs
// ============================================================================
// Module: idmesh Request Lifecycle Engine
// Description: The request/consent/data-exchange protocol state machine.
// Purpose: Govern request creation, consent collection, data collection, and closing.
// Dependencies: crate::core, crate::interfaces, crate::runtime::store, sha2
// ============================================================================

//! ## Overview
//! [`RequestEngine`] coordinates one RP, the resolved IdP set, and the
//! concerned AS nodes around a single request. Transitions follow
//! `pending -> confirmed -> completed -> closed`, with `timed_out` as a
//! parallel terminal reachable from any non-terminal state. Every
//! party-facing effect is emitted through the host-provided
//! [`CallbackDispatcher`] while the request mutex is held, which preserves
//! strict per-request callback ordering.
//!
//! Invariants:
//! - `closed` and `timed_out` are mutually exclusive; no transition is
//!   accepted after either is set.
//! - The token insufficiency check and the debit are atomic; concurrent
//!   creations cannot overdraw a balance.
//! - Timeout and settle sweeps are explicit host calls; the engine never
//!   reads wall-clock time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use sha2::Digest;
use sha2::Sha256;

use crate::core::block::LogicalChain;
use crate::core::callback::CallbackEvent;
use crate::core::callback::IncomingDataRequest;
use crate::core::directory::ServiceDirectory;
use crate::core::errors::ErrorDetail;
use crate::core::errors::PlatformError;
use crate::core::hashing::derive_request_salt;
use crate::core::hashing::derive_service_salt;
use crate::core::hashing::hash_request_message;
use crate::core::hashing::padded_message_hash;
use crate::core::identifiers::IdentityMode;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ReferenceId;
use crate::core::identifiers::RequestId;
use crate::core::identity::AccessorRecord;
use crate::core::identity::IdentityRegistry;
use crate::core::identity::decode_public_key;
use crate::core::identity::verify_accessor_signature;
use crate::core::party::NodeRole;
use crate::core::party::NodeTable;
use crate::core::proxy::ProxyBinding;
use crate::core::proxy::ProxyTable;
use crate::core::request::AddAccessorInput;
use crate::core::request::AsDataInput;
use crate::core::request::CloseRequestInput;
use crate::core::request::ConsentStatus;
use crate::core::request::CreateIdentityInput;
use crate::core::request::CreateRequestInput;
use crate::core::request::IdpResponseInput;
use crate::core::request::RequestRecord;
use crate::core::request::RequestSnapshot;
use crate::core::request::RequestStatus;
use crate::core::request::RequestTarget;
use crate::core::request::ResponseValidation;
use crate::core::request::ServiceProgress;
use crate::core::time::Timestamp;
use crate::core::token::TokenLedger;
use crate::interfaces::CallbackDispatcher;
use crate::runtime::store::InMemoryRequestStore;

// ============================================================================
// SECTION: Engine Configuration
// ============================================================================

/// Tunable engine parameters.
///
/// # Invariants
/// - `auto_close_delay_ms` is a tunable settle delay, never a protocol
///   constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Chain identifier embedded in block anchors.
    pub chain_id: String,
    /// Delay between completion and platform auto-close, in milliseconds.
    pub auto_close_delay_ms: i64,
    /// Namespaces reserved for platform-internal use.
    pub reserved_namespaces: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: "idmesh-local".to_string(),
            auto_close_delay_ms: 1_000,
            reserved_namespaces: vec!["requester".to_string()],
        }
    }
}

// ============================================================================
// SECTION: Request Engine
// ============================================================================

/// The request lifecycle state machine.
///
/// # Invariants
/// - All mutations and emissions for one request happen under that
///   request's mutex.
pub struct RequestEngine {
    /// Engine configuration.
    config: EngineConfig,
    /// Block anchor source.
    chain: LogicalChain,
    /// Request aggregates and the reference index.
    store: InMemoryRequestStore,
    /// Registered nodes.
    nodes: Arc<NodeTable>,
    /// Identity/accessor registry.
    identities: Arc<IdentityRegistry>,
    /// Service directory.
    directory: Arc<ServiceDirectory>,
    /// Proxy binding table shared with the broker.
    proxies: Arc<ProxyTable>,
    /// Token ledger.
    ledger: Arc<TokenLedger>,
    /// Callback dispatcher provided by the host.
    dispatcher: Arc<dyn CallbackDispatcher>,
    /// Monotonic counter folded into request identifiers.
    request_seq: AtomicU64,
}

impl std::fmt::Debug for RequestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEngine").field("config", &self.config).finish_non_exhaustive()
    }
}

impl RequestEngine {
    /// Creates an engine with fresh registries and the provided dispatcher.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        proxies: Arc<ProxyTable>,
        dispatcher: Arc<dyn CallbackDispatcher>,
    ) -> Self {
        let chain = LogicalChain::new(config.chain_id.clone());
        Self {
            config,
            chain,
            store: InMemoryRequestStore::new(),
            nodes: Arc::new(NodeTable::new()),
            identities: Arc::new(IdentityRegistry::new()),
            directory: Arc::new(ServiceDirectory::new()),
            proxies,
            ledger: Arc::new(TokenLedger::new()),
            dispatcher,
            request_seq: AtomicU64::new(0),
        }
    }

    /// Returns the node table.
    #[must_use]
    pub fn nodes(&self) -> &Arc<NodeTable> {
        &self.nodes
    }

    /// Returns the identity registry.
    #[must_use]
    pub fn identities(&self) -> &Arc<IdentityRegistry> {
        &self.identities
    }

    /// Returns the service directory.
    #[must_use]
    pub fn directory(&self) -> &Arc<ServiceDirectory> {
        &self.directory
    }

    /// Returns the token ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<TokenLedger> {
        &self.ledger
    }

    // ========================================================================
    // SECTION: Request Creation
    // ========================================================================

    /// Creates a request and fans out incoming-request events.
    ///
    /// Token insufficiency is discovered at ledger commit and reported
    /// asynchronously through a failed `create_request_result`; the
    /// synchronous result still carries the assigned request identifier.
    ///
    /// # Errors
    ///
    /// Returns validation and state-conflict errors synchronously, before
    /// any state change.
    pub fn create_request(
        &self,
        input: &CreateRequestInput,
        now: Timestamp,
    ) -> Result<RequestId, PlatformError> {
        self.nodes.require(&input.node_id, NodeRole::Rp)?;
        if input.request_message.is_empty() {
            return Err(PlatformError::MissingField("request_message".to_string()));
        }
        if input.initial_salt.is_empty() {
            return Err(PlatformError::MissingField("initial_salt".to_string()));
        }
        if input.request_timeout_ms <= 0 {
            return Err(PlatformError::MissingField("request_timeout".to_string()));
        }
        let idp_receivers = self.resolve_idp_receivers(input)?;
        let mut service_progress = std::collections::BTreeMap::new();
        for spec in &input.data_request_list {
            self.validate_data_request(input, spec)?;
            service_progress.insert(spec.service_id.clone(), ServiceProgress {
                service_id: spec.service_id.clone(),
                min_as: spec.min_as,
                signed_data_count: 0,
                received_data_count: 0,
            });
        }

        let request_id = self.next_request_id(&input.node_id, &input.reference_id);
        self.store.reserve_reference(&input.node_id, &input.reference_id, &request_id)?;

        if let Err(error) = self.ledger.debit_one(&input.node_id) {
            // Ledger-commit failure is an asynchronous business outcome:
            // exactly one terminal result callback, no retry.
            self.store.release_reference(&input.node_id, &input.reference_id);
            self.emit(&input.node_id, &CallbackEvent::CreateRequestResult {
                reference_id: input.reference_id.clone(),
                request_id: request_id.clone(),
                success: false,
                error: Some(ErrorDetail::from(&error)),
                creation_block_height: None,
            });
            return Ok(request_id);
        }

        let creation_block_height = self.chain.commit();
        let request_message_salt = derive_request_salt(&input.initial_salt, &request_id);
        let request_message_hash =
            hash_request_message(&input.request_message, &request_message_salt);
        let record = RequestRecord {
            request_id: request_id.clone(),
            requester: input.node_id.clone(),
            reference_id: input.reference_id.clone(),
            mode: input.mode,
            target: input.target.clone(),
            idp_receivers: idp_receivers.clone(),
            data_request_list: input.data_request_list.clone(),
            request_message: input.request_message.clone(),
            request_message_salt: request_message_salt.clone(),
            request_message_hash: request_message_hash.clone(),
            initial_salt: input.initial_salt.clone(),
            min_ial: input.min_ial,
            min_aal: input.min_aal,
            min_idp: input.min_idp,
            creation_time: now,
            deadline: now.plus_millis(input.request_timeout_ms),
            creation_block_height: creation_block_height.clone(),
            status: RequestStatus::Pending,
            closed: false,
            timed_out: false,
            responded_idps: std::collections::BTreeSet::new(),
            accept_count: 0,
            response_valid_list: Vec::new(),
            service_progress,
            data_senders: std::collections::BTreeMap::new(),
            data_fanout_done: false,
            settle_at: None,
        };
        self.store.insert(record);

        self.emit(&input.node_id, &CallbackEvent::CreateRequestResult {
            reference_id: input.reference_id.clone(),
            request_id: request_id.clone(),
            success: true,
            error: None,
            creation_block_height: Some(creation_block_height.clone()),
        });
        let (namespace, identifier) = match &input.target {
            RequestTarget::Subject { namespace, identifier } => {
                (Some(namespace.clone()), Some(identifier.clone()))
            }
            RequestTarget::IdpList { .. } => (None, None),
        };
        for idp_id in &idp_receivers {
            self.emit(idp_id, &CallbackEvent::IncomingRequest {
                request_id: request_id.clone(),
                requester_node_id: input.node_id.clone(),
                mode: input.mode,
                request_message_hash: request_message_hash.clone(),
                request_message_salt: request_message_salt.clone(),
                request_message: input.request_message.clone(),
                namespace: namespace.clone(),
                identifier: identifier.clone(),
                data_request_list: input
                    .data_request_list
                    .iter()
                    .map(|spec| IncomingDataRequest {
                        service_id: spec.service_id.clone(),
                        as_id_list: spec.as_id_list.clone(),
                        min_as: spec.min_as,
                    })
                    .collect(),
                min_ial: input.min_ial,
                min_aal: input.min_aal,
                request_timeout_ms: input.request_timeout_ms,
                creation_time: now,
                creation_block_height: creation_block_height.clone(),
            });
        }
        // The pending status is observable immediately after creation.
        let status_done = self.store.with_request(&request_id, |record| {
            self.evaluate_and_emit(record, now);
        });
        debug_assert!(status_done.is_some());
        Ok(request_id)
    }

    /// Resolves the IdP receiver set for a creation input.
    fn resolve_idp_receivers(
        &self,
        input: &CreateRequestInput,
    ) -> Result<std::collections::BTreeSet<NodeId>, PlatformError> {
        match &input.target {
            RequestTarget::Subject { namespace, identifier } => {
                if self.config.reserved_namespaces.iter().any(|reserved| reserved == namespace) {
                    return Err(PlatformError::ReservedNamespace(namespace.clone()));
                }
                self.identities.require_active_namespace(namespace)?;
                if input.mode.requires_accessor() {
                    if self.identities.get_subject(namespace, identifier).is_none() {
                        return Err(PlatformError::IdentityNotFound);
                    }
                    let receivers =
                        self.identities.idps_for_subject(namespace, identifier, input.mode);
                    if receivers.is_empty() {
                        return Err(PlatformError::IdpNotAssociated);
                    }
                    Ok(receivers)
                } else {
                    // Mode 1 has no accessor linkage; every active IdP is a
                    // potential receiver.
                    let receivers = self.nodes.active_by_role(NodeRole::Idp);
                    Ok(receivers.into_iter().collect())
                }
            }
            RequestTarget::IdpList { idp_id_list } => {
                if idp_id_list.is_empty() && input.min_idp > 0 {
                    return Err(PlatformError::MissingField("idp_id_list".to_string()));
                }
                let mut receivers = std::collections::BTreeSet::new();
                for idp_id in idp_id_list {
                    self.nodes.require(idp_id, NodeRole::Idp)?;
                    receivers.insert(idp_id.clone());
                }
                Ok(receivers)
            }
        }
    }

    /// Validates one service ask at creation time.
    fn validate_data_request(
        &self,
        input: &CreateRequestInput,
        spec: &crate::core::request::DataRequestSpec,
    ) -> Result<(), PlatformError> {
        let definition = self
            .directory
            .get_definition(&spec.service_id)
            .ok_or(PlatformError::ServiceNotFound)?;
        if !definition.active {
            return Err(PlatformError::ServiceNotFound);
        }
        if spec.as_id_list.is_empty() {
            if spec.min_as > 0 && self.directory.available_offerings(&spec.service_id)?.is_empty()
            {
                return Err(PlatformError::ServiceNotFound);
            }
            return Ok(());
        }
        for as_id in &spec.as_id_list {
            self.nodes.require(as_id, NodeRole::As)?;
            let offering = self
                .directory
                .get_offering(&spec.service_id, as_id)
                .ok_or(PlatformError::ServiceNotFound)?;
            if !offering.is_available() {
                return Err(PlatformError::ServiceNotFound);
            }
            if offering.min_ial > input.min_ial {
                return Err(PlatformError::IalExceedsNodeMax);
            }
        }
        Ok(())
    }

    // ========================================================================
    // SECTION: IdP Responses
    // ========================================================================

    /// Applies one IdP consent response.
    ///
    /// # Errors
    ///
    /// Returns validation and state-conflict errors synchronously; the
    /// response is applied atomically under the request mutex.
    pub fn respond(&self, input: &IdpResponseInput, now: Timestamp) -> Result<(), PlatformError> {
        let node = self.nodes.require(&input.node_id, NodeRole::Idp)?;
        let outcome = self.store.with_request(&input.request_id, |record| {
            self.check_open(record, now)?;
            if !record.idp_receivers.contains(&input.node_id) {
                return Err(PlatformError::IdpNotConcerned);
            }
            if record.responded_idps.contains(&input.node_id) {
                return Err(PlatformError::DuplicateResponse);
            }
            if input.ial > node.max_ial {
                return Err(PlatformError::IalExceedsNodeMax);
            }
            let validation = self.validate_response(record, input)?;

            record.responded_idps.insert(input.node_id.clone());
            if input.status == ConsentStatus::Accept {
                record.accept_count += 1;
            }
            record.response_valid_list.push(validation);
            if record.status == RequestStatus::Pending
                && !record.data_request_list.is_empty()
                && input.status == ConsentStatus::Accept
            {
                record.status = RequestStatus::Confirmed;
            }
            self.emit(&input.node_id, &CallbackEvent::ResponseResult {
                reference_id: input.reference_id.clone(),
                request_id: input.request_id.clone(),
                success: true,
                error: None,
            });
            self.evaluate_and_emit(record, now);
            Ok(())
        });
        outcome.ok_or(PlatformError::RequestNotFound)?
    }

    /// Validates signature and assurance levels for a consent response.
    fn validate_response(
        &self,
        record: &RequestRecord,
        input: &IdpResponseInput,
    ) -> Result<ResponseValidation, PlatformError> {
        let subject = match &record.target {
            RequestTarget::Subject { namespace, identifier } => {
                self.identities.get_subject(namespace, identifier)
            }
            RequestTarget::IdpList { .. } => None,
        };
        let valid_ial = subject.as_ref().map(|subject| input.ial >= subject.ial);
        if !record.mode.requires_accessor() {
            return Ok(ResponseValidation {
                idp_id: input.node_id.clone(),
                valid_signature: None,
                valid_ial,
            });
        }
        let accessor_id = input
            .accessor_id
            .as_ref()
            .ok_or_else(|| PlatformError::MissingField("accessor_id".to_string()))?;
        let signature = input
            .signature
            .as_ref()
            .ok_or_else(|| PlatformError::MissingField("signature".to_string()))?;
        let accessor = self
            .identities
            .find_accessor(accessor_id)
            .ok_or(PlatformError::IdpNotAssociated)?;
        if accessor.owner != input.node_id {
            return Err(PlatformError::IdpNotAssociated);
        }
        if let Some(subject) = &subject
            && !subject.accessors.contains_key(accessor_id)
        {
            return Err(PlatformError::IdpNotAssociated);
        }
        let key = decode_public_key(&accessor.public_key)?;
        let message = match record.mode {
            IdentityMode::Mode3 => {
                padded_message_hash(&record.request_message_hash).unwrap_or_default()
            }
            IdentityMode::Mode1 | IdentityMode::Mode2 => {
                record.request_message_hash.as_str().as_bytes().to_vec()
            }
        };
        let valid_signature = Some(verify_accessor_signature(&key, &message, signature));
        Ok(ResponseValidation {
            idp_id: input.node_id.clone(),
            valid_signature,
            valid_ial,
        })
    }

    /// Fans data-request events out to the concerned AS nodes.
    fn fan_out_data_requests(&self, record: &mut RequestRecord) {
        let subject_namespace = match &record.target {
            RequestTarget::Subject { namespace, .. } => Some(namespace.clone()),
            RequestTarget::IdpList { .. } => None,
        };
        for spec in &record.data_request_list {
            let receivers: Vec<NodeId> = if spec.as_id_list.is_empty() {
                self.directory
                    .available_offerings(&spec.service_id)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|offering| match (&offering.supported_namespace_list, &subject_namespace) {
                        (Some(supported), Some(namespace)) => supported.contains(namespace),
                        _ => true,
                    })
                    .map(|offering| offering.as_id)
                    .collect()
            } else {
                spec.as_id_list.clone()
            };
            let salt =
                derive_service_salt(&record.initial_salt, &record.request_id, &spec.service_id);
            for as_id in receivers {
                self.emit(&as_id, &CallbackEvent::DataRequest {
                    request_id: record.request_id.clone(),
                    service_id: spec.service_id.clone(),
                    requester_node_id: record.requester.clone(),
                    request_params: spec.request_params.clone(),
                    request_params_salt: salt.clone(),
                    answered_idp_count: record.answered_idp_count(),
                    deadline: record.deadline,
                });
            }
        }
        record.data_fanout_done = true;
    }

    // ========================================================================
    // SECTION: AS Data Responses
    // ========================================================================

    /// Applies one AS data submission.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::DataValidationFailed`] before any counter
    /// changes when the data does not conform to the declared schema, plus
    /// the usual state-conflict errors.
    pub fn send_data(&self, input: &AsDataInput, now: Timestamp) -> Result<(), PlatformError> {
        self.nodes.require(&input.node_id, NodeRole::As)?;
        let outcome = self.store.with_request(&input.request_id, |record| {
            self.check_open(record, now)?;
            let spec = record
                .data_request_list
                .iter()
                .find(|spec| spec.service_id == input.service_id)
                .cloned()
                .ok_or(PlatformError::ServiceNotFound)?;
            let concerned = if spec.as_id_list.is_empty() {
                self.directory
                    .get_offering(&input.service_id, &input.node_id)
                    .is_some_and(|offering| offering.is_available())
            } else {
                spec.as_id_list.contains(&input.node_id)
            };
            if !concerned {
                return Err(PlatformError::ServiceNotConcerned);
            }
            let senders = record.data_senders.entry(input.service_id.clone()).or_default();
            if senders.contains(&input.node_id) {
                return Err(PlatformError::DuplicateResponse);
            }
            // Schema validation happens before any counter changes.
            self.directory.validate_data(&input.service_id, &input.node_id, &input.data)?;
            senders.insert(input.node_id.clone());
            if let Some(progress) = record.service_progress.get_mut(&input.service_id) {
                progress.signed_data_count += 1;
                progress.received_data_count += 1;
            }
            self.emit(&input.node_id, &CallbackEvent::SendDataResult {
                reference_id: input.reference_id.clone(),
                request_id: input.request_id.clone(),
                success: true,
                error: None,
            });
            self.evaluate_and_emit(record, now);
            Ok(())
        });
        outcome.ok_or(PlatformError::RequestNotFound)?
    }

    // ========================================================================
    // SECTION: Closing, Timeout, and Settling
    // ========================================================================

    /// Closes a request explicitly on behalf of its requester.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::RequestClosed`] or
    /// [`PlatformError::RequestTimedOut`] when the request is already
    /// terminal, and [`PlatformError::RequestNotFound`] for unknown requests
    /// or a non-owner caller.
    pub fn close_request(
        &self,
        input: &CloseRequestInput,
        now: Timestamp,
    ) -> Result<(), PlatformError> {
        let outcome = self.store.with_request(&input.request_id, |record| {
            if record.requester != input.node_id {
                return Err(PlatformError::RequestNotFound);
            }
            self.check_open(record, now)?;
            record.closed = true;
            record.settle_at = None;
            self.store.release_reference(&record.requester, &record.reference_id);
            self.emit(&input.node_id, &CallbackEvent::CloseRequestResult {
                reference_id: input.reference_id.clone(),
                request_id: input.request_id.clone(),
                success: true,
                error: None,
            });
            self.emit_status(record);
            Ok(())
        });
        outcome.ok_or(PlatformError::RequestNotFound)?
    }

    /// Times out every request whose deadline elapsed. Returns the affected
    /// request identifiers.
    pub fn expire_due(&self, now: Timestamp) -> Vec<RequestId> {
        let due = self.store.due_for_timeout(now);
        let mut expired = Vec::new();
        for request_id in due {
            let applied = self.store.with_request(&request_id, |record| {
                if record.is_terminal() || !now.is_after(record.deadline) {
                    return false;
                }
                record.timed_out = true;
                record.settle_at = None;
                self.emit_status(record);
                true
            });
            if applied == Some(true) {
                expired.push(request_id);
            }
        }
        expired
    }

    /// Auto-closes every completed request whose settle delay elapsed.
    /// Returns the affected request identifiers.
    pub fn settle_due(&self, now: Timestamp) -> Vec<RequestId> {
        let due = self.store.due_for_settle(now);
        let mut settled = Vec::new();
        for request_id in due {
            let applied = self.store.with_request(&request_id, |record| {
                if record.is_terminal() || record.status != RequestStatus::Completed {
                    return false;
                }
                let due_now = record.settle_at.is_some_and(|at| !at.is_after(now));
                if !due_now {
                    return false;
                }
                record.closed = true;
                record.settle_at = None;
                self.store.release_reference(&record.requester, &record.reference_id);
                self.emit_status(record);
                true
            });
            if applied == Some(true) {
                settled.push(request_id);
            }
        }
        settled
    }

    // ========================================================================
    // SECTION: Identity Operations
    // ========================================================================

    /// Creates an identity and its auto-closed pseudo-request.
    ///
    /// # Errors
    ///
    /// Returns namespace, checksum, key, and duplicate-reference errors
    /// synchronously.
    pub fn create_identity(
        &self,
        input: &CreateIdentityInput,
        now: Timestamp,
    ) -> Result<RequestId, PlatformError> {
        self.nodes.require(&input.node_id, NodeRole::Idp)?;
        let request_id = self.next_request_id(&input.node_id, &input.reference_id);
        self.store.reserve_reference(&input.node_id, &input.reference_id, &request_id)?;
        let created = self.identities.create_identity(
            &input.namespace,
            &input.identifier,
            input.ial,
            input.lial,
            input.laal,
            input.mode,
            AccessorRecord {
                accessor_id: input.accessor.accessor_id.clone(),
                accessor_type: input.accessor.accessor_type.clone(),
                public_key: input.accessor.public_key.clone(),
                owner: input.node_id.clone(),
                mode: input.mode,
            },
        );
        // Pseudo-requests auto-close on success, so the reservation is
        // released either way.
        self.store.release_reference(&input.node_id, &input.reference_id);
        let reference_group_code = match created {
            Ok(code) => code,
            Err(error) => return Err(error),
        };
        self.insert_pseudo_request(input.node_id.clone(), &input.reference_id, input.mode, &request_id, now);
        self.emit(&input.node_id, &CallbackEvent::CreateIdentityResult {
            reference_id: input.reference_id.clone(),
            request_id: request_id.clone(),
            success: true,
            error: None,
            reference_group_code: Some(reference_group_code),
        });
        Ok(request_id)
    }

    /// Adds an accessor and its auto-closed pseudo-request.
    ///
    /// # Errors
    ///
    /// Returns subject, key, and duplicate-reference errors synchronously.
    pub fn add_accessor(
        &self,
        input: &AddAccessorInput,
        now: Timestamp,
    ) -> Result<RequestId, PlatformError> {
        self.nodes.require(&input.node_id, NodeRole::Idp)?;
        let request_id = self.next_request_id(&input.node_id, &input.reference_id);
        self.store.reserve_reference(&input.node_id, &input.reference_id, &request_id)?;
        let added = self.identities.add_accessor(
            &input.namespace,
            &input.identifier,
            input.mode,
            AccessorRecord {
                accessor_id: input.accessor.accessor_id.clone(),
                accessor_type: input.accessor.accessor_type.clone(),
                public_key: input.accessor.public_key.clone(),
                owner: input.node_id.clone(),
                mode: input.mode,
            },
        );
        self.store.release_reference(&input.node_id, &input.reference_id);
        let reference_group_code = match added {
            Ok(code) => code,
            Err(error) => return Err(error),
        };
        self.insert_pseudo_request(input.node_id.clone(), &input.reference_id, input.mode, &request_id, now);
        self.emit(&input.node_id, &CallbackEvent::AddAccessorResult {
            reference_id: input.reference_id.clone(),
            request_id: request_id.clone(),
            success: true,
            error: None,
            reference_group_code: Some(reference_group_code),
        });
        Ok(request_id)
    }

    // ========================================================================
    // SECTION: Proxy Administration
    // ========================================================================

    /// Associates a node with a proxy node.
    ///
    /// # Errors
    ///
    /// Returns proxy-association errors per the platform taxonomy.
    pub fn add_proxy_binding(&self, binding: ProxyBinding) -> Result<(), PlatformError> {
        self.check_proxy_binding(&binding)?;
        self.proxies.add(binding)
    }

    /// Updates an existing proxy association.
    ///
    /// # Errors
    ///
    /// Returns proxy-association errors per the platform taxonomy.
    pub fn update_proxy_binding(&self, binding: ProxyBinding) -> Result<(), PlatformError> {
        self.check_proxy_binding(&binding)?;
        self.proxies.update(binding)
    }

    /// Removes a proxy association.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NodeNotBehindProxy`] when no binding exists.
    pub fn remove_proxy_binding(&self, node_id: &NodeId) -> Result<(), PlatformError> {
        self.proxies.remove(node_id).map(|_| ())
    }

    /// Validates binding endpoints against the node table.
    fn check_proxy_binding(&self, binding: &ProxyBinding) -> Result<(), PlatformError> {
        let node = self
            .nodes
            .get(&binding.node_id)
            .ok_or_else(|| PlatformError::NodeNotFound(binding.node_id.to_string()))?;
        if node.role == NodeRole::Proxy {
            return Err(PlatformError::NodeIsProxy);
        }
        self.nodes
            .require(&binding.proxy_node_id, NodeRole::Proxy)
            .map_err(|_| PlatformError::ProxyNodeNotFound)?;
        Ok(())
    }

    // ========================================================================
    // SECTION: Queries
    // ========================================================================

    /// Returns a status snapshot for a request.
    #[must_use]
    pub fn get_request(&self, request_id: &RequestId) -> Option<RequestSnapshot> {
        let anchor = self.chain.current();
        self.store.with_request(request_id, |record| record.snapshot(anchor.clone()))
    }

    /// Returns the request reserved under a (node, reference) pair.
    ///
    /// Entries disappear once the request closes, so post-close lookups
    /// return `None`.
    #[must_use]
    pub fn request_id_by_reference(
        &self,
        node_id: &NodeId,
        reference_id: &ReferenceId,
    ) -> Option<RequestId> {
        self.store.request_id_by_reference(node_id, reference_id)
    }

    // ========================================================================
    // SECTION: Internal Helpers
    // ========================================================================

    /// Rejects operations on terminal requests, applying lazy timeout.
    fn check_open(&self, record: &mut RequestRecord, now: Timestamp) -> Result<(), PlatformError> {
        if record.closed {
            return Err(PlatformError::RequestClosed);
        }
        if record.timed_out {
            return Err(PlatformError::RequestTimedOut);
        }
        if now.is_after(record.deadline) {
            record.timed_out = true;
            record.settle_at = None;
            self.emit_status(record);
            return Err(PlatformError::RequestTimedOut);
        }
        Ok(())
    }

    /// Fans out due data requests, evaluates completion criteria, and emits
    /// one status update.
    ///
    /// Fan-out keys off the consent threshold alone: a request admitted with
    /// `min_idp = 0` reaches its concerned AS nodes at creation, not at the
    /// first consent.
    fn evaluate_and_emit(&self, record: &mut RequestRecord, now: Timestamp) {
        if !record.is_terminal()
            && record.accept_count >= record.min_idp
            && !record.data_fanout_done
            && !record.data_request_list.is_empty()
        {
            self.fan_out_data_requests(record);
        }
        if !record.is_terminal()
            && record.status != RequestStatus::Completed
            && record.completion_criteria_met()
        {
            record.status = RequestStatus::Completed;
            record.settle_at = Some(now.plus_millis(self.config.auto_close_delay_ms));
        }
        self.emit_status(record);
    }

    /// Emits a request-status callback to the requester.
    fn emit_status(&self, record: &RequestRecord) {
        let snapshot = record.snapshot(self.chain.commit());
        self.emit(&record.requester, &CallbackEvent::RequestStatus { snapshot });
    }

    /// Dispatches one event; delivery failures are terminal (at-most-once).
    fn emit(&self, node_id: &NodeId, event: &CallbackEvent) {
        let _receipt = self.dispatcher.dispatch(node_id, event);
    }

    /// Generates a unique request identifier.
    fn next_request_id(&self, node_id: &NodeId, reference_id: &ReferenceId) -> RequestId {
        let seq = self.request_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let mut hasher = Sha256::new();
        hasher.update(node_id.as_str().as_bytes());
        hasher.update(reference_id.as_str().as_bytes());
        hasher.update(seq.to_be_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        RequestId::new(hex)
    }

    /// Inserts the auto-closed pseudo-request spawned by identity operations.
    fn insert_pseudo_request(
        &self,
        requester: NodeId,
        reference_id: &ReferenceId,
        mode: IdentityMode,
        request_id: &RequestId,
        now: Timestamp,
    ) {
        let creation_block_height = self.chain.commit();
        let salt = derive_request_salt(reference_id.as_str(), request_id);
        let hash = hash_request_message("", &salt);
        self.store.insert(RequestRecord {
            request_id: request_id.clone(),
            requester,
            reference_id: reference_id.clone(),
            mode,
            target: RequestTarget::IdpList { idp_id_list: Vec::new() },
            idp_receivers: std::collections::BTreeSet::new(),
            data_request_list: Vec::new(),
            request_message: String::new(),
            request_message_salt: salt,
            request_message_hash: hash,
            initial_salt: reference_id.as_str().to_string(),
            min_ial: crate::core::identifiers::AssuranceLevel::from_tenths(0),
            min_aal: crate::core::identifiers::AssuranceLevel::from_tenths(0),
            min_idp: 0,
            creation_time: now,
            deadline: now,
            creation_block_height,
            status: RequestStatus::Completed,
            closed: true,
            timed_out: false,
            responded_idps: std::collections::BTreeSet::new(),
            accept_count: 0,
            response_valid_list: Vec::new(),
            service_progress: std::collections::BTreeMap::new(),
            data_senders: std::collections::BTreeMap::new(),
            data_fanout_done: false,
            settle_at: None,
        });
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
