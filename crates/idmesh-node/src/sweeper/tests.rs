// crates/idmesh-node/src/sweeper/tests.rs
// ============================================================================
// Module: Sweeper Unit Tests
// Description: Unit tests for timeout and settle sweeps.
// Purpose: Validate deadline handling against an in-memory engine.
// Dependencies: idmesh-node
// ============================================================================

//! ## Overview
//! Drives [`Sweeper::sweep_at`] with explicit timestamps: pending requests
//! past their deadline time out, completed requests settle into closure after
//! the auto-close delay, and neither sweep touches open requests early.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use idmesh_broker::CallbackBroker;
use idmesh_broker::LogSink;
use idmesh_core::AssuranceLevel;
use idmesh_core::CallbackDispatcher;
use idmesh_core::ConsentStatus;
use idmesh_core::CreateRequestInput;
use idmesh_core::EngineConfig;
use idmesh_core::IdentityMode;
use idmesh_core::IdpResponseInput;
use idmesh_core::NodeId;
use idmesh_core::NodeRecord;
use idmesh_core::NodeRole;
use idmesh_core::ProxyTable;
use idmesh_core::ReferenceId;
use idmesh_core::RequestStatus;
use idmesh_core::RequestTarget;

use super::*;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn test_engine() -> Arc<RequestEngine> {
    let proxies = Arc::new(ProxyTable::new());
    let broker = CallbackBroker::builder()
        .sink(LogSink::new(std::io::sink()))
        .proxies(Arc::clone(&proxies))
        .build()
        .expect("broker builds with a sink");
    let dispatcher: Arc<dyn CallbackDispatcher> = Arc::new(broker);
    let config = EngineConfig {
        chain_id: "test-chain".to_string(),
        auto_close_delay_ms: 500,
        reserved_namespaces: vec!["requester".to_string()],
    };
    let engine = Arc::new(RequestEngine::new(config, proxies, dispatcher));
    for (id, role) in [("rp1", NodeRole::Rp), ("idp1", NodeRole::Idp)] {
        engine.nodes().register(NodeRecord {
            node_id: NodeId::new(id),
            role,
            max_ial: AssuranceLevel::from_tenths(30),
            max_aal: AssuranceLevel::from_tenths(30),
            active: true,
        });
    }
    engine.ledger().set_balance(&NodeId::new("rp1"), 10);
    engine
}

fn create_request(engine: &RequestEngine, reference: &str, now: Timestamp) -> RequestId {
    let input = CreateRequestInput {
        node_id: NodeId::new("rp1"),
        reference_id: ReferenceId::new(reference),
        mode: IdentityMode::Mode1,
        target: RequestTarget::IdpList {
            idp_id_list: vec![NodeId::new("idp1")],
        },
        data_request_list: Vec::new(),
        request_message: "please confirm login".to_string(),
        min_ial: AssuranceLevel::from_tenths(21),
        min_aal: AssuranceLevel::from_tenths(21),
        min_idp: 1,
        request_timeout_ms: 60_000,
        initial_salt: "dGVzdC1zYWx0".to_string(),
    };
    engine.create_request(&input, now).expect("request creation succeeds")
}

fn accept(engine: &RequestEngine, request_id: &RequestId, now: Timestamp) {
    let input = IdpResponseInput {
        node_id: NodeId::new("idp1"),
        reference_id: ReferenceId::new("resp-1"),
        request_id: request_id.clone(),
        status: ConsentStatus::Accept,
        ial: AssuranceLevel::from_tenths(21),
        aal: AssuranceLevel::from_tenths(21),
        accessor_id: None,
        signature: None,
    };
    engine.respond(&input, now).expect("consent response succeeds");
}

// ============================================================================
// SECTION: Sweep Tests
// ============================================================================

#[test]
fn pending_requests_time_out_past_their_deadline() {
    let engine = test_engine();
    let sweeper = Sweeper::new(Arc::clone(&engine), 250);
    let request_id = create_request(&engine, "ref-timeout", Timestamp::from_unix_millis(1_000));

    let (expired, settled) = sweeper.sweep_at(Timestamp::from_unix_millis(30_000));
    assert!(expired.is_empty());
    assert!(settled.is_empty());

    let (expired, settled) = sweeper.sweep_at(Timestamp::from_unix_millis(61_001));
    assert_eq!(expired, vec![request_id.clone()]);
    assert!(settled.is_empty());
    let snapshot = engine.get_request(&request_id).expect("request exists");
    assert!(snapshot.timed_out);
    assert!(!snapshot.closed);
}

#[test]
fn completed_requests_settle_after_the_auto_close_delay() {
    let engine = test_engine();
    let sweeper = Sweeper::new(Arc::clone(&engine), 250);
    let request_id = create_request(&engine, "ref-settle", Timestamp::from_unix_millis(1_000));
    accept(&engine, &request_id, Timestamp::from_unix_millis(2_000));

    let snapshot = engine.get_request(&request_id).expect("request exists");
    assert_eq!(snapshot.status, RequestStatus::Completed);

    // Before the delay elapses, the request stays open.
    let (expired, settled) = sweeper.sweep_at(Timestamp::from_unix_millis(2_400));
    assert!(expired.is_empty());
    assert!(settled.is_empty());

    let (expired, settled) = sweeper.sweep_at(Timestamp::from_unix_millis(2_600));
    assert!(expired.is_empty());
    assert_eq!(settled, vec![request_id.clone()]);
    let snapshot = engine.get_request(&request_id).expect("request exists");
    assert!(snapshot.closed);
    assert!(!snapshot.timed_out);
}

#[test]
fn sweeps_are_idempotent_on_terminal_requests() {
    let engine = test_engine();
    let sweeper = Sweeper::new(Arc::clone(&engine), 250);
    let request_id = create_request(&engine, "ref-repeat", Timestamp::from_unix_millis(1_000));

    let (expired, _) = sweeper.sweep_at(Timestamp::from_unix_millis(61_001));
    assert_eq!(expired, vec![request_id]);
    let (expired, settled) = sweeper.sweep_at(Timestamp::from_unix_millis(120_000));
    assert!(expired.is_empty());
    assert!(settled.is_empty());
}
