// system-tests/tests/suites/happy_path.rs
// ============================================================================
// Module: Happy Path Scenarios
// Description: Mode 1 consent-only request flow, end to end.
// Purpose: Validate the pending/completed/closed status sequence.
// Dependencies: idmesh-core, system-tests harness
// ============================================================================

//! Mode 1 happy-path coverage: one RP, one IdP, no data services.

use std::error::Error;

use idmesh_core::AssuranceLevel;
use idmesh_core::CallbackEvent;
use idmesh_core::ConsentStatus;
use idmesh_core::CreateRequestInput;
use idmesh_core::IdentityMode;
use idmesh_core::IdpResponseInput;
use idmesh_core::NodeId;
use idmesh_core::NodeRole;
use idmesh_core::ReferenceId;
use idmesh_core::RequestStatus;
use idmesh_core::RequestTarget;
use idmesh_core::derive_request_salt;
use idmesh_core::hash_request_message;
use system_tests::ScenarioPlatform;
use system_tests::at;

fn consent_request(reference: &str) -> CreateRequestInput {
    CreateRequestInput {
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
        initial_salt: "aGFwcHktcGF0aA==".to_string(),
    }
}

#[test]
fn mode_one_request_completes_and_settles() -> Result<(), Box<dyn Error>> {
    let platform = ScenarioPlatform::new()?;
    platform.register_node("rp1", NodeRole::Rp)?;
    platform.register_node("idp1", NodeRole::Idp)?;
    platform.engine().ledger().set_balance(&NodeId::new("rp1"), 5);

    let created = platform.expect(|node_id, event| {
        node_id == &NodeId::new("rp1")
            && matches!(event, CallbackEvent::CreateRequestResult { success: true, .. })
    });
    let input = consent_request("hp-1");
    let request_id = platform.engine().create_request(&input, at(1_000))?;
    platform.drain();
    let _result = created.try_take().ok_or("missing create_request_result")?;

    let accept = IdpResponseInput {
        node_id: NodeId::new("idp1"),
        reference_id: ReferenceId::new("hp-1-resp"),
        request_id: request_id.clone(),
        status: ConsentStatus::Accept,
        ial: AssuranceLevel::from_tenths(21),
        aal: AssuranceLevel::from_tenths(21),
        accessor_id: None,
        signature: None,
    };
    platform.engine().respond(&accept, at(2_000))?;
    platform.drain();

    // Not yet due: completion at 2_000 plus the 500ms settle delay.
    let (_, settled) = platform.sweep(at(2_400));
    assert!(settled.is_empty());
    let (_, settled) = platform.sweep(at(2_600));
    assert_eq!(settled, vec![request_id]);

    let statuses = platform.statuses_for("rp1");
    let observed: Vec<(RequestStatus, bool)> =
        statuses.iter().map(|snapshot| (snapshot.status, snapshot.closed)).collect();
    assert_eq!(observed, vec![
        (RequestStatus::Pending, false),
        (RequestStatus::Completed, false),
        (RequestStatus::Completed, true),
    ]);
    let last = statuses.last().ok_or("missing final status")?;
    assert_eq!(last.answered_idp_count, 1);
    assert!(!last.timed_out);
    Ok(())
}

#[test]
fn incoming_request_hash_is_recomputable_by_the_receiver() -> Result<(), Box<dyn Error>> {
    let platform = ScenarioPlatform::new()?;
    platform.register_node("rp1", NodeRole::Rp)?;
    platform.register_node("idp1", NodeRole::Idp)?;
    platform.engine().ledger().set_balance(&NodeId::new("rp1"), 5);

    let input = consent_request("hp-hash");
    let request_id = platform.engine().create_request(&input, at(1_000))?;
    platform.drain();

    let incoming = platform
        .events_for("idp1")
        .into_iter()
        .find_map(|event| match event {
            CallbackEvent::IncomingRequest {
                request_message,
                request_message_salt,
                request_message_hash,
                ..
            } => Some((request_message, request_message_salt, request_message_hash)),
            _ => None,
        })
        .ok_or("missing incoming_request")?;
    let (message, salt, hash) = incoming;

    // The receiver recomputes both the salt and the hash independently.
    assert_eq!(salt, derive_request_salt(&input.initial_salt, &request_id));
    assert_eq!(hash, hash_request_message(&message, &salt));
    Ok(())
}
