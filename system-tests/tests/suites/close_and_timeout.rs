// system-tests/tests/suites/close_and_timeout.rs
// ============================================================================
// Module: Close and Timeout Scenarios
// Description: Explicit closes, duplicate references, and deadline expiry.
// Purpose: Validate terminal-state exclusivity and reference release.
// Dependencies: idmesh-core, system-tests harness
// ============================================================================

//! Terminal-state coverage: duplicate references, early closes, timeouts.

use std::error::Error;

use idmesh_core::AsDataInput;
use idmesh_core::AssuranceLevel;
use idmesh_core::CallbackEvent;
use idmesh_core::CloseRequestInput;
use idmesh_core::ConsentStatus;
use idmesh_core::CreateRequestInput;
use idmesh_core::IdentityMode;
use idmesh_core::IdpResponseInput;
use idmesh_core::NodeId;
use idmesh_core::NodeRole;
use idmesh_core::PlatformError;
use idmesh_core::ReferenceId;
use idmesh_core::RequestTarget;
use idmesh_core::ServiceId;
use serde_json::json;
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
        initial_salt: "Y2xvc2UtdGltZW91dA==".to_string(),
    }
}

fn consent_platform() -> Result<ScenarioPlatform, Box<dyn Error>> {
    let platform = ScenarioPlatform::new()?;
    platform.register_node("rp1", NodeRole::Rp)?;
    platform.register_node("idp1", NodeRole::Idp)?;
    platform.register_node("as1", NodeRole::As)?;
    platform.engine().ledger().set_balance(&NodeId::new("rp1"), 5);
    Ok(platform)
}

#[test]
fn duplicate_reference_yields_exactly_one_creation() -> Result<(), Box<dyn Error>> {
    let platform = consent_platform()?;
    platform.engine().create_request(&consent_request("dup-1"), at(1_000))?;
    let second = platform.engine().create_request(&consent_request("dup-1"), at(1_100));
    assert_eq!(second, Err(PlatformError::DuplicateReferenceId));
    // A different reference is admitted normally.
    platform.engine().create_request(&consent_request("dup-2"), at(1_200))?;
    Ok(())
}

#[test]
fn close_before_response_releases_the_reference() -> Result<(), Box<dyn Error>> {
    let platform = consent_platform()?;
    let request_id = platform.engine().create_request(&consent_request("cl-1"), at(1_000))?;

    let closed = platform.expect(|node_id, event| {
        node_id == &NodeId::new("rp1")
            && matches!(event, CallbackEvent::CloseRequestResult { success: true, .. })
    });
    let close = CloseRequestInput {
        node_id: NodeId::new("rp1"),
        reference_id: ReferenceId::new("cl-1-close"),
        request_id: request_id.clone(),
    };
    platform.engine().close_request(&close, at(1_100))?;
    platform.drain();
    let _result = closed.try_take().ok_or("missing close_request_result")?;

    // The reference lookup disappears with the close.
    let lookup = platform
        .engine()
        .request_id_by_reference(&NodeId::new("rp1"), &ReferenceId::new("cl-1"));
    assert_eq!(lookup, None);
    // Late consent hits the closed terminal state.
    let accept = IdpResponseInput {
        node_id: NodeId::new("idp1"),
        reference_id: ReferenceId::new("cl-1-resp"),
        request_id,
        status: ConsentStatus::Accept,
        ial: AssuranceLevel::from_tenths(21),
        aal: AssuranceLevel::from_tenths(21),
        accessor_id: None,
        signature: None,
    };
    let late = platform.engine().respond(&accept, at(1_200));
    assert_eq!(late, Err(PlatformError::RequestClosed));
    Ok(())
}

#[test]
fn timed_out_requests_accept_no_further_responses() -> Result<(), Box<dyn Error>> {
    let platform = consent_platform()?;
    let request_id = platform.engine().create_request(&consent_request("to-1"), at(1_000))?;

    let (expired, _) = platform.sweep(at(61_001));
    assert_eq!(expired, vec![request_id.clone()]);

    let accept = IdpResponseInput {
        node_id: NodeId::new("idp1"),
        reference_id: ReferenceId::new("to-1-resp"),
        request_id: request_id.clone(),
        status: ConsentStatus::Accept,
        ial: AssuranceLevel::from_tenths(21),
        aal: AssuranceLevel::from_tenths(21),
        accessor_id: None,
        signature: None,
    };
    let consent = platform.engine().respond(&accept, at(61_100));
    assert_eq!(consent, Err(PlatformError::RequestTimedOut));

    let data = AsDataInput {
        node_id: NodeId::new("as1"),
        reference_id: ReferenceId::new("to-1-data"),
        request_id,
        service_id: ServiceId::new("bank_statement"),
        data: json!({"statement": "ok"}),
        signature: None,
    };
    let submission = platform.engine().send_data(&data, at(61_200));
    assert_eq!(submission, Err(PlatformError::RequestTimedOut));
    Ok(())
}
