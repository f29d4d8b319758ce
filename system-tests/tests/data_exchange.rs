// system-tests/tests/data_exchange.rs
// ============================================================================
// Module: Data Exchange Suite
// Description: End-to-end data request flow with schema enforcement.
// Purpose: Validate AS data handling and progress monotonicity.
// Dependencies: idmesh-core, system-tests harness
// ============================================================================

//! ## Overview
//! Runs the full RP/IdP/AS data exchange in-process: service registration,
//! consent, data fan-out, schema rejection, and completion. Progress counters
//! reported through status callbacks must never decrease.

use std::collections::BTreeMap;
use std::error::Error;

use idmesh_core::AsDataInput;
use idmesh_core::AssuranceLevel;
use idmesh_core::CallbackEvent;
use idmesh_core::ConsentStatus;
use idmesh_core::CreateRequestInput;
use idmesh_core::DataRequestSpec;
use idmesh_core::IdentityMode;
use idmesh_core::IdpResponseInput;
use idmesh_core::NodeId;
use idmesh_core::NodeRole;
use idmesh_core::PlatformError;
use idmesh_core::ReferenceId;
use idmesh_core::RequestId;
use idmesh_core::RequestStatus;
use idmesh_core::RequestTarget;
use idmesh_core::ServiceDefinition;
use idmesh_core::ServiceId;
use idmesh_core::ServiceOffering;
use serde_json::json;
use system_tests::ScenarioPlatform;
use system_tests::at;

const SERVICE: &str = "bank_statement";

fn statement_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["statement"],
        "properties": {
            "statement": {"type": "string"}
        }
    })
}

fn exchange_platform() -> Result<ScenarioPlatform, Box<dyn Error>> {
    let platform = ScenarioPlatform::new()?;
    platform.register_node("rp1", NodeRole::Rp)?;
    platform.register_node("idp1", NodeRole::Idp)?;
    platform.register_node("as1", NodeRole::As)?;
    platform.engine().ledger().set_balance(&NodeId::new("rp1"), 5);

    let directory = platform.engine().directory();
    directory.define_service(ServiceDefinition {
        service_id: ServiceId::new(SERVICE),
        service_name: "Bank statement".to_string(),
        active: true,
        price_ceiling_by_currency: BTreeMap::new(),
    });
    directory.approve_service(&ServiceId::new(SERVICE), &NodeId::new("as1"))?;
    directory.add_or_update_service(ServiceOffering {
        service_id: ServiceId::new(SERVICE),
        as_id: NodeId::new("as1"),
        min_ial: AssuranceLevel::from_tenths(21),
        min_aal: AssuranceLevel::from_tenths(21),
        url: "http://as1.internal/service".to_string(),
        active: true,
        suspended: false,
        data_schema: Some(statement_schema()),
        data_schema_version: Some("1".to_string()),
        supported_namespace_list: None,
        price_schedule: None,
    })?;
    Ok(platform)
}

fn data_request(reference: &str) -> CreateRequestInput {
    CreateRequestInput {
        node_id: NodeId::new("rp1"),
        reference_id: ReferenceId::new(reference),
        mode: IdentityMode::Mode1,
        target: RequestTarget::IdpList {
            idp_id_list: vec![NodeId::new("idp1")],
        },
        data_request_list: vec![DataRequestSpec {
            service_id: ServiceId::new(SERVICE),
            as_id_list: vec![NodeId::new("as1")],
            min_as: 1,
            request_params: Some(json!({"months": 3})),
        }],
        request_message: "share your bank statement".to_string(),
        min_ial: AssuranceLevel::from_tenths(21),
        min_aal: AssuranceLevel::from_tenths(21),
        min_idp: 1,
        request_timeout_ms: 60_000,
        initial_salt: "ZGF0YS1leGNoYW5nZQ==".to_string(),
    }
}

fn accept(platform: &ScenarioPlatform, request_id: &RequestId) -> Result<(), Box<dyn Error>> {
    let input = IdpResponseInput {
        node_id: NodeId::new("idp1"),
        reference_id: ReferenceId::new("dx-resp"),
        request_id: request_id.clone(),
        status: ConsentStatus::Accept,
        ial: AssuranceLevel::from_tenths(21),
        aal: AssuranceLevel::from_tenths(21),
        accessor_id: None,
        signature: None,
    };
    platform.engine().respond(&input, at(2_000))?;
    platform.drain();
    Ok(())
}

fn submission(data: serde_json::Value) -> AsDataInput {
    AsDataInput {
        node_id: NodeId::new("as1"),
        reference_id: ReferenceId::new("dx-data"),
        request_id: RequestId::new("placeholder"),
        service_id: ServiceId::new(SERVICE),
        data,
        signature: None,
    }
}

#[test]
fn consent_fans_data_requests_out_to_the_concerned_as() -> Result<(), Box<dyn Error>> {
    let platform = exchange_platform()?;
    let request_id = platform.engine().create_request(&data_request("dx-fan"), at(1_000))?;
    platform.drain();
    assert!(platform.events_for("as1").is_empty());

    accept(&platform, &request_id)?;
    let fanned = platform.events_for("as1").into_iter().any(|event| {
        matches!(
            &event,
            CallbackEvent::DataRequest { request_id: id, service_id, .. }
                if id == &request_id && service_id == &ServiceId::new(SERVICE)
        )
    });
    assert!(fanned);
    Ok(())
}

#[test]
fn nonconforming_data_is_rejected_before_any_progress() -> Result<(), Box<dyn Error>> {
    let platform = exchange_platform()?;
    let request_id = platform.engine().create_request(&data_request("dx-schema"), at(1_000))?;
    platform.drain();
    accept(&platform, &request_id)?;

    let mut bad = submission(json!({"months": 3}));
    bad.request_id = request_id.clone();
    let rejected = platform.engine().send_data(&bad, at(3_000));
    let Err(err) = rejected else {
        return Err("schema violation must be rejected synchronously".into());
    };
    assert_eq!(err.code(), PlatformError::DataValidationFailed(String::new()).code());

    let snapshot = platform.engine().get_request(&request_id).ok_or("missing request")?;
    assert_eq!(snapshot.status, RequestStatus::Confirmed);
    let progress = snapshot.service_list.first().ok_or("missing service progress")?;
    assert_eq!(progress.received_data_count, 0);
    Ok(())
}

#[test]
fn conforming_data_completes_and_counters_stay_monotonic() -> Result<(), Box<dyn Error>> {
    let platform = exchange_platform()?;
    let request_id = platform.engine().create_request(&data_request("dx-done"), at(1_000))?;
    platform.drain();
    accept(&platform, &request_id)?;

    let mut good = submission(json!({"statement": "all good"}));
    good.request_id = request_id.clone();
    platform.engine().send_data(&good, at(3_000))?;
    platform.drain();
    let (_, settled) = platform.sweep(at(3_600));
    assert_eq!(settled, vec![request_id]);

    let statuses = platform.statuses_for("rp1");
    let observed: Vec<RequestStatus> =
        statuses.iter().map(|snapshot| snapshot.status).collect();
    assert_eq!(observed, vec![
        RequestStatus::Pending,
        RequestStatus::Confirmed,
        RequestStatus::Completed,
        RequestStatus::Completed,
    ]);
    // Received counts never decrease and the close latches exactly once.
    let mut last_count = 0;
    let mut close_transitions = 0;
    let mut was_closed = false;
    for snapshot in &statuses {
        let count = snapshot
            .service_list
            .first()
            .map_or(0, |progress| progress.received_data_count);
        assert!(count >= last_count);
        last_count = count;
        if snapshot.closed && !was_closed {
            close_transitions += 1;
            was_closed = true;
        }
        assert_eq!(snapshot.closed, was_closed);
    }
    assert_eq!(last_count, 1);
    assert_eq!(close_transitions, 1);
    Ok(())
}
