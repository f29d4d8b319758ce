// crates/idmesh-node/src/server.rs
// ============================================================================
// Module: Platform API Server
// Description: axum HTTP surface for RP, IdP, AS, and NDID operations.
// Purpose: Wire the request engine and callback broker behind one router.
// Dependencies: idmesh-core, idmesh-broker, idmesh-config, axum, tokio
// ============================================================================

//! ## Overview
//! The platform server exposes every party-facing operation over HTTP.
//! Accepted asynchronous operations return `202 Accepted` and report their
//! outcome through callbacks; synchronous registry administration returns
//! `200 OK`. Domain failures map to `400` with a `{error: {code, message}}`
//! body carrying the platform's numeric codes.
//!
//! Engine calls run on the blocking pool: callback delivery uses a blocking
//! HTTP client and must never run on the async executor threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use idmesh_broker::CallbackBroker;
use idmesh_broker::HttpSink;
use idmesh_broker::LogSink;
use idmesh_config::CallbackDelivery;
use idmesh_config::NodeConfig;
use idmesh_core::AddAccessorInput;
use idmesh_core::AsDataInput;
use idmesh_core::CallbackDispatcher;
use idmesh_core::CloseRequestInput;
use idmesh_core::CreateIdentityInput;
use idmesh_core::CreateRequestInput;
use idmesh_core::ErrorDetail;
use idmesh_core::IdpResponseInput;
use idmesh_core::NamespaceRecord;
use idmesh_core::NodeId;
use idmesh_core::NodeRecord;
use idmesh_core::PlatformError;
use idmesh_core::ProxyBinding;
use idmesh_core::ProxyTable;
use idmesh_core::ReferenceId;
use idmesh_core::RequestEngine;
use idmesh_core::RequestId;
use idmesh_core::ServiceDefinition;
use idmesh_core::ServiceId;
use idmesh_core::ServiceOffering;
use idmesh_core::Timestamp;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::telemetry::ApiMetricEvent;
use crate::telemetry::ApiOperation;
use crate::telemetry::ApiOutcome;
use crate::telemetry::NoopMetrics;
use crate::telemetry::PlatformMetrics;

// ============================================================================
// SECTION: Server Errors
// ============================================================================

/// Platform server construction and serving errors.
#[derive(Debug, Error)]
pub enum NodeServerError {
    /// Configuration rejected during server construction.
    #[error("server config error: {0}")]
    Config(String),
    /// Component initialization failure.
    #[error("server init error: {0}")]
    Init(String),
    /// Transport-level failure while serving.
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Platform Server
// ============================================================================

/// Platform API server instance.
pub struct PlatformServer {
    /// Node configuration.
    config: NodeConfig,
    /// Shared handler state.
    state: Arc<ServerState>,
}

/// Shared state for platform API handlers.
pub struct ServerState {
    /// Request lifecycle engine.
    pub engine: Arc<RequestEngine>,
    /// Callback broker the engine dispatches through.
    pub broker: Arc<CallbackBroker>,
    /// Metrics sink.
    pub metrics: Arc<dyn PlatformMetrics>,
}

impl PlatformServer {
    /// Builds a platform server from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NodeServerError`] when configuration is invalid or a
    /// component fails to initialize.
    pub fn from_config(config: NodeConfig) -> Result<Self, NodeServerError> {
        config.validate().map_err(|err| NodeServerError::Config(err.to_string()))?;
        let proxies = Arc::new(ProxyTable::new());
        let builder = CallbackBroker::builder().proxies(Arc::clone(&proxies));
        let broker = match config.callbacks.delivery {
            CallbackDelivery::Http => {
                let sink =
                    HttpSink::new().map_err(|err| NodeServerError::Init(err.to_string()))?;
                builder.sink(sink).build()
            }
            CallbackDelivery::Log => {
                let path = config.callbacks.log_path.clone().ok_or_else(|| {
                    NodeServerError::Config("log delivery requires callbacks.log_path".to_string())
                })?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|err| NodeServerError::Init(err.to_string()))?;
                builder.sink(LogSink::new(file)).build()
            }
        }
        .map_err(|err| NodeServerError::Init(err.to_string()))?;
        let broker = Arc::new(broker);
        for route in &config.routes {
            broker
                .register_route(&NodeId::new(route.node_id.clone()), route.url.clone())
                .map_err(|err| NodeServerError::Config(err.to_string()))?;
        }
        let dispatcher: Arc<dyn CallbackDispatcher> = Arc::<CallbackBroker>::clone(&broker);
        let engine =
            Arc::new(RequestEngine::new(config.platform.engine_config(), proxies, dispatcher));
        Ok(Self {
            config,
            state: Arc::new(ServerState {
                engine,
                broker,
                metrics: Arc::new(NoopMetrics),
            }),
        })
    }

    /// Returns the shared engine.
    #[must_use]
    pub fn engine(&self) -> Arc<RequestEngine> {
        Arc::clone(&self.state.engine)
    }

    /// Returns the shared callback broker.
    #[must_use]
    pub fn broker(&self) -> Arc<CallbackBroker> {
        Arc::clone(&self.state.broker)
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn PlatformMetrics>) -> Self {
        let state = Arc::new(ServerState {
            engine: Arc::clone(&self.state.engine),
            broker: Arc::clone(&self.state.broker),
            metrics,
        });
        self.state = state;
        self
    }

    /// Returns the platform API router.
    #[must_use]
    pub fn router(&self) -> Router {
        platform_router(Arc::clone(&self.state))
    }

    /// Serves the platform API on the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns [`NodeServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), NodeServerError> {
        let addr: SocketAddr = self
            .config
            .server
            .socket_addr()
            .map_err(|err| NodeServerError::Config(err.to_string()))?;
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| NodeServerError::Transport("platform api bind failed".to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|_| NodeServerError::Transport("platform api server failed".to_string()))
    }
}

/// Builds the platform API router over shared state.
#[must_use]
pub fn platform_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/rp/requests", post(create_request))
        .route("/rp/requests/close", post(close_request))
        .route("/idp/responses", post(idp_response))
        .route("/idp/identities", post(create_identity))
        .route("/idp/accessors", post(add_accessor))
        .route("/as/data", post(as_data))
        .route("/requests/{request_id}", get(get_request))
        .route(
            "/utility/nodes/{node_id}/references/{reference_id}",
            get(get_request_id_by_reference),
        )
        .route("/utility/nodes/{node_id}/tokens", get(get_tokens))
        .route("/ndid/nodes", post(register_node))
        .route("/ndid/namespaces", post(register_namespace))
        .route("/ndid/namespaces/active", post(set_namespace_active))
        .route("/ndid/services", post(define_service))
        .route("/ndid/services/active", post(set_service_active))
        .route("/ndid/services/approve", post(approve_service))
        .route("/ndid/services/offerings", post(upsert_offering))
        .route("/ndid/services/offerings/active", post(set_offering_active))
        .route("/ndid/tokens/set", post(set_tokens))
        .route("/ndid/tokens/add", post(add_tokens))
        .route("/ndid/proxies", post(add_proxy))
        .route("/ndid/proxies/update", post(update_proxy))
        .route("/ndid/proxies/remove", post(remove_proxy))
        .route("/ndid/routes", post(register_callback_route))
        .with_state(state)
}

// ============================================================================
// SECTION: Time Source
// ============================================================================

/// Returns the current wall-clock time in unix milliseconds.
#[must_use]
pub fn now_ms() -> Timestamp {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
    Timestamp::from_unix_millis(millis)
}

// ============================================================================
// SECTION: API Errors
// ============================================================================

/// Handler-level API failure.
#[derive(Debug)]
pub enum ApiError {
    /// Domain rejection with a platform error code.
    Platform(PlatformError),
    /// Blocking task failure.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Platform(err) => {
                let status = match err {
                    PlatformError::RequestNotFound => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, Json(json!({ "error": ErrorDetail::from(&err) }))).into_response()
            }
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": { "code": 10_500, "message": "internal failure" } })),
            )
                .into_response(),
        }
    }
}

/// Runs an engine call on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PlatformError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|_| ApiError::Internal)?
        .map_err(ApiError::Platform)
}

/// Records one API request observation.
fn record(state: &ServerState, operation: ApiOperation, started: Instant, error_code: Option<u32>) {
    let event = ApiMetricEvent {
        operation,
        outcome: if error_code.is_none() { ApiOutcome::Ok } else { ApiOutcome::Error },
        error_code,
    };
    state.metrics.record_request(event.clone());
    state.metrics.record_latency(event, started.elapsed());
}

/// Returns the numeric code for a handler result.
fn code_of<T>(result: &Result<T, ApiError>) -> Option<u32> {
    match result {
        Ok(_) => None,
        Err(ApiError::Platform(err)) => Some(err.code()),
        Err(ApiError::Internal) => Some(10_500),
    }
}

// ============================================================================
// SECTION: Party Handlers
// ============================================================================

/// Accepts an RP request creation.
async fn create_request(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<CreateRequestInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let started = Instant::now();
    let engine = Arc::clone(&state.engine);
    let result = run_blocking(move || engine.create_request(&input, now_ms())).await;
    record(&state, ApiOperation::CreateRequest, started, code_of(&result));
    let request_id = result?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "request_id": request_id }))))
}

/// Accepts an explicit RP close.
async fn close_request(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<CloseRequestInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let started = Instant::now();
    let engine = Arc::clone(&state.engine);
    let result = run_blocking(move || engine.close_request(&input, now_ms())).await;
    record(&state, ApiOperation::CloseRequest, started, code_of(&result));
    result?;
    Ok((StatusCode::ACCEPTED, Json(json!({}))))
}

/// Accepts an IdP consent response.
async fn idp_response(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<IdpResponseInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let started = Instant::now();
    let engine = Arc::clone(&state.engine);
    let result = run_blocking(move || engine.respond(&input, now_ms())).await;
    record(&state, ApiOperation::IdpResponse, started, code_of(&result));
    result?;
    Ok((StatusCode::ACCEPTED, Json(json!({}))))
}

/// Accepts an identity creation at an IdP.
async fn create_identity(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<CreateIdentityInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let started = Instant::now();
    let engine = Arc::clone(&state.engine);
    let result = run_blocking(move || engine.create_identity(&input, now_ms())).await;
    record(&state, ApiOperation::CreateIdentity, started, code_of(&result));
    let request_id = result?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "request_id": request_id }))))
}

/// Accepts an accessor registration at an IdP.
async fn add_accessor(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<AddAccessorInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let started = Instant::now();
    let engine = Arc::clone(&state.engine);
    let result = run_blocking(move || engine.add_accessor(&input, now_ms())).await;
    record(&state, ApiOperation::AddAccessor, started, code_of(&result));
    let request_id = result?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "request_id": request_id }))))
}

/// Accepts an AS data submission.
async fn as_data(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<AsDataInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let started = Instant::now();
    let engine = Arc::clone(&state.engine);
    let result = run_blocking(move || engine.send_data(&input, now_ms())).await;
    record(&state, ApiOperation::AsData, started, code_of(&result));
    result?;
    Ok((StatusCode::ACCEPTED, Json(json!({}))))
}

// ============================================================================
// SECTION: Read Handlers
// ============================================================================

/// Returns the current snapshot of a request.
async fn get_request(
    State(state): State<Arc<ServerState>>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .get_request(&RequestId::new(request_id))
        .ok_or(ApiError::Platform(PlatformError::RequestNotFound))
        .map(|snapshot| Json(json!(snapshot)));
    record(&state, ApiOperation::Read, started, code_of(&result));
    result
}

/// Returns the request reserved under a (node, reference) pair.
///
/// Reference entries are released when the request closes, so a post-close
/// lookup is indistinguishable from an unknown reference and maps to `404`.
async fn get_request_id_by_reference(
    State(state): State<Arc<ServerState>>,
    Path((node_id, reference_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .request_id_by_reference(&NodeId::new(node_id), &ReferenceId::new(reference_id))
        .ok_or(ApiError::Platform(PlatformError::RequestNotFound))
        .map(|request_id| Json(json!({ "request_id": request_id })));
    record(&state, ApiOperation::Read, started, code_of(&result));
    result
}

/// Returns a node's token balance.
async fn get_tokens(
    State(state): State<Arc<ServerState>>,
    Path(node_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .ledger()
        .balance(&NodeId::new(node_id))
        .map(|balance| Json(json!({ "balance": balance })))
        .map_err(ApiError::Platform);
    record(&state, ApiOperation::Read, started, code_of(&result));
    result
}

// ============================================================================
// SECTION: Admin Bodies
// ============================================================================

/// Body for namespace activation toggles.
#[derive(Debug, Deserialize)]
struct NamespaceActiveBody {
    /// Namespace name.
    name: String,
    /// Desired active flag.
    active: bool,
}

/// Body for service activation toggles.
#[derive(Debug, Deserialize)]
struct ServiceActiveBody {
    /// Service identifier.
    service_id: ServiceId,
    /// Desired active flag.
    active: bool,
}

/// Body for service approval grants.
#[derive(Debug, Deserialize)]
struct ApproveServiceBody {
    /// Service identifier.
    service_id: ServiceId,
    /// AS node being approved.
    as_id: NodeId,
}

/// Body for offering activation toggles.
#[derive(Debug, Deserialize)]
struct OfferingActiveBody {
    /// Service identifier.
    service_id: ServiceId,
    /// Offering AS node.
    as_id: NodeId,
    /// Desired active flag.
    active: bool,
}

/// Body for token balance administration.
#[derive(Debug, Deserialize)]
struct TokenBody {
    /// Target node.
    node_id: NodeId,
    /// Token amount.
    amount: u64,
}

/// Body for proxy binding removal.
#[derive(Debug, Deserialize)]
struct RemoveProxyBody {
    /// Node whose binding is removed.
    node_id: NodeId,
}

/// Body for callback route registration.
#[derive(Debug, Deserialize)]
struct CallbackRouteBody {
    /// Transport node the route belongs to.
    node_id: NodeId,
    /// Callback endpoint URL.
    url: String,
}

// ============================================================================
// SECTION: Admin Handlers
// ============================================================================

/// Registers or replaces a node record.
async fn register_node(
    State(state): State<Arc<ServerState>>,
    Json(record): Json<NodeRecord>,
) -> Json<Value> {
    let started = Instant::now();
    state.engine.nodes().register(record);
    record_admin(&state, started, None);
    Json(json!({}))
}

/// Registers a namespace.
async fn register_namespace(
    State(state): State<Arc<ServerState>>,
    Json(record): Json<NamespaceRecord>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .identities()
        .register_namespace(record)
        .map(|()| Json(json!({})))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Enables or disables a namespace.
async fn set_namespace_active(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<NamespaceActiveBody>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .identities()
        .set_namespace_active(&body.name, body.active)
        .map(|()| Json(json!({})))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Defines or replaces an NDID-level service.
async fn define_service(
    State(state): State<Arc<ServerState>>,
    Json(definition): Json<ServiceDefinition>,
) -> Json<Value> {
    let started = Instant::now();
    state.engine.directory().define_service(definition);
    record_admin(&state, started, None);
    Json(json!({}))
}

/// Enables or disables a service.
async fn set_service_active(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<ServiceActiveBody>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .directory()
        .set_service_active(&body.service_id, body.active)
        .map(|()| Json(json!({})))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Approves an AS to offer a service.
async fn approve_service(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<ApproveServiceBody>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .directory()
        .approve_service(&body.service_id, &body.as_id)
        .map(|()| Json(json!({})))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Adds or updates an AS service offering.
async fn upsert_offering(
    State(state): State<Arc<ServerState>>,
    Json(offering): Json<ServiceOffering>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .directory()
        .add_or_update_service(offering)
        .map(|()| Json(json!({})))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Enables or disables one AS offering.
async fn set_offering_active(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<OfferingActiveBody>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .directory()
        .set_offering_active(&body.service_id, &body.as_id, body.active)
        .map(|()| Json(json!({})))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Sets a node's token balance.
async fn set_tokens(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<TokenBody>,
) -> Json<Value> {
    let started = Instant::now();
    state.engine.ledger().set_balance(&body.node_id, body.amount);
    record_admin(&state, started, None);
    Json(json!({}))
}

/// Adds tokens to a node's balance.
async fn add_tokens(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<TokenBody>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .ledger()
        .add_tokens(&body.node_id, body.amount)
        .map(|balance| Json(json!({ "balance": balance })))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Adds a proxy binding.
async fn add_proxy(
    State(state): State<Arc<ServerState>>,
    Json(binding): Json<ProxyBinding>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .add_proxy_binding(binding)
        .map(|()| Json(json!({})))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Updates an existing proxy binding.
async fn update_proxy(
    State(state): State<Arc<ServerState>>,
    Json(binding): Json<ProxyBinding>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .update_proxy_binding(binding)
        .map(|()| Json(json!({})))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Removes a proxy binding.
async fn remove_proxy(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<RemoveProxyBody>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .engine
        .remove_proxy_binding(&body.node_id)
        .map(|()| Json(json!({})))
        .map_err(ApiError::Platform);
    record_admin(&state, started, code_of(&result));
    result
}

/// Registers or replaces a callback route.
async fn register_callback_route(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<CallbackRouteBody>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state
        .broker
        .register_route(&body.node_id, body.url)
        .map(|()| Json(json!({})))
        .map_err(|_| ApiError::Platform(PlatformError::MissingField("url".to_string())));
    record_admin(&state, started, code_of(&result));
    result
}

/// Records an admin operation observation.
fn record_admin(state: &ServerState, started: Instant, error_code: Option<u32>) {
    record(state, ApiOperation::Admin, started, error_code);
}

// ============================================================================
// SECTION: Tests
// ============================================================================
