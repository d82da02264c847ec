use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use consensus::{AuthError, Block, BusinessKey};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::NodeError;
use crate::service::{ForgeOutcome, NodeService};
use crate::sync::{API_KEY_HEADER, Envelope, SyncError, URL_HEADER};
use crate::transaction::TransferRequest;

#[derive(Clone)]
pub struct ApiState {
    node: Arc<NodeService>,
}

pub async fn serve(node: Arc<NodeService>) -> Result<()> {
    let addr = node.config().api_addr;
    let app = node_router(node);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn node_router(node: Arc<NodeService>) -> Router {
    let state = ApiState { node };
    Router::new()
        .route("/backend/v1/nodes", get(node_list))
        .route("/backend/v1/nodes/register", post(register_node))
        .route("/backend/v1/blocks", get(ledger).post(push_ledger))
        .route("/backend/v1/blocks/demo", get(ledger_view))
        .route("/backend/v1/transactions", post(submit_transaction))
        .route("/backend/v1/transactions/validate", post(validate_transaction))
        .route("/backend/v1/bootstrap", post(bootstrap))
        .route("/backend/v1/sync", post(synchronize))
        .route("/backend/v1/metrics", get(metrics))
        .with_state(state)
}

fn respond<T: Serialize>(status: StatusCode, message: impl Into<String>, payload: T) -> Response {
    (
        status,
        Json(Envelope {
            message: message.into(),
            payload,
        }),
    )
        .into_response()
}

fn credentials(headers: &HeaderMap) -> (Option<&str>, Option<&str>) {
    let read = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    (read(API_KEY_HEADER), read(URL_HEADER))
}

/// Authorizes the caller and adds it to the registry.
fn admit(node: &NodeService, headers: &HeaderMap) -> Result<String, Response> {
    let (key, address) = credentials(headers);
    let requester = node.authorize(key, address).map_err(map_error)?;
    node.register_peer(&requester).map_err(map_error)?;
    Ok(requester)
}

async fn node_list(State(state): State<ApiState>, headers: HeaderMap) -> Result<Response, Response> {
    let (key, address) = credentials(&headers);
    let nodes = state.node.node_list(key, address).map_err(map_error)?;
    Ok(respond(StatusCode::OK, "Nodes retrieved", nodes))
}

async fn ledger(State(state): State<ApiState>, headers: HeaderMap) -> Result<Response, Response> {
    admit(&state.node, &headers)?;
    chain_response(&state.node)
}

/// Front-end ledger view; same pending rule as the peer read, no credentials.
async fn ledger_view(State(state): State<ApiState>) -> Result<Response, Response> {
    chain_response(&state.node)
}

fn chain_response(node: &NodeService) -> Result<Response, Response> {
    match node.extract_chain().map_err(map_error)? {
        Some(chain) => Ok(respond(StatusCode::OK, "Blockchain retrieved", chain)),
        None => Ok(respond(
            StatusCode::FORBIDDEN,
            "Pending transactions; ledger temporarily unavailable",
            Vec::<Block>::new(),
        )),
    }
}

async fn push_ledger(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(chain): Json<Vec<Block>>,
) -> Result<Response, Response> {
    let (key, address) = credentials(&headers);
    let requester = state.node.authorize(key, address).map_err(map_error)?;
    let offered = chain.len();
    if state.node.replace_chain(chain).await.map_err(map_error)? {
        info!(peer = %requester, height = offered, "adopted pushed chain");
        Ok(respond(StatusCode::CREATED, "Blockchain replaced", offered))
    } else {
        Ok(respond(
            StatusCode::CONFLICT,
            "Blockchain not replaced: not longer or not valid",
            offered,
        ))
    }
}

async fn submit_transaction(
    State(state): State<ApiState>,
    Json(request): Json<TransferRequest>,
) -> Result<Response, Response> {
    let outcome = state.node.submit_request(request).await.map_err(map_error)?;
    Ok(match outcome {
        ForgeOutcome::Committed { .. } => {
            respond(StatusCode::CREATED, "Transaction committed", outcome)
        }
        ForgeOutcome::Deferred { .. } => respond(
            StatusCode::ACCEPTED,
            "Peers unreachable; transaction queued for retry",
            outcome,
        ),
        ForgeOutcome::Rejected { .. } => {
            respond(StatusCode::CONFLICT, "Transaction already recorded", outcome)
        }
    })
}

async fn validate_transaction(
    State(state): State<ApiState>,
    Json(key): Json<BusinessKey>,
) -> Result<Response, Response> {
    if state.node.transaction_exists(&key).map_err(map_error)? {
        Ok(respond(StatusCode::CONFLICT, "Transaction already recorded", key))
    } else {
        Ok(respond(StatusCode::OK, "Transaction not yet recorded", key))
    }
}

async fn bootstrap(State(state): State<ApiState>) -> Result<Response, Response> {
    match state.node.bootstrap().await.map_err(map_error)? {
        Some(seed) => Ok(respond(StatusCode::CREATED, "Seed block created", seed)),
        None => Ok(respond(
            StatusCode::OK,
            "Node already initialized",
            Option::<Block>::None,
        )),
    }
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    address: String,
}

async fn register_node(
    State(state): State<ApiState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, Response> {
    state
        .node
        .register_peer(&request.address)
        .map_err(map_error)?;
    let nodes = state.node.peers().map_err(map_error)?;
    Ok(respond(StatusCode::CREATED, "Node registered", nodes))
}

async fn synchronize(State(state): State<ApiState>) -> Result<Response, Response> {
    match state.node.synchronize().await {
        Ok(report) => Ok(respond(StatusCode::OK, "Synchronized with peers", report)),
        Err(NodeError::Sync(err)) => {
            warn!(%err, "manual sync failed");
            let failures = match &err {
                SyncError::Unreachable(failures) => failures.clone(),
                SyncError::NoPeers | SyncError::EmptyLedger => Vec::new(),
            };
            Ok(respond(StatusCode::ACCEPTED, err.to_string(), failures))
        }
        Err(err) => Err(map_error(err)),
    }
}

async fn metrics(State(state): State<ApiState>) -> Json<Envelope<crate::service::NodeStatus>> {
    Json(Envelope {
        message: "Node status".to_string(),
        payload: state.node.status(),
    })
}

fn map_error(err: NodeError) -> Response {
    let (status, message) = match &err {
        NodeError::Auth(AuthError::MissingCredentials) => {
            (StatusCode::BAD_REQUEST, "Missing Api-Key or Url header".to_string())
        }
        NodeError::Auth(_) => (StatusCode::UNAUTHORIZED, "Unauthorized request".to_string()),
        NodeError::InvalidInput(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
        NodeError::Invalid(_) | NodeError::Consensus(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        NodeError::Sync(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        _ => {
            warn!(?err, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        }
    };
    respond(status, message, serde_json::Value::Null)
}
