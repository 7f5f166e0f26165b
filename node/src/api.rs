//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the hub over HTTP. All endpoints
//! share application state through axum's `State` extractor. Mutating
//! routes take the caller identity from the `x-caller` header; the node
//! does not authenticate it.
//!
//! ## Endpoints
//!
//! | Method | Path                             | Description                    |
//! |--------|----------------------------------|--------------------------------|
//! | GET    | `/health`                        | Liveness probe                 |
//! | GET    | `/status`                        | Deployment summary             |
//! | POST   | `/entries`                       | Submit an entry                |
//! | GET    | `/entries`                       | Entries in creation order      |
//! | GET    | `/entries/ids`                   | All entry ids                  |
//! | GET    | `/entries/:id`                   | One entry                      |
//! | POST   | `/entries/:id/votes`             | Vote on an entry               |
//! | GET    | `/entries/:id/votes/:voter`      | One identity's vote            |
//! | GET    | `/creators/:address/entries`     | Entry ids by creator           |
//! | GET    | `/pool`                          | Reward pool                    |
//! | GET    | `/accounts/:address`             | Token balance                  |
//! | GET    | `/allowances/:owner/:spender`    | Allowance                      |
//! | POST   | `/token/{mint,burn,burn-from,transfer,approve,transfer-from}` | Ledger operations |
//! | GET    | `/ws`                            | Live notification feed         |
//!
//! Amounts are JSON integers in the token's smallest unit.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use knowhub_contracts::knowledge_hub::{EntryId, HubError, KnowledgeEntry, VoteDirection};
use knowhub_contracts::token_ledger::LedgerError;
use knowhub_protocol::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PROTOCOL_VERSION};
use knowhub_protocol::Address;

use crate::service::{FeedEvent, HubService, ServiceError, VoteOutcome};

/// Header carrying the caller identity on mutating routes.
pub const CALLER_HEADER: &str = "x-caller";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The serialised hub.
    pub service: Arc<HubService>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/entries", post(submit_entry_handler).get(list_entries_handler))
        .route("/entries/ids", get(entry_ids_handler))
        .route("/entries/:id", get(entry_handler))
        .route("/entries/:id/votes", post(vote_handler))
        .route("/entries/:id/votes/:voter", get(vote_status_handler))
        .route("/creators/:address/entries", get(creator_entries_handler))
        .route("/pool", get(pool_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/allowances/:owner/:spender", get(allowance_handler))
        .route("/token/mint", post(mint_handler))
        .route("/token/burn", post(burn_handler))
        .route("/token/burn-from", post(burn_from_handler))
        .route("/token/transfer", post(transfer_handler))
        .route("/token/approve", post(approve_handler))
        .route("/token/transfer-from", post(transfer_from_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// A failure on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_input",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: message.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Hub(HubError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ServiceError::Hub(HubError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Hub(HubError::DuplicateVote { .. }) => StatusCode::CONFLICT,
            ServiceError::Hub(HubError::SelfVoteForbidden { .. }) => StatusCode::FORBIDDEN,
            ServiceError::Ledger(LedgerError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
            ServiceError::Ledger(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Deployment(_) | ServiceError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// The identity invoking a mutating route, read from [`CALLER_HEADER`].
#[derive(Debug, Clone)]
pub struct Caller(pub Address);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or_else(|| ApiError::bad_request(format!("missing {CALLER_HEADER} header")))?;
        let value = raw
            .to_str()
            .map_err(|_| ApiError::bad_request(format!("{CALLER_HEADER} is not valid text")))?;
        let address = Address::new(value)
            .map_err(|e| ApiError::bad_request(format!("invalid {CALLER_HEADER}: {e}")))?;
        Ok(Caller(address))
    }
}

/// Runs a committing service call on the blocking pool. Commits flush the
/// snapshot to disk while holding the service lock.
async fn commit<R, F>(state: &AppState, op: F) -> ApiResult<R>
where
    R: Send + 'static,
    F: FnOnce(&HubService) -> Result<R, ServiceError> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    let result = tokio::task::spawn_blocking(move || op(&service))
        .await
        .map_err(|e| ApiError::internal(format!("operation task failed: {e}")))?;
    Ok(result?)
}

fn parse_address(raw: &str) -> ApiResult<Address> {
    Address::new(raw).map_err(|e| ApiError::bad_request(format!("invalid address: {e}")))
}

fn parse_entry_id(raw: &str) -> ApiResult<EntryId> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid entry id: {raw:?}")))
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub protocol_version: String,
    /// Commits behind the served state.
    pub sequence: u64,
    pub hub: Address,
    pub entry_count: usize,
    pub pool_balance: u128,
    pub reward_per_upvote: u128,
    pub token: TokenInfo,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub owner: Address,
    pub total_supply: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitEntryRequest {
    pub title: String,
    pub content_ref: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryIdResponse {
    pub entry_id: EntryId,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryPage {
    pub entries: Vec<KnowledgeEntry>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryIdsResponse {
    pub entry_ids: Vec<EntryId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub is_upvote: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteStatusResponse {
    pub entry_id: EntryId,
    pub voter: Address,
    pub has_voted: bool,
    pub is_upvote: bool,
    pub direction: Option<VoteDirection>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolResponse {
    pub hub: Address,
    pub balance: u128,
    pub reward_per_upvote: u128,
    /// Upvotes the pool can still pay for.
    pub rewards_remaining: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    pub balance: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllowanceResponse {
    pub owner: Address,
    pub spender: Address,
    pub allowance: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MintRequest {
    pub to: Address,
    pub amount: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BurnRequest {
    pub amount: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BurnFromRequest {
    pub owner: Address,
    pub amount: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub to: Address,
    pub amount: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub spender: Address,
    pub amount: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferFromRequest {
    pub from: Address,
    pub to: Address,
    pub amount: u128,
}

// ---------------------------------------------------------------------------
// Handlers: node
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — deployment summary.
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let sequence = state.service.sequence();
    let resp = state.service.read(|d| StatusResponse {
        version: state.version.clone(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        sequence,
        hub: d.hub.address().clone(),
        entry_count: d.hub.get_entry_count(),
        pool_balance: d.pool_balance(),
        reward_per_upvote: d.hub.reward_amount(),
        token: TokenInfo {
            address: d.ledger.address().clone(),
            name: d.ledger.name().to_string(),
            symbol: d.ledger.symbol().to_string(),
            decimals: d.ledger.decimals(),
            owner: d.ledger.owner().clone(),
            total_supply: d.ledger.total_supply(),
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
    });
    Json(resp)
}

// ---------------------------------------------------------------------------
// Handlers: entries and votes
// ---------------------------------------------------------------------------

/// `POST /entries` — registers an entry for the caller.
async fn submit_entry_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<SubmitEntryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EntryIdResponse>)> {
    let Json(req) = payload?;
    let entry_id = commit(&state, move |service| {
        service.submit_entry(&caller, &req.title, &req.content_ref)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(EntryIdResponse { entry_id })))
}

/// `GET /entries?offset&limit` — a page of entries in creation order.
async fn list_entries_handler(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<EntryPage>> {
    let Query(params) = params?;
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    let page = state.service.read(|d| {
        let ids = d.hub.get_all_entry_ids();
        let entries = ids
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| d.hub.get_entry(*id).ok().cloned())
            .collect();
        EntryPage {
            entries,
            total: ids.len(),
            offset,
            limit,
        }
    });
    Ok(Json(page))
}

/// `GET /entries/ids` — every entry id in creation order.
async fn entry_ids_handler(State(state): State<AppState>) -> Json<EntryIdsResponse> {
    let entry_ids = state.service.read(|d| d.hub.get_all_entry_ids());
    Json(EntryIdsResponse { entry_ids })
}

/// `GET /entries/:id` — one entry, 404 if it does not exist.
async fn entry_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<KnowledgeEntry>> {
    let id = parse_entry_id(&id)?;
    let entry = state.service.read(|d| d.hub.get_entry(id).cloned())?;
    Ok(Json(entry))
}

/// `POST /entries/:id/votes` — casts the caller's vote.
async fn vote_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<Json<VoteOutcome>> {
    let id = parse_entry_id(&id)?;
    let Json(req) = payload?;
    let outcome = commit(&state, move |service| {
        service.vote_on_entry(&caller, id, req.is_upvote)
    })
    .await?;
    Ok(Json(outcome))
}

/// `GET /entries/:id/votes/:voter` — how `voter` voted, if at all.
async fn vote_status_handler(
    Path((id, voter)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResult<Json<VoteStatusResponse>> {
    let entry_id = parse_entry_id(&id)?;
    let voter = parse_address(&voter)?;
    let record = state
        .service
        .read(|d| d.hub.get_vote_status(entry_id, &voter));
    Ok(Json(VoteStatusResponse {
        entry_id,
        voter,
        has_voted: record.has_voted,
        is_upvote: record.is_upvote,
        direction: record.direction(),
    }))
}

/// `GET /creators/:address/entries` — ids submitted by `address`.
async fn creator_entries_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<EntryIdsResponse>> {
    let creator = parse_address(&address)?;
    let entry_ids = state
        .service
        .read(|d| d.hub.get_entries_by_creator(&creator));
    Ok(Json(EntryIdsResponse { entry_ids }))
}

// ---------------------------------------------------------------------------
// Handlers: ledger
// ---------------------------------------------------------------------------

/// `GET /pool` — the hub's reward pool.
async fn pool_handler(State(state): State<AppState>) -> Json<PoolResponse> {
    let resp = state.service.read(|d| {
        let balance = d.pool_balance();
        let reward = d.hub.reward_amount();
        PoolResponse {
            hub: d.hub.address().clone(),
            balance,
            reward_per_upvote: reward,
            rewards_remaining: balance / reward,
        }
    });
    Json(resp)
}

/// `GET /accounts/:address` — token balance; zero for unknown identities.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<AccountResponse>> {
    let address = parse_address(&address)?;
    let balance = state.service.read(|d| d.ledger.balance_of(&address));
    Ok(Json(AccountResponse { address, balance }))
}

/// `GET /allowances/:owner/:spender`
async fn allowance_handler(
    Path((owner, spender)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResult<Json<AllowanceResponse>> {
    let owner = parse_address(&owner)?;
    let spender = parse_address(&spender)?;
    let allowance = state.service.read(|d| d.ledger.allowance(&owner, &spender));
    Ok(Json(AllowanceResponse {
        owner,
        spender,
        allowance,
    }))
}

async fn mint_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<MintRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    commit(&state, move |service| service.mint(&caller, &req.to, req.amount)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn burn_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<BurnRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    commit(&state, move |service| service.burn(&caller, req.amount)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn burn_from_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<BurnFromRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    commit(&state, move |service| {
        service.burn_from(&caller, &req.owner, req.amount)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn transfer_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    commit(&state, move |service| service.transfer(&caller, &req.to, req.amount)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<ApproveRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    commit(&state, move |service| {
        service.approve(&caller, &req.spender, req.amount)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn transfer_from_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<TransferFromRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    commit(&state, move |service| {
        service.transfer_from(&caller, &req.from, &req.to, req.amount)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// WebSocket feed
// ---------------------------------------------------------------------------

/// `GET /ws` — WebSocket upgrade for the live notification feed.
///
/// Clients receive one JSON-encoded [`FeedEvent`]
/// per notification, in commit order. Client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.service.subscribe();
    ws.on_upgrade(move |socket| handle_ws_connection(socket, rx))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<FeedEvent>,
) {
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
