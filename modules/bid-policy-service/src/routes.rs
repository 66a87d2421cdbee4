//! Axum route handlers for the bid policy RPC API.

use crate::error::ServiceError;
use crate::service::PolicyService;
use crate::validation::{self, Validate, Validated};
use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use bid_policy_types::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;

/// Header carrying the authenticated owner id.
pub const USER_ID_HEADER: &str = "x-user-id";

pub struct AppState {
    pub service: PolicyService,
    pub start_time: Instant,
}

type ApiResponse<T> = (StatusCode, Json<RpcResponse<T>>);

fn reject<T: Serialize>(status: StatusCode, msg: impl Into<String>) -> ApiResponse<T> {
    (status, Json(RpcResponse::err(msg)))
}

fn service_error<T: Serialize>(e: ServiceError) -> ApiResponse<T> {
    let status = match e {
        ServiceError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log::error!("[POLICY_DB] request failed: {}", e);
    reject(status, e.to_string())
}

// =====================================================
// Extractors
// =====================================================

/// Owner id taken from the `X-User-Id` header.
pub struct Owner(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiResponse<()>;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Owner(v.to_string()))
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "missing X-User-Id header"))
    }
}

/// JSON body that has been through the validation pipeline.
pub struct ValidatedJson<T>(pub Validated<T>);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiResponse<()>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state).await.map_err(|e| {
            log::debug!("[VALIDATION] undecodable body: {}", e);
            reject(StatusCode::BAD_REQUEST, "invalid request body")
        })?;

        validation::validate(body)
            .map(ValidatedJson)
            .map_err(|e| reject(StatusCode::BAD_REQUEST, e.to_string()))
    }
}

// =====================================================
// Handlers
// =====================================================

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/policies", get(list_policies).post(create_policy))
        .route(
            "/policies/:id",
            get(get_policy).put(update_policy).delete(delete_policy),
        )
        .with_state(state)
}

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> ApiResponse<ServiceStatus> {
    let components = state.service.health().await;
    let healthy = components.values().all(ComponentHealth::is_healthy);
    let status = ServiceStatus {
        running: true,
        uptime_secs: state.start_time.elapsed().as_secs(),
        components,
    };

    if healthy {
        (StatusCode::OK, Json(RpcResponse::ok(status)))
    } else {
        let body = RpcResponse {
            success: false,
            data: Some(status),
            error: Some("one or more components unhealthy".to_string()),
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

// GET /policies?marketplace=XX
pub async fn list_policies(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Query(q): Query<ListPoliciesQuery>,
) -> ApiResponse<Vec<Policy>> {
    let marketplace = q.marketplace.as_deref().filter(|m| !m.trim().is_empty());
    match state.service.list_policies(&owner, marketplace).await {
        Ok(p) => (StatusCode::OK, Json(RpcResponse::ok(p))),
        Err(e) => service_error(e),
    }
}

// POST /policies
pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    ValidatedJson(req): ValidatedJson<CreatePolicyRequest>,
) -> ApiResponse<Policy> {
    let Validated { body, rules } = req;
    let policy = Policy {
        id: String::new(),
        user_id: owner.clone(),
        marketplace: body.marketplace,
        name: body.name,
        policy_type: body.policy_type,
        rules,
    };
    match state.service.create_policy(&owner, policy).await {
        Ok(p) => (StatusCode::CREATED, Json(RpcResponse::ok(p))),
        Err(e) => service_error(e),
    }
}

// GET /policies/:id
pub async fn get_policy(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ApiResponse<Policy> {
    match state.service.get_policy(&owner, &id).await {
        Ok(Some(p)) => (StatusCode::OK, Json(RpcResponse::ok(p))),
        Ok(None) => reject(StatusCode::NOT_FOUND, "policy not found"),
        Err(e) => service_error(e),
    }
}

// PUT /policies/:id
pub async fn update_policy(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdatePolicyRequest>,
) -> ApiResponse<Policy> {
    let Validated { body, rules } = req;
    match state.service.update_policy(&owner, &id, body.name, rules).await {
        Ok(Some(p)) => (StatusCode::OK, Json(RpcResponse::ok(p))),
        Ok(None) => reject(StatusCode::NOT_FOUND, "policy not found"),
        Err(e) => service_error(e),
    }
}

// DELETE /policies/:id
pub async fn delete_policy(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ApiResponse<bool> {
    match state.service.delete_policy(&owner, &id).await {
        Ok(true) => (StatusCode::OK, Json(RpcResponse::ok(true))),
        Ok(false) => reject(StatusCode::NOT_FOUND, "policy not found"),
        Err(e) => service_error(e),
    }
}
