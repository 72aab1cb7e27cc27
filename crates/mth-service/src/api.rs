//! HTTP API for the claim service.
//!
//! Callers arrive pre-authenticated: the session provider terminates
//! auth upstream and forwards the caller id in the `x-caller-id` header.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use mth_claims::ClaimError;
use mth_core::ClaimStatus;

use crate::service::{ClaimService, ClaimView, ServiceError, SubmitClaimRequest};

/// Header carrying the session provider's caller identity.
pub const CALLER_HEADER: &str = "x-caller-id";

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub claim_id: Uuid,
    pub status: ClaimStatus,
}

#[derive(Serialize)]
pub struct DecisionResponse {
    pub claim_id: Uuid,
    pub status: ClaimStatus,
}

#[derive(Serialize)]
pub struct ClaimsResponse {
    pub claims: Vec<ClaimView>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

/// Error wrapper that renders as a JSON error body.
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                code,
                correlation_id: None,
            },
        }
    }

    fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            format!("missing {} header", CALLER_HEADER),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let correlation_id = err.correlation_id();
        let (status, code) = match err.domain() {
            None => (StatusCode::FORBIDDEN, "forbidden"),
            Some(ClaimError::Validation(_)) | Some(ClaimError::Core(_)) => {
                (StatusCode::BAD_REQUEST, "validation")
            }
            Some(ClaimError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            Some(ClaimError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            Some(ClaimError::StaleState { .. }) => (StatusCode::CONFLICT, "stale_state"),
            Some(ClaimError::EvaluatorUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "evaluator_unavailable")
            }
            Some(ClaimError::Storage(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
        };
        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                code,
                correlation_id: Some(correlation_id),
            },
        }
    }
}

fn caller_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(ApiError::unauthenticated)
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_submit(
    State(service): State<Arc<ClaimService>>,
    headers: HeaderMap,
    Json(request): Json<SubmitClaimRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let caller = caller_id(&headers)?;
    let view = service.submit_claim(request, &caller).await?;
    Ok(Json(SubmitResponse {
        claim_id: view.id,
        status: view.status,
    }))
}

async fn handle_approve(
    State(service): State<Arc<ClaimService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let caller = caller_id(&headers)?;
    let view = service.approve(id, &caller).await?;
    Ok(Json(DecisionResponse {
        claim_id: view.id,
        status: view.status,
    }))
}

async fn handle_reject(
    State(service): State<Arc<ClaimService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let caller = caller_id(&headers)?;
    let view = service.reject(id, &caller).await?;
    Ok(Json(DecisionResponse {
        claim_id: view.id,
        status: view.status,
    }))
}

async fn handle_reevaluate(
    State(service): State<Arc<ClaimService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ClaimView>, ApiError> {
    let caller = caller_id(&headers)?;
    let view = service.reevaluate(id, &caller).await?;
    Ok(Json(view))
}

async fn handle_get_claim(
    State(service): State<Arc<ClaimService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ClaimView>, ApiError> {
    let caller = caller_id(&headers)?;
    let view = service.get_claim(id, &caller).await?;
    Ok(Json(view))
}

async fn handle_my_claims(
    State(service): State<Arc<ClaimService>>,
    headers: HeaderMap,
) -> Result<Json<ClaimsResponse>, ApiError> {
    let caller = caller_id(&headers)?;
    let claims = service.list_my_claims(&caller).await?;
    let count = claims.len();
    Ok(Json(ClaimsResponse { claims, count }))
}

async fn handle_pending(
    State(service): State<Arc<ClaimService>>,
    headers: HeaderMap,
) -> Result<Json<ClaimsResponse>, ApiError> {
    let caller = caller_id(&headers)?;
    let claims = service.list_pending_for_approver(&caller).await?;
    let count = claims.len();
    Ok(Json(ClaimsResponse { claims, count }))
}

// --- Server ---

pub fn build_router(service: Arc<ClaimService>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/claims", post(handle_submit))
        .route("/api/v1/claims/mine", get(handle_my_claims))
        .route("/api/v1/claims/pending", get(handle_pending))
        .route("/api/v1/claims/{id}", get(handle_get_claim))
        .route("/api/v1/claims/{id}/approve", post(handle_approve))
        .route("/api/v1/claims/{id}/reject", post(handle_reject))
        .route("/api/v1/claims/{id}/reevaluate", post(handle_reevaluate))
        .with_state(service)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    service: Arc<ClaimService>,
) -> anyhow::Result<()> {
    let app = build_router(service);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "claim API server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("received shutdown signal");
        })
        .await?;
    Ok(())
}
