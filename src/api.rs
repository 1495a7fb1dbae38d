use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::rejection::JsonRejection,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::errors::UpstreamError;
use crate::jobs::JobStore;
use crate::translation::{FormatParams, JobOutcome, ResourceRef, TranslationOrchestrator};
use crate::upstream::{ApiGateway, ProxiedResponse};
use crate::webhook::{self, Disposition, WebhookNotification};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub orchestrator: TranslationOrchestrator,
    pub gateway: Arc<dyn ApiGateway>,
    pub jobs: Arc<JobStore>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub document_id: String,
    pub workspace_id: String,
    pub element_id: String,
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub distance_tolerance: Option<f64>,
    #[serde(default)]
    pub angular_tolerance: Option<f64>,
    #[serde(default)]
    pub maximum_chord_length: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentScopeQuery {
    pub document_id: String,
    pub workspace_id: String,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    BadRequest(String),
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

/// Relays an upstream reply verbatim: status, content type, body.
pub struct Proxied(pub ProxiedResponse);

impl IntoResponse for Proxied {
    fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.0.status);
        if let Some(content_type) = &self.0.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder
            .body(Body::from(self.0.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/translate", post(start_translation))
        .route("/api/translate/{tid}", get(get_translation))
        .route("/api/webhookEvents", post(receive_webhook_event))
        .route("/api/elements", get(list_elements))
        .route("/api/elements/{eid}/parts", get(list_element_parts))
        .route("/api/parts", get(list_parts))
        .route("/api/gltf/{did}/{wvm}/{wvmid}/{eid}", get(get_assembly_gltf))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

/// Kick off a glTF translation and proxy the upstream acceptance reply,
/// which carries the job id the client polls with.
async fn start_translation(
    State(state): State<SharedState>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Proxied, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let resource = ResourceRef {
        document_id: req.document_id,
        workspace_id: req.workspace_id,
        element_id: req.element_id,
        part_id: req.part_id,
    };
    let defaults = FormatParams::default();
    let params = FormatParams {
        resolution: req.resolution.unwrap_or(defaults.resolution),
        distance_tolerance: req.distance_tolerance.unwrap_or(defaults.distance_tolerance),
        angular_tolerance: req.angular_tolerance.unwrap_or(defaults.angular_tolerance),
        maximum_chord_length: req
            .maximum_chord_length
            .unwrap_or(defaults.maximum_chord_length),
    };
    let started = state.orchestrator.start_translation(&resource, &params).await?;
    Ok(Proxied(started.response))
}

/// Poll a translation job: 404 unknown, 202 still processing, 200 with the
/// translated asset (consuming the job), or 500 with the failure reason.
async fn get_translation(
    State(state): State<SharedState>,
    Path(tid): Path<String>,
) -> Result<Response, ApiError> {
    match state.orchestrator.job_result(&tid).await? {
        JobOutcome::NotFound => Ok(StatusCode::NOT_FOUND.into_response()),
        JobOutcome::InProgress => Ok(StatusCode::ACCEPTED.into_response()),
        JobOutcome::Ready(response) => Ok(Proxied(response).into_response()),
        JobOutcome::Failed { reason } => Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": reason})),
        )
            .into_response()),
    }
}

/// Inbound webhook notifications. Always acknowledged with 200 (so the
/// platform does not retry-storm us) except for truly malformed payloads.
async fn receive_webhook_event(
    State(state): State<SharedState>,
    payload: Result<Json<WebhookNotification>, JsonRejection>,
) -> Response {
    let Ok(Json(notification)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "malformed notification payload"})),
        )
            .into_response();
    };
    match webhook::apply_notification(&state.jobs, &notification).await {
        Disposition::RegistrationPing => (
            StatusCode::OK,
            Json(json!({"output": "Ready to receive webhook notifications"})),
        )
            .into_response(),
        Disposition::Malformed(reason) => {
            (StatusCode::BAD_REQUEST, Json(json!({"error": reason}))).into_response()
        }
        Disposition::Resolved(_) | Disposition::Ignored => StatusCode::OK.into_response(),
    }
}

async fn list_elements(
    State(state): State<SharedState>,
    Query(scope): Query<DocumentScopeQuery>,
) -> Result<Proxied, ApiError> {
    let path = format!(
        "documents/d/{}/w/{}/elements",
        scope.document_id, scope.workspace_id
    );
    Ok(Proxied(state.gateway.get(&path).await?))
}

async fn list_element_parts(
    State(state): State<SharedState>,
    Path(eid): Path<String>,
    Query(scope): Query<DocumentScopeQuery>,
) -> Result<Proxied, ApiError> {
    let path = format!(
        "parts/d/{}/w/{}/e/{}",
        scope.document_id, scope.workspace_id, eid
    );
    Ok(Proxied(state.gateway.get(&path).await?))
}

async fn list_parts(
    State(state): State<SharedState>,
    Query(scope): Query<DocumentScopeQuery>,
) -> Result<Proxied, ApiError> {
    let path = format!("parts/d/{}/w/{}", scope.document_id, scope.workspace_id);
    Ok(Proxied(state.gateway.get(&path).await?))
}

async fn get_assembly_gltf(
    State(state): State<SharedState>,
    Path((did, wvm, wvmid, eid)): Path<(String, String, String, String)>,
) -> Result<Proxied, ApiError> {
    let path = format!("assemblies/d/{did}/{wvm}/{wvmid}/e/{eid}/gltf");
    Ok(Proxied(state.gateway.get(&path).await?))
}
