//! HTTP API for the federation control service.
//!
//! Provides endpoints for:
//! - Site registry management and federation sync (`/federation/*`)
//! - Deployment reconciliation (`/solution/*`)
//! - Health and readiness checks

mod federation;
mod solution;

use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use meridian_core::bus::EventBus;

use crate::error::{ControlError, ControlResult};
use crate::managers::{CatalogsManager, SitesManager};
use crate::reconcile::Reconciler;
use crate::staging::StagingManager;

pub use federation::RegistryQuery;
pub use solution::QueueQuery;

/// Shared application state for the control service.
#[derive(Clone)]
pub struct AppState {
    /// Sites registry.
    pub sites: Arc<SitesManager>,
    /// Catalogs registry.
    pub catalogs: Arc<CatalogsManager>,
    /// Per-site staging queues.
    pub staging: Arc<StagingManager>,
    /// Reconciliation engine.
    pub reconciler: Arc<Reconciler>,
    /// Process-wide event bus.
    pub bus: Arc<EventBus>,
    /// Name of this site, used as the sync package origin.
    pub site_id: String,
}

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Federation
        .route(
            "/federation/registry",
            get(federation::registry_get)
                .post(federation::registry_post)
                .delete(federation::registry_delete),
        )
        .route(
            "/federation/sync",
            get(federation::sync_get).post(federation::sync_post),
        )
        // Reserved routes answer with the canonical 405 body.
        .route("/federation/graph", get(method_not_allowed))
        .route("/federation/trail", post(method_not_allowed))
        // Solution
        .route(
            "/solution/instances",
            get(solution::instances_get)
                .post(solution::instances_post)
                .delete(solution::instances_delete),
        )
        .route("/solution/reconcile", post(solution::reconcile_post))
        .route(
            "/solution/queue",
            get(solution::queue_get).post(solution::queue_post),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

/// Readiness check endpoint: the registry must be reachable.
async fn readiness_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> (StatusCode, Json<Value>) {
    match state.sites.list_specs().await {
        Ok(sites) => (
            StatusCode::OK,
            Json(json!({"ready": true, "sites": sites.len()})),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"ready": false, "sites": 0})),
        ),
    }
}

pub(crate) async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"result": "405 - method not allowed"})),
    )
        .into_response()
}

/// Map a control error to its HTTP status.
pub(crate) const fn error_to_status(error: &ControlError) -> StatusCode {
    match error {
        ControlError::NotFound(_) => StatusCode::NOT_FOUND,
        ControlError::Conflict(_) => StatusCode::CONFLICT,
        ControlError::BadRequest(_) | ControlError::InvalidSpec(_) | ControlError::Decode(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error body shape shared by every endpoint.
pub(crate) fn error_response(error: &ControlError) -> Response {
    (
        error_to_status(error),
        Json(json!({"error": error.to_string()})),
    )
        .into_response()
}

/// Shape a response value: optional dot-path projection, JSON by default,
/// YAML when `doc-type=yaml` (served as `application/text`).
pub(crate) fn format_object(
    value: Value,
    path: Option<&str>,
    doc_type: Option<&str>,
) -> ControlResult<Response> {
    let value = match path {
        Some(path) if !path.is_empty() => project_path(&value, path),
        _ => value,
    };

    match doc_type {
        Some("yaml") => {
            let body = serde_yaml::to_string(&value)
                .map_err(|e| ControlError::internal(e.to_string()))?;
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/text")],
                body,
            )
                .into_response())
        }
        _ => Ok((StatusCode::OK, Json(value)).into_response()),
    }
}

fn project_path(value: &Value, path: &str) -> Value {
    let lookup = |item: &Value| {
        path.split('.')
            .try_fold(item.clone(), |current, segment| {
                current.get(segment).cloned()
            })
            .unwrap_or(Value::Null)
    };
    match value {
        Value::Array(items) => Value::Array(items.iter().map(lookup).collect()),
        other => lookup(other),
    }
}
