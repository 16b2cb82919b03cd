//! Solution endpoints: deployment application and reconciliation queue.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use meridian_core::bus::{topics, Event};
use meridian_core::model::{DeploymentSpec, JobAction, JobData, JobObjectType};

use super::{error_response, AppState};
use crate::error::ControlError;

/// Query parameters shared by the deployment endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DeploymentQuery {
    /// Namespace scope; empty means default.
    pub scope: Option<String>,
    /// `true` turns a reconcile into a removal.
    pub delete: Option<String>,
}

/// Query parameters for the queue endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct QueueQuery {
    /// Instance to queue or query.
    pub instance: Option<String>,
    /// Namespace scope; empty means default.
    pub scope: Option<String>,
    /// `true` queues a removal.
    pub delete: Option<String>,
    /// `true` addresses the target runtime instead of the instance.
    pub target: Option<String>,
}

/// POST `solution/instances`: apply a deployment.
pub async fn instances_post(
    State(state): State<AppState>,
    Query(query): Query<DeploymentQuery>,
    Json(deployment): Json<DeploymentSpec>,
) -> Response {
    let scope = query.scope.unwrap_or_default();
    info!(instance = %deployment.instance.name, "deployment apply requested");
    match state
        .reconciler
        .reconcile(deployment, false, &scope, &CancellationToken::new())
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET `solution/instances`: observed components for a deployment.
pub async fn instances_get(
    State(state): State<AppState>,
    Json(deployment): Json<DeploymentSpec>,
) -> Response {
    match state.reconciler.get(deployment).await {
        Ok((_, components)) => (StatusCode::OK, Json(components)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// DELETE `solution/instances`: remove a deployment.
pub async fn instances_delete(
    State(state): State<AppState>,
    Query(query): Query<DeploymentQuery>,
    Json(deployment): Json<DeploymentSpec>,
) -> Response {
    let scope = query.scope.unwrap_or_default();
    info!(instance = %deployment.instance.name, "deployment removal requested");
    match state
        .reconciler
        .reconcile(deployment, true, &scope, &CancellationToken::new())
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST `solution/reconcile`: reconcile a deployment, optionally removing.
pub async fn reconcile_post(
    State(state): State<AppState>,
    Query(query): Query<DeploymentQuery>,
    Json(deployment): Json<DeploymentSpec>,
) -> Response {
    let scope = query.scope.unwrap_or_default();
    let remove = query.delete.as_deref() == Some("true");
    match state
        .reconciler
        .reconcile(deployment, remove, &scope, &CancellationToken::new())
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET `solution/queue`: latest summary for an instance.
pub async fn queue_get(State(state): State<AppState>, Query(query): Query<QueueQuery>) -> Response {
    let scope = query.scope.unwrap_or_default();
    let Some(instance) = query.instance.filter(|i| !i.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"result": "400 - instance parameter is not found"})),
        )
            .into_response();
    };

    match state.reconciler.get_summary(&scope, &instance).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST `solution/queue`: queue a reconciliation job for an instance or its
/// target runtime.
pub async fn queue_post(State(state): State<AppState>, Query(query): Query<QueueQuery>) -> Response {
    let scope = query.scope.unwrap_or_default();
    let Some(instance) = query.instance.filter(|i| !i.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"result": "400 - instance parameter is not found"})),
        )
            .into_response();
    };

    let action = if query.delete.as_deref() == Some("true") {
        JobAction::Delete
    } else {
        JobAction::Update
    };
    let object_type = if query.target.as_deref() == Some("true") {
        JobObjectType::Target
    } else {
        JobObjectType::Instance
    };

    let job = JobData::new(&instance, action, object_type);
    let event = match Event::from_body(&job) {
        Ok(event) => event
            .with_metadata("objectType", object_type.as_str())
            .with_metadata("scope", scope),
        Err(e) => return error_response(&ControlError::Decode(e)),
    };
    state.bus.publish(topics::JOB, event).await;

    (
        StatusCode::OK,
        Json(json!({"result": "200 - instance reconciliation job accepted"})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt as _;
    use tower::ServiceExt;

    use meridian_core::model::{
        ComponentSpec, InstanceSpec, SolutionSpec, TargetSelector,
    };

    use super::super::router;
    use super::super::tests::make_app_state;
    use super::*;

    fn deployment_body() -> String {
        let deployment = DeploymentSpec {
            solution_name: "app".to_owned(),
            solution: SolutionSpec {
                components: vec![ComponentSpec {
                    name: "web".to_owned(),
                    component_type: "container".to_owned(),
                    ..ComponentSpec::default()
                }],
                ..SolutionSpec::default()
            },
            instance: InstanceSpec {
                name: "app-prod".to_owned(),
                solution: "app".to_owned(),
                target: TargetSelector {
                    name: Some("t1".to_owned()),
                    ..TargetSelector::default()
                },
                ..InstanceSpec::default()
            },
            generation: 1,
            ..DeploymentSpec::default()
        };
        serde_json::to_string(&deployment).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn apply_then_queue_summary() {
        let app = router(make_app_state());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/solution/instances")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(deployment_body()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let summary = body_json(response).await;
        assert_eq!(summary["succeeded"], 1);
        assert_eq!(summary["failed"], 0);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/solution/queue?instance=app-prod")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary = body_json(response).await;
        assert_eq!(summary["succeeded"], 1);
    }

    #[tokio::test]
    async fn reconcile_delete_removes() {
        let app = router(make_app_state());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/solution/reconcile")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(deployment_body()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/solution/reconcile?delete=true")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(deployment_body()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary = body_json(response).await;
        assert_eq!(summary["removal"], true);
    }

    #[tokio::test]
    async fn queue_summary_for_unknown_instance_is_not_found() {
        let app = router(make_app_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/solution/queue?instance=ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn queue_requires_instance_parameter() {
        let app = router(make_app_state());
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/solution/queue")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/solution/queue")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn queue_post_publishes_job_event() {
        let state = make_app_state();
        let jobs = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        {
            let jobs = std::sync::Arc::clone(&jobs);
            state
                .bus
                .subscribe_fn(topics::JOB, move |_, event| {
                    let jobs = std::sync::Arc::clone(&jobs);
                    async move {
                        let job: JobData = event.body_as()?;
                        let scope = event.metadata("scope").unwrap_or_default().to_owned();
                        jobs.lock().unwrap().push((scope, job));
                        Ok(())
                    }
                })
                .await;
        }

        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/solution/queue?instance=app-prod&scope=tenant-a&delete=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let jobs = jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        let (scope, job) = &jobs[0];
        assert_eq!(scope, "tenant-a");
        assert_eq!(job.id, "app-prod");
        assert_eq!(job.action, JobAction::Delete);
        assert_eq!(job.object_type, JobObjectType::Instance);
    }

    #[tokio::test]
    async fn invalid_deployment_is_bad_request() {
        let app = router(make_app_state());

        // Dependency cycle: a -> b -> a.
        let deployment = DeploymentSpec {
            solution: SolutionSpec {
                components: vec![
                    ComponentSpec {
                        name: "a".to_owned(),
                        component_type: "container".to_owned(),
                        dependencies: vec!["b".to_owned()],
                        ..ComponentSpec::default()
                    },
                    ComponentSpec {
                        name: "b".to_owned(),
                        component_type: "container".to_owned(),
                        dependencies: vec!["a".to_owned()],
                        ..ComponentSpec::default()
                    },
                ],
                ..SolutionSpec::default()
            },
            instance: InstanceSpec {
                name: "app-prod".to_owned(),
                target: TargetSelector {
                    name: Some("t1".to_owned()),
                    ..TargetSelector::default()
                },
                ..InstanceSpec::default()
            },
            ..DeploymentSpec::default()
        };

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/solution/reconcile")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_string(&deployment).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
