//! Federation endpoints: site registry and sync.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use meridian_core::bus::{topics, Event};
use meridian_core::model::{ActivationStatus, JobAction, SiteSpec, SyncPackage};

use super::{error_response, format_object, AppState};
use crate::error::ControlError;

/// Query parameters for the registry endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RegistryQuery {
    /// Site name; absent means the whole registry.
    pub name: Option<String>,
    /// Dot-path projection applied to the response body.
    pub path: Option<String>,
    /// `yaml` flips the response to YAML with `application/text`.
    #[serde(rename = "doc-type")]
    pub doc_type: Option<String>,
}

/// Query parameters for the sync endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    /// Site pulling its batch.
    pub site: Option<String>,
    /// Dot-path projection applied to the response body.
    pub path: Option<String>,
    /// `yaml` flips the response to YAML with `application/text`.
    #[serde(rename = "doc-type")]
    pub doc_type: Option<String>,
}

/// GET `federation/registry`: one site by name, or all sites.
pub async fn registry_get(
    State(state): State<AppState>,
    Query(query): Query<RegistryQuery>,
) -> Response {
    let value = match &query.name {
        Some(name) => state
            .sites
            .get_spec(name)
            .await
            .and_then(|site| Ok(serde_json::to_value(site)?)),
        None => state
            .sites
            .list_specs()
            .await
            .and_then(|sites| Ok(serde_json::to_value(sites)?)),
    };
    match value {
        Ok(value) => format_object(value, query.path.as_deref(), query.doc_type.as_deref())
            .unwrap_or_else(|e| error_response(&e)),
        Err(e) => error_response(&e),
    }
}

/// POST `federation/registry`: register or update a site.
pub async fn registry_post(
    State(state): State<AppState>,
    Query(query): Query<RegistryQuery>,
    Json(spec): Json<SiteSpec>,
) -> Response {
    let name = query
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| spec.name.clone());
    if name.is_empty() {
        return error_response(&ControlError::bad_request("site name is not supplied"));
    }

    info!(site = %name, "registry registration");
    match state.sites.upsert_spec(&name, spec).await {
        Ok(()) => (StatusCode::OK, Json(json!({"result": "200 - OK"}))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// DELETE `federation/registry`: deregister a site.
pub async fn registry_delete(
    State(state): State<AppState>,
    Query(query): Query<RegistryQuery>,
) -> Response {
    let Some(name) = query.name.clone().filter(|n| !n.is_empty()) else {
        return error_response(&ControlError::bad_request("site name is not supplied"));
    };
    match state.sites.delete_spec(&name).await {
        Ok(()) => (StatusCode::OK, Json(json!({"result": "200 - OK"}))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET `federation/sync`: drain a batch for the pulling site and
/// materialise full catalog bodies.
pub async fn sync_get(State(state): State<AppState>, Query(query): Query<SyncQuery>) -> Response {
    let site = query.site.clone().unwrap_or_default();

    let batch = match state.staging.get_batch_for_site(&site).await {
        Ok(batch) => batch,
        Err(e) => return error_response(&e),
    };

    let mut package = SyncPackage::new(state.site_id.clone());
    for job in batch {
        if job.action == JobAction::Run {
            package.jobs.push(job);
            continue;
        }
        match state.catalogs.get_spec(&job.id).await {
            Ok(catalog) => {
                if let Some(spec) = catalog.spec {
                    package.catalogs.push(spec);
                }
            }
            Err(e) => return error_response(&e),
        }
    }

    match serde_json::to_value(&package) {
        Ok(value) => format_object(value, query.path.as_deref(), query.doc_type.as_deref())
            .unwrap_or_else(|e| error_response(&e)),
        Err(e) => error_response(&ControlError::Decode(e)),
    }
}

/// POST `federation/sync`: accept an activation status report from a child
/// site and republish it as a `job-report`.
pub async fn sync_post(
    State(state): State<AppState>,
    Json(status): Json<ActivationStatus>,
) -> Response {
    let event = match Event::from_body(&status) {
        Ok(event) => event,
        Err(e) => return error_response(&ControlError::Decode(e)),
    };
    state.bus.publish(topics::JOB_REPORT, event).await;
    (StatusCode::OK, Json(json!({"result": "200 - OK"}))).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt as _;
    use tower::ServiceExt;

    use meridian_core::model::{CatalogSpec, JobData, JobObjectType};

    use super::super::tests::make_app_state;
    use super::super::router;
    use super::*;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_then_list_sites() {
        let state = make_app_state();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/federation/registry")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"edge1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/federation/registry")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let sites = body_json(response).await;
        assert_eq!(sites.as_array().unwrap().len(), 1);
        assert_eq!(sites[0]["spec"]["name"], "edge1");
    }

    #[tokio::test]
    async fn get_single_site_with_path_projection() {
        let state = make_app_state();
        state
            .sites
            .upsert_spec(
                "edge1",
                SiteSpec {
                    name: "edge1".to_owned(),
                    ..SiteSpec::default()
                },
            )
            .await
            .unwrap();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/federation/registry?name=edge1&path=spec.name")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!("edge1"));
    }

    #[tokio::test]
    async fn registry_yaml_doc_type_flips_content_type() {
        let state = make_app_state();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/federation/registry?doc-type=yaml")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/text"
        );
    }

    #[tokio::test]
    async fn missing_site_is_not_found() {
        let app = router(make_app_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/federation/registry?name=ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_requires_name() {
        let app = router(make_app_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/federation/registry")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sync_pull_packages_catalogs_and_run_jobs() {
        let state = make_app_state();

        state
            .sites
            .upsert_spec(
                "edge1",
                SiteSpec {
                    name: "edge1".to_owned(),
                    ..SiteSpec::default()
                },
            )
            .await
            .unwrap();
        for name in ["c1", "c2"] {
            state
                .catalogs
                .upsert_spec(
                    name,
                    CatalogSpec {
                        site_id: "hq".to_owned(),
                        name: name.to_owned(),
                        catalog_type: "config".to_owned(),
                        ..CatalogSpec::default()
                    },
                )
                .await
                .unwrap();
        }

        // Two catalog updates and one RUN job staged for edge1.
        for name in ["c1", "c2"] {
            let event = Event::from_body(&JobData::new(
                name,
                JobAction::Update,
                JobObjectType::Catalog,
            ))
            .unwrap()
            .with_metadata("site", "edge1");
            state.staging.handle_job_event(&event).await.unwrap();
        }
        let event = Event::from_body(&JobData::new(
            "wf1",
            JobAction::Run,
            JobObjectType::Catalog,
        ))
        .unwrap()
        .with_metadata("site", "edge1");
        state.staging.handle_job_event(&event).await.unwrap();

        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/federation/sync?site=edge1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let package = body_json(response).await;
        assert_eq!(package["origin"], "hq");
        assert_eq!(package["catalogs"].as_array().unwrap().len(), 2);
        assert_eq!(package["jobs"].as_array().unwrap().len(), 1);
        assert_eq!(package["jobs"][0]["action"], "RUN");
    }

    #[tokio::test]
    async fn sync_post_republishes_job_report() {
        let state = make_app_state();
        let reports = std::sync::Arc::new(std::sync::Mutex::new(0usize));
        {
            let reports = std::sync::Arc::clone(&reports);
            state
                .bus
                .subscribe_fn(topics::JOB_REPORT, move |_, _| {
                    let reports = std::sync::Arc::clone(&reports);
                    async move {
                        *reports.lock().unwrap() += 1;
                        Ok(())
                    }
                })
                .await;
        }

        let app = router(state);
        let status = ActivationStatus {
            instance_id: "app-prod".to_owned(),
            ..ActivationStatus::default()
        };
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/federation/sync")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&status).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*reports.lock().unwrap(), 1);
    }
}
