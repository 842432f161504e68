use std::sync::Arc;

use anyhow::Error;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use log::error;
use serde_json::json;

use crate::domain::{
    component::NoComponentFound, port::ClusterError, InspectionService,
};

pub fn router(service: InspectionService) -> Router {
    Router::new()
        .route("/components", get(list_components))
        .route("/components/:name/modes", get(component_modes))
        .route("/components/:name/connections", get(component_connections))
        .route("/components/:name/devfile", get(component_devfile))
        .route("/bindings/:name", get(get_binding))
        .route("/instances", get(list_instances))
        .route("/ports", get(forwarded_ports))
        .with_state(Arc::new(service))
}

fn error_response(operation: &str, err: Error) -> (StatusCode, String) {
    let not_found = err.downcast_ref::<NoComponentFound>().is_some()
        || matches!(err.downcast_ref::<ClusterError>(), Some(e) if e.is_not_found());
    if not_found {
        (StatusCode::NOT_FOUND, err.to_string())
    } else {
        error!("Error during {} {:?}", operation, err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {err}"),
        )
    }
}

async fn list_components(State(service): State<Arc<InspectionService>>) -> impl IntoResponse {
    crate::domain::list_components(&service)
        .await
        .map(|(components, component_in_devfile)| {
            Json(json!({
                "components": components,
                "componentInDevfile": component_in_devfile,
            }))
        })
        .map_err(|e| error_response("list_components", e))
}

async fn component_modes(
    State(service): State<Arc<InspectionService>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    crate::domain::running_modes(&service, &name)
        .await
        .map(Json)
        .map_err(|e| error_response("component_modes", e))
}

async fn component_connections(
    State(service): State<Arc<InspectionService>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    crate::domain::connections(&service, &name)
        .await
        .map(|(ingresses, routes)| Json(json!({ "ingresses": ingresses, "routes": routes })))
        .map_err(|e| error_response("component_connections", e))
}

async fn component_devfile(
    State(service): State<Arc<InspectionService>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    crate::domain::devfile_info(&service, &name)
        .await
        .map(Json)
        .map_err(|e| error_response("component_devfile", e))
}

async fn get_binding(
    State(service): State<Arc<InspectionService>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    crate::domain::get_binding(&service, &name)
        .await
        .map(Json)
        .map_err(|e| error_response("get_binding", e))
}

async fn list_instances(State(service): State<Arc<InspectionService>>) -> impl IntoResponse {
    crate::domain::service_instances(&service)
        .await
        .map(Json)
        .map_err(|e| error_response("list_instances", e))
}

async fn forwarded_ports(State(service): State<Arc<InspectionService>>) -> impl IntoResponse {
    crate::domain::forwarded_ports(&service)
        .map(Json)
        .map_err(|e| error_response("forwarded_ports", e))
}
