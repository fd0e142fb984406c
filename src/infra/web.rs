use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::error;
use serde_json::json;

use crate::domain::{
    self, container_to_json,
    error::ProvisionError,
    model::{ConfigRequest, InstanceRequest},
    ProvisioningService,
};

pub fn router(service: ProvisioningService) -> Router {
    Router::new()
        .route("/instances", get(list_instances).post(create_instance))
        .route("/instances/:name", get(get_instance))
        .route("/instances/:name/logs", get(instance_logs))
        .route("/configs", post(configure_instance))
        .with_state(Arc::new(service))
}

fn internal_error(operation: &str, e: anyhow::Error) -> Response {
    error!("Error during {} {:?}", operation, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Something went wrong: {e}"),
    )
        .into_response()
}

fn provision_failure(operation: &str, e: ProvisionError) -> Response {
    match e {
        ProvisionError::Invalid(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": errors.errors })),
        )
            .into_response(),
        ProvisionError::Backend(e) => internal_error(operation, e),
    }
}

fn malformed_body(rejection: JsonRejection) -> Response {
    (
        rejection.status(),
        Json(json!({ "errors": { "body": [rejection.body_text()] } })),
    )
        .into_response()
}

async fn list_instances(State(service): State<Arc<ProvisioningService>>) -> Response {
    match domain::list_instances(&service).await {
        Ok(containers) => Json(
            containers
                .iter()
                .map(|container| container_to_json(Some(container), false))
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => internal_error("list_instances", e),
    }
}

async fn create_instance(
    State(service): State<Arc<ProvisioningService>>,
    payload: Result<Json<InstanceRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return malformed_body(rejection),
    };
    match domain::create_instance(&payload, &service).await {
        Ok(created) => {
            let status = if created.provisioned.is_created() {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let body = json!({
                "container": container_to_json(Some(created.provisioned.container()), true),
                "root_password": created.root_password,
            });
            (status, Json(body)).into_response()
        }
        Err(e) => provision_failure("create_instance", e),
    }
}

async fn get_instance(
    State(service): State<Arc<ProvisioningService>>,
    Path(name): Path<String>,
) -> Response {
    match domain::instance(&name, &service).await {
        Ok(Some(container)) => Json(container_to_json(Some(&container), true)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(container_to_json(None, true))).into_response(),
        Err(e) => internal_error("get_instance", e),
    }
}

async fn instance_logs(
    State(service): State<Arc<ProvisioningService>>,
    Path(name): Path<String>,
) -> Response {
    match domain::instance_logs(&name, &service).await {
        Ok(Some(logs)) => (StatusCode::OK, logs).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, format!("Container {name} not found")).into_response(),
        Err(e) => internal_error("instance_logs", e),
    }
}

async fn configure_instance(
    State(service): State<Arc<ProvisioningService>>,
    payload: Result<Json<ConfigRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return malformed_body(rejection),
    };
    match domain::configure_instance(&payload, &service).await {
        Ok(settings) => Json(json!({
            "container": container_to_json(Some(&settings.container), true),
            "database": settings.database,
            "charset": settings.charset,
        }))
        .into_response(),
        Err(e) => provision_failure("configure_instance", e),
    }
}
