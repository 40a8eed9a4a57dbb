use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::device::SharedCloud;
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    access_token: Option<String>,
}

pub fn create_router(cloud: SharedCloud) -> Router {
    Router::new()
        .route("/v1/devices/:device_id/ping", put(ping))
        .route("/v1/devices/:device_id/:variable", get(get_variable))
        .route(
            "/v1/products/:product_id/devices/:device_id/ping",
            put(product_ping),
        )
        .route(
            "/v1/products/:product_id/devices/:device_id/:variable",
            get(product_variable),
        )
        .route("/metrics", get(metrics_handler))
        .with_state(cloud)
}

async fn get_variable(
    State(cloud): State<SharedCloud>,
    Path((device_id, variable)): Path<(String, String)>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = presented_token(&query, &headers);
    observed(
        "variable",
        read_variable(&cloud, None, &device_id, &variable, token).await,
    )
}

async fn product_variable(
    State(cloud): State<SharedCloud>,
    Path((product_id, device_id, variable)): Path<(String, String, String)>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = presented_token(&query, &headers);
    observed(
        "variable",
        read_variable(&cloud, Some(&product_id), &device_id, &variable, token).await,
    )
}

async fn ping(
    State(cloud): State<SharedCloud>,
    Path(device_id): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = presented_token(&query, &headers);
    observed("ping", ping_device(&cloud, None, &device_id, token).await)
}

async fn product_ping(
    State(cloud): State<SharedCloud>,
    Path((product_id, device_id)): Path<(String, String)>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = presented_token(&query, &headers);
    observed(
        "ping",
        ping_device(&cloud, Some(&product_id), &device_id, token).await,
    )
}

async fn metrics_handler() -> Result<String, ApiError> {
    metrics::gather_metrics().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
    })
}

async fn read_variable(
    cloud: &SharedCloud,
    product_id: Option<&str>,
    device_id: &str,
    variable: &str,
    token: Option<&str>,
) -> Result<Json<Value>, ApiError> {
    let cloud = cloud.read().await;
    if !cloud.authorized(token) {
        return Err(ApiError::unauthorized());
    }

    let device = cloud
        .device(product_id, device_id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Device not found."))?;

    // The real cloud times out waiting for an offline device to answer.
    if !device.online {
        return Err(ApiError::new(StatusCode::REQUEST_TIMEOUT, "Timed out."));
    }

    let result = device
        .variable(variable)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Variable not found"))?;

    debug!("{} {} = {}", device_id, variable, result);

    Ok(Json(json!({
        "cmd": "VarReturn",
        "name": variable,
        "result": result,
        "coreInfo": device.core_info(),
    })))
}

async fn ping_device(
    cloud: &SharedCloud,
    product_id: Option<&str>,
    device_id: &str,
    token: Option<&str>,
) -> Result<Json<Value>, ApiError> {
    let cloud = cloud.read().await;
    if !cloud.authorized(token) {
        return Err(ApiError::unauthorized());
    }

    let device = cloud
        .device(product_id, device_id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Device not found."))?;

    Ok(Json(json!({
        "online": device.online,
        "ok": device.healthy,
    })))
}

/// Token from `?access_token=` or `Authorization: Bearer`.
fn presented_token<'a>(query: &'a TokenQuery, headers: &'a HeaderMap) -> Option<&'a str> {
    query.access_token.as_deref().or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    })
}

fn observed<T>(endpoint: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status,
    };
    metrics::record_request(endpoint, status.as_u16());
    result
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "invalid_token: The access token provided is invalid.",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("API error {}: {}", self.status, self.message);
        (
            self.status,
            Json(json!({ "ok": false, "error": self.message })),
        )
            .into_response()
    }
}
