use axum::Extension;
use axum::Json;
use axum::http::StatusCode;
use chrono::Utc;

use crate::server::dtos::health_dto::HealthResponse;
use crate::server::services::app_services::AppServices;
use crate::server::{get_app_version, get_uptime_seconds};

/// health endpoint - reports browser, cache and lock state
/// if this isn't wanted comment out the health endpoint in ../mod.rs
pub async fn health_endpoint(
    Extension(services): Extension<AppServices>,
) -> (StatusCode, Json<HealthResponse>) {
    let browser_alive = services.runner.is_alive().await;
    let cache = services.cache.stats().await;
    let extraction_lock = services.lock.status().await;

    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: get_uptime_seconds(),
        version: get_app_version().to_string(),
        environment: format!("{:?}", services.config.cargo_env).to_lowercase(),
        browser_alive,
        cache,
        extraction_lock,
    };

    // a dead browser isn't fatal, the next extraction relaunches it
    (StatusCode::OK, Json(response))
}
