use axum::{
    Extension, Json, Router,
    extract::Query,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::model::ContentId;
use crate::server::error::{AppResult, Error};
use crate::server::services::app_services::AppServices;

#[derive(Deserialize)]
struct CacheClearQuery {
    id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaybackErrorBody {
    content_id: String,
    error_type: Option<String>,
}

/// recovery endpoints for when a client or operator notices something wedged
pub struct AdminController;

impl AdminController {
    pub fn app() -> Router {
        Router::new()
            .route("/lock/release", get(Self::lock_release))
            .route("/cache/clear", get(Self::cache_clear))
            .route("/playback/error", post(Self::playback_error))
    }

    async fn lock_release(Extension(services): Extension<AppServices>) -> Json<Value> {
        warn!("extraction lock force-released");
        services.lock.release().await;
        services.runner.reset().await;
        Json(json!({ "success": true, "message": "Lock released and browser reset" }))
    }

    async fn cache_clear(
        Extension(services): Extension<AppServices>,
        Query(params): Query<CacheClearQuery>,
    ) -> AppResult<Json<Value>> {
        match params.id.as_deref() {
            Some(raw) => {
                let id = ContentId::parse(raw)
                    .ok_or_else(|| Error::BadRequest(format!("Invalid content id: {raw}")))?;
                let removed = services.cache.invalidate(&id).await;
                info!("cache clear for {}: removed={}", id, removed);
                Ok(Json(json!({ "success": true, "removed": removed })))
            }
            None => {
                let removed = services.cache.invalidate_all().await;
                info!("cache cleared entirely, {} entries dropped", removed);
                Ok(Json(json!({ "success": true, "removed": removed })))
            }
        }
    }

    async fn playback_error(
        Extension(services): Extension<AppServices>,
        Json(body): Json<PlaybackErrorBody>,
    ) -> AppResult<Json<Value>> {
        let id = ContentId::parse(&body.content_id).ok_or_else(|| {
            Error::BadRequest(format!("Invalid content id: {}", body.content_id))
        })?;

        warn!(
            "playback error reported for {} ({})",
            id,
            body.error_type.as_deref().unwrap_or("unspecified")
        );

        let removed = services.cache.invalidate(&id).await;
        Ok(Json(json!({ "success": true, "invalidated": removed })))
    }
}
