use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{Extension, Router, http::HeaderValue, routing::get};
use once_cell::sync::Lazy;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::server::api::admin_controller::AdminController;
use crate::server::api::extract_controller::ExtractController;
use crate::server::api::health_controller::health_endpoint;
use crate::server::api::proxy_controller::ProxyController;
use crate::server::services::app_services::AppServices;

pub mod api;
pub mod dtos;
pub mod error;
pub mod services;
pub mod utils;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub fn get_uptime_seconds() -> u64 {
    START_TIME.elapsed().as_secs()
}

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub struct ApplicationServer;

impl ApplicationServer {
    pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
        // touch START_TIME so uptime counts from boot, not first health probe
        Lazy::force(&START_TIME);

        let port = config.port;
        let services = AppServices::new(config.clone());

        let cors = if config.cors_origin == "*" {
            CorsLayer::new().allow_origin(Any).allow_methods(Any)
        } else {
            let origin = config
                .cors_origin
                .parse::<HeaderValue>()
                .context("invalid cors origin")?;
            CorsLayer::new().allow_origin(origin).allow_methods(Any)
        };

        let app = Router::new()
            .nest("/api/extract", ExtractController::app())
            .nest("/api/proxy", ProxyController::app())
            .nest("/api", AdminController::app())
            .route("/health", get(health_endpoint))
            .layer(Extension(services))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(NormalizePathLayer::trim_trailing_slash());

        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .context("failed to bind listener")?;

        info!("server listening on port {}", port);

        axum::serve(listener, app)
            .await
            .context("server stopped unexpectedly")?;

        Ok(())
    }
}
