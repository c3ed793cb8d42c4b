use axum::{
    Extension, Router,
    extract::Query,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::debug;

use crate::server::error::{AppResult, Error};
use crate::server::services::app_services::AppServices;
use crate::server::utils::m3u8_utils::rewrite_playlist;
use crate::server::utils::url_utils::decode_url;

#[derive(Deserialize)]
struct ProxyQuery {
    url: String,
    referer: Option<String>,
}

pub struct ProxyController;

impl ProxyController {
    pub fn app() -> Router {
        Router::new()
            .route("/m3u8", get(Self::m3u8_get).options(Self::proxy_options))
            .route("/segment", get(Self::segment_get).options(Self::proxy_options))
    }

    fn decode_params(params: &ProxyQuery) -> AppResult<(String, String)> {
        let target_url = decode_url(&params.url)?;

        if !target_url.starts_with("http://") && !target_url.starts_with("https://") {
            return Err(Error::BadRequest("Invalid URL format".to_string()));
        }

        let referer = match params.referer.as_deref() {
            Some(r) if !r.is_empty() => decode_url(r)?,
            _ => String::new(),
        };

        Ok((target_url, referer))
    }

    /// playlists are rewritten to point every uri back at us, so the response
    /// must never be cached by the player
    async fn m3u8_get(
        Extension(services): Extension<AppServices>,
        Query(params): Query<ProxyQuery>,
    ) -> AppResult<Response> {
        let (target_url, referer) = Self::decode_params(&params)?;

        debug!("proxying playlist: {}", target_url);

        let body = services.upstream.fetch_manifest(&target_url, &referer).await?;
        let rewritten = rewrite_playlist(
            &body,
            &target_url,
            &referer,
            &services.config.public_base_url,
        );

        let mut response_headers = HeaderMap::new();
        response_headers.insert(
            header::CONTENT_TYPE,
            "application/vnd.apple.mpegurl"
                .parse()
                .expect("Static header value should parse"),
        );
        response_headers.insert(
            header::CACHE_CONTROL,
            "no-cache"
                .parse()
                .expect("Static header value should parse"),
        );
        response_headers.insert(
            header::CONTENT_LENGTH,
            rewritten
                .len()
                .to_string()
                .parse()
                .expect("Content length should parse"),
        );

        Ok((StatusCode::OK, response_headers, rewritten).into_response())
    }

    async fn segment_get(
        Extension(services): Extension<AppServices>,
        Query(params): Query<ProxyQuery>,
    ) -> AppResult<Response> {
        let (target_url, referer) = Self::decode_params(&params)?;

        debug!("proxying segment: {}", target_url);

        let segment = services.upstream.fetch_segment(&target_url, &referer).await?;

        let mut response_headers = HeaderMap::new();
        response_headers.insert(
            header::CONTENT_TYPE,
            segment
                .content_type
                .parse()
                .unwrap_or_else(|_| "application/octet-stream".parse().expect("static value")),
        );
        // segments are immutable once published, let the player hold onto them
        response_headers.insert(
            header::CACHE_CONTROL,
            "public, max-age=3600"
                .parse()
                .expect("Static header value should parse"),
        );
        response_headers.insert(
            header::CONTENT_LENGTH,
            segment
                .bytes
                .len()
                .to_string()
                .parse()
                .expect("Content length should parse"),
        );

        let status = StatusCode::from_u16(segment.status).unwrap_or(StatusCode::OK);
        Ok((status, response_headers, segment.bytes).into_response())
    }

    async fn proxy_options() -> impl IntoResponse {
        StatusCode::NO_CONTENT
    }
}
