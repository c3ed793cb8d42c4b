use axum::{
    Extension, Json, Router,
    extract::Query,
    routing::get,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::model::{ContentId, MediaType};
use crate::server::dtos::extract_dto::ExtractResponse;
use crate::server::error::{AppResult, Error};
use crate::server::services::app_services::AppServices;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractQuery {
    tmdb_id: Option<String>,
    imdb_id: Option<String>,
    #[serde(rename = "type")]
    media_type: Option<String>,
    season: Option<u32>,
    episode: Option<u32>,
    server: Option<String>,
}

pub struct ExtractController;

impl ExtractController {
    pub fn app() -> Router {
        Router::new().route("/", get(Self::extract_get))
    }

    /// query validation lives here so the coordinator only ever sees a well-formed id
    fn parse_query(params: &ExtractQuery) -> AppResult<ContentId> {
        let external_id = params
            .tmdb_id
            .as_deref()
            .or(params.imdb_id.as_deref())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::BadRequest("Missing tmdbId or imdbId".to_string()))?;

        let media_type = match params.media_type.as_deref() {
            None => MediaType::Movie,
            Some(raw) => MediaType::parse(raw)
                .ok_or_else(|| Error::BadRequest(format!("Unknown media type: {raw}")))?,
        };

        match media_type {
            MediaType::Movie => Ok(ContentId::movie(external_id)),
            MediaType::Tv => {
                let (season, episode) = match (params.season, params.episode) {
                    (Some(s), Some(e)) => (s, e),
                    _ => {
                        return Err(Error::BadRequest(
                            "Missing season/episode for TV".to_string(),
                        ));
                    }
                };
                Ok(ContentId::tv(external_id, season, episode))
            }
        }
    }

    async fn extract_get(
        Extension(services): Extension<AppServices>,
        Query(params): Query<ExtractQuery>,
    ) -> AppResult<Json<ExtractResponse>> {
        let id = Self::parse_query(&params)?;

        debug!("extract request for {}", id);

        let result = services
            .extraction
            .extract(&id, params.server.clone())
            .await?;

        info!("extraction resolved for {} via {}", id, result.provider);
        Ok(Json(ExtractResponse::from(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(tmdb: Option<&str>, kind: Option<&str>, s: Option<u32>, e: Option<u32>) -> ExtractQuery {
        ExtractQuery {
            tmdb_id: tmdb.map(String::from),
            imdb_id: None,
            media_type: kind.map(String::from),
            season: s,
            episode: e,
            server: None,
        }
    }

    #[test]
    fn movie_defaults_when_type_missing() {
        let id = ExtractController::parse_query(&query(Some("550"), None, None, None)).unwrap();
        assert_eq!(id.to_string(), "movie-550");
    }

    #[test]
    fn tv_requires_season_and_episode() {
        let err =
            ExtractController::parse_query(&query(Some("1399"), Some("tv"), Some(1), None))
                .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn rejects_missing_ids() {
        let err = ExtractController::parse_query(&query(None, None, None, None)).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
