// external subtitle search API, only consulted when extraction discovered
// no embedded or network subtitle tracks
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use tracing::{error, info};

use crate::model::{ContentId, MediaType, SubtitleSource, SubtitleTrack};
use crate::server::error::{AppResult, Error};

pub type DynSubtitleService = Arc<dyn SubtitleServiceTrait + Send + Sync>;

#[automock]
#[async_trait]
pub trait SubtitleServiceTrait {
    async fn search(&self, id: &ContentId) -> AppResult<Vec<SubtitleTrack>>;
}

#[derive(Deserialize)]
struct SubtitleSearchResponse {
    success: bool,
    #[serde(default)]
    subtitles: Vec<SubtitleCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubtitleCandidate {
    label: String,
    #[serde(default)]
    language_code: Option<String>,
    url: String,
}

pub struct SubtitleService {
    http: reqwest::Client,
    api_base: Option<String>,
    api_key: Option<String>,
}

impl SubtitleService {
    pub fn new(http: reqwest::Client, api_base: Option<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            api_base,
            api_key,
        }
    }
}

#[async_trait]
impl SubtitleServiceTrait for SubtitleService {
    async fn search(&self, id: &ContentId) -> AppResult<Vec<SubtitleTrack>> {
        let Some(base) = self.api_base.as_deref() else {
            // not configured, nothing to offer
            return Ok(Vec::new());
        };

        let media_type = match id.media_type {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        };

        let mut request = self
            .http
            .get(format!("{}/search", base))
            .query(&[("id", id.external_id.as_str()), ("type", media_type)]);

        if let (Some(season), Some(episode)) = (id.season, id.episode) {
            request = request.query(&[("season", season), ("episode", episode)]);
        }

        if let Some(key) = self.api_key.as_deref() {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            error!("subtitle search failed for {}: {}", id, e);
            Error::InternalServerErrorWithContext(format!("subtitle search failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(Error::Upstream {
                status: response.status().as_u16(),
            });
        }

        let parsed: SubtitleSearchResponse = response.json().await.map_err(|e| {
            error!("failed to parse subtitle search response: {}", e);
            Error::InternalServerErrorWithContext(format!(
                "failed to parse subtitle search response: {}",
                e
            ))
        })?;

        if !parsed.success {
            return Ok(Vec::new());
        }

        let tracks: Vec<SubtitleTrack> = parsed
            .subtitles
            .into_iter()
            .map(|c| SubtitleTrack {
                language_code: c.language_code.unwrap_or_else(|| "en".to_string()),
                label: c.label,
                file_url: c.url,
                source: SubtitleSource::External,
            })
            .collect();

        info!("subtitle search for {} returned {} tracks", id, tracks.len());
        Ok(tracks)
    }
}
