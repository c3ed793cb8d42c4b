// domain types shared by the coordinator, cache and controllers
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "tv" => Some(Self::Tv),
            _ => None,
        }
    }
}

/// Canonical content key: `{movie|tv}-{externalId}[-s{season}e{episode}]`.
/// Used for cache lookups and for correlating playback errors back to an
/// entry, so the string form has to stay deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId {
    pub media_type: MediaType,
    pub external_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ContentId {
    pub fn movie(external_id: impl Into<String>) -> Self {
        Self {
            media_type: MediaType::Movie,
            external_id: external_id.into(),
            season: None,
            episode: None,
        }
    }

    pub fn tv(external_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            media_type: MediaType::Tv,
            external_id: external_id.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (kind, rest) = s.split_once('-')?;
        let media_type = MediaType::parse(kind)?;

        match media_type {
            MediaType::Movie => Some(Self::movie(rest)),
            MediaType::Tv => {
                // the episode suffix is the last dash-separated chunk
                let (external_id, suffix) = rest.rsplit_once('-')?;
                let suffix = suffix.strip_prefix('s')?;
                let (season, episode) = suffix.split_once('e')?;
                Some(Self::tv(
                    external_id,
                    season.parse().ok()?,
                    episode.parse().ok()?,
                ))
            }
        }
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.media_type {
            MediaType::Movie => write!(f, "movie-{}", self.external_id),
            MediaType::Tv => write!(
                f,
                "tv-{}-s{}e{}",
                self.external_id,
                self.season.unwrap_or(0),
                self.episode.unwrap_or(0)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleSource {
    /// found in the player's inline subtitle configuration
    Embedded,
    /// a .vtt/.srt response observed on the wire
    Network,
    /// fetched from the external subtitle search API
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    pub label: String,
    pub language_code: String,
    pub file_url: String,
    pub source: SubtitleSource,
}

/// Immutable payload of a successful extraction. Becomes the body of a
/// cache entry and of the /api/extract response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub manifest_url: String,
    pub proxied_manifest_url: String,
    pub subtitles: Vec<SubtitleTrack>,
    pub referer: String,
    pub provider: String,
}
