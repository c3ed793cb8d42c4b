use serde::Serialize;

use crate::model::{ExtractionResult, SubtitleTrack};

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    #[serde(rename = "m3u8Url")]
    pub m3u8_url: String,
    #[serde(rename = "proxiedM3U8Url")]
    pub proxied_m3u8_url: String,
    pub subtitles: Vec<SubtitleTrack>,
    pub referer: String,
    pub provider: String,
}

impl From<ExtractionResult> for ExtractResponse {
    fn from(result: ExtractionResult) -> Self {
        Self {
            success: true,
            m3u8_url: result.manifest_url,
            proxied_m3u8_url: result.proxied_manifest_url,
            subtitles: result.subtitles,
            referer: result.referer,
            provider: result.provider,
        }
    }
}
