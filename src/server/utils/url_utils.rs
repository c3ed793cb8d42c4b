use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use tracing::error;

use crate::server::error::{AppResult, Error};

/// Unpadded URL-safe base64, the form emitted into rewritten playlists.
pub fn encode_url(url: &str) -> String {
    URL_SAFE
        .encode(url.as_bytes())
        .trim_end_matches('=')
        .to_string()
}

/// Accepts either a raw percent-encoded URL or the unpadded base64 form
/// above, so hand-built and playlist-emitted links both work.
pub fn decode_url(url_param: &str) -> AppResult<String> {
    if url_param.starts_with("http://") || url_param.starts_with("https://") {
        urlencoding::decode(url_param)
            .map(|s| s.to_string())
            .map_err(|e| {
                error!("Failed to decode URL: {}", e);
                Error::BadRequest("Invalid URL encoding".to_string())
            })
    } else {
        let mut padded = url_param.to_string();
        while !padded.len().is_multiple_of(4) {
            padded.push('=');
        }

        URL_SAFE
            .decode(&padded)
            .map_err(|e| {
                error!("Failed to decode base64: {}", e);
                Error::BadRequest("Invalid URL encoding".to_string())
            })
            .and_then(|bytes| {
                String::from_utf8(bytes).map_err(|e| {
                    error!("Failed to parse UTF-8: {}", e);
                    Error::BadRequest("Invalid URL encoding".to_string())
                })
            })
    }
}
