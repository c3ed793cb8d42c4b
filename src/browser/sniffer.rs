// network traffic observation for the automated tab: manifest capture,
// referer tracking and subtitle discovery
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived, GetResponseBodyParams,
};
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::{SubtitleSource, SubtitleTrack};
use crate::server::error::{AppResult, Error};

/// response URLs that carry the embedded player's source configuration,
/// including the inline subtitle list
const PLAYER_ENDPOINT_MARKERS: &[&str] = &["getSources", "/api/source"];

/// inline subtitle config entries look like `[English]https://…file.vtt`
/// concatenated back to back
static INLINE_SUBTITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[([^\[\]]+)\](https?://[^\s\[\]"']+?\.vtt)"#).unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestHit {
    pub url: String,
    pub referer: String,
}

fn path_of(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase())
}

fn english_label(label: &str) -> bool {
    let l = label.trim();
    l.eq_ignore_ascii_case("english") || l.eq_ignore_ascii_case("en")
}

#[derive(Default)]
pub struct NetworkSniffer {
    /// manifests seen before the server-switch click are discarded by
    /// policy; the default server's stream must never be returned
    switched: AtomicBool,
    manifest: Mutex<Option<ManifestHit>>,
    subtitles: Mutex<Vec<SubtitleTrack>>,
    /// fallback referer when the originating request carried none
    page_url: Mutex<String>,
}

impl NetworkSniffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mark_switched(&self) {
        info!("server switch registered, accepting manifest URLs");
        self.switched.store(true, Ordering::SeqCst);
    }

    pub fn switched(&self) -> bool {
        self.switched.load(Ordering::SeqCst)
    }

    pub fn set_page_url(&self, url: &str) {
        *self.page_url.lock().unwrap() = url.to_string();
    }

    pub fn manifest(&self) -> Option<ManifestHit> {
        self.manifest.lock().unwrap().clone()
    }

    pub fn subtitles(&self) -> Vec<SubtitleTrack> {
        self.subtitles.lock().unwrap().clone()
    }

    /// Core observation rule, independent of any CDP plumbing.
    pub fn observe_response(&self, url: &str, status: i64, referer: Option<&str>) {
        if status >= 400 || url.starts_with("blob:") {
            return;
        }

        let path = path_of(url);

        if path.contains(".m3u8") {
            if !self.switched() {
                debug!("discarding pre-switch manifest URL: {}", url);
                return;
            }

            let mut manifest = self.manifest.lock().unwrap();
            if manifest.is_none() {
                let referer = referer
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| self.page_url.lock().unwrap().clone());
                info!("captured manifest URL: {}", url);
                *manifest = Some(ManifestHit {
                    url: url.to_string(),
                    referer,
                });
            }
            return;
        }

        if path.ends_with(".vtt") || path.ends_with(".srt") {
            self.push_subtitle(SubtitleTrack {
                label: "English".to_string(),
                language_code: "en".to_string(),
                file_url: url.to_string(),
                source: SubtitleSource::Network,
            });
        }
    }

    pub fn is_player_endpoint(url: &str) -> bool {
        PLAYER_ENDPOINT_MARKERS.iter().any(|m| url.contains(m))
    }

    /// Best-effort scan of a player-endpoint body for the inline subtitle
    /// configuration; only English-labeled entries are kept.
    pub fn scan_player_body(&self, body: &str) {
        for caps in INLINE_SUBTITLE.captures_iter(body) {
            let label = caps[1].to_string();
            if !english_label(&label) {
                continue;
            }
            self.push_subtitle(SubtitleTrack {
                label,
                language_code: "en".to_string(),
                file_url: caps[2].to_string(),
                source: SubtitleSource::Embedded,
            });
        }
    }

    fn push_subtitle(&self, track: SubtitleTrack) {
        let mut subtitles = self.subtitles.lock().unwrap();
        if subtitles.iter().any(|t| t.file_url == track.file_url) {
            return;
        }
        debug!("collected subtitle track: {}", track.file_url);
        subtitles.push(track);
    }

    /// Install request/response observers on the tab. Returned handles are
    /// aborted to detach when the extraction ends.
    pub async fn attach(self: &Arc<Self>, page: &Page) -> AppResult<Vec<JoinHandle<()>>> {
        page.execute(EnableParams::default())
            .await
            .map_err(|e| Error::SessionCorrupted(e.to_string()))?;

        // referers are captured from the originating request's headers and
        // looked up when the matching response lands
        let referers: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));

        let mut request_events = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| Error::SessionCorrupted(e.to_string()))?;

        let request_referers = referers.clone();
        let request_task = tokio::spawn(async move {
            while let Some(ev) = request_events.next().await {
                let headers = serde_json::to_value(&ev.request.headers)
                    .unwrap_or(serde_json::Value::Null);
                let referer = headers
                    .get("Referer")
                    .or_else(|| headers.get("referer"))
                    .and_then(|v| v.as_str());
                if let Some(referer) = referer {
                    request_referers
                        .lock()
                        .unwrap()
                        .insert(ev.request_id.inner().clone(), referer.to_string());
                }
            }
        });

        let mut response_events = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| Error::SessionCorrupted(e.to_string()))?;

        let sniffer = self.clone();
        let body_page = page.clone();
        let response_task = tokio::spawn(async move {
            while let Some(ev) = response_events.next().await {
                let url = ev.response.url.clone();
                let status = ev.response.status;

                let referer = referers
                    .lock()
                    .unwrap()
                    .remove(ev.request_id.inner());

                sniffer.observe_response(&url, status, referer.as_deref());

                if status < 400 && Self::is_player_endpoint(&url) {
                    match body_page
                        .execute(GetResponseBodyParams::new(ev.request_id.clone()))
                        .await
                    {
                        Ok(body) => {
                            let text = if body.base64_encoded {
                                STANDARD
                                    .decode(body.body.as_bytes())
                                    .ok()
                                    .and_then(|b| String::from_utf8(b).ok())
                                    .unwrap_or_default()
                            } else {
                                body.body.clone()
                            };
                            sniffer.scan_player_body(&text);
                        }
                        Err(e) => {
                            // body may already be gone from the buffer
                            warn!("could not read player endpoint body: {}", e);
                        }
                    }
                }
            }
        });

        Ok(vec![request_task, response_task])
    }
}
