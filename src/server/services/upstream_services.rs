// origin-facing fetch layer for manifests and segments
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use tracing::{debug, error, warn};

use crate::server::error::{AppResult, Error};
use crate::server::services::stream_cache_services::DynStreamCacheService;

pub type DynUpstreamService = Arc<dyn UpstreamServiceTrait + Send + Sync>;

pub const SPOOFED_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// CDN family that rejects Origin/Sec-Fetch-* outright and sometimes
/// Referer on non-manifest assets
const STRICT_CDN_MARKERS: &[&str] = &["shadowlandschronicles."];

pub fn is_strict_cdn(url: &str) -> bool {
    STRICT_CDN_MARKERS.iter().any(|m| url.contains(m))
}

/// Header sets for the 403 downgrade ladder. Each tier is a strict subset
/// of the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderTier {
    /// full cross-origin media fetch: UA, Accept, Referer, Origin, Sec-Fetch-*
    Full,
    /// Origin/Referer/Sec-Fetch-* dropped
    Stripped,
    /// User-Agent and Accept only
    Minimal,
}

impl HeaderTier {
    pub fn downgrade(self) -> Self {
        match self {
            Self::Full => Self::Stripped,
            Self::Stripped | Self::Minimal => Self::Minimal,
        }
    }
}

fn origin_of(referer: &str) -> Option<String> {
    let u = url::Url::parse(referer).ok()?;
    Some(format!("{}://{}", u.scheme(), u.host_str()?))
}

/// Segment request headers for one attempt. Pure so the downgrade ladder is
/// testable without a network.
pub fn segment_headers(url: &str, referer: &str, tier: HeaderTier) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("User-Agent", SPOOFED_UA.to_string()),
        ("Accept", "*/*".to_string()),
    ];

    if tier == HeaderTier::Minimal {
        return headers;
    }

    headers.push(("Accept-Language", "en-US,en;q=0.9".to_string()));

    if tier == HeaderTier::Stripped {
        return headers;
    }

    if !referer.is_empty() {
        headers.push(("Referer", referer.to_string()));
    }

    // the strict CDN family bounces requests carrying Origin or Sec-Fetch-*
    if !is_strict_cdn(url) {
        if let Some(origin) = origin_of(referer) {
            headers.push(("Origin", origin));
        }
        headers.push(("Sec-Fetch-Dest", "empty".to_string()));
        headers.push(("Sec-Fetch-Mode", "cors".to_string()));
        headers.push(("Sec-Fetch-Site", "cross-site".to_string()));
    }

    headers
}

/// Playlist request headers; Origin is omitted for the strict CDN family.
pub fn manifest_headers(url: &str, referer: &str) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("User-Agent", SPOOFED_UA.to_string()),
        ("Accept", "*/*".to_string()),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
    ];

    if !referer.is_empty() {
        headers.push(("Referer", referer.to_string()));
    }

    if !is_strict_cdn(url) {
        if let Some(origin) = origin_of(referer) {
            headers.push(("Origin", origin));
        }
    }

    headers
}

/// Content type by extension when the upstream omits or hedges on it.
pub fn infer_content_type(url: &str, upstream: Option<&str>) -> String {
    if let Some(ct) = upstream {
        if !ct.is_empty() && ct != "application/octet-stream" {
            return ct.to_string();
        }
    }

    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());

    if path.ends_with(".vtt") {
        "text/vtt".to_string()
    } else if path.ends_with(".srt") {
        "text/plain".to_string()
    } else if path.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl".to_string()
    } else if path.ends_with(".ts") || path.ends_with(".m4s") {
        "video/mp2t".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// extra attempts after a 403, each with a smaller header set
    pub permission_retries: u32,
    /// extra attempts for network errors and non-403/404 statuses
    pub transient_retries: u32,
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            permission_retries: 2,
            transient_retries: 2,
            backoff: Duration::from_millis(400),
            attempt_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedSegment {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub status: u16,
}

#[automock]
#[async_trait]
pub trait UpstreamServiceTrait {
    /// raw playlist text; rewriting happens in the controller layer
    async fn fetch_manifest(&self, url: &str, referer: &str) -> AppResult<String>;

    async fn fetch_segment(&self, url: &str, referer: &str) -> AppResult<FetchedSegment>;
}

pub struct UpstreamService {
    http: reqwest::Client,
    cache: DynStreamCacheService,
    policy: RetryPolicy,
}

impl UpstreamService {
    pub fn new(http: reqwest::Client, cache: DynStreamCacheService, policy: RetryPolicy) -> Self {
        Self {
            http,
            cache,
            policy,
        }
    }

    fn request(&self, url: &str, headers: &[(&'static str, String)]) -> reqwest::RequestBuilder {
        let mut builder = self.http.get(url).timeout(self.policy.attempt_timeout);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        builder
    }
}

#[async_trait]
impl UpstreamServiceTrait for UpstreamService {
    async fn fetch_manifest(&self, url: &str, referer: &str) -> AppResult<String> {
        let headers = manifest_headers(url, referer);
        let mut transient_attempts = 0u32;

        loop {
            match self.request(url, &headers).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.text().await.map_err(|e| {
                            error!("failed to read playlist body: {}", e);
                            Error::InternalServerErrorWithContext(format!(
                                "failed to read playlist body: {}",
                                e
                            ))
                        });
                    }

                    warn!("playlist fetch returned {} for {}", status, url);
                    if status.as_u16() == 404 || transient_attempts >= self.policy.transient_retries
                    {
                        return Err(Error::Upstream {
                            status: status.as_u16(),
                        });
                    }
                }
                Err(e) => {
                    error!("playlist fetch failed: {}", e);
                    if transient_attempts >= self.policy.transient_retries {
                        return Err(Error::InternalServerErrorWithContext(format!(
                            "playlist fetch failed: {}",
                            e
                        )));
                    }
                }
            }

            transient_attempts += 1;
            tokio::time::sleep(self.policy.backoff).await;
        }
    }

    async fn fetch_segment(&self, url: &str, referer: &str) -> AppResult<FetchedSegment> {
        // strict CDNs get the trimmed set from the first attempt
        let mut tier = if is_strict_cdn(url) {
            HeaderTier::Stripped
        } else {
            HeaderTier::Full
        };

        let mut permission_attempts = 0u32;
        let mut transient_attempts = 0u32;

        loop {
            let headers = segment_headers(url, referer, tier);

            match self.request(url, &headers).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let upstream_ct = response
                            .headers()
                            .get(reqwest::header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(|s| s.to_string());

                        let bytes = response.bytes().await.map_err(|e| {
                            error!("failed to read segment body: {}", e);
                            Error::InternalServerErrorWithContext(format!(
                                "failed to read segment body: {}",
                                e
                            ))
                        })?;

                        return Ok(FetchedSegment {
                            bytes: bytes.to_vec(),
                            content_type: infer_content_type(url, upstream_ct.as_deref()),
                            status: status.as_u16(),
                        });
                    }

                    match status.as_u16() {
                        403 => {
                            if permission_attempts >= self.policy.permission_retries {
                                // exhausted 403s count against the cached
                                // entry whose manifest shares this host
                                self.cache.record_failure(url).await;
                                return Err(Error::Upstream { status: 403 });
                            }
                            permission_attempts += 1;
                            tier = tier.downgrade();
                            debug!(
                                "segment 403, retrying with {:?} headers: {}",
                                tier, url
                            );
                            continue;
                        }
                        404 => {
                            return Err(Error::Upstream { status: 404 });
                        }
                        other => {
                            warn!("segment fetch returned {} for {}", other, url);
                            if transient_attempts >= self.policy.transient_retries {
                                return Err(Error::Upstream { status: other });
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("segment fetch failed: {}", e);
                    if transient_attempts >= self.policy.transient_retries {
                        return Err(Error::InternalServerErrorWithContext(format!(
                            "segment fetch failed: {}",
                            e
                        )));
                    }
                }
            }

            transient_attempts += 1;
            tokio::time::sleep(self.policy.backoff).await;
        }
    }
}
