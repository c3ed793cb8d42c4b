// serializes browser-driven extractions and owns the cache-then-extract
// decision path
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use tracing::{error, info, warn};

use crate::browser::runner::DynExtractionRunner;
use crate::model::{ContentId, ExtractionResult};
use crate::server::error::{AppResult, Error};
use crate::server::services::lock_services::{DynLockService, LockAttempt};
use crate::server::services::stream_cache_services::DynStreamCacheService;
use crate::server::services::subtitle_services::DynSubtitleService;
use crate::server::utils::url_utils::encode_url;

pub type DynExtractionService = Arc<dyn ExtractionServiceTrait + Send + Sync>;

#[automock]
#[async_trait]
pub trait ExtractionServiceTrait {
    async fn extract(
        &self,
        id: &ContentId,
        target_override: Option<String>,
    ) -> AppResult<ExtractionResult>;
}

pub struct ExtractionCoordinator {
    cache: DynStreamCacheService,
    lock: DynLockService,
    runner: DynExtractionRunner,
    subtitles: DynSubtitleService,
    target_server: String,
    public_base_url: String,
}

impl ExtractionCoordinator {
    pub fn new(
        cache: DynStreamCacheService,
        lock: DynLockService,
        runner: DynExtractionRunner,
        subtitles: DynSubtitleService,
        target_server: String,
        public_base_url: String,
    ) -> Self {
        Self {
            cache,
            lock,
            runner,
            subtitles,
            target_server,
            public_base_url,
        }
    }

    fn proxied_manifest_url(&self, manifest_url: &str, referer: &str) -> String {
        format!(
            "{}/api/proxy/m3u8?url={}&referer={}",
            self.public_base_url,
            encode_url(manifest_url),
            urlencoding::encode(referer)
        )
    }
}

#[async_trait]
impl ExtractionServiceTrait for ExtractionCoordinator {
    async fn extract(
        &self,
        id: &ContentId,
        target_override: Option<String>,
    ) -> AppResult<ExtractionResult> {
        if let Some(cached) = self.cache.get(id).await {
            info!("cache hit for {}, no browser work", id);
            return Ok(cached);
        }

        match self.lock.try_acquire(id).await {
            LockAttempt::Busy { held_for } => {
                info!(
                    "extraction for {} rejected, lock held for {}s",
                    id,
                    held_for.as_secs()
                );
                return Err(Error::ExtractionBusy);
            }
            LockAttempt::Acquired { took_over_stale } => {
                if took_over_stale {
                    // the previous holder crashed mid-flow; the browser
                    // state it left behind cannot be trusted
                    warn!("took over stale lock, discarding browser session");
                    self.runner.reset().await;
                }
            }
        }

        let target = target_override.unwrap_or_else(|| self.target_server.clone());
        let run = self.runner.run(id, &target).await;

        // the lock must be released on every exit path below

        let outcome = match run {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, Error::SessionCorrupted(_)) {
                    self.runner.reset().await;
                }
                self.lock.release().await;
                return Err(e);
            }
        };

        if outcome.manifest_url.is_empty() {
            // a cache entry is only ever written for a verified manifest
            self.lock.release().await;
            return Err(Error::ManifestNotFound);
        }

        let mut subtitles = outcome.subtitles;
        if subtitles.is_empty() {
            // best effort; a missing subtitle API never fails the extraction
            match self.subtitles.search(id).await {
                Ok(external) => subtitles = external,
                Err(e) => error!("external subtitle search failed for {}: {}", id, e),
            }
        }

        let result = ExtractionResult {
            proxied_manifest_url: self
                .proxied_manifest_url(&outcome.manifest_url, &outcome.referer),
            manifest_url: outcome.manifest_url,
            subtitles,
            referer: outcome.referer,
            provider: target,
        };

        self.cache.put(id, result.clone()).await;
        self.lock.release().await;

        Ok(result)
    }
}
