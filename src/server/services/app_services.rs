use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::browser::runner::{BrowserRunner, DynExtractionRunner};
use crate::browser::session::{BrowserSession, SessionConfig};
use crate::browser::state_machine::MachinePolicy;
use crate::config::AppConfig;
use crate::server::services::extraction_services::{DynExtractionService, ExtractionCoordinator};
use crate::server::services::lock_services::{DynLockService, LockPolicy, LockService};
use crate::server::services::stream_cache_services::{
    CachePolicy, DynStreamCacheService, StreamCacheService,
};
use crate::server::services::subtitle_services::{DynSubtitleService, SubtitleService};
use crate::server::services::upstream_services::{
    DynUpstreamService, RetryPolicy, SPOOFED_UA, UpstreamService,
};

/// service registry handed to every controller via Extension
#[derive(Clone)]
pub struct AppServices {
    pub cache: DynStreamCacheService,
    pub lock: DynLockService,
    pub runner: DynExtractionRunner,
    pub extraction: DynExtractionService,
    pub upstream: DynUpstreamService,
    pub subtitles: DynSubtitleService,
    pub http: reqwest::Client,
    pub config: Arc<AppConfig>,
}

impl AppServices {
    pub fn new(config: Arc<AppConfig>) -> Self {
        info!("starting services...");

        let http = reqwest::Client::builder()
            .user_agent(SPOOFED_UA)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let cache =
            Arc::new(StreamCacheService::new(CachePolicy::default())) as DynStreamCacheService;
        let lock = Arc::new(LockService::new(LockPolicy::default())) as DynLockService;

        let session = Arc::new(BrowserSession::new(SessionConfig {
            executable: config.chrome_executable.clone(),
            headless: config.browser_headless,
        }));

        let runner = Arc::new(BrowserRunner::new(
            session,
            config.upstream_embed_base.clone(),
            MachinePolicy::default(),
        )) as DynExtractionRunner;

        let subtitles = Arc::new(SubtitleService::new(
            http.clone(),
            config.subtitle_api_base.clone(),
            config.subtitle_api_key.clone(),
        )) as DynSubtitleService;

        let upstream = Arc::new(UpstreamService::new(
            http.clone(),
            cache.clone(),
            RetryPolicy::default(),
        )) as DynUpstreamService;

        let extraction = Arc::new(ExtractionCoordinator::new(
            cache.clone(),
            lock.clone(),
            runner.clone(),
            subtitles.clone(),
            config.target_server.clone(),
            config.public_base_url.clone(),
        )) as DynExtractionService;

        Self {
            cache,
            lock,
            runner,
            extraction,
            upstream,
            subtitles,
            http,
            config,
        }
    }
}
