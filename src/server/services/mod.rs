pub mod app_services;
pub mod extraction_services;
pub mod lock_services;
pub mod stream_cache_services;
pub mod subtitle_services;
pub mod upstream_services;

pub use app_services::AppServices;
pub use extraction_services::DynExtractionService;
pub use lock_services::DynLockService;
pub use stream_cache_services::DynStreamCacheService;
pub use subtitle_services::DynSubtitleService;
pub use upstream_services::DynUpstreamService;
