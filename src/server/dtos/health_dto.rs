use serde::Serialize;

use crate::server::services::lock_services::LockStatus;
use crate::server::services::stream_cache_services::CacheStats;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub environment: String,
    pub browser_alive: bool,
    pub cache: CacheStats,
    pub extraction_lock: Option<LockStatus>,
}
