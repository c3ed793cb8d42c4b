use std::time::Duration;

use vidveil::model::{ContentId, ExtractionResult};
use vidveil::server::services::stream_cache_services::{
    CachePolicy, StreamCacheService, StreamCacheServiceTrait,
};

fn result_for(host: &str) -> ExtractionResult {
    ExtractionResult {
        manifest_url: format!("https://{host}/hls/master.m3u8"),
        proxied_manifest_url: "http://localhost:5000/api/proxy/m3u8?url=abc".to_string(),
        subtitles: vec![],
        referer: "https://embed.example/".to_string(),
        provider: "CloudStream Pro".to_string(),
    }
}

fn cache_with(ttl_ms: u64, threshold: u32) -> StreamCacheService {
    StreamCacheService::new(CachePolicy {
        ttl: Duration::from_millis(ttl_ms),
        failure_threshold: threshold,
        soft_capacity: 100,
    })
}

#[tokio::test]
async fn test_returns_cached_result() {
    let cache = cache_with(60_000, 5);
    let id = ContentId::movie("550");

    cache.put(&id, result_for("cdn.example")).await;

    let hit = cache.get(&id).await.expect("entry should still be live");
    assert_eq!(hit.manifest_url, "https://cdn.example/hls/master.m3u8");
}

#[tokio::test]
async fn test_expired_entry_is_evicted_on_read() {
    let cache = cache_with(10, 5);
    let id = ContentId::movie("550");

    cache.put(&id, result_for("cdn.example")).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(cache.get(&id).await.is_none());
    // the eviction is real, not just hidden
    assert_eq!(cache.stats().await.entries, 0);
}

#[tokio::test]
async fn test_failure_threshold_evicts_entry() {
    let cache = cache_with(60_000, 3);
    let id = ContentId::movie("550");

    cache.put(&id, result_for("cdn.example")).await;

    for _ in 0..2 {
        cache
            .record_failure("https://cdn.example/hls/seg-001.ts")
            .await;
    }
    // two failures, still below threshold
    assert!(cache.get(&id).await.is_some());

    cache
        .record_failure("https://cdn.example/hls/seg-002.ts")
        .await;
    assert!(cache.get(&id).await.is_none());
}

#[tokio::test]
async fn test_failures_only_count_against_matching_host() {
    let cache = cache_with(60_000, 1);
    let movie = ContentId::movie("550");
    let show = ContentId::tv("1399", 1, 1);

    cache.put(&movie, result_for("cdn-a.example")).await;
    cache.put(&show, result_for("cdn-b.example")).await;

    cache
        .record_failure("https://cdn-a.example/hls/seg-001.ts")
        .await;

    assert!(cache.get(&movie).await.is_none());
    assert!(cache.get(&show).await.is_some());
}

#[tokio::test]
async fn test_rewrite_resets_failure_counter() {
    let cache = cache_with(60_000, 2);
    let id = ContentId::movie("550");

    cache.put(&id, result_for("cdn.example")).await;
    cache
        .record_failure("https://cdn.example/hls/seg-001.ts")
        .await;

    // a fresh extraction result lands for the same id
    cache.put(&id, result_for("cdn.example")).await;
    cache
        .record_failure("https://cdn.example/hls/seg-002.ts")
        .await;

    // one failure since the rewrite, entry survives
    assert!(cache.get(&id).await.is_some());
}

#[tokio::test]
async fn test_invalidate_single_and_all() {
    let cache = cache_with(60_000, 5);
    let movie = ContentId::movie("550");
    let show = ContentId::tv("1399", 1, 1);

    cache.put(&movie, result_for("cdn-a.example")).await;
    cache.put(&show, result_for("cdn-b.example")).await;

    assert!(cache.invalidate(&movie).await);
    assert!(!cache.invalidate(&movie).await);
    assert_eq!(cache.invalidate_all().await, 1);
    assert_eq!(cache.stats().await.entries, 0);
}

#[tokio::test]
async fn test_put_sweeps_expired_entries_at_capacity() {
    let cache = StreamCacheService::new(CachePolicy {
        ttl: Duration::from_millis(10),
        failure_threshold: 5,
        soft_capacity: 2,
    });

    cache.put(&ContentId::movie("1"), result_for("a.example")).await;
    cache.put(&ContentId::movie("2"), result_for("b.example")).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    cache.put(&ContentId::movie("3"), result_for("c.example")).await;

    let stats = cache.stats().await;
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.keys, vec!["movie-3".to_string()]);
}
