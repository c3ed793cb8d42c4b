use std::time::Duration;

use vidveil::model::ContentId;
use vidveil::server::services::lock_services::{
    LockAttempt, LockPolicy, LockService, LockServiceTrait,
};

fn lock_with(stale_ms: u64) -> LockService {
    LockService::new(LockPolicy {
        stale_after: Duration::from_millis(stale_ms),
    })
}

#[tokio::test]
async fn test_acquires_when_free() {
    let lock = lock_with(60_000);

    let attempt = lock.try_acquire(&ContentId::movie("550")).await;
    assert_eq!(
        attempt,
        LockAttempt::Acquired {
            took_over_stale: false
        }
    );
}

#[tokio::test]
async fn test_rejects_second_caller_while_held() {
    let lock = lock_with(60_000);

    lock.try_acquire(&ContentId::movie("550")).await;
    let attempt = lock.try_acquire(&ContentId::movie("551")).await;

    assert!(matches!(attempt, LockAttempt::Busy { .. }));
}

#[tokio::test]
async fn test_takes_over_stale_holder() {
    let lock = lock_with(20);

    lock.try_acquire(&ContentId::movie("550")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let attempt = lock.try_acquire(&ContentId::movie("551")).await;
    assert_eq!(
        attempt,
        LockAttempt::Acquired {
            took_over_stale: true
        }
    );

    // the new holder owns the lock now
    let status = lock.status().await.expect("lock should be held");
    assert_eq!(status.content_id, "movie-551");
    assert!(!status.stale);
}

#[tokio::test]
async fn test_release_frees_the_lock() {
    let lock = lock_with(60_000);

    lock.try_acquire(&ContentId::movie("550")).await;
    lock.release().await;

    assert!(lock.status().await.is_none());
    assert_eq!(
        lock.try_acquire(&ContentId::movie("551")).await,
        LockAttempt::Acquired {
            took_over_stale: false
        }
    );
}

#[tokio::test]
async fn test_release_when_free_is_a_noop() {
    let lock = lock_with(60_000);
    lock.release().await;
    assert!(lock.status().await.is_none());
}

#[tokio::test]
async fn test_status_reports_staleness() {
    let lock = lock_with(20);

    lock.try_acquire(&ContentId::tv("1399", 1, 1)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = lock.status().await.expect("lock should be held");
    assert_eq!(status.content_id, "tv-1399-s1e1");
    assert!(status.stale);
}
