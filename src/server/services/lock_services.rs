// process-wide single-flight lock over the browser session
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use tracing::{info, warn};

use crate::model::ContentId;

pub type DynLockService = Arc<dyn LockServiceTrait + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LockPolicy {
    /// a holder older than this is presumed crashed and taken over
    pub stale_after: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LockAttempt {
    /// lock acquired; `took_over_stale` means the previous holder was
    /// force-released and the browser state should be presumed corrupt
    Acquired { took_over_stale: bool },
    Busy { held_for: Duration },
}

#[derive(Debug, Clone, Serialize)]
pub struct LockStatus {
    pub content_id: String,
    pub held_for_secs: u64,
    pub stale: bool,
}

#[automock]
#[async_trait]
pub trait LockServiceTrait {
    async fn try_acquire(&self, id: &ContentId) -> LockAttempt;

    async fn release(&self);

    async fn status(&self) -> Option<LockStatus>;
}

struct LockState {
    content_id: String,
    started_at: Instant,
}

pub struct LockService {
    state: Mutex<Option<LockState>>,
    policy: LockPolicy,
}

impl LockService {
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            state: Mutex::new(None),
            policy,
        }
    }
}

#[async_trait]
impl LockServiceTrait for LockService {
    async fn try_acquire(&self, id: &ContentId) -> LockAttempt {
        let mut state = self.state.lock().unwrap();

        let took_over_stale = match state.as_ref() {
            None => false,
            Some(held) if held.started_at.elapsed() >= self.policy.stale_after => {
                warn!(
                    "lock for {} held {}s, presuming crashed extraction and taking over",
                    held.content_id,
                    held.started_at.elapsed().as_secs()
                );
                true
            }
            Some(held) => {
                return LockAttempt::Busy {
                    held_for: held.started_at.elapsed(),
                };
            }
        };

        *state = Some(LockState {
            content_id: id.to_string(),
            started_at: Instant::now(),
        });
        info!("extraction lock acquired for {}", id);

        LockAttempt::Acquired { took_over_stale }
    }

    async fn release(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(held) = state.take() {
            info!(
                "extraction lock released for {} after {}s",
                held.content_id,
                held.started_at.elapsed().as_secs()
            );
        }
    }

    async fn status(&self) -> Option<LockStatus> {
        let state = self.state.lock().unwrap();
        state.as_ref().map(|held| LockStatus {
            content_id: held.content_id.clone(),
            held_for_secs: held.started_at.elapsed().as_secs(),
            stale: held.started_at.elapsed() >= self.policy.stale_after,
        })
    }
}
