// wires session + driver + sniffer + state machine into the single
// operation the coordinator consumes
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use tracing::{error, info};

use crate::browser::driver::{BrowserDriver, CdpDriver};
use crate::browser::session::BrowserSession;
use crate::browser::sniffer::NetworkSniffer;
use crate::browser::state_machine::{ExtractionStateMachine, MachinePolicy};
use crate::model::{ContentId, MediaType, SubtitleTrack};
use crate::server::error::AppResult;

pub type DynExtractionRunner = Arc<dyn ExtractionRunnerTrait + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub manifest_url: String,
    pub referer: String,
    pub subtitles: Vec<SubtitleTrack>,
}

#[automock]
#[async_trait]
pub trait ExtractionRunnerTrait {
    /// one full browser-driven extraction; only ever called with the
    /// single-flight lock held
    async fn run(&self, id: &ContentId, target_server: &str) -> AppResult<ExtractionOutcome>;

    /// discard the browser session; the next run launches fresh
    async fn reset(&self);

    async fn is_alive(&self) -> bool;
}

pub struct BrowserRunner {
    session: Arc<BrowserSession>,
    embed_base: String,
    policy: MachinePolicy,
}

impl BrowserRunner {
    pub fn new(session: Arc<BrowserSession>, embed_base: String, policy: MachinePolicy) -> Self {
        Self {
            session,
            embed_base,
            policy,
        }
    }

    fn embed_url(&self, id: &ContentId) -> String {
        match id.media_type {
            MediaType::Movie => format!("{}/movie/{}", self.embed_base, id.external_id),
            MediaType::Tv => format!(
                "{}/tv/{}/{}/{}",
                self.embed_base,
                id.external_id,
                id.season.unwrap_or(1),
                id.episode.unwrap_or(1)
            ),
        }
    }
}

#[async_trait]
impl ExtractionRunnerTrait for BrowserRunner {
    async fn run(&self, id: &ContentId, target_server: &str) -> AppResult<ExtractionOutcome> {
        let embed_url = self.embed_url(id);
        info!("starting extraction for {} at {}", id, embed_url);

        let page = self.session.page().await?;

        let sniffer = NetworkSniffer::new();
        let observer_tasks = sniffer.attach(&page).await?;

        // interstitial popups steal focus and pile up; keep only the
        // primary tab while the flow runs
        let popup_session = self.session.clone();
        let popup_task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                popup_session.close_stray_tabs().await;
            }
        });

        let driver = CdpDriver::new(page);
        let machine = ExtractionStateMachine::new(&driver, &sniffer, self.policy.clone());
        let outcome = machine.run(&embed_url, target_server).await;

        // observers stop with the run, success or not
        popup_task.abort();
        for task in observer_tasks {
            task.abort();
        }

        match outcome {
            Ok(done) => {
                info!("extraction for {} captured {}", id, done.manifest_url);
                Ok(ExtractionOutcome {
                    manifest_url: done.manifest_url,
                    referer: done.referer,
                    subtitles: sniffer.subtitles(),
                })
            }
            Err(e) => {
                error!("extraction for {} failed: {}", id, e);
                Err(e)
            }
        }
    }

    async fn reset(&self) {
        self.session.reset().await;
    }

    async fn is_alive(&self) -> bool {
        self.session.is_alive().await
    }
}
