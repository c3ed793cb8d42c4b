// one long-lived automated browser and its primary tab
use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::server::error::{AppResult, Error};

const LAUNCH_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub executable: Option<String>,
    pub headless: bool,
}

struct SessionInner {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
}

pub struct BrowserSession {
    inner: Mutex<Option<SessionInner>>,
    config: SessionConfig,
}

/// Find a usable Chromium-family executable: explicit config, then PATH,
/// then well-known install locations.
fn find_chrome_executable(configured: Option<&str>) -> Option<String> {
    if let Some(p) = configured {
        if Path::new(p).exists() {
            return Some(p.to_string());
        }
        warn!("configured chrome executable {} does not exist", p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = ["google-chrome", "chromium", "chromium-browser", "chrome"];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/local/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    candidates
        .iter()
        .find(|c| Path::new(c).exists())
        .map(|c| c.to_string())
}

impl BrowserSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Mutex::new(None),
            config,
        }
    }

    async fn launch(&self) -> AppResult<SessionInner> {
        let exe = find_chrome_executable(self.config.executable.as_deref())
            .ok_or_else(|| Error::BrowserLaunch("no chromium executable found".to_string()))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&exe)
            .window_size(1280, 720)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-background-networking")
            .arg("--mute-audio")
            .arg("--autoplay-policy=no-user-gesture-required");

        if !self.config.headless {
            builder = builder.with_head();
        }

        let config = builder.build().map_err(Error::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::BrowserLaunch(e.to_string()))?;

        // the handler future drives the CDP websocket; it runs until the
        // browser process goes away
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::BrowserLaunch(e.to_string()))?;

        info!("browser launched ({})", exe);

        Ok(SessionInner {
            browser,
            handler_task,
            page,
        })
    }

    /// Lightweight probe that fails fast when the tab context is gone.
    async fn probe(page: &Page) -> bool {
        page.evaluate("1 + 1").await.is_ok()
    }

    /// Primary tab, launching or relaunching as needed. A failed probe
    /// means the session is corrupt; it is torn down and retried fresh.
    pub async fn page(&self) -> AppResult<Page> {
        let mut attempts = 0u32;

        loop {
            {
                let mut inner = self.inner.lock().await;

                if inner.is_none() {
                    match self.launch().await {
                        Ok(session) => *inner = Some(session),
                        Err(e) => {
                            if attempts >= LAUNCH_RETRIES {
                                return Err(e);
                            }
                            error!("browser launch failed, retrying: {}", e);
                            attempts += 1;
                            continue;
                        }
                    }
                }

                let session = inner.as_ref().unwrap();
                if Self::probe(&session.page).await {
                    return Ok(session.page.clone());
                }

                warn!("browser session failed health probe, relaunching");
                if let Some(mut dead) = inner.take() {
                    let _ = dead.browser.close().await;
                    dead.handler_task.abort();
                }
            }

            if attempts >= LAUNCH_RETRIES {
                return Err(Error::BrowserLaunch(
                    "browser session unusable after retries".to_string(),
                ));
            }
            attempts += 1;
        }
    }

    /// Tear the session down; the next `page()` call launches fresh.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut session) = inner.take() {
            info!("tearing down browser session");
            let _ = session.browser.close().await;
            session.handler_task.abort();
        }
    }

    pub async fn is_alive(&self) -> bool {
        let inner = self.inner.lock().await;
        match inner.as_ref() {
            Some(session) => Self::probe(&session.page).await,
            None => false,
        }
    }

    /// Close any popup/child tab the interstitial spawned and hand focus
    /// back to the primary tab.
    pub async fn close_stray_tabs(&self) {
        let inner = self.inner.lock().await;
        let Some(session) = inner.as_ref() else {
            return;
        };

        let Ok(pages) = session.browser.pages().await else {
            return;
        };

        let primary = session.page.target_id().clone();
        let mut closed = 0usize;

        for page in pages {
            if *page.target_id() != primary {
                let _ = page.close().await;
                closed += 1;
            }
        }

        if closed > 0 {
            info!("closed {} stray tab(s)", closed);
            let _ = session.page.bring_to_front().await;
        }
    }
}
