// multi-phase UI automation flow: dismiss ad, find play/servers, switch
// server, wait for the sniffer to catch the manifest
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::browser::driver::BrowserDriver;
use crate::browser::sniffer::NetworkSniffer;
use crate::server::error::{AppResult, Error};

/// iteration caps and waits for the bounded polling loops, pulled out so
/// tests don't depend on real timing
#[derive(Debug, Clone)]
pub struct MachinePolicy {
    pub interstitial_attempts: u32,
    pub locate_attempts: u32,
    pub server_attempts: u32,
    pub step_delay: Duration,
    pub manifest_wait: Duration,
    pub manifest_poll: Duration,
}

impl Default for MachinePolicy {
    fn default() -> Self {
        Self {
            interstitial_attempts: 5,
            locate_attempts: 5,
            server_attempts: 4,
            step_delay: Duration::from_millis(800),
            manifest_wait: Duration::from_secs(4),
            manifest_poll: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MachineOutcome {
    pub manifest_url: String,
    pub referer: String,
}

#[derive(Debug, Default, Deserialize)]
struct ClickTarget {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    fatal: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
struct LocateHits {
    servers: Option<Point>,
    play: Option<Point>,
}

/// Looks for an ad-skip affordance by page text; only clicks something
/// visible, plausibly button-sized and in the top half of the viewport.
/// Also flags fatal error pages so the caller can reload.
const DISMISS_SCRIPT: &str = r#"
    (function() {
        var bodyText = (document.body && document.body.innerText) || '';
        if (/404 not found|502 bad gateway|server error/i.test(bodyText)) {
            return { fatal: true };
        }
        var els = document.querySelectorAll('div,span,button,a');
        for (var i = 0; i < els.length; i++) {
            var el = els[i];
            var t = (el.textContent || '').trim();
            if (t.length > 40) continue;
            if (!/(skip|close ad|continue to video)/i.test(t)) continue;
            var r = el.getBoundingClientRect();
            if (r.width < 20 || r.width > 500 || r.height < 10 || r.height > 120) continue;
            if (r.top < 0 || r.top > window.innerHeight * 0.5) continue;
            var st = window.getComputedStyle(el);
            if (st.display === 'none' || st.visibility === 'hidden' || st.opacity === '0') continue;
            return { found: true, x: r.left + r.width / 2, y: r.top + r.height / 2 };
        }
        return { found: false };
    })()
"#;

/// One pass that reports both a servers affordance and a play control, so
/// the caller can prefer the servers list and skip playing entirely.
const LOCATE_SCRIPT: &str = r#"
    (function() {
        function center(el) {
            var r = el.getBoundingClientRect();
            if (r.width === 0 || r.height === 0) return null;
            var st = window.getComputedStyle(el);
            if (st.display === 'none' || st.visibility === 'hidden') return null;
            return { x: r.left + r.width / 2, y: r.top + r.height / 2 };
        }
        var out = { servers: null, play: null };
        var els = document.querySelectorAll('div,span,button,a,li');
        for (var i = 0; i < els.length; i++) {
            var el = els[i];
            var t = (el.textContent || '').trim().toLowerCase();
            if (!out.servers && /^servers?$/.test(t)) {
                out.servers = center(el);
            }
        }
        var plays = document.querySelectorAll(
            'button[class*="play" i], div[class*="play" i], [aria-label*="play" i]');
        for (var j = 0; j < plays.length; j++) {
            var p = center(plays[j]);
            if (p) { out.play = p; break; }
        }
        return out;
    })()
"#;

/// Same-origin iframe poll for a player play control; coordinates are
/// translated back into the top viewport for the synthetic click.
const FRAME_PLAY_SCRIPT: &str = r#"
    (function() {
        var frames = document.querySelectorAll('iframe');
        for (var i = 0; i < frames.length; i++) {
            var frame = frames[i];
            var doc;
            try { doc = frame.contentDocument; } catch (e) { continue; }
            if (!doc) continue;
            var btn = doc.querySelector(
                '.jw-icon-play, .vjs-big-play-button, button[aria-label*="play" i]');
            if (!btn) continue;
            var fr = frame.getBoundingClientRect();
            var br = btn.getBoundingClientRect();
            if (br.width === 0 || br.height === 0) continue;
            return {
                found: true,
                x: fr.left + br.left + br.width / 2,
                y: fr.top + br.top + br.height / 2
            };
        }
        return { found: false };
    })()
"#;

impl MachinePolicy {
    fn server_match_script(target: &str) -> String {
        // serde_json gives us a safely quoted JS string literal
        let needle = serde_json::to_string(&target.to_lowercase())
            .unwrap_or_else(|_| "\"\"".to_string());
        format!(
            r#"
            (function() {{
                var needle = {needle};
                var best = null;
                var bestArea = Infinity;
                var els = document.querySelectorAll('div,span,li,button,a');
                for (var i = 0; i < els.length; i++) {{
                    var el = els[i];
                    var t = (el.textContent || '').trim().toLowerCase();
                    if (t.indexOf(needle) === -1) continue;
                    var r = el.getBoundingClientRect();
                    if (r.width === 0 || r.height === 0) continue;
                    var st = window.getComputedStyle(el);
                    if (st.display === 'none' || st.visibility === 'hidden') continue;
                    var area = r.width * r.height;
                    if (area < bestArea) {{
                        bestArea = area;
                        best = {{ found: true, x: r.left + r.width / 2, y: r.top + r.height / 2 }};
                    }}
                }}
                return best || {{ found: false }};
            }})()
            "#
        )
    }
}

pub struct ExtractionStateMachine<'a> {
    driver: &'a dyn BrowserDriver,
    sniffer: &'a NetworkSniffer,
    policy: MachinePolicy,
}

impl<'a> ExtractionStateMachine<'a> {
    pub fn new(
        driver: &'a dyn BrowserDriver,
        sniffer: &'a NetworkSniffer,
        policy: MachinePolicy,
    ) -> Self {
        Self {
            driver,
            sniffer,
            policy,
        }
    }

    pub async fn run(&self, embed_url: &str, target_server: &str) -> AppResult<MachineOutcome> {
        self.driver.navigate(embed_url).await?;

        let page_url = self
            .driver
            .current_url()
            .await
            .unwrap_or_else(|_| embed_url.to_string());
        self.sniffer.set_page_url(&page_url);

        self.dismiss_interstitial().await?;

        if self.sniffer.manifest().is_none() {
            self.locate_play_or_servers().await?;
        }

        if self.sniffer.manifest().is_none() {
            self.select_target_server(target_server).await?;
        }

        self.await_manifest().await;

        match self.sniffer.manifest() {
            Some(hit) => Ok(MachineOutcome {
                manifest_url: hit.url,
                referer: hit.referer,
            }),
            None => Err(Error::ManifestNotFound),
        }
    }

    async fn eval_target(&self, script: &str) -> AppResult<ClickTarget> {
        let value = self.driver.evaluate(script).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Bounded poll for the ad-skip affordance; gives up after the cap and
    /// proceeds, since manifest capture may still succeed later.
    async fn dismiss_interstitial(&self) -> AppResult<()> {
        for attempt in 0..self.policy.interstitial_attempts {
            let target = self.eval_target(DISMISS_SCRIPT).await?;

            if target.fatal {
                warn!("fatal page error detected, reloading");
                self.driver.reload().await?;
                tokio::time::sleep(self.policy.step_delay).await;
                continue;
            }

            if target.found {
                info!("dismissing ad interstitial (attempt {})", attempt + 1);
                // a missed click is not an error, the next poll re-checks
                let _ = self.driver.click_at(target.x, target.y).await;
            }

            tokio::time::sleep(self.policy.step_delay).await;

            let gone = self.eval_target(DISMISS_SCRIPT).await?;
            if !gone.found && !gone.fatal {
                return Ok(());
            }
        }

        debug!("interstitial still present after retries, proceeding anyway");
        Ok(())
    }

    /// Finds the servers affordance and/or a play control in one page
    /// evaluation; servers wins because switching skips playback entirely.
    async fn locate_play_or_servers(&self) -> AppResult<()> {
        for attempt in 0..self.policy.locate_attempts {
            if self.sniffer.manifest().is_some() {
                return Ok(());
            }

            let value = self.driver.evaluate(LOCATE_SCRIPT).await?;
            let hits: LocateHits = serde_json::from_value(value).unwrap_or_default();

            if hits.servers.is_some() {
                debug!("servers affordance present, skipping playback");
                return Ok(());
            }

            if let Some(play) = hits.play {
                info!("clicking play control (attempt {})", attempt + 1);
                let _ = self.driver.click_at(play.x, play.y).await;
            } else {
                // embedded players often swallow the control; poke frames,
                // then fall back to a center click
                let frame = self.eval_target(FRAME_PLAY_SCRIPT).await?;
                if frame.found {
                    let _ = self.driver.click_at(frame.x, frame.y).await;
                } else {
                    let _ = self.driver.click_at(640.0, 360.0).await;
                }
            }

            tokio::time::sleep(self.policy.step_delay).await;
        }

        Ok(())
    }

    /// Opens the server list and clicks the entry matching the target name
    /// case-insensitively, preferring the smallest bounding area among
    /// matches. The click arms the sniffer; anything seen before it is
    /// discarded.
    async fn select_target_server(&self, target_server: &str) -> AppResult<()> {
        let match_script = MachinePolicy::server_match_script(target_server);

        for attempt in 0..self.policy.server_attempts {
            if self.sniffer.manifest().is_some() {
                return Ok(());
            }

            // re-find the servers affordance each round; the DOM moves
            let value = self.driver.evaluate(LOCATE_SCRIPT).await?;
            let hits: LocateHits = serde_json::from_value(value).unwrap_or_default();
            if let Some(servers) = hits.servers {
                let _ = self.driver.click_at(servers.x, servers.y).await;
                tokio::time::sleep(self.policy.step_delay).await;
            }

            let target = self.eval_target(&match_script).await?;
            if target.found {
                info!(
                    "switching to server '{}' (attempt {})",
                    target_server,
                    attempt + 1
                );
                self.driver.click_at(target.x, target.y).await?;
                self.sniffer.mark_switched();
                return Ok(());
            }

            tokio::time::sleep(self.policy.step_delay).await;
        }

        warn!("target server '{}' never appeared in the list", target_server);
        Ok(())
    }

    /// Bounded wait for the sniffer; at the midpoint an in-frame play click
    /// nudges playback if nothing has loaded yet.
    async fn await_manifest(&self) {
        let deadline = tokio::time::Instant::now() + self.policy.manifest_wait;
        let midpoint = tokio::time::Instant::now() + self.policy.manifest_wait / 2;
        let mut nudged = false;

        while tokio::time::Instant::now() < deadline {
            if self.sniffer.manifest().is_some() {
                return;
            }

            if !nudged && tokio::time::Instant::now() >= midpoint {
                nudged = true;
                if let Ok(frame) = self.eval_target(FRAME_PLAY_SCRIPT).await {
                    if frame.found {
                        debug!("nudging in-frame play control");
                        let _ = self.driver.click_at(frame.x, frame.y).await;
                    }
                }
            }

            tokio::time::sleep(self.policy.manifest_poll).await;
        }
    }
}
