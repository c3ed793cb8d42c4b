// capability seam between the scraping heuristics and the automation
// engine; substituting another engine only needs a new impl of this trait
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use mockall::automock;
use tracing::debug;

use crate::server::error::{AppResult, Error};

#[automock]
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> AppResult<()>;

    async fn reload(&self) -> AppResult<()>;

    async fn current_url(&self) -> AppResult<String>;

    /// run a script in the page; `null` when the page returns nothing usable
    async fn evaluate(&self, script: &str) -> AppResult<serde_json::Value>;

    /// synthetic pointer click at viewport coordinates
    async fn click_at(&self, x: f64, y: f64) -> AppResult<()>;
}

/// Any CDP-level failure means the tab context is gone or wedged, which
/// callers treat as a corrupted session rather than a step failure.
fn corrupted(e: impl std::fmt::Display) -> Error {
    Error::SessionCorrupted(e.to_string())
}

pub struct CdpDriver {
    page: Page,
}

impl CdpDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        debug!("navigating to {}", url);
        self.page.goto(url).await.map_err(corrupted)?;
        self.page.wait_for_navigation().await.map_err(corrupted)?;
        Ok(())
    }

    async fn reload(&self) -> AppResult<()> {
        self.page.reload().await.map_err(corrupted)?;
        Ok(())
    }

    async fn current_url(&self) -> AppResult<String> {
        let url = self.page.url().await.map_err(corrupted)?;
        Ok(url.unwrap_or_default())
    }

    async fn evaluate(&self, script: &str) -> AppResult<serde_json::Value> {
        let result = self.page.evaluate(script).await.map_err(corrupted)?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn click_at(&self, x: f64, y: f64) -> AppResult<()> {
        debug!("clicking at ({:.0}, {:.0})", x, y);

        let down = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MousePressed)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(Error::InternalServerErrorWithContext)?;
        self.page.execute(down).await.map_err(corrupted)?;

        tokio::time::sleep(Duration::from_millis(60)).await;

        let up = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseReleased)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(Error::InternalServerErrorWithContext)?;
        self.page.execute(up).await.map_err(corrupted)?;

        Ok(())
    }
}
