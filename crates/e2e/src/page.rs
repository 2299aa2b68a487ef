//! Remote page primitives
//!
//! Everything the suite does to the site goes through [`Page`]. The WebDriver
//! implementation lives in [`crate::webdriver`]; tests substitute an
//! in-memory page.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::E2eResult;

/// A single document view in the browser
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait for DOM content.
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    /// Document title.
    async fn title(&self) -> E2eResult<String>;

    /// Number of elements matching a CSS selector.
    async fn count(&self, selector: &str) -> E2eResult<usize>;

    /// Wait until at least one element matches `selector`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> E2eResult<()>;

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> E2eResult<()>;

    /// Text content of the first element matching `selector`.
    async fn text(&self, selector: &str) -> E2eResult<String>;

    /// Press a key on the focused document.
    async fn press_key(&self, key: &str) -> E2eResult<()>;

    /// Run a script in the page. Arguments are exposed as `arguments[n]`.
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> E2eResult<Value>;

    /// PNG bytes of the visible viewport.
    async fn screenshot_png(&self) -> E2eResult<Vec<u8>>;

    /// Handles of every open tab in the session.
    async fn window_handles(&self) -> E2eResult<Vec<String>>;

    /// Make `handle` the active tab for all further calls.
    async fn switch_to_window(&self, handle: &str) -> E2eResult<()>;

    /// Close the active tab.
    async fn close(&self) -> E2eResult<()>;
}

/// Source of pages for the lifecycle hooks
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh page for one scenario.
    async fn new_page(&self) -> E2eResult<Box<dyn Page>>;

    /// End the session.
    async fn quit(&self) -> E2eResult<()>;
}

/// Which path of a multi-strategy interaction took effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Simulated user input (click, key press)
    Primary,
    /// Direct DOM or media-element call
    Fallback,
}
