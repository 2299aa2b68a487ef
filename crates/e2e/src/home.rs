//! Home view: landing page, search and result listing

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::delay::delay_until;
use crate::error::E2eResult;
use crate::page::Page;
use crate::video::VIDEO_SELECTOR;

/// Result links. The site has shipped two markups for them.
pub const RESULT_SELECTOR: &str = "ytd-video-renderer a#video-title, a#video-title-link";

/// Wait for results and for the watch page
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between tab / URL checks after clicking a result
pub const NAVIGATION_POLL: Duration = Duration::from_millis(100);

fn is_watch_url(url: &str) -> bool {
    url.contains("watch?v=")
}

/// Where the first result opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultNavigation {
    /// A new tab opened and is now active
    NewTab(String),
    /// The current tab navigated
    SameTab,
}

/// Build the results address for `keyword`.
pub fn search_url(base_url: &str, keyword: &str) -> E2eResult<String> {
    let mut url = Url::parse(&format!("{}/results", base_url.trim_end_matches('/')))?;
    url.query_pairs_mut().append_pair("search_query", keyword);
    Ok(url.into())
}

pub struct HomePage<'a> {
    page: &'a dyn Page,
    base_url: &'a str,
}

impl<'a> HomePage<'a> {
    pub fn new(page: &'a dyn Page, base_url: &'a str) -> Self {
        Self { page, base_url }
    }

    pub async fn open(&self) -> E2eResult<()> {
        info!("Opening {}", self.base_url);
        self.page.goto(self.base_url).await
    }

    /// Go straight to the results listing and wait for the first entry.
    pub async fn search(&self, keyword: &str) -> E2eResult<()> {
        let url = search_url(self.base_url, keyword)?;
        info!("Searching: {}", url);
        self.page.goto(&url).await?;
        self.page.wait_for(RESULT_SELECTOR, NAVIGATION_TIMEOUT).await
    }

    pub async fn result_count(&self) -> E2eResult<usize> {
        self.page.count(RESULT_SELECTOR).await
    }

    /// Click the first result and follow it, into a new tab if one opened.
    pub async fn open_first_result(&self) -> E2eResult<ResultNavigation> {
        self.page.wait_for(RESULT_SELECTOR, NAVIGATION_TIMEOUT).await?;

        let before = self.page.window_handles().await?;
        self.page.click(RESULT_SELECTOR).await?;

        // The click can return before a new tab is registered
        let deadline = Instant::now() + NAVIGATION_TIMEOUT;
        loop {
            let after = self.page.window_handles().await?;
            if let Some(handle) = after.into_iter().find(|h| !before.contains(h)) {
                info!("First result opened in a new tab");
                self.page.switch_to_window(&handle).await?;
                return Ok(ResultNavigation::NewTab(handle));
            }

            if is_watch_url(&self.page.current_url().await?) {
                return Ok(ResultNavigation::SameTab);
            }

            if Instant::now() >= deadline {
                break;
            }
            delay_until(NAVIGATION_POLL, deadline).await;
        }

        debug!("No new tab or watch URL after clicking the first result");
        if let Err(e) = self
            .page
            .wait_for(VIDEO_SELECTOR, NAVIGATION_TIMEOUT)
            .await
        {
            debug!("No video element after opening result: {}", e);
        }
        Ok(ResultNavigation::SameTab)
    }
}
