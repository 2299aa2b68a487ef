//! Lifecycle hooks
//!
//! The browser session lives for the whole run; each scenario gets its own
//! page, opened before its first step and closed after its last.

use tracing::{info, warn};

use crate::config::SuiteConfig;
use crate::error::E2eResult;
use crate::evidence;
use crate::page::{Browser, Page};

pub struct Hooks {
    browser: Box<dyn Browser>,
}

impl Hooks {
    /// Prepare output directories and take ownership of the session.
    pub fn before_all(browser: Box<dyn Browser>, config: &SuiteConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.reports_dir)?;
        std::fs::create_dir_all(&config.screenshot_dir)?;
        Ok(Self { browser })
    }

    /// Fresh page for the next scenario.
    pub async fn before(&self) -> E2eResult<Box<dyn Page>> {
        self.browser.new_page().await
    }

    /// Capture failure evidence and close the scenario's page.
    ///
    /// Never fails: evidence is best-effort and a page that will not close
    /// is only logged. Returns notes for the report.
    pub async fn after(
        &self,
        page: Box<dyn Page>,
        scenario: &str,
        failed: bool,
        config: &SuiteConfig,
    ) -> Vec<String> {
        let mut notes = Vec::new();

        if failed {
            let path = evidence::failure_screenshot_path(&config.screenshot_dir, scenario);
            match evidence::save_screenshot(page.as_ref(), &path).await {
                Ok(saved) => {
                    notes.push(format!("Saved failure screenshot to {}", saved.describe()))
                }
                Err(e) => warn!("Could not capture failure screenshot for '{}': {}", scenario, e),
            }
        }

        if let Err(e) = page.close().await {
            warn!("Failed to close page for '{}': {}", scenario, e);
        }

        notes
    }

    /// End the browser session.
    pub async fn after_all(self) -> E2eResult<()> {
        info!("Shutting down browser session");
        self.browser.quit().await
    }
}
