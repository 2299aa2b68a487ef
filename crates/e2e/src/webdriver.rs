//! WebDriver-backed browser session

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::{Capabilities, WindowHandle};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::BrowserConfig;
use crate::delay::delay;
use crate::error::{E2eError, E2eResult};
use crate::page::{Browser, Page};

struct SessionInner {
    driver: RwLock<Option<WebDriver>>,
    /// Tab opened with the session. Kept alive so closing a scenario page
    /// never ends the session.
    root: WindowHandle,
    config: BrowserConfig,
}

/// One WebDriver session shared by every scenario of a run
pub struct WebDriverSession {
    inner: Arc<SessionInner>,
}

impl WebDriverSession {
    /// Connect to the WebDriver server and apply timeouts and viewport.
    pub async fn start(config: BrowserConfig) -> E2eResult<Self> {
        info!(
            "Starting browser session at {} (headless: {})",
            config.webdriver_url, config.headless
        );

        let caps = build_capabilities(&config)?;
        let driver = WebDriver::new(&config.webdriver_url, caps)
            .await
            .map_err(|e| E2eError::DriverStartup(e.to_string()))?;

        driver.set_page_load_timeout(config.page_load_timeout).await?;
        driver.set_script_timeout(config.script_timeout).await?;
        driver
            .set_window_rect(0, 0, config.viewport_width, config.viewport_height)
            .await?;

        let root = driver.window().await?;

        Ok(Self {
            inner: Arc::new(SessionInner {
                driver: RwLock::new(Some(driver)),
                root,
                config,
            }),
        })
    }
}

#[async_trait]
impl Browser for WebDriverSession {
    async fn new_page(&self) -> E2eResult<Box<dyn Page>> {
        let guard = self.inner.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;

        let handle = driver.new_tab().await?;
        driver.switch_to_window(handle.clone()).await?;
        debug!("Opened page {}", handle);

        Ok(Box::new(WebDriverPage {
            session: Arc::clone(&self.inner),
        }))
    }

    async fn quit(&self) -> E2eResult<()> {
        let mut guard = self.inner.driver.write().await;
        if let Some(driver) = guard.take() {
            info!("Closing browser session");
            driver.quit().await?;
        }
        Ok(())
    }
}

/// The active tab of a [`WebDriverSession`]
pub struct WebDriverPage {
    session: Arc<SessionInner>,
}

impl WebDriverPage {
    /// Slow-motion pacing for visible runs.
    async fn pace(&self) {
        delay(self.session.config.interaction_delay).await;
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.pace().await;
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        driver.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        Ok(driver.current_url().await?.to_string())
    }

    async fn title(&self) -> E2eResult<String> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        Ok(driver.title().await?)
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        Ok(driver.find_all(By::Css(selector)).await?.len())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        driver
            .query(By::Css(selector))
            .wait(timeout, Duration::from_millis(100))
            .first()
            .await
            .map_err(|e| E2eError::Timeout(format!("{} ({})", selector, e)))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.pace().await;
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        let element = driver
            .find(By::Css(selector))
            .await
            .map_err(|_| E2eError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn text(&self, selector: &str) -> E2eResult<String> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        let element = driver
            .find(By::Css(selector))
            .await
            .map_err(|_| E2eError::ElementNotFound(selector.to_string()))?;
        Ok(element.text().await?)
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        self.pace().await;
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        driver.action_chain().send_keys(key).perform().await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> E2eResult<Value> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        let ret = driver.execute(script, args).await?;
        Ok(ret.json().clone())
    }

    async fn screenshot_png(&self) -> E2eResult<Vec<u8>> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        Ok(driver.screenshot_as_png().await?)
    }

    async fn window_handles(&self) -> E2eResult<Vec<String>> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        let handles = driver.windows().await?;
        Ok(handles.into_iter().map(|h| h.to_string()).collect())
    }

    async fn switch_to_window(&self, handle: &str) -> E2eResult<()> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;
        driver
            .switch_to_window(WindowHandle::from(handle.to_string()))
            .await?;
        Ok(())
    }

    /// Closes every tab the scenario opened, including tabs spawned by
    /// result links, and returns focus to the session's root tab.
    async fn close(&self) -> E2eResult<()> {
        let guard = self.session.driver.read().await;
        let driver = guard.as_ref().ok_or(E2eError::SessionNotStarted)?;

        for handle in driver.windows().await? {
            if handle == self.session.root {
                continue;
            }
            driver.switch_to_window(handle.clone()).await?;
            driver.close_window().await?;
            debug!("Closed page {}", handle);
        }

        driver.switch_to_window(self.session.root.clone()).await?;
        Ok(())
    }
}

fn build_capabilities(config: &BrowserConfig) -> E2eResult<Capabilities> {
    let mut caps = DesiredCapabilities::chrome();
    if config.headless {
        caps.add_arg("--headless=new")?;
    }
    caps.add_arg("--disable-dev-shm-usage")?;
    caps.add_arg("--autoplay-policy=no-user-gesture-required")?;
    caps.add_arg(&format!(
        "--window-size={},{}",
        config.viewport_width, config.viewport_height
    ))?;
    for arg in &config.browser_args {
        caps.add_arg(arg)?;
    }
    Ok(caps.into())
}
