//! In-memory video site used by the integration tests
//!
//! `FakeSite` models the pieces of the real site the suite touches: a
//! results listing, a watch view with a media element whose clock runs on
//! tokio time, an optional ad with a skip control, and browser tabs. Every
//! action the suite sends is recorded so tests can assert on exactly what
//! reached the page.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use vidplay_e2e::home::RESULT_SELECTOR;
use vidplay_e2e::reconcile::SKIP_SELECTORS;
use vidplay_e2e::video::{scripts, VIDEO_SELECTOR};
use vidplay_e2e::{Browser, E2eError, E2eResult, Page};

/// One thing the suite did to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Goto(String),
    Click(String),
    Key(String),
    Script(&'static str),
    Close(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Blank,
    Home,
    Results,
    Watch,
}

#[derive(Debug, Clone)]
pub struct Ad {
    /// Selector of the rendered skip control, if any
    pub skip_selector: Option<&'static str>,
    /// A real click on the control dismisses the ad
    pub click_works: bool,
    /// A synthetic DOM click dismisses the ad
    pub dom_click_works: bool,
    /// The ad finishes on its own after this long
    pub ends_after: Option<Duration>,
}

impl Ad {
    pub fn unskippable() -> Self {
        Self {
            skip_selector: None,
            click_works: false,
            dom_click_works: false,
            ends_after: None,
        }
    }

    pub fn skippable(selector: &'static str) -> Self {
        Self {
            skip_selector: Some(selector),
            click_works: true,
            dom_click_works: true,
            ends_after: None,
        }
    }
}

#[derive(Debug)]
pub struct SiteState {
    pub view: View,
    pub url: String,
    pub handles: Vec<String>,
    pub active: String,
    pub next_handle: u32,

    pub result_count: usize,
    pub result_opens_new_tab: bool,
    pub heading: String,
    pub document_title: String,

    pub video_present: bool,
    pub ready_state: u8,
    pub autoplay: bool,
    pub paused: bool,
    pub base_time: f64,
    pub playing_since: Option<Instant>,

    pub toggle_key_works: bool,
    pub play_fallback_works: bool,
    pub pause_fallback_works: bool,
    pub fullscreen: bool,
    pub fullscreen_key_works: bool,
    pub seek_key_works: bool,
    /// Not paused, but the clock does not advance
    pub stalled: bool,

    /// Ad shown when the watch view opens
    pub ad_on_open: Option<Ad>,
    pub ad: Option<(Ad, Instant)>,

    pub screenshot_fails: bool,

    pub log: Vec<Action>,
    pub pages_opened: usize,
    pub quit: bool,
}

impl Default for SiteState {
    fn default() -> Self {
        Self {
            view: View::Blank,
            url: "about:blank".to_string(),
            handles: vec!["root".to_string()],
            active: "root".to_string(),
            next_handle: 1,
            result_count: 3,
            result_opens_new_tab: false,
            heading: "Intro to QA automation".to_string(),
            document_title: "Intro to QA automation - Video".to_string(),
            video_present: true,
            ready_state: 4,
            autoplay: false,
            paused: true,
            base_time: 0.0,
            playing_since: None,
            toggle_key_works: true,
            play_fallback_works: true,
            pause_fallback_works: true,
            fullscreen: false,
            fullscreen_key_works: true,
            seek_key_works: true,
            stalled: false,
            ad_on_open: None,
            ad: None,
            screenshot_fails: false,
            log: Vec::new(),
            pages_opened: 0,
            quit: false,
        }
    }
}

impl SiteState {
    pub fn current_time(&self) -> f64 {
        let running = match self.playing_since {
            Some(_) if self.stalled => 0.0,
            Some(since) => since.elapsed().as_secs_f64(),
            None => 0.0,
        };
        self.base_time + running
    }

    fn start(&mut self) {
        if self.paused {
            self.paused = false;
            self.playing_since = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if !self.paused {
            self.base_time = self.current_time();
            self.playing_since = None;
            self.paused = true;
        }
    }

    fn toggle(&mut self) {
        if self.paused {
            self.start();
        } else {
            self.stop();
        }
    }

    pub fn ad_showing(&mut self) -> bool {
        let ended = match &self.ad {
            Some((ad, shown_at)) => ad.ends_after.is_some_and(|d| shown_at.elapsed() >= d),
            None => return false,
        };
        if ended {
            self.ad = None;
        }
        !ended
    }

    pub fn show_ad(&mut self, ad: Ad) {
        self.ad = Some((ad, Instant::now()));
    }

    fn skip_control(&mut self, selector: &str) -> Option<Ad> {
        if !self.ad_showing() {
            return None;
        }
        self.ad
            .as_ref()
            .filter(|(ad, _)| ad.skip_selector == Some(selector))
            .map(|(ad, _)| ad.clone())
    }

    fn has_video(&self) -> bool {
        self.view == View::Watch && self.video_present
    }

    fn open_watch(&mut self) {
        self.view = View::Watch;
        self.url = "http://video.test/watch?v=abc123".to_string();
        if let Some(ad) = self.ad_on_open.take() {
            self.show_ad(ad);
        }
        if self.autoplay {
            self.start();
        }
    }

    fn read_state(&mut self) -> Value {
        let present = self.has_video();
        let ad_showing = self.ad_showing();
        json!({
            "present": present,
            "paused": if present { self.paused } else { true },
            "ended": false,
            "readyState": if present { self.ready_state } else { 0 },
            "currentTime": if present { self.current_time() } else { 0.0 },
            "adShowing": ad_showing,
            "fullscreen": present && self.fullscreen,
        })
    }

    pub fn keys(&self) -> Vec<String> {
        self.log
            .iter()
            .filter_map(|a| match a {
                Action::Key(k) => Some(k.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn mutations(&self) -> usize {
        self.log
            .iter()
            .filter(|a| {
                matches!(
                    a,
                    Action::Key(_)
                        | Action::Click(_)
                        | Action::Script("play_fallback")
                        | Action::Script("pause_fallback")
                        | Action::Script("dom_click")
                )
            })
            .count()
    }
}

#[derive(Clone, Default)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub fn new(state: SiteState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap()
    }

    pub fn page(&self) -> FakePage {
        FakePage { site: self.clone() }
    }

    /// A page already on the watch view
    pub fn watch_page(&self) -> FakePage {
        self.state().open_watch();
        self.page()
    }

    pub fn browser(&self) -> Box<dyn Browser> {
        Box::new(FakeBrowser { site: self.clone() })
    }
}

pub struct FakePage {
    site: FakeSite,
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut s = self.site.state();
        s.log.push(Action::Goto(url.to_string()));
        s.url = url.to_string();
        s.view = if url.contains("/results") {
            View::Results
        } else if url.contains("watch?v=") {
            View::Watch
        } else {
            View::Home
        };
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.site.state().url.clone())
    }

    async fn title(&self) -> E2eResult<String> {
        Ok(self.site.state().document_title.clone())
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        let mut s = self.site.state();
        if selector == RESULT_SELECTOR {
            return Ok(if s.view == View::Results { s.result_count } else { 0 });
        }
        if selector == VIDEO_SELECTOR {
            return Ok(usize::from(s.has_video()));
        }
        if SKIP_SELECTORS.contains(&selector) {
            return Ok(usize::from(s.skip_control(selector).is_some()));
        }
        Ok(0)
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> E2eResult<()> {
        match self.count(selector).await? {
            0 => Err(E2eError::Timeout(selector.to_string())),
            _ => Ok(()),
        }
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        let mut s = self.site.state();
        s.log.push(Action::Click(selector.to_string()));

        if selector == RESULT_SELECTOR && s.view == View::Results && s.result_count > 0 {
            if s.result_opens_new_tab {
                let handle = format!("tab-{}", s.next_handle);
                s.next_handle += 1;
                s.handles.push(handle);
            }
            s.open_watch();
            return Ok(());
        }
        if selector == VIDEO_SELECTOR && s.has_video() {
            return Ok(());
        }
        if let Some(ad) = s.skip_control(selector) {
            if ad.click_works {
                s.ad = None;
                return Ok(());
            }
            return Err(E2eError::ElementNotFound(format!(
                "{} (not interactable)",
                selector
            )));
        }
        Err(E2eError::ElementNotFound(selector.to_string()))
    }

    async fn text(&self, selector: &str) -> E2eResult<String> {
        let s = self.site.state();
        if selector == "h1" && s.view == View::Watch {
            return Ok(s.heading.clone());
        }
        Err(E2eError::ElementNotFound(selector.to_string()))
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        let mut s = self.site.state();
        s.log.push(Action::Key(key.to_string()));
        if !s.has_video() {
            return Ok(());
        }
        match key {
            "k" if s.toggle_key_works => s.toggle(),
            "l" if s.seek_key_works => {
                s.base_time = s.current_time() + 10.0;
                if s.playing_since.is_some() {
                    s.playing_since = Some(Instant::now());
                }
            }
            "f" if s.fullscreen_key_works => s.fullscreen = !s.fullscreen,
            _ => {}
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> E2eResult<Value> {
        let mut s = self.site.state();

        if script == scripts::READ_STATE {
            s.log.push(Action::Script("read_state"));
            return Ok(s.read_state());
        }
        if script == scripts::PLAY_FALLBACK {
            s.log.push(Action::Script("play_fallback"));
            if !s.has_video() || !s.paused {
                return Ok(json!(false));
            }
            if s.play_fallback_works {
                s.start();
            }
            return Ok(json!(true));
        }
        if script == scripts::PAUSE_FALLBACK {
            s.log.push(Action::Script("pause_fallback"));
            if !s.has_video() || s.paused {
                return Ok(json!(false));
            }
            if s.pause_fallback_works {
                s.stop();
            }
            return Ok(json!(true));
        }
        if script == scripts::DOM_CLICK {
            s.log.push(Action::Script("dom_click"));
            let selector = args
                .first()
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            return Ok(match s.skip_control(&selector) {
                Some(ad) if ad.dom_click_works => {
                    s.ad = None;
                    json!(true)
                }
                Some(_) => json!(true),
                None => json!(false),
            });
        }

        Err(E2eError::ScriptResult(format!("unexpected script: {}", script)))
    }

    async fn screenshot_png(&self) -> E2eResult<Vec<u8>> {
        if self.site.state().screenshot_fails {
            return Err(E2eError::Timeout("screenshot".to_string()));
        }
        Ok(b"\x89PNG\r\n\x1a\nfake-frame".to_vec())
    }

    async fn window_handles(&self) -> E2eResult<Vec<String>> {
        Ok(self.site.state().handles.clone())
    }

    async fn switch_to_window(&self, handle: &str) -> E2eResult<()> {
        let mut s = self.site.state();
        if !s.handles.iter().any(|h| h == handle) {
            return Err(E2eError::ElementNotFound(format!("window {}", handle)));
        }
        s.active = handle.to_string();
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        let mut s = self.site.state();
        let active = s.active.clone();
        s.log.push(Action::Close(active.clone()));
        s.handles.retain(|h| h != &active);
        s.active = "root".to_string();
        Ok(())
    }
}

pub struct FakeBrowser {
    site: FakeSite,
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_page(&self) -> E2eResult<Box<dyn Page>> {
        let mut s = self.site.state();
        s.pages_opened += 1;
        let handle = format!("tab-{}", s.next_handle);
        s.next_handle += 1;
        s.handles.push(handle.clone());
        s.active = handle;
        s.view = View::Blank;
        drop(s);
        Ok(Box::new(self.site.page()))
    }

    async fn quit(&self) -> E2eResult<()> {
        self.site.state().quit = true;
        Ok(())
    }
}
