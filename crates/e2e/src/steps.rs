//! Scenario steps
//!
//! Step phrases are matched by text into [`StepKind`]; [`run_step`] composes
//! the page objects and reconciliation helpers and owns every assertion.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

use crate::config::SuiteConfig;
use crate::delay::delay;
use crate::error::{E2eError, E2eResult};
use crate::evidence;
use crate::home::{HomePage, ResultNavigation};
use crate::page::Page;
use crate::reconcile::{self, AdOutcome};
use crate::video::VideoPage;

/// Seconds skipped by the seek step
pub const SEEK_SECONDS: f64 = 15.0;

/// Wait after seeking before sampling the time again
pub const SEEK_SETTLE: Duration = Duration::from_millis(800);

/// Minimum advance the seek assertion accepts
pub const MIN_SEEK_ADVANCE: f64 = 5.0;

/// Every phrase the suite understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    OpenSite,
    /// Search for the configured keyword, or the quoted one
    Search(Option<String>),
    AssertResults,
    OpenFirstResult,
    AssertPlaying,
    Pause,
    AssertPaused,
    SeekForward,
    AssertTimeAdvanced,
    Screenshot,
    AssertScreenshotExists,
    AssertTitle,
}

fn quoted_search() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^I search for "([^"]+)"$"#).expect("search regex is valid"))
}

impl StepKind {
    /// Match a step phrase, keyword already stripped.
    pub fn parse(text: &str) -> E2eResult<Self> {
        let text = text.trim();
        let kind = match text {
            "I open the video site" => StepKind::OpenSite,
            "I search for a keyword" => StepKind::Search(None),
            "I should see at least one search result" => StepKind::AssertResults,
            "I open the first video result" => StepKind::OpenFirstResult,
            "the video should start playing" => StepKind::AssertPlaying,
            "I pause the video" => StepKind::Pause,
            "the video should be paused" => StepKind::AssertPaused,
            "I seek forward in the video" => StepKind::SeekForward,
            "the video time should have advanced" => StepKind::AssertTimeAdvanced,
            "I take a screenshot while playing" => StepKind::Screenshot,
            "the screenshot file should exist" => StepKind::AssertScreenshotExists,
            "the video title should not be empty" => StepKind::AssertTitle,
            other => match quoted_search().captures(other) {
                Some(caps) => StepKind::Search(Some(caps[1].to_string())),
                None => return Err(E2eError::UnknownStep(other.to_string())),
            },
        };
        Ok(kind)
    }
}

/// Values handed from one step to a later assertion in the same scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioContext {
    pub screenshot_path: Option<PathBuf>,
    /// Playback time before seeking
    pub t0: Option<f64>,
    /// Playback time after seeking
    pub t1: Option<f64>,
}

/// Everything a step can touch. One per scenario.
pub struct World<'a> {
    pub page: Box<dyn Page>,
    pub config: &'a SuiteConfig,
    pub ctx: ScenarioContext,
    attachments: Vec<String>,
}

impl<'a> World<'a> {
    pub fn new(page: Box<dyn Page>, config: &'a SuiteConfig) -> Self {
        Self {
            page,
            config,
            ctx: ScenarioContext::default(),
            attachments: Vec::new(),
        }
    }

    /// Record a note on the current step.
    pub fn attach(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("[attach] {}", message);
        self.attachments.push(message);
    }

    /// Notes recorded since the last call.
    pub fn take_attachments(&mut self) -> Vec<String> {
        std::mem::take(&mut self.attachments)
    }

    fn home(&self) -> HomePage<'_> {
        HomePage::new(self.page.as_ref(), &self.config.base_url)
    }

    fn video(&self) -> VideoPage<'_> {
        VideoPage::new(self.page.as_ref(), &self.config.timings)
    }
}

/// Execute one step against the scenario's world.
pub async fn run_step(world: &mut World<'_>, step: &StepKind) -> E2eResult<()> {
    match step {
        StepKind::OpenSite => {
            world.home().open().await?;
            let url = world.config.base_url.clone();
            world.attach(format!("Opened: {}", url));
        }

        StepKind::Search(keyword) => {
            let keyword = keyword
                .clone()
                .unwrap_or_else(|| world.config.keyword.clone());
            world.home().search(&keyword).await?;
            world.attach(format!("Searched for: {}", keyword));
        }

        StepKind::AssertResults => {
            let count = world.home().result_count().await?;
            world.attach(format!("Result count: {}", count));
            if count < 1 {
                return Err(E2eError::assertion(
                    "Expected at least one search result",
                    ">= 1",
                    count,
                ));
            }
        }

        StepKind::OpenFirstResult => {
            let navigation = world.home().open_first_result().await?;
            if let ResultNavigation::NewTab(handle) = &navigation {
                world.attach(format!("Switched to new tab {}", handle));
            }

            let (ad, fullscreen, playing) = {
                let video = world.video();
                video.ensure_player_ready().await?;
                let ad = reconcile::skip_ad(&video).await?;
                let (fullscreen, playing) = video.ensure_fullscreen_and_playing().await?;
                (ad, fullscreen, playing)
            };
            if ad != AdOutcome::NoAd {
                world.attach(format!("Ad: {:?}", ad));
            }
            world.attach(format!("Fullscreen: {:?}; playback: {:?}", fullscreen, playing));
        }

        StepKind::AssertPlaying => {
            let playing = {
                let video = world.video();
                reconcile::ensure_playing(&video).await?;
                video.is_playing().await?
            };
            world.attach(format!("Playing status: {}", playing));
            if !playing {
                return Err(E2eError::assertion(
                    "Expected video to be playing",
                    "playing",
                    "not playing",
                ));
            }
        }

        StepKind::Pause => {
            let outcome = reconcile::ensure_paused(&world.video()).await?;
            world.attach(format!(
                "Pause from {:?} (recovered: {}): {:?}",
                outcome.entry, outcome.recovered, outcome.result
            ));
        }

        StepKind::AssertPaused => {
            let snapshot = world.video().snapshot().await?;
            if snapshot.is_playing(&world.config.timings.heuristic) {
                return Err(E2eError::assertion(
                    "Expected video to be paused",
                    "paused",
                    format!("playing at {:.2}s", snapshot.current_time),
                ));
            }
        }

        StepKind::SeekForward => {
            let (t0, t1, ad) = {
                let video = world.video();
                reconcile::ensure_playing(&video).await?;
                let t0 = video.current_time().await?;
                let ad = reconcile::skip_ad(&video).await?;
                video.seek_forward(SEEK_SECONDS).await;
                delay(SEEK_SETTLE).await;
                let t1 = video.current_time().await?;
                (t0, t1, ad)
            };
            world.ctx.t0 = Some(t0);
            world.ctx.t1 = Some(t1);
            if ad != AdOutcome::NoAd {
                world.attach(format!("Ad: {:?}", ad));
            }
            world.attach(format!(
                "Time before: {:.2}s; after seek: {:.2}s",
                t0, t1
            ));
        }

        StepKind::AssertTimeAdvanced => {
            let (t0, t1) = match (world.ctx.t0, world.ctx.t1) {
                (Some(t0), Some(t1)) => (t0, t1),
                _ => {
                    return Err(E2eError::MissingContext(
                        "seek times not recorded; run the seek step first".to_string(),
                    ))
                }
            };
            if t1 <= t0 + MIN_SEEK_ADVANCE {
                return Err(E2eError::assertion(
                    format!("Expected playback to advance by more than {}s after seek", MIN_SEEK_ADVANCE),
                    format!("> {:.2}", t0 + MIN_SEEK_ADVANCE),
                    format!("{:.2} (t0={:.2})", t1, t0),
                ));
            }
        }

        StepKind::Screenshot => {
            reconcile::ensure_playing(&world.video()).await?;
            let path = evidence::playing_screenshot_path(
                &world.config.screenshot_dir,
                chrono::Utc::now().timestamp_millis(),
            );
            let saved = evidence::save_screenshot(world.page.as_ref(), &path).await?;
            world.ctx.screenshot_path = Some(saved.path.clone());
            world.attach(format!("Saved screenshot: {}", saved.describe()));
        }

        StepKind::AssertScreenshotExists => {
            let path = world
                .ctx
                .screenshot_path
                .clone()
                .ok_or_else(|| E2eError::MissingContext("no screenshot path recorded".to_string()))?;
            if let Err(e) = std::fs::metadata(&path) {
                return Err(E2eError::assertion(
                    "Expected screenshot file to exist",
                    path.display(),
                    e,
                ));
            }
        }

        StepKind::AssertTitle => {
            let title = world.video().title().await?;
            world.attach(format!("Title: {}", title));
            if title.trim().is_empty() {
                return Err(E2eError::assertion(
                    "Expected non-empty video title",
                    "non-empty title",
                    "\"\"",
                ));
            }
        }
    }

    Ok(())
}
