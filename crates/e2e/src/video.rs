//! Video page: player state reader and mutator
//!
//! Reads come from one script that snapshots the `<video>` element and the
//! player container. Mutations go through the player's keyboard shortcuts
//! first and direct media-element calls second. Mutation failures are
//! logged and swallowed; callers get a [`MutationOutcome`] instead.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{PlayingHeuristic, Timings};
use crate::delay::delay;
use crate::error::{E2eError, E2eResult};
use crate::page::{Page, Strategy};
use crate::reconcile::{self, Reconciled};

/// Player keyboard shortcuts
pub mod keys {
    /// Play/pause toggle
    pub const TOGGLE: &str = "k";
    /// Seek forward one step
    pub const SEEK_FORWARD: &str = "l";
    /// Fullscreen toggle
    pub const FULLSCREEN: &str = "f";
}

/// Scripts evaluated in the page
pub mod scripts {
    /// Snapshot of the media element and player container.
    pub const READ_STATE: &str = r#"
const v = document.querySelector('video');
const p = document.querySelector('.html5-video-player');
const overlay = document.querySelector('.ytp-ad-player-overlay')
    || document.querySelector('.ytp-ad-image-overlay');
return {
  present: !!v,
  paused: v ? v.paused : true,
  ended: v ? v.ended : false,
  readyState: v ? v.readyState : 0,
  currentTime: v ? v.currentTime : 0,
  adShowing: (!!p && (p.classList.contains('ad-showing')
      || p.classList.contains('ad-interrupting'))) || !!overlay,
  fullscreen: !!p && p.classList.contains('ytp-fullscreen'),
};
"#;

    /// Start a paused element directly. Returns whether `play()` was called.
    pub const PLAY_FALLBACK: &str = r#"
const v = document.querySelector('video');
if (!v || !v.paused) return false;
const p = v.play();
if (p && typeof p.catch === 'function') p.catch(() => {});
return true;
"#;

    /// Pause a running element directly. Returns whether `pause()` was called.
    pub const PAUSE_FALLBACK: &str = r#"
const v = document.querySelector('video');
if (!v || v.paused) return false;
v.pause();
return true;
"#;

    /// Synthetic click on `arguments[0]`, or its closest button.
    pub const DOM_CLICK: &str = r#"
const node = document.querySelector(arguments[0]);
if (!node) return false;
const target = node.closest('button') || node;
if (typeof target.click !== 'function') return false;
target.click();
return true;
"#;
}

/// Selector of the media element
pub const VIDEO_SELECTOR: &str = "video";

/// How long to wait for the media element to appear
pub const PLAYER_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Point-in-time view of the player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnapshot {
    pub present: bool,
    pub paused: bool,
    pub ended: bool,
    pub ready_state: u8,
    pub current_time: f64,
    pub ad_showing: bool,
    pub fullscreen: bool,
}

impl VideoSnapshot {
    /// Whether playback is advancing.
    ///
    /// An explicit paused flag always wins over the progressed disjunct,
    /// otherwise a paused video that has played for a moment would never
    /// read as paused.
    pub fn is_playing(&self, heuristic: &PlayingHeuristic) -> bool {
        if !self.present || self.paused {
            return false;
        }
        let has_data = self.ready_state >= heuristic.min_ready_state;
        let progressed = self.current_time > heuristic.progressed_threshold;
        (!self.ended && has_data) || progressed
    }

    pub fn classify(&self, heuristic: &PlayingHeuristic) -> PlaybackState {
        if !self.present {
            PlaybackState::Unknown
        } else if self.ad_showing {
            PlaybackState::AdInterrupted
        } else if self.is_playing(heuristic) {
            PlaybackState::Playing
        } else if self.paused && self.ready_state >= heuristic.min_ready_state {
            PlaybackState::Paused
        } else {
            PlaybackState::Unknown
        }
    }
}

/// Player classification used by the reconciliation helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Unknown,
    Playing,
    Paused,
    AdInterrupted,
}

/// Result of one best-effort mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    Applied(Strategy),
    /// Every strategy failed or found nothing to act on
    NoEffect,
}

impl MutationOutcome {
    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            MutationOutcome::Applied(strategy) => Some(*strategy),
            MutationOutcome::NoEffect => None,
        }
    }
}

/// Number of forward-seek presses needed to skip `seconds`.
pub fn seek_presses(seconds: f64, step_secs: f64) -> u32 {
    if !seconds.is_finite() || !step_secs.is_finite() || seconds <= 0.0 || step_secs <= 0.0 {
        return 0;
    }
    (seconds / step_secs).ceil() as u32
}

/// The watch view of the site
pub struct VideoPage<'a> {
    page: &'a dyn Page,
    timings: &'a Timings,
}

impl<'a> VideoPage<'a> {
    pub fn new(page: &'a dyn Page, timings: &'a Timings) -> Self {
        Self { page, timings }
    }

    pub fn page(&self) -> &'a dyn Page {
        self.page
    }

    pub fn timings(&self) -> &'a Timings {
        self.timings
    }

    /// Wait for the media element to exist.
    pub async fn ensure_player_ready(&self) -> E2eResult<()> {
        self.page
            .wait_for(VIDEO_SELECTOR, PLAYER_READY_TIMEOUT)
            .await
    }

    pub async fn snapshot(&self) -> E2eResult<VideoSnapshot> {
        let value = self.page.evaluate(scripts::READ_STATE, vec![]).await?;
        serde_json::from_value(value.clone())
            .map_err(|e| E2eError::ScriptResult(format!("{} ({})", value, e)))
    }

    pub async fn state(&self) -> E2eResult<PlaybackState> {
        Ok(self.snapshot().await?.classify(&self.timings.heuristic))
    }

    pub async fn is_playing(&self) -> E2eResult<bool> {
        Ok(self.snapshot().await?.is_playing(&self.timings.heuristic))
    }

    pub async fn is_ad_showing(&self) -> E2eResult<bool> {
        Ok(self.snapshot().await?.ad_showing)
    }

    /// Elapsed playback time in seconds, 0 without a media element.
    pub async fn current_time(&self) -> E2eResult<f64> {
        Ok(self.snapshot().await?.current_time)
    }

    /// Start playback: focus the surface, press the toggle key, then call
    /// `play()` directly if the element is still paused.
    pub async fn play(&self) -> MutationOutcome {
        if let Err(e) = self.page.click(VIDEO_SELECTOR).await {
            debug!("Focus click on video failed: {}", e);
        }

        let key_sent = match self.page.press_key(keys::TOGGLE).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Play toggle key failed: {}", e);
                false
            }
        };
        delay(self.timings.keys.toggle_settle).await;

        let fallback_used = match self.page.evaluate(scripts::PLAY_FALLBACK, vec![]).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                debug!("Direct play() failed: {}", e);
                false
            }
        };
        delay(self.timings.keys.fallback_settle).await;

        let outcome = resolve_outcome(key_sent, fallback_used);
        debug!("play -> {:?}", outcome);
        outcome
    }

    /// Pause playback: press the toggle key, then call `pause()` directly if
    /// the element is still running.
    pub async fn pause(&self) -> MutationOutcome {
        let key_sent = match self.page.press_key(keys::TOGGLE).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Pause toggle key failed: {}", e);
                false
            }
        };
        delay(self.timings.keys.pause_settle).await;

        let fallback_used = match self.page.evaluate(scripts::PAUSE_FALLBACK, vec![]).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                debug!("Direct pause() failed: {}", e);
                false
            }
        };

        let outcome = resolve_outcome(key_sent, fallback_used);
        debug!("pause -> {:?}", outcome);
        outcome
    }

    /// Advance playback with forward-seek presses. Returns the press count.
    pub async fn seek_forward(&self, seconds: f64) -> u32 {
        let keys = &self.timings.keys;
        let presses = seek_presses(seconds, keys.seek_step_secs);
        for _ in 0..presses {
            if let Err(e) = self.page.press_key(keys::SEEK_FORWARD).await {
                debug!("Seek key failed: {}", e);
            }
            delay(keys.seek_press).await;
        }
        presses
    }

    /// Heading text, or the document title when there is no usable heading.
    pub async fn title(&self) -> E2eResult<String> {
        match self.page.text("h1").await {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => self.page.title().await,
        }
    }

    /// Press the fullscreen key until the player reports fullscreen.
    pub async fn enter_fullscreen(&self) -> E2eResult<Reconciled> {
        if self.snapshot().await?.fullscreen {
            return Ok(Reconciled::AlreadyHeld);
        }

        let keys = &self.timings.keys;
        for attempt in 1..=keys.fullscreen_attempts {
            if let Err(e) = self.page.press_key(keys::FULLSCREEN).await {
                debug!("Fullscreen key failed: {}", e);
            }
            delay(keys.fullscreen_press).await;

            if self.snapshot().await?.fullscreen {
                return Ok(Reconciled::Reached {
                    attempts: attempt,
                    via: Some(Strategy::Primary),
                });
            }
        }

        Ok(Reconciled::Exhausted {
            attempts: keys.fullscreen_attempts,
        })
    }

    /// Enter fullscreen, then make sure playback resumed.
    pub async fn ensure_fullscreen_and_playing(&self) -> E2eResult<(Reconciled, Reconciled)> {
        self.ensure_player_ready().await?;
        let fullscreen = self.enter_fullscreen().await?;
        let playing = reconcile::ensure_playing(self).await?;
        Ok((fullscreen, playing))
    }
}

/// The fallback only runs when the primary path left the element in the
/// wrong state, so a fallback hit means the primary did not take.
fn resolve_outcome(key_sent: bool, fallback_used: bool) -> MutationOutcome {
    match (key_sent, fallback_used) {
        (_, true) => MutationOutcome::Applied(Strategy::Fallback),
        (true, false) => MutationOutcome::Applied(Strategy::Primary),
        (false, false) => MutationOutcome::NoEffect,
    }
}
