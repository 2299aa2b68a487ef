//! Playback reconciliation helpers
//!
//! Bounded poll-and-mutate loops that drive the player toward a target
//! state. None of them fail when the budget runs out: they report what
//! happened and leave the verdict to the assertion steps. Only transport
//! errors while reading player state are propagated.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::delay::{delay, delay_until};
use crate::page::Strategy;
use crate::video::{scripts, PlaybackState, VideoPage};

/// Skip-control selectors, tried in order. The site has shipped several
/// markups for the same button.
pub const SKIP_SELECTORS: &[&str] = &[
    "button.ytp-ad-skip-button",
    ".ytp-ad-skip-button-modern",
    ".ytp-skip-ad-button",
    ".ytp-ad-skip-button-container button",
    "span.ytp-skip-ad-button__icon",
];

/// Result of driving the player toward a target state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum Reconciled {
    /// Target held on entry; nothing was sent to the page
    AlreadyHeld,
    /// Target reached after `attempts` mutations
    Reached {
        attempts: u32,
        via: Option<Strategy>,
    },
    /// Budget spent without reaching the target
    Exhausted { attempts: u32 },
}

impl Reconciled {
    pub fn is_satisfied(&self) -> bool {
        !matches!(self, Reconciled::Exhausted { .. })
    }
}

/// Result of [`ensure_paused`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseOutcome {
    /// Classification on entry
    pub entry: PlaybackState,
    /// Whether the play-then-pause recovery ran first
    pub recovered: bool,
    pub result: Reconciled,
}

/// Result of [`skip_ad`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum AdOutcome {
    /// No ad was seen on entry or after the grace period
    NoAd,
    /// An ad was seen and finished on its own
    AdEnded,
    Skipped { via: Strategy, selector: String },
    /// No skip control worked before the deadline
    Unskippable,
}

/// Poll until playing, pressing play between polls.
pub async fn ensure_playing(video: &VideoPage<'_>) -> crate::E2eResult<Reconciled> {
    let policy = video.timings().retry;
    video.ensure_player_ready().await?;

    let mut via = None;
    for attempt in 0..policy.attempts {
        if video.is_playing().await? {
            return Ok(if attempt == 0 {
                Reconciled::AlreadyHeld
            } else {
                Reconciled::Reached {
                    attempts: attempt,
                    via,
                }
            });
        }
        via = video.play().await.strategy();
        delay(policy.settle).await;
    }

    if video.is_playing().await? {
        return Ok(Reconciled::Reached {
            attempts: policy.attempts,
            via,
        });
    }

    warn!(
        "Video still not playing after {} attempts",
        policy.attempts
    );
    Ok(Reconciled::Exhausted {
        attempts: policy.attempts,
    })
}

/// Poll until paused, pressing pause between polls.
///
/// When the entry state is neither clearly playing nor clearly paused the
/// player is forced through one play-then-pause sequence before polling,
/// so the toggle never flips an indeterminate element back and forth.
pub async fn ensure_paused(video: &VideoPage<'_>) -> crate::E2eResult<PauseOutcome> {
    let timings = video.timings();
    video.ensure_player_ready().await?;

    let entry = video.state().await?;
    let mut mutations = 0;
    let mut via = None;

    let recovered = match entry {
        PlaybackState::Paused => {
            return Ok(PauseOutcome {
                entry,
                recovered: false,
                result: Reconciled::AlreadyHeld,
            });
        }
        PlaybackState::Playing => false,
        PlaybackState::Unknown | PlaybackState::AdInterrupted => {
            debug!("Indeterminate player state {:?}, forcing play then pause", entry);
            video.play().await;
            delay(timings.pause.play_settle).await;
            via = video.pause().await.strategy();
            delay(timings.pause.settle).await;
            mutations += 1;
            true
        }
    };

    for _ in 0..timings.retry.attempts {
        if !video.is_playing().await? {
            return Ok(PauseOutcome {
                entry,
                recovered,
                result: Reconciled::Reached {
                    attempts: mutations,
                    via,
                },
            });
        }
        via = video.pause().await.strategy();
        delay(timings.pause.settle).await;
        mutations += 1;
    }

    let result = if video.is_playing().await? {
        warn!("Video still playing after {} pause attempts", mutations);
        Reconciled::Exhausted {
            attempts: mutations,
        }
    } else {
        Reconciled::Reached {
            attempts: mutations,
            via,
        }
    };

    Ok(PauseOutcome {
        entry,
        recovered,
        result,
    })
}

/// Wait out an ad and click its skip control once one renders.
///
/// The grace period always runs first: ad markup is attached some time
/// after the media element, so an entry check alone would miss it.
/// Never blocks longer than the policy's `initial_wait + max_poll + fallback`.
/// An ad that cannot be skipped is an accepted outcome.
pub async fn skip_ad(video: &VideoPage<'_>) -> crate::E2eResult<AdOutcome> {
    let policy = video.timings().ad_skip;

    let mut seen = video.is_ad_showing().await?;
    debug!(
        "Waiting {:?} before looking for a skip control (ad on entry: {})",
        policy.initial_wait, seen
    );
    delay(policy.initial_wait).await;

    let deadline = Instant::now() + policy.max_poll;
    while Instant::now() < deadline {
        if !video.is_ad_showing().await? {
            return Ok(if seen {
                AdOutcome::AdEnded
            } else {
                AdOutcome::NoAd
            });
        }
        seen = true;

        for selector in SKIP_SELECTORS {
            if let Some(via) = try_skip(video, selector).await {
                info!("Skipped ad via {} ({:?})", selector, via);
                delay(policy.after_click).await;
                return Ok(AdOutcome::Skipped {
                    via,
                    selector: selector.to_string(),
                });
            }
        }

        delay_until(policy.poll, deadline).await;
    }

    info!("No skip control worked, waiting {:?} more", policy.fallback);
    delay(policy.fallback).await;
    Ok(AdOutcome::Unskippable)
}

/// One selector strategy: a real click first, a synthetic DOM click second.
async fn try_skip(video: &VideoPage<'_>, selector: &str) -> Option<Strategy> {
    let page = video.page();

    match page.count(selector).await {
        Ok(0) => return None,
        Ok(_) => {}
        Err(e) => {
            debug!("Skip selector {} query failed: {}", selector, e);
            return None;
        }
    }

    match page.click(selector).await {
        Ok(()) => return Some(Strategy::Primary),
        Err(e) => debug!("Skip click on {} failed: {}", selector, e),
    }

    match page
        .evaluate(scripts::DOM_CLICK, vec![serde_json::json!(selector)])
        .await
    {
        Ok(value) if value.as_bool() == Some(true) => Some(Strategy::Fallback),
        Ok(_) => None,
        Err(e) => {
            debug!("DOM click on {} failed: {}", selector, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciled_satisfied() {
        assert!(Reconciled::AlreadyHeld.is_satisfied());
        assert!(Reconciled::Reached {
            attempts: 2,
            via: Some(Strategy::Fallback)
        }
        .is_satisfied());
        assert!(!Reconciled::Exhausted { attempts: 5 }.is_satisfied());
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(AdOutcome::Skipped {
            via: Strategy::Primary,
            selector: SKIP_SELECTORS[0].to_string(),
        })
        .unwrap();
        assert_eq!(json["result"], "skipped");
        assert_eq!(json["via"], "primary");
    }
}
