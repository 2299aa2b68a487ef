//! Playback reconciliation against the in-memory site
//!
//! All tests run on a paused tokio clock, so settle intervals and the ad
//! budget are measured exactly without real waiting.

mod common;

use std::time::Duration;
use tokio::time::Instant;

use common::{Action, Ad, FakeSite, SiteState};
use vidplay_e2e::config::Timings;
use vidplay_e2e::reconcile::{self, AdOutcome, Reconciled, SKIP_SELECTORS};
use vidplay_e2e::video::{PlaybackState, VideoPage};
use vidplay_e2e::Strategy;

fn site(state: SiteState) -> FakeSite {
    FakeSite::new(state)
}

#[tokio::test(start_paused = true)]
async fn ensure_playing_is_a_no_op_when_already_playing() {
    let site = site(SiteState {
        autoplay: true,
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let result = reconcile::ensure_playing(&video).await.unwrap();

    assert_eq!(result, Reconciled::AlreadyHeld);
    assert_eq!(site.state().mutations(), 0);
}

#[tokio::test(start_paused = true)]
async fn ensure_playing_starts_a_fresh_video_with_the_toggle_key() {
    let site = site(SiteState::default());
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let result = reconcile::ensure_playing(&video).await.unwrap();

    assert_eq!(
        result,
        Reconciled::Reached {
            attempts: 1,
            via: Some(Strategy::Primary)
        }
    );
    assert_eq!(site.state().keys(), vec!["k"]);
    assert!(video.is_playing().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn ensure_playing_falls_back_to_direct_play() {
    let site = site(SiteState {
        toggle_key_works: false,
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let result = reconcile::ensure_playing(&video).await.unwrap();

    assert_eq!(
        result,
        Reconciled::Reached {
            attempts: 1,
            via: Some(Strategy::Fallback)
        }
    );
    assert!(site
        .state()
        .log
        .contains(&Action::Script("play_fallback")));
}

#[tokio::test(start_paused = true)]
async fn ensure_playing_gives_up_after_the_retry_budget() {
    let site = site(SiteState {
        toggle_key_works: false,
        play_fallback_works: false,
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let start = Instant::now();
    let result = reconcile::ensure_playing(&video).await.unwrap();

    assert_eq!(result, Reconciled::Exhausted { attempts: 5 });
    assert_eq!(site.state().keys().len(), 5);

    let keys = timings.keys;
    let per_attempt = keys.toggle_settle + keys.fallback_settle + timings.retry.settle;
    assert_eq!(start.elapsed(), per_attempt * 5);
}

#[tokio::test(start_paused = true)]
async fn ensure_paused_leaves_a_paused_video_alone() {
    let site = site(SiteState::default());
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let outcome = reconcile::ensure_paused(&video).await.unwrap();

    assert_eq!(outcome.entry, PlaybackState::Paused);
    assert!(!outcome.recovered);
    assert_eq!(outcome.result, Reconciled::AlreadyHeld);
    assert_eq!(site.state().mutations(), 0);
}

#[tokio::test(start_paused = true)]
async fn ensure_paused_pauses_a_playing_video() {
    let site = site(SiteState {
        autoplay: true,
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let outcome = reconcile::ensure_paused(&video).await.unwrap();

    assert_eq!(outcome.entry, PlaybackState::Playing);
    assert!(!outcome.recovered);
    assert_eq!(
        outcome.result,
        Reconciled::Reached {
            attempts: 1,
            via: Some(Strategy::Primary)
        }
    );
    assert!(!video.is_playing().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn ensure_paused_recovers_an_indeterminate_player_with_one_play_then_pause() {
    // Paused but without enough buffered data to count as clearly paused
    let site = site(SiteState {
        ready_state: 1,
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let outcome = reconcile::ensure_paused(&video).await.unwrap();

    assert_eq!(outcome.entry, PlaybackState::Unknown);
    assert!(outcome.recovered);
    assert!(outcome.result.is_satisfied());
    assert_eq!(site.state().keys(), vec!["k", "k"]);
    assert!(!video.is_playing().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn ensure_paused_uses_direct_pause_when_the_key_is_ignored() {
    let site = site(SiteState {
        autoplay: true,
        toggle_key_works: false,
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let outcome = reconcile::ensure_paused(&video).await.unwrap();

    assert_eq!(
        outcome.result,
        Reconciled::Reached {
            attempts: 1,
            via: Some(Strategy::Fallback)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn skip_ad_without_an_ad_only_waits_the_grace_period() {
    let site = site(SiteState::default());
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let start = Instant::now();
    let outcome = reconcile::skip_ad(&video).await.unwrap();

    assert_eq!(outcome, AdOutcome::NoAd);
    assert_eq!(start.elapsed(), timings.ad_skip.initial_wait);
    assert_eq!(site.state().mutations(), 0);
}

#[tokio::test(start_paused = true)]
async fn skip_ad_catches_an_ad_attached_after_the_player() {
    let site = site(SiteState::default());
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let late = site.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        late.state().show_ad(Ad::skippable(SKIP_SELECTORS[2]));
    });

    let outcome = reconcile::skip_ad(&video).await.unwrap();

    assert_eq!(
        outcome,
        AdOutcome::Skipped {
            via: Strategy::Primary,
            selector: SKIP_SELECTORS[2].to_string(),
        }
    );
    assert!(!video.is_ad_showing().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn skip_ad_clicks_the_rendered_skip_control() {
    let site = site(SiteState {
        ad_on_open: Some(Ad::skippable(SKIP_SELECTORS[1])),
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let start = Instant::now();
    let outcome = reconcile::skip_ad(&video).await.unwrap();

    assert_eq!(
        outcome,
        AdOutcome::Skipped {
            via: Strategy::Primary,
            selector: SKIP_SELECTORS[1].to_string(),
        }
    );
    assert!(!video.is_ad_showing().await.unwrap());

    let policy = timings.ad_skip;
    assert_eq!(start.elapsed(), policy.initial_wait + policy.after_click);
}

#[tokio::test(start_paused = true)]
async fn skip_ad_falls_back_to_a_dom_click() {
    let site = site(SiteState {
        ad_on_open: Some(Ad {
            click_works: false,
            ..Ad::skippable(SKIP_SELECTORS[4])
        }),
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let outcome = reconcile::skip_ad(&video).await.unwrap();

    assert_eq!(
        outcome,
        AdOutcome::Skipped {
            via: Strategy::Fallback,
            selector: SKIP_SELECTORS[4].to_string(),
        }
    );
    assert!(site.state().log.contains(&Action::Script("dom_click")));
}

#[tokio::test(start_paused = true)]
async fn skip_ad_notices_an_ad_that_ends_on_its_own() {
    let site = site(SiteState {
        ad_on_open: Some(Ad {
            ends_after: Some(Duration::from_secs(15)),
            ..Ad::unskippable()
        }),
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let start = Instant::now();
    let outcome = reconcile::skip_ad(&video).await.unwrap();

    assert_eq!(outcome, AdOutcome::AdEnded);
    assert!(start.elapsed() >= Duration::from_secs(15));
    assert!(start.elapsed() < timings.ad_skip.budget());
}

#[tokio::test(start_paused = true)]
async fn skip_ad_is_bounded_for_an_unskippable_ad() {
    let site = site(SiteState {
        ad_on_open: Some(Ad::unskippable()),
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let start = Instant::now();
    let outcome = reconcile::skip_ad(&video).await.unwrap();

    assert_eq!(outcome, AdOutcome::Unskippable);
    assert!(start.elapsed() <= timings.ad_skip.budget());
    assert!(start.elapsed() >= timings.ad_skip.initial_wait + timings.ad_skip.max_poll);
}

#[tokio::test(start_paused = true)]
async fn seek_forward_presses_once_per_ten_seconds() {
    let site = site(SiteState {
        autoplay: true,
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let t0 = video.current_time().await.unwrap();
    let presses = video.seek_forward(15.0).await;
    let t1 = video.current_time().await.unwrap();

    assert_eq!(presses, 2);
    assert_eq!(site.state().keys(), vec!["l", "l"]);
    assert!(t1 >= t0 + 20.0);
}

#[tokio::test(start_paused = true)]
async fn fullscreen_and_playing_reached_together() {
    let site = site(SiteState::default());
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let (fullscreen, playing) = video.ensure_fullscreen_and_playing().await.unwrap();

    assert_eq!(
        fullscreen,
        Reconciled::Reached {
            attempts: 1,
            via: Some(Strategy::Primary)
        }
    );
    assert!(playing.is_satisfied());
    assert!(site.state().fullscreen);
}

#[tokio::test(start_paused = true)]
async fn fullscreen_exhausts_when_the_key_is_ignored() {
    let site = site(SiteState {
        fullscreen_key_works: false,
        ..Default::default()
    });
    let page = site.watch_page();
    let timings = Timings::default();
    let video = VideoPage::new(&page, &timings);

    let result = video.enter_fullscreen().await.unwrap();

    assert_eq!(result, Reconciled::Exhausted { attempts: 5 });
    assert_eq!(site.state().keys(), vec!["f"; 5]);
}
