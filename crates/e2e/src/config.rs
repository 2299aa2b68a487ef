//! Suite configuration and playback tuning constants
//!
//! Retry counts, settle intervals and thresholds were tuned empirically
//! against the live site. They live here as named defaults instead of
//! being scattered through the helpers.

use std::path::PathBuf;
use std::time::Duration;

/// Default site under test
pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

/// Default search keyword
pub const DEFAULT_KEYWORD: &str = "QA automation";

/// Default WebDriver endpoint
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Top-level configuration for a suite run
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Base address of the site under test
    pub base_url: String,

    /// Keyword used by the search step
    pub keyword: String,

    /// Browser session settings
    pub browser: BrowserConfig,

    /// Directory containing `.feature` files
    pub features_dir: PathBuf,

    /// Directory for report files
    pub reports_dir: PathBuf,

    /// Directory for screenshots
    pub screenshot_dir: PathBuf,

    /// Upper bound for a single step
    pub step_timeout: Duration,

    /// Playback tuning
    pub timings: Timings,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            keyword: DEFAULT_KEYWORD.to_string(),
            browser: BrowserConfig::default(),
            features_dir: PathBuf::from("features"),
            reports_dir: PathBuf::from("reports"),
            screenshot_dir: PathBuf::from("screenshots"),
            step_timeout: Duration::from_secs(60),
            timings: Timings::default(),
        }
    }
}

impl SuiteConfig {
    /// Build a config from the process environment.
    ///
    /// Loads `.env` first when present. Unset variables keep their defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("BASE_URL") {
            config.base_url = url;
        }
        if let Some(keyword) = lookup("SEARCH_KEYWORD") {
            config.keyword = keyword;
        }
        if let Some(url) = lookup("WEBDRIVER_URL") {
            config.browser.webdriver_url = url;
        }
        if let Some(path) = lookup("CHROMEDRIVER") {
            config.browser.chromedriver = Some(PathBuf::from(path));
        }
        config.browser.set_headless(parse_headless(lookup("HEADLESS").as_deref()));

        config
    }
}

/// `HEADLESS` is only honoured when it reads `true`, in any case.
pub fn parse_headless(value: Option<&str>) -> bool {
    value
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Browser session settings
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// WebDriver server URL
    pub webdriver_url: String,

    /// Driver binary to spawn instead of using a running server
    pub chromedriver: Option<PathBuf>,

    /// Run without a visible window
    pub headless: bool,

    /// Delay inserted before every remote interaction
    pub interaction_delay: Duration,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Page load timeout
    pub page_load_timeout: Duration,

    /// Script execution timeout
    pub script_timeout: Duration,

    /// Extra browser arguments
    pub browser_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            chromedriver: None,
            headless: false,
            interaction_delay: VISIBLE_INTERACTION_DELAY,
            viewport_width: 1366,
            viewport_height: 768,
            page_load_timeout: Duration::from_secs(30),
            script_timeout: Duration::from_secs(30),
            browser_args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
            ],
        }
    }
}

/// Slow-motion delay used when the browser is visible
const VISIBLE_INTERACTION_DELAY: Duration = Duration::from_millis(100);

impl BrowserConfig {
    /// Toggle headless mode. Headless runs drop the interaction delay.
    pub fn set_headless(&mut self, headless: bool) {
        self.headless = headless;
        self.interaction_delay = if headless {
            Duration::ZERO
        } else {
            VISIBLE_INTERACTION_DELAY
        };
    }
}

/// All playback tuning in one place
#[derive(Debug, Clone, Default)]
pub struct Timings {
    pub retry: RetryPolicy,
    pub pause: PauseTimings,
    pub ad_skip: AdSkipPolicy,
    pub heuristic: PlayingHeuristic,
    pub keys: KeyTimings,
}

/// Bounded retry loop used by ensure-playing
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Number of check-then-mutate rounds
    pub attempts: u32,

    /// Wait after each mutation before re-checking
    pub settle: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            settle: Duration::from_millis(1200),
        }
    }
}

/// Settle intervals used by ensure-paused
#[derive(Debug, Clone, Copy)]
pub struct PauseTimings {
    /// Wait after a pause toggle
    pub settle: Duration,

    /// Wait after the forced play of the recovery branch
    pub play_settle: Duration,
}

impl Default for PauseTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(300),
            play_settle: Duration::from_millis(500),
        }
    }
}

/// Timing budget for the skip-ad loop.
///
/// The loop never blocks longer than `initial_wait + max_poll + fallback`.
#[derive(Debug, Clone, Copy)]
pub struct AdSkipPolicy {
    /// Grace period so the skip control has time to render
    pub initial_wait: Duration,

    /// Sleep between poll cycles
    pub poll: Duration,

    /// Total polling window after the initial wait
    pub max_poll: Duration,

    /// Extra wait when no skip control ever worked
    pub fallback: Duration,

    /// Wait after a successful skip click
    pub after_click: Duration,
}

impl AdSkipPolicy {
    /// Upper bound on how long [`crate::reconcile::skip_ad`] can block.
    pub fn budget(&self) -> Duration {
        self.initial_wait + self.max_poll + self.fallback
    }
}

impl Default for AdSkipPolicy {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_millis(12_000),
            poll: Duration::from_millis(250),
            max_poll: Duration::from_millis(12_000),
            fallback: Duration::from_millis(5_000),
            after_click: Duration::from_millis(300),
        }
    }
}

/// Thresholds for classifying a media element as playing.
///
/// An element is playing when it is neither paused nor ended and has at
/// least `min_ready_state` buffered, OR its elapsed time is past
/// `progressed_threshold`. The second disjunct covers environments where
/// the ready-state is unreliable; an explicit paused flag still vetoes it.
/// It also reports a video that played briefly and then stalled as playing.
#[derive(Debug, Clone, Copy)]
pub struct PlayingHeuristic {
    /// `HAVE_CURRENT_DATA`
    pub min_ready_state: u8,

    /// Seconds of elapsed playback treated as proof of progress
    pub progressed_threshold: f64,
}

impl Default for PlayingHeuristic {
    fn default() -> Self {
        Self {
            min_ready_state: 2,
            progressed_threshold: 0.5,
        }
    }
}

/// Key-press pacing for the player shortcuts
#[derive(Debug, Clone, Copy)]
pub struct KeyTimings {
    /// Wait after the play toggle key before trying the fallback
    pub toggle_settle: Duration,

    /// Wait after the direct `play()` fallback
    pub fallback_settle: Duration,

    /// Wait after the pause toggle key
    pub pause_settle: Duration,

    /// Wait after each forward-seek key press
    pub seek_press: Duration,

    /// Seconds skipped by one forward-seek press
    pub seek_step_secs: f64,

    /// Wait after each fullscreen key press
    pub fullscreen_press: Duration,

    /// Fullscreen key attempts
    pub fullscreen_attempts: u32,
}

impl Default for KeyTimings {
    fn default() -> Self {
        Self {
            toggle_settle: Duration::from_millis(1000),
            fallback_settle: Duration::from_millis(500),
            pause_settle: Duration::from_millis(800),
            seek_press: Duration::from_millis(400),
            seek_step_secs: 10.0,
            fullscreen_press: Duration::from_millis(700),
            fullscreen_attempts: 5,
        }
    }
}
