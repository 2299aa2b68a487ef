//! Vidplay E2E Test Suite
//!
//! This crate drives a video-sharing site through WebDriver from Gherkin
//! feature files:
//! - Opens a WebDriver session (optionally spawning chromedriver)
//! - Searches for a keyword and opens the first result
//! - Waits out or skips advertisements
//! - Reconciles the player into playing / paused / fullscreen states
//! - Captures screenshots as evidence and writes JSON + HTML reports
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── DriverProcess::spawn() / wait_for_webdriver()        │
//! │    ├── Hooks: before_all / before / after / after_all       │
//! │    ├── run_scenario(feature, scenario) -> ScenarioResult    │
//! │    └── write_results() -> report.json, report.html          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Steps (StepKind) ── World { page, config, ctx }            │
//! │    ├── HomePage: open, search, result_count, open_first     │
//! │    ├── VideoPage: snapshot, play, pause, seek, fullscreen   │
//! │    └── reconcile: ensure_playing, ensure_paused, skip_ad    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page / Browser traits ── WebDriverSession (thirtyfour)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod delay;
pub mod driver;
pub mod error;
pub mod evidence;
pub mod feature;
pub mod home;
pub mod hooks;
pub mod page;
pub mod reconcile;
pub mod report;
pub mod runner;
pub mod steps;
pub mod video;
pub mod webdriver;

pub use config::SuiteConfig;
pub use error::{E2eError, E2eResult};
pub use feature::{Feature, Scenario};
pub use page::{Browser, Page, Strategy};
pub use runner::TestRunner;
