//! Vidplay E2E - suite entry point
//!
//! Runs the feature files against the configured site and writes reports.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vidplay_e2e::config::{self, DEFAULT_BASE_URL, DEFAULT_KEYWORD, DEFAULT_WEBDRIVER_URL};
use vidplay_e2e::runner::TestSuiteResult;
use vidplay_e2e::{E2eResult, SuiteConfig, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "vidplay-e2e")]
#[command(about = "End-to-end UI suite for a video-sharing site", version)]
struct Args {
    /// Directory containing .feature files
    #[arg(short, long, default_value = "features")]
    features: PathBuf,

    /// Run only scenarios with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the scenario with this name
    #[arg(short, long)]
    name: Option<String>,

    /// Base address of the site under test
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Keyword for the search step
    #[arg(long, env = "SEARCH_KEYWORD", default_value = DEFAULT_KEYWORD)]
    keyword: String,

    /// Run the browser without a window (`HEADLESS=true`)
    #[arg(
        long,
        env = "HEADLESS",
        action = clap::ArgAction::Set,
        value_parser = parse_headless_flag,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value = "false"
    )]
    headless: bool,

    /// WebDriver server to connect to
    #[arg(long, env = "WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    /// Spawn this chromedriver binary instead of connecting to a running one
    #[arg(long, env = "CHROMEDRIVER")]
    chromedriver: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long, default_value = "reports")]
    reports: PathBuf,

    /// Output directory for screenshots
    #[arg(long, default_value = "screenshots")]
    screenshots: PathBuf,
}

fn parse_headless_flag(value: &str) -> Result<bool, String> {
    Ok(config::parse_headless(Some(value)))
}

fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let mut config = SuiteConfig {
        base_url: args.base_url,
        keyword: args.keyword,
        features_dir: args.features,
        reports_dir: args.reports,
        screenshot_dir: args.screenshots,
        ..Default::default()
    };
    config.browser.webdriver_url = args.webdriver_url;
    config.browser.chromedriver = args.chromedriver;
    config.browser.set_headless(args.headless);

    let mut runner = TestRunner::new(config);

    let outcome = run(&mut runner, args.name, args.tag).await;
    let finished = runner.finish().await;

    let results = outcome?;
    finished?;

    runner.write_results(&results)?;
    Ok(results.failed == 0)
}

async fn run(
    runner: &mut TestRunner,
    name: Option<String>,
    tag: Option<String>,
) -> E2eResult<TestSuiteResult> {
    if let Some(name) = name {
        runner.run_named(&name).await
    } else if let Some(tag) = tag {
        runner.run_tagged(&tag).await
    } else {
        runner.run_all().await
    }
}
