//! Main test runner that orchestrates the driver, the browser session and
//! scenario execution

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::SuiteConfig;
use crate::driver::{self, DriverConfig, DriverProcess};
use crate::error::{E2eError, E2eResult};
use crate::feature::{Feature, Scenario, StepLine};
use crate::hooks::Hooks;
use crate::page::Browser;
use crate::report;
use crate::steps::{run_step, StepKind, World};
use crate::webdriver::WebDriverSession;

/// How long to wait for an already-running WebDriver endpoint
const WEBDRIVER_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
    Undefined,
}

/// Result of executing a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub keyword: String,
    pub text: String,
    pub line: usize,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub attachments: Vec<String>,
    pub error: Option<String>,
}

impl StepResult {
    fn new(step: &StepLine, status: StepStatus) -> Self {
        Self {
            keyword: step.keyword.as_str().to_string(),
            text: step.text.clone(),
            line: step.line,
            status,
            duration_ms: 0,
            attachments: vec![],
            error: None,
        }
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub feature: String,
    pub name: String,
    pub tags: Vec<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    /// Notes from the lifecycle hooks
    pub attachments: Vec<String>,
    pub error: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub started_at: String,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

/// Main E2E test runner
pub struct TestRunner {
    config: SuiteConfig,

    /// Spawned driver process (if any)
    driver: Option<DriverProcess>,

    /// Live session hooks (after `start`)
    hooks: Option<Hooks>,
}

impl TestRunner {
    pub fn new(config: SuiteConfig) -> Self {
        Self {
            config,
            driver: None,
            hooks: None,
        }
    }

    /// Create a runner around an already-open browser
    pub fn with_browser(config: SuiteConfig, browser: Box<dyn Browser>) -> E2eResult<Self> {
        let hooks = Hooks::before_all(browser, &config)?;
        Ok(Self {
            config,
            driver: None,
            hooks: Some(hooks),
        })
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Spawn the driver if configured, then open the browser session
    pub async fn start(&mut self) -> E2eResult<()> {
        if self.hooks.is_some() {
            return Ok(()); // Already running
        }

        if let Some(binary_path) = self.config.browser.chromedriver.clone() {
            let process = DriverProcess::spawn(DriverConfig {
                binary_path,
                ..Default::default()
            })
            .await?;
            self.config.browser.webdriver_url = process.webdriver_url().to_string();
            self.driver = Some(process);
        } else {
            driver::wait_for_webdriver(&self.config.browser.webdriver_url, WEBDRIVER_STATUS_TIMEOUT)
                .await?;
        }

        let session = WebDriverSession::start(self.config.browser.clone()).await?;
        self.hooks = Some(Hooks::before_all(Box::new(session), &self.config)?);
        Ok(())
    }

    /// Close the session and stop the driver
    pub async fn finish(&mut self) -> E2eResult<()> {
        if let Some(hooks) = self.hooks.take() {
            hooks.after_all().await?;
        }
        if let Some(mut process) = self.driver.take() {
            process.stop()?;
        }
        Ok(())
    }

    /// Run every feature in the features directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let features = Feature::load_all(&self.config.features_dir)?;
        self.run_features(&features).await
    }

    /// Run scenarios carrying a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let features = Feature::load_all(&self.config.features_dir)?;
        let filtered = Feature::filter_by_tag(features, tag);
        self.run_features(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&mut self, name: &str) -> E2eResult<TestSuiteResult> {
        let mut features = Feature::load_all(&self.config.features_dir)?;
        for feature in &mut features {
            feature.scenarios.retain(|s| s.name == name);
        }
        features.retain(|f| !f.scenarios.is_empty());

        if features.is_empty() {
            return Err(E2eError::ScenarioNotFound(name.to_string()));
        }
        self.run_features(&features).await
    }

    /// Run scenarios one after another
    pub async fn run_features(&mut self, features: &[Feature]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        self.start().await?;

        let total: usize = features.iter().map(|f| f.scenarios.len()).sum();
        info!("Running {} scenario(s)...", total);

        for feature in features {
            for scenario in &feature.scenarios {
                let result = self.run_scenario(feature, scenario).await?;
                if result.success {
                    passed += 1;
                    info!("✓ {} ({} ms)", result.name, result.duration_ms);
                } else {
                    failed += 1;
                    error!(
                        "✗ {} - {}",
                        result.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                results.push(result);
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        Ok(TestSuiteResult {
            total,
            passed,
            failed,
            started_at,
            duration_ms,
            results,
        })
    }

    /// Run a single scenario in its own page
    pub async fn run_scenario(
        &self,
        feature: &Feature,
        scenario: &Scenario,
    ) -> E2eResult<ScenarioResult> {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let hooks = self.hooks.as_ref().ok_or(E2eError::SessionNotStarted)?;
        let mut step_results = Vec::with_capacity(scenario.steps.len());
        let mut scenario_error: Option<String> = None;

        // Undefined phrases fail the scenario before any browser work
        let parsed: Vec<E2eResult<StepKind>> = scenario
            .steps
            .iter()
            .map(|s| StepKind::parse(&s.text))
            .collect();
        if let Some((idx, Err(e))) = parsed.iter().enumerate().find(|(_, p)| p.is_err()) {
            let steps = scenario
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| {
                    let status = if i == idx {
                        StepStatus::Undefined
                    } else {
                        StepStatus::Skipped
                    };
                    StepResult::new(step, status)
                })
                .collect();
            return Ok(failed_before_start(feature, scenario, steps, e, start));
        }

        let page = match hooks.before().await {
            Ok(page) => page,
            Err(e) => {
                let steps = scenario
                    .steps
                    .iter()
                    .map(|s| StepResult::new(s, StepStatus::Skipped))
                    .collect();
                return Ok(failed_before_start(feature, scenario, steps, &e, start));
            }
        };
        let mut world = World::new(page, &self.config);

        for (line, kind) in scenario.steps.iter().zip(parsed) {
            let mut result = StepResult::new(line, StepStatus::Skipped);

            if scenario_error.is_none() {
                let kind = kind?;
                let step_start = Instant::now();
                let outcome =
                    tokio::time::timeout(self.config.step_timeout, run_step(&mut world, &kind))
                        .await
                        .unwrap_or_else(|_| {
                            Err(E2eError::Timeout(format!(
                                "step '{}' exceeded {:?}",
                                line.text, self.config.step_timeout
                            )))
                        });

                result.duration_ms = step_start.elapsed().as_millis() as u64;
                result.attachments = world.take_attachments();
                match outcome {
                    Ok(()) => result.status = StepStatus::Passed,
                    Err(e) => {
                        let message = format!("{} {}: {}", line.keyword.as_str(), line.text, e);
                        result.status = StepStatus::Failed;
                        result.error = Some(e.to_string());
                        scenario_error = Some(message);
                    }
                }
            }

            step_results.push(result);
        }

        let success = scenario_error.is_none();
        let attachments = hooks
            .after(world.page, &scenario.name, !success, &self.config)
            .await;

        Ok(ScenarioResult {
            feature: feature.name.clone(),
            name: scenario.name.clone(),
            tags: scenario.tags.clone(),
            success,
            duration_ms: start.elapsed().as_millis() as u64,
            steps: step_results,
            attachments,
            error: scenario_error,
        })
    }

    /// Write the JSON and HTML reports
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<(PathBuf, PathBuf)> {
        let meta = report::RunMetadata::from_config(&self.config);
        report::write_reports(&self.config.reports_dir, results, &meta)
    }
}

fn failed_before_start(
    feature: &Feature,
    scenario: &Scenario,
    steps: Vec<StepResult>,
    error: &E2eError,
    start: Instant,
) -> ScenarioResult {
    ScenarioResult {
        feature: feature.name.clone(),
        name: scenario.name.clone(),
        tags: scenario.tags.clone(),
        success: false,
        duration_ms: start.elapsed().as_millis() as u64,
        steps,
        attachments: vec![],
        error: Some(error.to_string()),
    }
}
