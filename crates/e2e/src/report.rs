//! Run reports: `report.json` for machines, `report.html` for people

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::SuiteConfig;
use crate::error::E2eResult;
use crate::runner::{StepStatus, TestSuiteResult};

/// Run information shown at the top of the HTML report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub title: String,
    pub base_url: String,
    pub keyword: String,
    pub browser: String,
    pub headless: bool,
    pub platform: String,
}

impl RunMetadata {
    pub fn from_config(config: &SuiteConfig) -> Self {
        Self {
            title: "UI Automation Report".to_string(),
            base_url: config.base_url.clone(),
            keyword: config.keyword.clone(),
            browser: "chrome".to_string(),
            headless: config.browser.headless,
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a RunMetadata,
    #[serde(flatten)]
    suite: &'a TestSuiteResult,
}

/// Write both reports into `dir`. Returns `(json, html)` paths.
pub fn write_reports(
    dir: &Path,
    results: &TestSuiteResult,
    meta: &RunMetadata,
) -> E2eResult<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;

    let json_path = dir.join("report.json");
    let json = serde_json::to_string_pretty(&JsonReport {
        metadata: meta,
        suite: results,
    })?;
    std::fs::write(&json_path, json)?;

    let html_path = dir.join("report.html");
    std::fs::write(&html_path, render_html(results, meta))?;

    info!(
        "Reports written to: {} and {}",
        json_path.display(),
        html_path.display()
    );
    Ok((json_path, html_path))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn status_class(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Passed => "passed",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped",
        StepStatus::Undefined => "undefined",
    }
}

/// Self-contained HTML summary of a run
pub fn render_html(results: &TestSuiteResult, meta: &RunMetadata) -> String {
    let mut html = String::new();

    // Writing into a String cannot fail
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 0.25rem 0.5rem; text-align: left; }}
.passed {{ color: #1a7f37; }}
.failed {{ color: #cf222e; }}
.skipped, .undefined {{ color: #9a6700; }}
.attachment {{ color: #57606a; font-size: 0.9em; }}
</style>
</head>
<body>
<h1>{title}</h1>
<table>
<tr><th>Started</th><td>{started}</td></tr>
<tr><th>Site</th><td>{base_url}</td></tr>
<tr><th>Keyword</th><td>{keyword}</td></tr>
<tr><th>Browser</th><td>{browser} (headless: {headless})</td></tr>
<tr><th>Platform</th><td>{platform}</td></tr>
<tr><th>Result</th><td>{passed} passed, {failed} failed of {total} in {duration} ms</td></tr>
</table>
"#,
        title = escape(&meta.title),
        started = escape(&results.started_at),
        base_url = escape(&meta.base_url),
        keyword = escape(&meta.keyword),
        browser = escape(&meta.browser),
        headless = meta.headless,
        platform = escape(&meta.platform),
        passed = results.passed,
        failed = results.failed,
        total = results.total,
        duration = results.duration_ms,
    );

    for scenario in &results.results {
        let class = if scenario.success { "passed" } else { "failed" };
        let _ = writeln!(
            html,
            r#"<h2 class="{class}">{feature}: {name} ({duration} ms)</h2>"#,
            feature = escape(&scenario.feature),
            name = escape(&scenario.name),
            duration = scenario.duration_ms,
        );
        if let Some(error) = &scenario.error {
            let _ = writeln!(html, r#"<p class="failed">{}</p>"#, escape(error));
        }

        html.push_str("<ol>\n");
        for step in &scenario.steps {
            let _ = write!(
                html,
                r#"<li class="{class}">{keyword} {text} <small>[{class}, {duration} ms]</small>"#,
                class = status_class(step.status),
                keyword = escape(&step.keyword),
                text = escape(&step.text),
                duration = step.duration_ms,
            );
            for note in &step.attachments {
                let _ = write!(html, r#"<div class="attachment">{}</div>"#, escape(note));
            }
            if let Some(error) = &step.error {
                let _ = write!(html, r#"<div class="failed">{}</div>"#, escape(error));
            }
            html.push_str("</li>\n");
        }
        html.push_str("</ol>\n");

        for note in &scenario.attachments {
            let _ = writeln!(html, r#"<p class="attachment">{}</p>"#, escape(note));
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}
