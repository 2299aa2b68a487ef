//! Screenshot evidence

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

use crate::error::E2eResult;
use crate::page::Page;

/// A screenshot written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: usize,
}

impl Evidence {
    /// One-line description for report attachments
    pub fn describe(&self) -> String {
        format!(
            "{} ({} bytes, sha256 {})",
            self.path.display(),
            self.bytes,
            self.sha256
        )
    }
}

/// Replace every run of characters outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]+").expect("sanitize regex is valid"));
    let sanitized = re.replace_all(name, "_").into_owned();
    if sanitized.is_empty() {
        "scenario".to_string()
    } else {
        sanitized
    }
}

/// `<dir>/<sanitized scenario>-FAILED.png`
pub fn failure_screenshot_path(dir: &Path, scenario: &str) -> PathBuf {
    dir.join(format!("{}-FAILED.png", sanitize_name(scenario)))
}

/// `<dir>/playing-<unix millis>.png`
pub fn playing_screenshot_path(dir: &Path, timestamp_millis: i64) -> PathBuf {
    dir.join(format!("playing-{}.png", timestamp_millis))
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Capture the page and write it to `path`, creating parent directories.
pub async fn save_screenshot(page: &dyn Page, path: &Path) -> E2eResult<Evidence> {
    let png = page.screenshot_png().await?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &png)?;

    let evidence = Evidence {
        path: path.to_path_buf(),
        sha256: sha256_hex(&png),
        bytes: png.len(),
    };
    info!("Saved screenshot {}", evidence.describe());
    Ok(evidence)
}
