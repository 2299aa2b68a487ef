//! Gherkin feature files
//!
//! Supports the subset the suite needs: `Feature:`, `Background:`,
//! `Scenario:`, `@tag` lines and `Given/When/Then/And/But` steps. Comments
//! and blank lines are ignored; free text under a `Feature:` line is kept as
//! its description.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{E2eError, E2eResult};

/// A parsed `.feature` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Source file, when loaded from disk
    #[serde(default)]
    pub path: Option<PathBuf>,

    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    /// Own tags plus the feature's tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Background steps first, then the scenario's own
    pub steps: Vec<StepLine>,

    pub line: usize,
}

/// One step line as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLine {
    pub keyword: Keyword,
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyword {
    Given,
    When,
    Then,
    And,
    But,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Given => "Given",
            Keyword::When => "When",
            Keyword::Then => "Then",
            Keyword::And => "And",
            Keyword::But => "But",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "Given" => Some(Keyword::Given),
            "When" => Some(Keyword::When),
            "Then" => Some(Keyword::Then),
            "And" => Some(Keyword::And),
            "But" => Some(Keyword::But),
            _ => None,
        }
    }
}

fn step_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(Given|When|Then|And|But)\s+(.+?)\s*$").expect("step regex is valid")
    })
}

enum Section {
    None,
    Background,
    Scenario,
}

impl Feature {
    /// Parse a feature from source text. `origin` is used in error messages.
    pub fn parse(source: &str, origin: &str) -> E2eResult<Self> {
        let err = |line: usize, reason: &str| E2eError::FeatureParse {
            file: origin.to_string(),
            line,
            reason: reason.to_string(),
        };

        let mut name: Option<String> = None;
        let mut description = Vec::new();
        let mut feature_tags = Vec::new();
        let mut pending_tags: Vec<String> = Vec::new();
        let mut background = Vec::new();
        let mut scenarios: Vec<Scenario> = Vec::new();
        let mut section = Section::None;

        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('@') {
                pending_tags.extend(
                    line.split_whitespace()
                        .filter(|t| t.starts_with('@'))
                        .map(|t| t.trim_start_matches('@').to_string()),
                );
                continue;
            }

            if let Some(rest) = line.strip_prefix("Feature:") {
                if name.is_some() {
                    return Err(err(line_no, "more than one Feature"));
                }
                name = Some(rest.trim().to_string());
                feature_tags = std::mem::take(&mut pending_tags);
                continue;
            }

            if name.is_none() {
                return Err(err(line_no, "expected Feature:"));
            }

            if line.starts_with("Background:") {
                if !scenarios.is_empty() {
                    return Err(err(line_no, "Background must come before scenarios"));
                }
                section = Section::Background;
                continue;
            }

            if let Some(rest) = line
                .strip_prefix("Scenario:")
                .or_else(|| line.strip_prefix("Example:"))
            {
                let mut tags = feature_tags.clone();
                tags.append(&mut pending_tags);
                scenarios.push(Scenario {
                    name: rest.trim().to_string(),
                    tags,
                    steps: background.clone(),
                    line: line_no,
                });
                section = Section::Scenario;
                continue;
            }

            if let Some(caps) = step_regex().captures(line) {
                let keyword = Keyword::parse(&caps[1]).ok_or_else(|| err(line_no, "bad keyword"))?;
                let step = StepLine {
                    keyword,
                    text: caps[2].to_string(),
                    line: line_no,
                };
                match section {
                    Section::Background => background.push(step),
                    Section::Scenario => {
                        if let Some(scenario) = scenarios.last_mut() {
                            scenario.steps.push(step);
                        }
                    }
                    Section::None => return Err(err(line_no, "step outside a scenario")),
                }
                continue;
            }

            match section {
                Section::None => description.push(line.to_string()),
                _ => return Err(err(line_no, &format!("unrecognized line: {}", line))),
            }
        }

        let name = name.ok_or_else(|| err(1, "missing Feature:"))?;

        Ok(Feature {
            name,
            description: description.join("\n"),
            tags: feature_tags,
            path: None,
            scenarios,
        })
    }

    /// Parse a feature from a file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut feature = Self::parse(&content, &path.display().to_string())?;
        feature.path = Some(path.to_path_buf());
        Ok(feature)
    }

    /// Load all features under a directory, sorted by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "feature")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// Keep only scenarios carrying `tag`; drop features left empty
    pub fn filter_by_tag(features: Vec<Self>, tag: &str) -> Vec<Self> {
        let tag = tag.trim_start_matches('@');
        features
            .into_iter()
            .filter_map(|mut f| {
                f.scenarios.retain(|s| s.tags.iter().any(|t| t == tag));
                (!f.scenarios.is_empty()).then_some(f)
            })
            .collect()
    }
}
