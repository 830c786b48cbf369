//! Runner result schema (`test-results.json`)
//!
//! The layout follows the Playwright JSON reporter so existing dashboards and
//! CI steps keep working:
//!
//! ```text
//! Report
//!   ├── stats { startTime, duration, expected, unexpected, flaky, skipped }
//!   └── suites[]
//!         ├── title, file
//!         ├── suites[]            (nested describe blocks)
//!         └── specs[]
//!               └── tests[]       (one per project)
//!                     └── results[]   (one per attempt)
//!                           ├── status, duration, retry
//!                           ├── stdout[].text
//!                           └── errors[].message
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub suites: Vec<Suite>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub errors: Vec<ReportError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub start_time: Option<String>,
    /// Milliseconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub expected: u64,
    #[serde(default)]
    pub unexpected: u64,
    #[serde(default)]
    pub flaky: u64,
    #[serde(default)]
    pub skipped: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suite {
    pub title: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub specs: Vec<Spec>,
    #[serde(default)]
    pub suites: Vec<Suite>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    pub title: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub tests: Vec<Test>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub status: TestStatus,
    #[serde(default)]
    pub results: Vec<TestResult>,
}

/// Outcome of a test across all of its attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Expected,
    Unexpected,
    Flaky,
    #[default]
    Skipped,
}

impl TestStatus {
    /// Fold per-attempt statuses into the overall outcome
    pub fn from_attempts(attempts: &[AttemptStatus]) -> Self {
        let passed = attempts.iter().any(|s| *s == AttemptStatus::Passed);
        let failed = attempts
            .iter()
            .any(|s| matches!(s, AttemptStatus::Failed | AttemptStatus::TimedOut | AttemptStatus::Interrupted));
        match (passed, failed) {
            (true, false) => TestStatus::Expected,
            (true, true) => TestStatus::Flaky,
            (false, true) => TestStatus::Unexpected,
            (false, false) => TestStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub status: AttemptStatus,
    /// Milliseconds
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub retry: u32,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub stdout: Vec<StdioEntry>,
    #[serde(default)]
    pub stderr: Vec<StdioEntry>,
    #[serde(default)]
    pub errors: Vec<ReportError>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Outcome of a single attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttemptStatus {
    Passed,
    Failed,
    TimedOut,
    #[default]
    Skipped,
    Interrupted,
}

/// Captured output line. Binary output is reported base64-encoded by other
/// producers; only `text` is read here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StdioEntry {
    #[serde(default)]
    pub text: Option<String>,
}

impl StdioEntry {
    pub fn text(line: impl Into<String>) -> Self {
        Self { text: Some(line.into()) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Counts as presented to people: flaky tests count as passed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: u64,
    pub failed: u64,
    pub flaky: u64,
    pub skipped: u64,
    pub total: u64,
    pub duration_ms: f64,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// A spec flattened out of the suite tree, with its describe path
#[derive(Debug, Clone)]
pub struct FlatSpec<'a> {
    pub file: &'a str,
    pub path: Vec<&'a str>,
    pub spec: &'a Spec,
}

impl FlatSpec<'_> {
    pub fn full_title(&self) -> String {
        let mut parts: Vec<&str> = self.path.iter().copied().filter(|p| !p.is_empty()).collect();
        parts.push(&self.spec.title);
        parts.join(" › ")
    }
}

impl Report {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Report(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn summary(&self) -> Summary {
        let stats = &self.stats;
        Summary {
            passed: stats.expected + stats.flaky,
            failed: stats.unexpected,
            flaky: stats.flaky,
            skipped: stats.skipped,
            total: stats.expected + stats.unexpected + stats.flaky + stats.skipped,
            duration_ms: stats.duration,
        }
    }

    /// Depth-first walk over every spec in the suite tree
    pub fn specs(&self) -> Vec<FlatSpec<'_>> {
        fn walk<'a>(suite: &'a Suite, file: &'a str, path: &mut Vec<&'a str>, out: &mut Vec<FlatSpec<'a>>) {
            let file = if suite.file.is_empty() { file } else { suite.file.as_str() };
            path.push(&suite.title);
            for spec in &suite.specs {
                out.push(FlatSpec {
                    file,
                    path: path.clone(),
                    spec,
                });
            }
            for child in &suite.suites {
                walk(child, file, path, out);
            }
            path.pop();
        }

        let mut out = Vec::new();
        for suite in &self.suites {
            walk(suite, "", &mut Vec::new(), &mut out);
        }
        out
    }

    /// Titles of tests whose final outcome is a failure
    pub fn failed_titles(&self) -> Vec<String> {
        self.specs()
            .into_iter()
            .filter(|s| s.spec.tests.iter().any(|t| t.status == TestStatus::Unexpected))
            .map(|s| s.full_title())
            .collect()
    }

    /// Every captured stdout line, in report order
    pub fn stdout_lines(&self) -> Vec<&str> {
        self.specs()
            .into_iter()
            .flat_map(|s| s.spec.tests.iter())
            .flat_map(|t| t.results.iter())
            .flat_map(|r| r.stdout.iter())
            .filter_map(|e| e.text.as_deref())
            .flat_map(str::lines)
            .collect()
    }

    /// First error message per failed spec
    pub fn failure_messages(&self) -> Vec<(String, String)> {
        self.specs()
            .into_iter()
            .filter_map(|s| {
                let message = s
                    .spec
                    .tests
                    .iter()
                    .filter(|t| t.status == TestStatus::Unexpected)
                    .flat_map(|t| t.results.iter())
                    .flat_map(|r| r.errors.iter())
                    .map(|e| e.message.clone())
                    .next()?;
                Some((s.full_title(), message))
            })
            .collect()
    }

    /// Recompute `stats` from the suite tree
    pub fn recount(&mut self) {
        let mut stats = Stats {
            start_time: self.stats.start_time.clone(),
            duration: self.stats.duration,
            ..Stats::default()
        };
        for flat in self.specs() {
            for test in &flat.spec.tests {
                match test.status {
                    TestStatus::Expected => stats.expected += 1,
                    TestStatus::Unexpected => stats.unexpected += 1,
                    TestStatus::Flaky => stats.flaky += 1,
                    TestStatus::Skipped => stats.skipped += 1,
                }
            }
        }
        self.stats = stats;
    }
}
