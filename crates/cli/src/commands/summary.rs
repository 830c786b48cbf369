//! Print a run report

use anyhow::{bail, Context, Result};
use clap::Args;
use comfy_table::Color;
use serde::Serialize;
use std::path::PathBuf;

use lumimeds_common::{Report, Summary};

use super::notify::format_duration;
use crate::output::{print_list, print_success, render_item, render_list, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct SummaryArgs {
    #[arg(long, default_value = "test-results.json")]
    pub results: PathBuf,

    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Exit non-zero when any test failed
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug, Serialize)]
pub struct CountRow {
    pub outcome: &'static str,
    pub count: u64,
}

impl TableDisplay for CountRow {
    fn headers() -> Vec<&'static str> {
        vec!["Outcome", "Count"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.outcome.to_string(), self.count.to_string()]
    }

    fn color(&self) -> Option<Color> {
        match (self.outcome, self.count) {
            (_, 0) => None,
            ("passed", _) => Some(Color::Green),
            ("failed", _) => Some(Color::Red),
            ("flaky", _) => Some(Color::Yellow),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FailureRow {
    pub test: String,
    pub error: String,
}

impl TableDisplay for FailureRow {
    fn headers() -> Vec<&'static str> {
        vec!["Test", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.test.clone(), first_line(&self.error).to_string()]
    }

    fn color(&self) -> Option<Color> {
        Some(Color::Red)
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// The serialized form used for json and yaml
#[derive(Debug, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub summary: Summary,
    pub duration: String,
    pub failures: Vec<FailureRow>,
}

impl TableDisplay for RunSummary {
    fn headers() -> Vec<&'static str> {
        vec!["Passed", "Failed", "Flaky", "Skipped", "Total", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        let s = &self.summary;
        vec![
            s.passed.to_string(),
            s.failed.to_string(),
            s.flaky.to_string(),
            s.skipped.to_string(),
            s.total.to_string(),
            self.duration.clone(),
        ]
    }
}

impl RunSummary {
    pub fn from_report(report: &Report) -> Self {
        let summary = report.summary();
        let mut failures: Vec<FailureRow> = report
            .failure_messages()
            .into_iter()
            .map(|(test, error)| FailureRow { test, error })
            .collect();
        // failed tests that recorded no error message
        for title in report.failed_titles() {
            if !failures.iter().any(|f| f.test == title) {
                failures.push(FailureRow {
                    test: title,
                    error: String::new(),
                });
            }
        }
        Self {
            duration: format_duration(summary.duration_ms),
            summary,
            failures,
        }
    }

    pub fn counts(&self) -> Vec<CountRow> {
        let s = &self.summary;
        vec![
            CountRow { outcome: "passed", count: s.passed },
            CountRow { outcome: "failed", count: s.failed },
            CountRow { outcome: "flaky", count: s.flaky },
            CountRow { outcome: "skipped", count: s.skipped },
        ]
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json | OutputFormat::Yaml | OutputFormat::Plain => render_item(self, format),
            OutputFormat::Table => render_list(&self.counts(), format),
        }
    }
}

pub async fn execute(args: SummaryArgs) -> Result<()> {
    let report = Report::from_file(&args.results).with_context(|| format!("reading {}", args.results.display()))?;
    let run = RunSummary::from_report(&report);

    println!("{}", run.render(args.format));
    if matches!(args.format, OutputFormat::Table | OutputFormat::Plain) {
        if run.failures.is_empty() {
            print_success(&format!("{} tests in {}", run.summary.total, run.duration));
        } else {
            println!();
            print_list(&run.failures, args.format);
        }
    }

    if args.check && !run.summary.all_passed() {
        bail!("{} test(s) failed", run.summary.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
      "suites": [
        {
          "title": "checkout/staging.spec.ts",
          "file": "checkout/staging.spec.ts",
          "specs": [
            { "title": "staging checkout", "ok": false,
              "tests": [{ "projectName": "chromium", "status": "unexpected",
                "results": [{ "status": "failed",
                  "errors": [{ "message": "coupon mismatch: expected TEST99OFF\n  at checkout" }] }] }] }
          ]
        },
        {
          "title": "footer/links.spec.ts",
          "file": "footer/links.spec.ts",
          "specs": [
            { "title": "footer links resolve", "ok": true,
              "tests": [{ "projectName": "chromium", "status": "expected",
                "results": [{ "status": "passed" }] }] },
            { "title": "admin modal", "ok": false,
              "tests": [{ "projectName": "chromium", "status": "unexpected",
                "results": [{ "status": "timedOut" }] }] }
          ]
        }
      ],
      "stats": { "duration": 83000, "expected": 1, "unexpected": 2, "flaky": 0, "skipped": 0 }
    }"#;

    #[test]
    fn test_failures_include_silent_ones() {
        let run = RunSummary::from_report(&Report::from_json(REPORT).unwrap());
        assert_eq!(run.summary.failed, 2);
        assert_eq!(run.duration, "1m 23s");
        assert_eq!(run.failures.len(), 2);
        assert_eq!(run.failures[0].row()[1], "coupon mismatch: expected TEST99OFF");
        assert!(run.failures[1].test.ends_with("admin modal"));
        assert_eq!(run.failures[1].error, "");
    }

    #[test]
    fn test_json_is_flat() {
        let run = RunSummary::from_report(&Report::from_json(REPORT).unwrap());
        let json: serde_json::Value = serde_json::from_str(&run.render(OutputFormat::Json)).unwrap();
        assert_eq!(json["passed"], 1);
        assert_eq!(json["failed"], 2);
        assert_eq!(json["failures"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_count_colors() {
        let run = RunSummary::from_report(&Report::from_json(REPORT).unwrap());
        let counts = run.counts();
        assert_eq!(counts[0].color(), Some(Color::Green));
        assert_eq!(counts[1].color(), Some(Color::Red));
        assert_eq!(counts[2].color(), None);
    }

    #[tokio::test]
    async fn test_check_fails_on_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-results.json");
        std::fs::write(&path, REPORT).unwrap();

        let args = SummaryArgs {
            results: path,
            format: OutputFormat::Json,
            check: true,
        };
        assert_eq!(execute(args).await.unwrap_err().to_string(), "2 test(s) failed");
    }
}
