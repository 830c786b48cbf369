//! Slack run notification

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;

use lumimeds_common::{Report, Summary};

use crate::output::{print_info, print_success};

const MAX_LISTED_FAILURES: usize = 10;
const NON_PAGE_GROUPS: &[&str] = &["ad-pages", "footer", "admin-modal", "checkout"];

static EMAIL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Email:\s*([^\s@]+@[^\s@]+\.[A-Za-z]{2,})").expect("valid regex"));
static COUPON_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Coupon:\s*([A-Za-z0-9_-]+)").expect("valid regex"));
static AD_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|[/\s])((?:es/)?ad/[a-z0-9-]+)").expect("valid regex"));
static SPEC_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|/)([a-z0-9-]+)\.spec(?:\.ts)?$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum MessageStyle {
    /// Plain text message
    #[default]
    Simple,
    /// Colored attachment with fields
    Detailed,
}

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Runner report to summarize
    #[arg(long, default_value = "test-results.json")]
    pub results: PathBuf,

    #[arg(long, value_enum, default_value = "simple")]
    pub style: MessageStyle,

    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    #[arg(long, default_value = "LumiMeds E2E")]
    pub username: String,

    /// Print the payload instead of posting it
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub run: RunInfo,
}

/// Where and how the run happened, straight from the CI environment
#[derive(Args, Debug, Clone, Default)]
pub struct RunInfo {
    #[arg(long = "test-env", env = "TEST_ENV")]
    pub env: Option<String>,

    #[arg(long, env = "TEST_BROWSER")]
    pub browser: Option<String>,

    #[arg(long, env = "TEST_VIEWPORT")]
    pub viewport: Option<String>,

    #[arg(long, env = "TEST_URL")]
    pub test_url: Option<String>,

    #[arg(long, env = "REPORT_URL")]
    pub report_url: Option<String>,

    #[arg(long, env = "GITHUB_RUN_NUMBER")]
    pub run_number: Option<String>,

    #[arg(long, env = "TEST_FILE")]
    pub test_file: Option<String>,
}

impl RunInfo {
    /// Present settings as label/value pairs
    fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("Environment", &self.env),
            ("Browser", &self.browser),
            ("Viewport", &self.viewport),
            ("URL", &self.test_url),
            ("Test file", &self.test_file),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().filter(|v| !v.is_empty()).map(|v| (label, v)))
        .collect()
    }
}

/// Strings scenarios log for people to follow up on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mined {
    pub emails: Vec<String>,
    pub coupons: Vec<String>,
}

/// Pull `Email:` and `Coupon:` values out of the captured stdout
pub fn mine_stdout(report: &Report) -> Mined {
    let mut emails = Vec::new();
    let mut coupons = Vec::new();
    for line in report.stdout_lines() {
        if let Some(c) = EMAIL_LINE.captures(line) {
            push_unique(&mut emails, &c[1]);
        }
        if let Some(c) = COUPON_LINE.captures(line) {
            push_unique(&mut coupons, &c[1]);
        }
    }
    Mined { emails, coupons }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Landing pages a run exercised, from suite files, spec titles and `TEST_FILE`
pub fn extract_tested_pages(report: &Report, test_file: Option<&str>) -> Vec<String> {
    let mut pages = BTreeSet::new();

    for flat in report.specs() {
        let from_file = scan_ad_paths(flat.file, &mut pages);
        let from_title = scan_ad_paths(&flat.spec.title, &mut pages);
        if !from_file && !from_title {
            if let Some(slug) = page_slug_from_file(flat.file) {
                pages.insert(format!("ad/{}", slug));
            }
        }
    }

    if let Some(filter) = test_file.map(str::trim).filter(|f| !f.is_empty()) {
        let filter = filter.trim_end_matches(".ts").trim_end_matches(".spec");
        if !scan_ad_paths(filter, &mut pages) && !NON_PAGE_GROUPS.contains(&filter) && !filter.contains('/') {
            pages.insert(format!("ad/{}", filter));
        }
    }

    pages.into_iter().collect()
}

/// Collect every `ad/<slug>` and `es/ad/<slug>` in `text`
fn scan_ad_paths(text: &str, pages: &mut BTreeSet<String>) -> bool {
    let mut found = false;
    for c in AD_PATH.captures_iter(text) {
        pages.insert(c[1].to_string());
        found = true;
    }
    found
}

/// `<slug>.spec.ts` files that sit directly in a landing-page directory
fn page_slug_from_file(file: &str) -> Option<String> {
    let slug = SPEC_FILE.captures(file)?.get(1)?.as_str().to_string();
    let dir = file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let in_page_dir = dir.is_empty() || dir.ends_with("ad-pages") || dir.ends_with("ad");
    (in_page_dir && !NON_PAGE_GROUPS.contains(&slug.as_str())).then_some(slug)
}

pub fn format_duration(ms: f64) -> String {
    let secs = ms / 1000.0;
    let whole = secs.round().max(0.0) as u64;
    if whole >= 60 {
        format!("{}m {}s", whole / 60, whole % 60)
    } else {
        format!("{:.1}s", secs)
    }
}

/// Everything a message is built from
#[derive(Debug, Clone)]
pub struct Notification {
    pub summary: Summary,
    pub failed: Vec<String>,
    pub pages: Vec<String>,
    pub mined: Mined,
    pub run: RunInfo,
    pub username: String,
}

impl Notification {
    pub fn from_report(report: &Report, run: RunInfo, username: impl Into<String>) -> Self {
        Self {
            summary: report.summary(),
            failed: report.failed_titles(),
            pages: extract_tested_pages(report, run.test_file.as_deref()),
            mined: mine_stdout(report),
            run,
            username: username.into(),
        }
    }

    fn icon(&self) -> &'static str {
        if self.summary.all_passed() {
            ":white_check_mark:"
        } else {
            ":x:"
        }
    }

    fn headline(&self) -> String {
        if self.summary.all_passed() {
            format!("✅ All {} tests passed", self.summary.passed)
        } else {
            format!("❌ {} of {} tests failed", self.summary.failed, self.summary.total)
        }
    }

    fn counts(&self) -> String {
        format!(
            "Passed: {}  Failed: {}  Flaky: {}  Skipped: {}  Duration: {}",
            self.summary.passed,
            self.summary.failed,
            self.summary.flaky,
            self.summary.skipped,
            format_duration(self.summary.duration_ms)
        )
    }

    fn failure_list(&self) -> String {
        let mut lines: Vec<String> = self
            .failed
            .iter()
            .take(MAX_LISTED_FAILURES)
            .map(|t| format!("• {}", t))
            .collect();
        if self.failed.len() > MAX_LISTED_FAILURES {
            lines.push(format!("…and {} more", self.failed.len() - MAX_LISTED_FAILURES));
        }
        lines.join("\n")
    }

    fn footer(&self) -> String {
        match &self.run.run_number {
            Some(n) => format!("LumiMeds E2E • run #{}", n),
            None => "LumiMeds E2E".to_string(),
        }
    }

    /// `username`, `icon_emoji` and a `text` body
    pub fn simple_payload(&self) -> Value {
        let mut lines = vec![format!("*LumiMeds E2E* {}", self.headline())];
        let settings: Vec<String> = self.run.fields().iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        if !settings.is_empty() {
            lines.push(settings.join(" | "));
        }
        lines.push(self.counts());
        if !self.pages.is_empty() {
            lines.push(format!("Pages: {}", self.pages.join(", ")));
        }
        for email in &self.mined.emails {
            lines.push(format!("Email: {}", email));
        }
        for coupon in &self.mined.coupons {
            lines.push(format!("Coupon: {}", coupon));
        }
        if !self.failed.is_empty() {
            lines.push(format!("Failed tests:\n{}", self.failure_list()));
        }
        if let Some(url) = &self.run.report_url {
            lines.push(format!("<{}|View report>", url));
        }
        if let Some(n) = &self.run.run_number {
            lines.push(format!("Run #{}", n));
        }

        json!({
            "username": self.username,
            "icon_emoji": self.icon(),
            "text": lines.join("\n"),
        })
    }

    /// A single colored attachment with short fields
    pub fn detailed_payload(&self) -> Value {
        let color = match (self.summary.failed, self.summary.flaky) {
            (0, 0) => "good",
            (0, _) => "warning",
            _ => "danger",
        };

        let field = |title: &str, value: String, short: bool| json!({ "title": title, "value": value, "short": short });
        let mut fields = vec![
            field("Passed", self.summary.passed.to_string(), true),
            field("Failed", self.summary.failed.to_string(), true),
            field("Flaky", self.summary.flaky.to_string(), true),
            field("Skipped", self.summary.skipped.to_string(), true),
            field("Duration", format_duration(self.summary.duration_ms), true),
        ];
        for (label, value) in self.run.fields() {
            fields.push(field(label, value.to_string(), true));
        }
        if !self.pages.is_empty() {
            fields.push(field("Pages", self.pages.join("\n"), false));
        }
        if !self.mined.emails.is_empty() {
            fields.push(field("Test emails", self.mined.emails.join("\n"), false));
        }
        if !self.mined.coupons.is_empty() {
            fields.push(field("Coupons", self.mined.coupons.join(", "), false));
        }
        if !self.failed.is_empty() {
            fields.push(field("Failed tests", self.failure_list(), false));
        }

        let mut attachment = json!({
            "color": color,
            "title": self.headline(),
            "fields": fields,
            "footer": self.footer(),
            "ts": chrono::Utc::now().timestamp(),
        });
        if let Some(url) = &self.run.report_url {
            attachment["title_link"] = json!(url);
        }

        json!({
            "username": self.username,
            "icon_emoji": self.icon(),
            "attachments": [attachment],
        })
    }

    pub fn payload(&self, style: MessageStyle) -> Value {
        match style {
            MessageStyle::Simple => self.simple_payload(),
            MessageStyle::Detailed => self.detailed_payload(),
        }
    }
}

/// POST a payload to an incoming webhook
pub async fn post(client: &reqwest::Client, webhook_url: &str, payload: &Value) -> Result<()> {
    let response = client
        .post(webhook_url)
        .json(payload)
        .send()
        .await
        .context("sending Slack notification")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Slack webhook returned {}: {}", status, body);
    }
    Ok(())
}

pub async fn execute(args: NotifyArgs) -> Result<()> {
    let report = Report::from_file(&args.results)
        .with_context(|| format!("reading {}", args.results.display()))?;
    let notification = Notification::from_report(&report, args.run.clone(), args.username.clone());
    let payload = notification.payload(args.style);

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let webhook_url = args
        .webhook_url
        .filter(|u| !u.trim().is_empty())
        .context("SLACK_WEBHOOK_URL is not set")?;

    info!(
        "Posting {} summary: {} passed, {} failed",
        match args.style {
            MessageStyle::Simple => "simple",
            MessageStyle::Detailed => "detailed",
        },
        notification.summary.passed,
        notification.summary.failed
    );
    post(&reqwest::Client::new(), &webhook_url, &payload).await?;

    print_success("Slack notification sent");
    if !notification.pages.is_empty() {
        print_info(&format!("Pages tested: {}", notification.pages.join(", ")));
    }
    Ok(())
}
