//! Test runner: scenario × project matrix, retries, and the JSON report

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use lumimeds_common::report::{
    Attachment, AttemptStatus, ReportError, Spec, Stats, StdioEntry, Suite, Test, TestResult, TestStatus,
};
use lumimeds_common::{HarnessConfig, Project, Report};

use crate::bridge::BridgeConfig;
use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::playwright::{is_file, BrowserSession};
use crate::scenarios::{matches_file, Scenario};

/// Opens a fresh browser for one attempt
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, project: &Project) -> E2eResult<BrowserSession>;
}

/// Launches a Node Playwright bridge per attempt
pub struct BridgeLauncher {
    bridge: BridgeConfig,
    harness: Arc<HarnessConfig>,
}

impl BridgeLauncher {
    pub fn new(bridge: BridgeConfig, harness: Arc<HarnessConfig>) -> Self {
        Self { bridge, harness }
    }
}

#[async_trait]
impl Launcher for BridgeLauncher {
    async fn launch(&self, project: &Project) -> E2eResult<BrowserSession> {
        BrowserSession::launch(&self.bridge, project, &self.harness).await
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub projects: Vec<Project>,
    pub workers: usize,
    /// Substring of the test title
    pub grep: Option<String>,
    /// Scenario group or part of its file
    pub file: Option<String>,
    pub results_path: PathBuf,
    pub bridge: BridgeConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            projects: Project::all(),
            workers: 1,
            grep: None,
            file: None,
            results_path: PathBuf::from("test-results.json"),
            bridge: BridgeConfig::default(),
        }
    }
}

/// One cell of the matrix, in report order
struct Job {
    index: usize,
    scenario: Arc<dyn Scenario>,
    project: Project,
}

struct JobResult {
    index: usize,
    file: String,
    title: String,
    test: Test,
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,
    harness: Arc<HarnessConfig>,
    launcher: Arc<dyn Launcher>,
}

impl TestRunner {
    pub fn new(config: RunnerConfig, harness: Arc<HarnessConfig>) -> Self {
        let launcher = Arc::new(BridgeLauncher::new(config.bridge.clone(), harness.clone()));
        Self::with_launcher(config, harness, launcher)
    }

    pub fn with_launcher(config: RunnerConfig, harness: Arc<HarnessConfig>, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            config,
            harness,
            launcher,
        }
    }

    /// Apply the `--file` and `--grep` filters
    pub fn select(&self, scenarios: Vec<Arc<dyn Scenario>>) -> Vec<Arc<dyn Scenario>> {
        scenarios
            .into_iter()
            .filter(|s| self.config.file.as_deref().map_or(true, |f| matches_file(s.as_ref(), f)))
            .filter(|s| self.config.grep.as_deref().map_or(true, |g| s.title().contains(g)))
            .collect()
    }

    /// Run every selected scenario on every project and write the report
    pub async fn run(&self, scenarios: Vec<Arc<dyn Scenario>>) -> E2eResult<Report> {
        let selected = self.select(scenarios);
        let started = Instant::now();
        let start_time = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut jobs = Vec::new();
        for scenario in &selected {
            for project in &self.config.projects {
                jobs.push(Job {
                    index: jobs.len(),
                    scenario: scenario.clone(),
                    project: project.clone(),
                });
            }
        }
        info!(
            "Running {} test(s) across {} project(s) with {} worker(s)...",
            jobs.len(),
            self.config.projects.len(),
            self.config.workers.max(1)
        );

        let mut results: Vec<JobResult> = stream::iter(jobs)
            .map(|job| self.run_job(job))
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;
        results.sort_by_key(|r| r.index);

        let mut report = build_report(results);
        report.stats.start_time = Some(start_time);
        report.stats.duration = started.elapsed().as_secs_f64() * 1000.0;
        report.recount();

        let summary = report.summary();
        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} flaky, {} skipped ({:.1}s)",
            summary.passed,
            summary.failed,
            summary.flaky,
            summary.skipped,
            summary.duration_ms / 1000.0
        );

        report.write_to(&self.config.results_path)?;
        info!("Results written to: {}", self.config.results_path.display());
        Ok(report)
    }

    async fn run_job(&self, job: Job) -> JobResult {
        let scenario = job.scenario.as_ref();
        let title = scenario.title();
        let mut results = Vec::new();
        let mut statuses = Vec::new();

        if let Some(reason) = scenario.skip_reason(&self.harness) {
            info!("ℹ️ [{}] skipped {}: {}", job.project.name, title, reason);
            results.push(TestResult {
                status: AttemptStatus::Skipped,
                stdout: vec![StdioEntry::text(format!("ℹ️ Skipped: {}\n", reason))],
                ..TestResult::default()
            });
            statuses.push(AttemptStatus::Skipped);
        } else {
            for retry in 0..=self.harness.retries {
                let result = self.attempt(scenario, &job.project, retry).await;
                let status = result.status;
                statuses.push(status);
                results.push(result);
                if matches!(status, AttemptStatus::Passed | AttemptStatus::Skipped) {
                    break;
                }
                if retry < self.harness.retries {
                    warn!("⚠️ [{}] {} failed, retry {}", job.project.name, title, retry + 1);
                }
            }
        }

        let status = TestStatus::from_attempts(&statuses);
        match status {
            TestStatus::Expected => info!("✓ [{}] {}", job.project.name, title),
            TestStatus::Flaky => warn!("⚠️ [{}] {} (flaky)", job.project.name, title),
            TestStatus::Unexpected => error!("✗ [{}] {}", job.project.name, title),
            TestStatus::Skipped => {}
        }

        JobResult {
            index: job.index,
            file: format!("{}.ts", scenario.file()),
            title,
            test: Test {
                project_name: job.project.name.clone(),
                status,
                results,
            },
        }
    }

    /// One attempt in its own browser
    async fn attempt(&self, scenario: &dyn Scenario, project: &Project, retry: u32) -> TestResult {
        let started = Instant::now();
        let start_time = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        let failed = |message: String| TestResult {
            status: AttemptStatus::Failed,
            duration: started.elapsed().as_millis() as u64,
            retry,
            start_time: start_time.clone(),
            errors: vec![ReportError { message }],
            ..TestResult::default()
        };

        let session = match self.launcher.launch(project).await {
            Ok(session) => session,
            Err(e) => {
                error!("✗ [{}] could not launch browser: {}", project.name, e);
                return failed(e.to_string());
            }
        };

        let mut ctx = TestContext::new(session, self.harness.clone(), scenario.title());
        let budget = scenario.timeout(&self.harness.timeouts);
        debug!("Running {} on {} (timeout {:?})", scenario.title(), project.name, budget);

        let (status, errors) = match tokio::time::timeout(budget, scenario.run(&mut ctx)).await {
            Ok(Ok(())) => (AttemptStatus::Passed, vec![]),
            Ok(Err(E2eError::Skipped(reason))) => {
                ctx.log(format!("ℹ️ Skipped: {}", reason));
                (AttemptStatus::Skipped, vec![])
            }
            Ok(Err(e)) => {
                ctx.log(format!("✗ {}", e));
                (AttemptStatus::Failed, vec![ReportError { message: e.to_string() }])
            }
            Err(_) => {
                let message = format!("Test timeout of {}ms exceeded.", budget.as_millis());
                ctx.log(format!("✗ {}", message));
                (AttemptStatus::TimedOut, vec![ReportError { message }])
            }
        };

        let mut attachments = Vec::new();
        match ctx.session.close().await {
            Ok(Some(video)) if is_file(&video) => attachments.push(Attachment {
                name: "video".to_string(),
                content_type: "video/webm".to_string(),
                path: Some(video.to_string_lossy().to_string()),
            }),
            Ok(_) => {}
            Err(e) => warn!("Browser did not close cleanly: {}", e),
        }

        TestResult {
            status,
            duration: started.elapsed().as_millis() as u64,
            retry,
            start_time,
            stdout: ctx
                .take_output()
                .into_iter()
                .map(|line| StdioEntry::text(format!("{}\n", line)))
                .collect(),
            stderr: vec![],
            errors,
            attachments,
        }
    }
}

/// Group results into one suite per file, one spec per title
fn build_report(results: Vec<JobResult>) -> Report {
    let mut suites: BTreeMap<String, Suite> = BTreeMap::new();
    for result in results {
        let suite = suites.entry(result.file.clone()).or_insert_with(|| Suite {
            title: result.file.clone(),
            file: result.file.clone(),
            ..Suite::default()
        });
        let index = match suite.specs.iter().position(|s| s.title == result.title) {
            Some(index) => index,
            None => {
                suite.specs.push(Spec {
                    title: result.title.clone(),
                    ok: true,
                    file: result.file.clone(),
                    tests: vec![],
                });
                suite.specs.len() - 1
            }
        };
        let spec = &mut suite.specs[index];
        spec.ok &= result.test.status != TestStatus::Unexpected;
        spec.tests.push(result.test);
    }

    Report {
        suites: suites.into_values().collect(),
        stats: Stats::default(),
        errors: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBrowser;
    use lumimeds_common::Timeouts;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FakeLauncher {
        browser: FakeBrowser,
    }

    #[async_trait]
    impl Launcher for FakeLauncher {
        async fn launch(&self, project: &Project) -> E2eResult<BrowserSession> {
            Ok(self.browser.session_with(project.clone(), &HarnessConfig::default()))
        }
    }

    enum Behaviour {
        Pass,
        FailOnce(AtomicU32),
        Hang,
        Skip,
    }

    struct Scripted {
        title: &'static str,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl Scenario for Scripted {
        fn group(&self) -> &'static str {
            "scripted"
        }

        fn file(&self) -> String {
            format!("scripted/{}.spec", self.title.replace(' ', "-"))
        }

        fn title(&self) -> String {
            self.title.to_string()
        }

        fn timeout(&self, _timeouts: &Timeouts) -> Duration {
            Duration::from_millis(100)
        }

        fn skip_reason(&self, _config: &HarnessConfig) -> Option<String> {
            matches!(self.behaviour, Behaviour::Skip).then(|| "not configured".to_string())
        }

        async fn run(&self, ctx: &mut TestContext) -> E2eResult<()> {
            ctx.log("Email: qa+runner@lumimeds.com");
            match &self.behaviour {
                Behaviour::Pass | Behaviour::Skip => Ok(()),
                Behaviour::FailOnce(calls) => {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(E2eError::assertion("first attempt fails"))
                    } else {
                        Ok(())
                    }
                }
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            }
        }
    }

    fn scenario(title: &'static str, behaviour: Behaviour) -> Arc<dyn Scenario> {
        Arc::new(Scripted { title, behaviour })
    }

    fn runner(results_path: PathBuf, grep: Option<&str>) -> TestRunner {
        let config = RunnerConfig {
            projects: vec![Project::by_name("mobile-safari").unwrap()],
            workers: 2,
            grep: grep.map(str::to_string),
            file: None,
            results_path,
            bridge: BridgeConfig::default(),
        };
        let harness = Arc::new(HarnessConfig {
            retries: 1,
            ..HarnessConfig::default()
        });
        let launcher = Arc::new(FakeLauncher {
            browser: FakeBrowser::new("about:blank"),
        });
        TestRunner::with_launcher(config, harness, launcher)
    }

    #[tokio::test]
    async fn test_report_statuses_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-results.json");
        let runner = runner(path.clone(), None);

        let report = runner
            .run(vec![
                scenario("passes", Behaviour::Pass),
                scenario("flakes", Behaviour::FailOnce(AtomicU32::new(0))),
                scenario("hangs", Behaviour::Hang),
                scenario("skips", Behaviour::Skip),
            ])
            .await
            .unwrap();

        assert_eq!(report.stats.expected, 1);
        assert_eq!(report.stats.flaky, 1);
        assert_eq!(report.stats.unexpected, 1);
        assert_eq!(report.stats.skipped, 1);
        assert!(report.stats.start_time.is_some());

        let hangs = report.suites.iter().find(|s| s.file == "scripted/hangs.spec.ts").unwrap();
        let test = &hangs.specs[0].tests[0];
        assert_eq!(test.results.len(), 2);
        assert_eq!(test.results[1].retry, 1);
        assert_eq!(test.results[0].status, AttemptStatus::TimedOut);
        assert!(test.results[0].errors[0].message.contains("100ms"));
        assert!(!hangs.specs[0].ok);

        assert!(report.stdout_lines().contains(&"Email: qa+runner@lumimeds.com"));
        assert_eq!(Report::from_file(&path).unwrap().stats, report.stats);
    }

    #[tokio::test]
    async fn test_grep_filters_titles() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path().join("results.json"), Some("pass"));
        let report = runner
            .run(vec![scenario("passes", Behaviour::Pass), scenario("hangs", Behaviour::Hang)])
            .await
            .unwrap();
        assert_eq!(report.suites.len(), 1);
        assert_eq!(report.summary().total, 1);
    }
}
