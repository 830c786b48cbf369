//! Per-attempt test context

use std::fmt::Display;
use std::sync::Arc;
use tracing::info;

use lumimeds_common::{HarnessConfig, Project};

use crate::error::E2eResult;
use crate::playwright::BrowserSession;

/// What a scenario gets to work with: one browser session, the harness
/// configuration, and a log that ends up in the report's stdout.
pub struct TestContext {
    pub session: BrowserSession,
    config: Arc<HarnessConfig>,
    title: String,
    output: Vec<String>,
}

impl TestContext {
    pub fn new(session: BrowserSession, config: Arc<HarnessConfig>, title: impl Into<String>) -> Self {
        Self {
            session,
            config,
            title: title.into(),
            output: Vec::new(),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn project(&self) -> &Project {
        self.session.project()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Absolute URL for a site path
    pub fn url(&self, path: &str) -> String {
        self.config.url(path)
    }

    /// Log a line and capture it for the report
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("[{}] {}", self.project().name, line);
        self.output.push(line);
    }

    /// Log a best-effort failure with the info marker and carry on
    pub fn recover<T, E: Display>(&mut self, what: &str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.log(format!("ℹ️ {}: {}", what, e));
                None
            }
        }
    }

    /// Screenshot named after the current test
    pub async fn capture(&mut self, label: &str) -> E2eResult<std::path::PathBuf> {
        let name = format!("{}-{}", self.title, label);
        let path = self.session.screenshot(&name, true).await?;
        self.log(format!("📸 Screenshot saved: {}", path.display()));
        Ok(path)
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn into_session(self) -> BrowserSession {
        self.session
    }
}
