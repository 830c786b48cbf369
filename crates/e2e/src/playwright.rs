//! Playwright browser automation
//!
//! `BrowserSession` is the typed face of the bridge: one browser, one context,
//! one active page. Page objects only ever talk to this type.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use lumimeds_common::{HarnessConfig, Project, Timeouts, Viewport};

use crate::bridge::{BridgeConfig, BridgeProcess, Transport};
use crate::error::{E2eError, E2eResult};
use crate::protocol::{
    ClickNavigation, ClosedSession, Command, CompletionSignal, Navigation, RawLink, WaitState, WaitUntil,
};

/// Slack added on top of a command's own timeout before Rust gives up on the bridge
const TRANSPORT_MARGIN: Duration = Duration::from_secs(5);

/// Playwright browser handle
pub struct BrowserSession {
    transport: Box<dyn Transport>,
    project: Project,
    timeouts: Timeouts,
    screenshot_dir: PathBuf,
    closed: bool,
}

impl BrowserSession {
    /// Spawn a bridge and open a browser context for `project`
    pub async fn launch(bridge: &BridgeConfig, project: &Project, config: &HarnessConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(config.screenshot_dir())?;
        let video_dir = if config.record_video {
            let dir = config.video_dir();
            std::fs::create_dir_all(&dir)?;
            Some(dir.to_string_lossy().to_string())
        } else {
            None
        };

        let process = BridgeProcess::spawn(bridge).await?;
        let mut session = Self::with_transport(Box::new(process), project.clone(), config);

        let version = session
            .transport
            .request(
                &Command::Launch {
                    browser: project.browser,
                    headless: config.headless,
                    viewport: project.viewport,
                    is_mobile: project.is_mobile,
                    has_touch: project.has_touch,
                    device_scale_factor: project.device_scale_factor,
                    user_agent: project.user_agent.clone(),
                    video_dir,
                    action_timeout: config.timeouts.action.as_millis() as u64,
                    navigation_timeout: config.timeouts.navigation.as_millis() as u64,
                },
                bridge.startup_timeout,
            )
            .await?;

        info!(
            "Launched {} {} at {}",
            project.name,
            version.as_str().unwrap_or("?"),
            project.viewport
        );
        Ok(session)
    }

    /// Build a session over an already-connected transport
    pub fn with_transport(transport: Box<dyn Transport>, project: Project, config: &HarnessConfig) -> Self {
        Self {
            transport,
            project,
            timeouts: config.timeouts,
            screenshot_dir: config.screenshot_dir(),
            closed: false,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    fn action_ms(&self) -> u64 {
        self.timeouts.action.as_millis() as u64
    }

    fn navigation_ms(&self) -> u64 {
        self.timeouts.navigation.as_millis() as u64
    }

    async fn call(&mut self, command: Command, timeout: Duration) -> E2eResult<Value> {
        if self.closed {
            return Err(E2eError::BridgeClosed);
        }
        debug!("Executing step: {}", command.describe());
        self.transport.request(&command, timeout + TRANSPORT_MARGIN).await
    }

    async fn call_as<T: DeserializeOwned>(&mut self, command: Command, timeout: Duration) -> E2eResult<T> {
        let name = command.describe();
        let value = self.call(command, timeout).await?;
        serde_json::from_value(value).map_err(|e| E2eError::Protocol(format!("{}: {}", name, e)))
    }

    pub async fn goto(&mut self, url: &str) -> E2eResult<Navigation> {
        self.goto_until(url, WaitUntil::DomContentLoaded).await
    }

    pub async fn goto_until(&mut self, url: &str, wait_until: WaitUntil) -> E2eResult<Navigation> {
        let timeout = self.timeouts.navigation;
        self.call_as(
            Command::Goto {
                url: url.to_string(),
                wait_until,
            },
            timeout,
        )
        .await
    }

    pub async fn current_url(&mut self) -> E2eResult<String> {
        let timeout = self.timeouts.action;
        self.call_as(Command::Url, timeout).await
    }

    pub async fn click(&mut self, selector: &str) -> E2eResult<()> {
        self.click_with(selector, self.timeouts.action, false).await
    }

    pub async fn click_with(&mut self, selector: &str, timeout: Duration, force: bool) -> E2eResult<()> {
        self.call(
            Command::Click {
                selector: selector.to_string(),
                timeout: timeout.as_millis() as u64,
                force,
            },
            timeout,
        )
        .await?;
        Ok(())
    }

    /// Click and wait for a URL containing `url_contains`, armed before the click
    pub async fn click_and_wait_url(&mut self, selector: &str, url_contains: &str) -> E2eResult<ClickNavigation> {
        let timeout = self.timeouts.navigation;
        self.call_as(
            Command::ClickAndWaitUrl {
                selector: selector.to_string(),
                url_contains: url_contains.to_string(),
                timeout: self.navigation_ms(),
            },
            timeout,
        )
        .await
    }

    pub async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        self.call(
            Command::Fill {
                selector: selector.to_string(),
                value: value.to_string(),
                timeout: self.action_ms(),
            },
            timeout,
        )
        .await?;
        Ok(())
    }

    pub async fn frame_fill(&mut self, frame_selector: &str, selector: &str, value: &str) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        self.call(
            Command::FrameFill {
                frame_selector: frame_selector.to_string(),
                selector: selector.to_string(),
                value: value.to_string(),
                timeout: self.action_ms(),
            },
            timeout,
        )
        .await?;
        Ok(())
    }

    pub async fn press(&mut self, selector: Option<&str>, key: &str) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        self.call(
            Command::Press {
                selector: selector.map(String::from),
                key: key.to_string(),
            },
            timeout,
        )
        .await?;
        Ok(())
    }

    /// Wait for an element state. Returns `false` instead of failing on timeout.
    pub async fn wait_for(&mut self, selector: &str, state: WaitState, timeout: Duration) -> E2eResult<bool> {
        self.call_as(
            Command::WaitFor {
                selector: selector.to_string(),
                state,
                timeout: timeout.as_millis() as u64,
            },
            timeout,
        )
        .await
    }

    /// Wait for the URL to contain `contains`. Returns `false` on timeout.
    pub async fn wait_for_url(&mut self, contains: &str, timeout: Duration) -> E2eResult<bool> {
        self.call_as(
            Command::WaitForUrl {
                contains: contains.to_string(),
                timeout: timeout.as_millis() as u64,
            },
            timeout,
        )
        .await
    }

    pub async fn is_visible(&mut self, selector: &str) -> E2eResult<bool> {
        let timeout = self.timeouts.action;
        self.call_as(
            Command::Visible {
                selector: selector.to_string(),
            },
            timeout,
        )
        .await
    }

    /// First selector from `candidates` that is currently visible
    pub async fn first_visible<S: AsRef<str> + Sync>(&mut self, candidates: &[S]) -> E2eResult<Option<String>> {
        for selector in candidates {
            let selector = selector.as_ref();
            if self.is_visible(selector).await? {
                return Ok(Some(selector.to_string()));
            }
        }
        Ok(None)
    }

    /// Fill the first visible field among `candidates`. Returns the selector used.
    pub async fn fill_first<S: AsRef<str> + Sync>(&mut self, candidates: &[S], value: &str) -> E2eResult<Option<String>> {
        match self.first_visible(candidates).await? {
            Some(selector) => {
                self.fill(&selector, value).await?;
                Ok(Some(selector))
            }
            None => Ok(None),
        }
    }

    /// Click the first visible element among `candidates`. Returns the selector used.
    pub async fn click_first<S: AsRef<str> + Sync>(&mut self, candidates: &[S]) -> E2eResult<Option<String>> {
        match self.first_visible(candidates).await? {
            Some(selector) => {
                self.click(&selector).await?;
                Ok(Some(selector))
            }
            None => Ok(None),
        }
    }

    pub async fn count(&mut self, selector: &str) -> E2eResult<usize> {
        let timeout = self.timeouts.action;
        self.call_as(
            Command::Count {
                selector: selector.to_string(),
            },
            timeout,
        )
        .await
    }

    pub async fn text(&mut self, selector: &str) -> E2eResult<Option<String>> {
        let timeout = self.timeouts.action;
        self.call_as(
            Command::Text {
                selector: selector.to_string(),
                timeout: 5_000,
            },
            timeout,
        )
        .await
    }

    pub async fn texts(&mut self, selector: &str) -> E2eResult<Vec<String>> {
        let timeout = self.timeouts.action;
        self.call_as(
            Command::Texts {
                selector: selector.to_string(),
            },
            timeout,
        )
        .await
    }

    /// Anchors inside `container`
    pub async fn links(&mut self, container: &str) -> E2eResult<Vec<RawLink>> {
        let timeout = self.timeouts.action;
        self.call_as(
            Command::Links {
                selector: container.to_string(),
            },
            timeout,
        )
        .await
    }

    pub async fn mouse_click(&mut self, x: f64, y: f64) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        self.call(Command::MouseClick { x, y }, timeout).await?;
        Ok(())
    }

    pub async fn scroll_into_view(&mut self, selector: &str) -> E2eResult<bool> {
        let timeout = self.timeouts.action;
        self.call_as(
            Command::ScrollIntoView {
                selector: selector.to_string(),
                timeout: self.action_ms(),
            },
            timeout,
        )
        .await
    }

    /// Save a screenshot as `<project>-<name>.png` in the screenshot directory
    pub async fn screenshot(&mut self, name: &str, full_page: bool) -> E2eResult<PathBuf> {
        let path = self
            .screenshot_dir
            .join(format!("{}-{}.png", self.project.name, slug(name)));
        let timeout = self.timeouts.action;
        self.call(
            Command::Screenshot {
                path: path.to_string_lossy().to_string(),
                full_page,
            },
            timeout,
        )
        .await?;
        Ok(path)
    }

    pub async fn evaluate(&mut self, script: &str) -> E2eResult<Value> {
        let timeout = self.timeouts.action;
        self.call(
            Command::Evaluate {
                script: script.to_string(),
            },
            timeout,
        )
        .await
    }

    /// Fixed pause in the page. Prefer waiting on a condition.
    pub async fn sleep(&mut self, duration: Duration) -> E2eResult<()> {
        self.call(
            Command::Sleep {
                ms: duration.as_millis() as u64,
            },
            duration,
        )
        .await?;
        Ok(())
    }

    pub async fn select_option(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        self.call(
            Command::SelectOption {
                selector: selector.to_string(),
                value: value.to_string(),
                timeout: self.action_ms(),
            },
            timeout,
        )
        .await?;
        Ok(())
    }

    pub async fn check(&mut self, selector: &str) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        self.call(
            Command::Check {
                selector: selector.to_string(),
                timeout: self.action_ms(),
            },
            timeout,
        )
        .await?;
        Ok(())
    }

    /// Click `selector` and report the first completion signal
    pub async fn submit_and_watch(
        &mut self,
        selector: &str,
        checkout_path: &str,
        markers: &[String],
        timeout: Duration,
    ) -> E2eResult<CompletionSignal> {
        self.call_as(
            Command::SubmitAndWatch {
                selector: selector.to_string(),
                checkout_path: checkout_path.to_string(),
                markers: markers.to_vec(),
                timeout: timeout.as_millis() as u64,
            },
            timeout + self.timeouts.action,
        )
        .await
    }

    pub async fn go_back(&mut self) -> E2eResult<String> {
        let timeout = self.timeouts.navigation;
        self.call_as(Command::GoBack, timeout).await
    }

    pub async fn viewport(&mut self) -> E2eResult<Viewport> {
        let timeout = self.timeouts.action;
        let value: Option<Viewport> = self.call_as(Command::Viewport, timeout).await?;
        Ok(value.unwrap_or(self.project.viewport))
    }

    pub async fn clear_cookies(&mut self) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        self.call(Command::ClearCookies, timeout).await?;
        Ok(())
    }

    /// Close the context and browser. Returns the recorded video, if any.
    pub async fn close(&mut self) -> E2eResult<Option<PathBuf>> {
        if self.closed {
            return Ok(None);
        }
        let timeout = self.timeouts.navigation;
        let result: E2eResult<ClosedSession> = self.call_as(Command::Close, timeout).await;
        self.closed = true;
        self.transport.shutdown().await;
        Ok(result?.video.map(PathBuf::from))
    }
}

/// File-name safe version of a title
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Whether a path is an existing regular file
pub(crate) fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
