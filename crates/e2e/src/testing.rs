//! In-memory browser used by page-object and scenario unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lumimeds_common::{HarnessConfig, Project};

use crate::bridge::Transport;
use crate::error::{E2eError, E2eResult};
use crate::playwright::BrowserSession;
use crate::protocol::{Command, CompletionSignal, RawLink, SignalSource, WaitState};

/// Scripted page state. Clicking an element that is not visible fails the
/// same way Playwright's actionability check would.
#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub url: String,
    pub visible: HashSet<String>,
    pub texts: HashMap<String, String>,
    pub links: HashMap<String, Vec<RawLink>>,
    /// selector -> URL loaded when it is clicked
    pub navigations: HashMap<String, String>,
    /// selector -> selectors that appear when it is clicked
    pub reveals: HashMap<String, Vec<String>>,
    /// selector -> selectors that disappear when it is clicked
    pub hides: HashMap<String, Vec<String>>,
    /// selector -> text changes applied when it is clicked
    pub text_updates: HashMap<String, Vec<(String, String)>>,
    pub escape_hides: Vec<String>,
    pub mouse_hides: Vec<String>,
    /// selector -> number of fills that fail before one succeeds
    pub fill_failures: HashMap<String, u32>,
    pub fills: Vec<(String, String)>,
    pub commands: Vec<String>,
    pub history: Vec<String>,
    pub signal: Option<CompletionSignal>,
    pub evaluate_result: Value,
}

impl FakeState {
    fn load(&mut self, url: &str) {
        let previous = std::mem::replace(&mut self.url, url.to_string());
        self.history.push(previous);
    }

    fn click(&mut self, selector: &str) -> E2eResult<()> {
        if !self.visible.contains(selector) {
            return Err(E2eError::Playwright {
                command: format!("click:{}", selector),
                message: "Timeout exceeded waiting for element".to_string(),
            });
        }
        for hidden in self.hides.get(selector).cloned().unwrap_or_default() {
            self.visible.remove(&hidden);
        }
        for shown in self.reveals.get(selector).cloned().unwrap_or_default() {
            self.visible.insert(shown);
        }
        for (target, text) in self.text_updates.get(selector).cloned().unwrap_or_default() {
            self.texts.insert(target, text);
        }
        if let Some(url) = self.navigations.get(selector).cloned() {
            self.load(&url);
        }
        Ok(())
    }

    fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        if let Some(remaining) = self.fill_failures.get_mut(selector) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(E2eError::Playwright {
                    command: format!("fill:{}", selector),
                    message: "element is not editable".to_string(),
                });
            }
        }
        self.fills.push((selector.to_string(), value.to_string()));
        Ok(())
    }

    fn apply(&mut self, command: &Command) -> E2eResult<Value> {
        self.commands.push(command.name().to_string());
        let value = match command {
            Command::Launch { .. } => json!("fake"),
            Command::Goto { url, .. } => {
                self.load(url);
                json!({ "status": 200, "url": url })
            }
            Command::Url => json!(self.url),
            Command::Click { selector, .. } => {
                self.click(selector)?;
                Value::Null
            }
            Command::ClickAndWaitUrl {
                selector, url_contains, ..
            } => {
                self.click(selector)?;
                json!({ "matched": self.url.contains(url_contains.as_str()), "url": self.url })
            }
            Command::Fill { selector, value, .. } => {
                self.fill(selector, value)?;
                Value::Null
            }
            Command::FrameFill {
                frame_selector,
                selector,
                value,
                ..
            } => {
                self.fill(&format!("{} >> {}", frame_selector, selector), value)?;
                Value::Null
            }
            Command::Press { key, .. } => {
                if key == "Escape" {
                    for hidden in std::mem::take(&mut self.escape_hides) {
                        self.visible.remove(&hidden);
                    }
                }
                Value::Null
            }
            Command::WaitFor { selector, state, .. } => {
                let present = self.visible.contains(selector);
                json!(match state {
                    WaitState::Visible | WaitState::Attached => present,
                    WaitState::Hidden | WaitState::Detached => !present,
                })
            }
            Command::WaitForUrl { contains, .. } => json!(self.url.contains(contains.as_str())),
            Command::Visible { selector } | Command::ScrollIntoView { selector, .. } => {
                json!(self.visible.contains(selector))
            }
            Command::Count { selector } => {
                let links = self.links.get(selector).map(Vec::len).unwrap_or(0);
                json!(links.max(usize::from(self.visible.contains(selector))))
            }
            Command::Text { selector, .. } => json!(self.texts.get(selector)),
            Command::Texts { selector } => json!(self.texts.get(selector).into_iter().collect::<Vec<_>>()),
            Command::Links { selector } => json!(self.links.get(selector).cloned().unwrap_or_default()),
            Command::MouseClick { .. } => {
                for hidden in std::mem::take(&mut self.mouse_hides) {
                    self.visible.remove(&hidden);
                }
                Value::Null
            }
            Command::Screenshot { path, .. } => json!(path),
            Command::Evaluate { .. } => self.evaluate_result.clone(),
            Command::SelectOption { selector, value, .. } => {
                self.fill(selector, value)?;
                Value::Null
            }
            Command::Check { selector, .. } => {
                self.click(selector)?;
                Value::Null
            }
            Command::SubmitAndWatch { selector, .. } => {
                self.click(selector)?;
                let signal = self.signal.clone().unwrap_or(CompletionSignal {
                    via: SignalSource::Timeout,
                    detail: self.url.clone(),
                });
                if signal.via == SignalSource::Navigation {
                    self.load(&signal.detail);
                }
                serde_json::to_value(signal)?
            }
            Command::GoBack => {
                if let Some(previous) = self.history.pop() {
                    self.url = previous;
                }
                json!(self.url)
            }
            Command::Close => json!({ "video": null }),
            Command::Sleep { .. } | Command::Viewport | Command::ClearCookies => Value::Null,
        };
        Ok(value)
    }
}

/// Handle to a scripted page that can hand out sessions
#[derive(Clone, Default)]
pub(crate) struct FakeBrowser {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBrowser {
    pub fn new(url: &str) -> Self {
        let browser = Self::default();
        browser.state().url = url.to_string();
        browser
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn show(&self, selectors: &[&str]) -> &Self {
        let mut state = self.state();
        for selector in selectors {
            state.visible.insert(selector.to_string());
        }
        drop(state);
        self
    }

    pub fn on_click_navigate(&self, selector: &str, url: &str) -> &Self {
        self.state().navigations.insert(selector.to_string(), url.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn session(&self) -> BrowserSession {
        let project = Project::by_name("mobile-safari").unwrap();
        self.session_with(project, &HarnessConfig::default())
    }

    pub fn session_with(&self, project: Project, config: &HarnessConfig) -> BrowserSession {
        let transport = FakeTransport {
            state: self.state.clone(),
        };
        BrowserSession::with_transport(Box::new(transport), project, config)
    }
}

struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request(&mut self, command: &Command, _timeout: Duration) -> E2eResult<Value> {
        let result = self.state.lock().unwrap().apply(command);
        result
    }

    async fn shutdown(&mut self) {}
}
