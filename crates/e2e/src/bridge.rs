//! Playwright bridge process: spawning, the JSON line protocol, and shutdown
//!
//! The bridge is a small Node script that owns one browser and one context.
//! Rust writes one JSON request per line to its stdin and reads one JSON
//! response per line from its stdout. Everything the script wants to say to
//! humans goes to stderr and is forwarded to tracing.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::protocol::Command;

/// Node side of the bridge. Commands are chained so they run strictly in order
/// even if Rust gives up on one and sends the next.
pub const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

let browser = null;
let context = null;
let page = null;
let actionTimeout = 30000;
let navigationTimeout = 60000;

const log = (...args) => console.error('[bridge]', ...args);
const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
const first = (selector) => page.locator(selector).first();

async function probe(fn, fallback) {
  try { return await fn(); } catch (_) { return fallback; }
}

const handlers = {
  async launch(a) {
    browser = await playwright[a.browser].launch({ headless: a.headless });
    const options = {
      viewport: a.viewport,
      hasTouch: a.hasTouch,
      deviceScaleFactor: a.deviceScaleFactor,
      ignoreHTTPSErrors: true,
    };
    if (a.isMobile) options.isMobile = true;
    if (a.userAgent) options.userAgent = a.userAgent;
    if (a.videoDir) options.recordVideo = { dir: a.videoDir, size: a.viewport };
    context = await browser.newContext(options);
    actionTimeout = a.actionTimeout;
    navigationTimeout = a.navigationTimeout;
    context.setDefaultTimeout(actionTimeout);
    context.setDefaultNavigationTimeout(navigationTimeout);
    page = await context.newPage();
    return browser.version();
  },
  async goto(a) {
    const response = await page.goto(a.url, { waitUntil: a.waitUntil });
    return { status: response ? response.status() : null, url: page.url() };
  },
  async url() { return page.url(); },
  async click(a) {
    await first(a.selector).click({ timeout: a.timeout, force: a.force });
    return null;
  },
  async click_and_wait_url(a) {
    const [matched] = await Promise.all([
      page.waitForURL((u) => u.toString().includes(a.urlContains), { timeout: a.timeout })
        .then(() => true, () => false),
      first(a.selector).click({ timeout: a.timeout }),
    ]);
    return { matched, url: page.url() };
  },
  async fill(a) {
    await first(a.selector).fill(a.value, { timeout: a.timeout });
    return null;
  },
  async frame_fill(a) {
    await page.frameLocator(a.frameSelector).locator(a.selector).first()
      .fill(a.value, { timeout: a.timeout });
    return null;
  },
  async press(a) {
    if (a.selector) await first(a.selector).press(a.key);
    else await page.keyboard.press(a.key);
    return null;
  },
  async wait_for(a) {
    return probe(async () => {
      await first(a.selector).waitFor({ state: a.state, timeout: a.timeout });
      return true;
    }, false);
  },
  async wait_for_url(a) {
    return probe(async () => {
      await page.waitForURL((u) => u.toString().includes(a.contains), { timeout: a.timeout });
      return true;
    }, false);
  },
  async visible(a) { return probe(() => first(a.selector).isVisible(), false); },
  async count(a) { return probe(() => page.locator(a.selector).count(), 0); },
  async text(a) {
    return probe(() => first(a.selector).innerText({ timeout: a.timeout }), null);
  },
  async texts(a) { return probe(() => page.locator(a.selector).allInnerTexts(), []); },
  async links(a) {
    return probe(() => page.locator(a.selector).locator('a[href]').evaluateAll((els) =>
      els.map((e) => ({ text: (e.innerText || e.getAttribute('aria-label') || '').trim(), href: e.href }))), []);
  },
  async mouse_click(a) {
    await page.mouse.click(a.x, a.y);
    return null;
  },
  async scroll_into_view(a) {
    return probe(async () => {
      await first(a.selector).scrollIntoViewIfNeeded({ timeout: a.timeout });
      return true;
    }, false);
  },
  async screenshot(a) {
    await page.screenshot({ path: a.path, fullPage: a.fullPage });
    return a.path;
  },
  async evaluate(a) { return page.evaluate(a.script); },
  async sleep(a) {
    await page.waitForTimeout(a.ms);
    return null;
  },
  async select_option(a) {
    await first(a.selector).selectOption(a.value, { timeout: a.timeout });
    return null;
  },
  async check(a) {
    await first(a.selector).check({ timeout: a.timeout });
    return null;
  },
  async submit_and_watch(a) {
    return new Promise((resolve, reject) => {
      let done = false;
      const finish = (via, detail) => {
        if (done) return;
        done = true;
        cleanup();
        resolve({ via, detail });
      };
      const onNavigated = (frame) => {
        if (frame === page.mainFrame() && !frame.url().includes(a.checkoutPath)) {
          finish('navigation', frame.url());
        }
      };
      const onResponse = async (response) => {
        try {
          if (response.status() >= 400) return;
          const type = response.headers()['content-type'] || '';
          if (!type.includes('json') && !type.includes('text')) return;
          const body = await response.text();
          const marker = a.markers.find((m) => body.includes(m));
          if (marker) finish('response', response.url() + ' :: ' + marker);
        } catch (_) {}
      };
      const onPage = (p) => finish('new_page', p.url());
      const timer = setTimeout(() => finish('timeout', page.url()), a.timeout);
      function cleanup() {
        clearTimeout(timer);
        page.off('framenavigated', onNavigated);
        page.off('response', onResponse);
        context.off('page', onPage);
      }
      page.on('framenavigated', onNavigated);
      page.on('response', onResponse);
      context.on('page', onPage);
      first(a.selector).click({ timeout: actionTimeout }).catch((e) => {
        if (done) return;
        done = true;
        cleanup();
        reject(e);
      });
    });
  },
  async go_back() {
    await page.goBack({ timeout: navigationTimeout });
    return page.url();
  },
  async viewport() { return page.viewportSize(); },
  async clear_cookies() {
    await context.clearCookies();
    return null;
  },
  async close() {
    const video = page ? page.video() : null;
    if (context) await context.close();
    const path = video ? await video.path() : null;
    if (browser) await browser.close();
    browser = null;
    context = null;
    page = null;
    return { video: path };
  },
};

async function handle(line) {
  let msg;
  try { msg = JSON.parse(line); } catch (e) { log('unparseable request', line); return; }
  const handler = handlers[msg.cmd];
  if (!handler) return reply({ id: msg.id, ok: false, error: 'unknown command ' + msg.cmd });
  try {
    const value = await handler(msg);
    reply({ id: msg.id, ok: true, value: value === undefined ? null : value });
  } catch (e) {
    reply({ id: msg.id, ok: false, error: (e && e.message) ? e.message.split('\n')[0] : String(e) });
  }
}

let chain = Promise.resolve();
const rl = readline.createInterface({ input: process.stdin });
rl.on('line', (line) => { chain = chain.then(() => handle(line)); });
rl.on('close', () => {
  chain.then(async () => { if (browser) await browser.close(); process.exit(0); });
});
log('ready');
"#;

/// Something that can carry bridge commands to a browser
#[async_trait]
pub trait Transport: Send {
    async fn request(&mut self, command: &Command, timeout: Duration) -> E2eResult<Value>;

    /// Stop the browser side. Idempotent.
    async fn shutdown(&mut self);
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Configuration for launching the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Node executable
    pub node_binary: PathBuf,
    /// Where the bridge script is written. Placing it inside the project lets
    /// `require('playwright')` resolve from the project's node_modules.
    pub work_dir: PathBuf,
    /// Extra module search path for Playwright
    pub node_path: Option<PathBuf>,
    /// Time allowed for the process to come up
    pub startup_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            node_binary: PathBuf::from("node"),
            work_dir: PathBuf::from("test-results/.bridge"),
            node_path: Some(PathBuf::from("node_modules")),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Check that Playwright is installed
pub fn check_playwright_installed() -> E2eResult<()> {
    let status = std::process::Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// Handle to a running bridge process
pub struct BridgeProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr_task: JoinHandle<()>,
    next_id: u64,
    closed: bool,
}

impl BridgeProcess {
    /// Write the bridge script and spawn it under Node
    pub async fn spawn(config: &BridgeConfig) -> E2eResult<Self> {
        tokio::fs::create_dir_all(&config.work_dir).await?;
        let script_path = config.work_dir.join("playwright-bridge.js");
        tokio::fs::write(&script_path, BRIDGE_SCRIPT).await?;

        let mut cmd = TokioCommand::new(&config.node_binary);
        cmd.arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(node_path) = &config.node_path {
            let node_path = std::fs::canonicalize(node_path).unwrap_or_else(|_| node_path.clone());
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::BridgeStartup(format!("failed to spawn {}: {}", config.node_binary.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::BridgeStartup("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::BridgeStartup("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| E2eError::BridgeStartup("stderr not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "playwright", "{}", line);
            }
        });

        info!("Playwright bridge started (pid: {:?})", child.id());

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            stderr_task,
            next_id: 0,
            closed: false,
        })
    }

    async fn send(&mut self, id: u64, command: &Command) -> E2eResult<()> {
        let mut message = serde_json::to_value(command)?;
        let object = message
            .as_object_mut()
            .ok_or_else(|| E2eError::Protocol(format!("{} did not serialize to an object", command.name())))?;
        object.insert("id".to_string(), Value::from(id));

        let mut line = serde_json::to_string(&message)?;
        line.push('\n');

        let stdin = self.stdin.as_mut().ok_or(E2eError::BridgeClosed)?;
        stdin.write_all(line.as_bytes()).await.map_err(|_| E2eError::BridgeClosed)?;
        stdin.flush().await.map_err(|_| E2eError::BridgeClosed)?;
        Ok(())
    }

    /// Read until the response for `id` arrives. Responses for earlier
    /// requests that timed out on our side are discarded.
    async fn receive(&mut self, id: u64) -> E2eResult<Response> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or(E2eError::BridgeClosed)?;

            match serde_json::from_str::<Response>(&line) {
                Ok(response) if response.id == id => return Ok(response),
                Ok(response) if response.id < id => {
                    debug!("Discarding stale bridge response {}", response.id);
                }
                Ok(response) => {
                    return Err(E2eError::Protocol(format!(
                        "response {} arrived before request {}",
                        response.id, id
                    )));
                }
                Err(_) => debug!(target: "playwright", "{}", line),
            }
        }
    }

    /// Stop the bridge
    pub fn stop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Closing stdin lets the script shut its browser down cleanly
        self.stdin.take();

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                    std::thread::sleep(Duration::from_millis(200));
                }
            }
        }

        let _ = self.child.start_kill();
        self.stderr_task.abort();
    }
}

#[async_trait]
impl Transport for BridgeProcess {
    async fn request(&mut self, command: &Command, timeout: Duration) -> E2eResult<Value> {
        if self.closed {
            return Err(E2eError::BridgeClosed);
        }

        self.next_id += 1;
        let id = self.next_id;
        let start = Instant::now();

        self.send(id, command).await?;
        let response = tokio::time::timeout(timeout, self.receive(id))
            .await
            .map_err(|_| E2eError::Timeout(format!("{} after {:?}", command.describe(), timeout)))??;

        debug!("{} finished in {} ms", command.describe(), start.elapsed().as_millis());

        if response.ok {
            Ok(response.value)
        } else {
            Err(E2eError::Playwright {
                command: command.describe(),
                message: response.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }

    async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.stdin.take();
        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(_) => {
                self.closed = true;
                self.stderr_task.abort();
            }
            Err(_) => {
                warn!("Playwright bridge did not exit after stdin closed, terminating");
                self.stop();
            }
        }
    }
}

impl Drop for BridgeProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_script_handles_every_command() {
        for name in Command::NAMES {
            assert!(
                BRIDGE_SCRIPT.contains(&format!("async {}(", name)),
                "bridge script has no handler for {}",
                name
            );
        }
    }

    #[test]
    fn test_response_parsing() {
        let ok: Response = serde_json::from_str(r#"{"id":3,"ok":true,"value":{"url":"https://lumimeds.com/"}}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.value["url"], "https://lumimeds.com/");

        let err: Response = serde_json::from_str(r#"{"id":4,"ok":false,"error":"Timeout 30000ms exceeded"}"#).unwrap();
        assert!(!err.ok);
        assert_eq!(err.value, Value::Null);
        assert_eq!(err.error.as_deref(), Some("Timeout 30000ms exceeded"));
    }

    #[tokio::test]
    async fn test_spawn_with_missing_node_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig {
            node_binary: PathBuf::from("definitely-not-node-3f9a"),
            work_dir: dir.path().join("bridge"),
            node_path: None,
            startup_timeout: Duration::from_secs(1),
        };
        let err = BridgeProcess::spawn(&config).await.err().unwrap();
        assert!(matches!(err, E2eError::BridgeStartup(_)));
        assert!(dir.path().join("bridge/playwright-bridge.js").exists());
    }
}
