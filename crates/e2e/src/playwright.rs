//! Playwright browser automation
//!
//! A small Node script is written to a temp dir and run with `node`. It keeps
//! one browser alive and serves JSON-line requests on stdin:
//!
//! ```text
//! -> {"id": 7, "method": "waitForSelector", "params": {"context": 1, ...}}
//! <- {"id": 7, "ok": true, "result": null}
//! ```
//!
//! Requests are matched to replies by id, so several waits on the same page
//! may be outstanding at once.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rwa_common::Viewport;

use crate::cookie::SessionCookie;
use crate::driver::{BrowserContext, BrowserPage, LoadState, WaitState};
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    /// `node_modules` dir that provides `playwright`
    pub node_path: Option<PathBuf>,
    pub action_timeout: Duration,
    pub navigation_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            node_path: None,
            action_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(15),
        }
    }
}

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');

let pw;
try {
  pw = require('playwright');
} catch (_) {
  pw = require('@playwright/test');
}

let browser = null;
let nextContext = 1;
const contexts = new Map();

function entry(id) {
  const found = contexts.get(id);
  if (!found) throw new Error(`unknown context ${id}`);
  return found;
}

function reply(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

const handlers = {
  async launch({ browser: name, headless }) {
    browser = await pw[name].launch({ headless });
    return { version: browser.version() };
  },
  async newContext({ viewport }) {
    const context = await browser.newContext({ viewport });
    const page = await context.newPage();
    const id = nextContext++;
    contexts.set(id, { context, page });
    return { id };
  },
  async closeContext({ context }) {
    const found = entry(context);
    contexts.delete(context);
    await found.context.close();
    return null;
  },
  async goto({ context, url, waitUntil, timeout }) {
    await entry(context).page.goto(url, { waitUntil, timeout });
    return null;
  },
  async waitForLoadState({ context, state, timeout }) {
    await entry(context).page.waitForLoadState(state, { timeout });
    return null;
  },
  async waitForSelector({ context, selector, state, timeout }) {
    await entry(context).page.waitForSelector(selector, { state, timeout });
    return null;
  },
  async click({ context, selector, timeout }) {
    await entry(context).page.locator(selector).click({ timeout });
    return null;
  },
  async fill({ context, selector, value, timeout }) {
    await entry(context).page.locator(selector).fill(value, { timeout });
    return null;
  },
  async clear({ context, selector, timeout }) {
    await entry(context).page.locator(selector).clear({ timeout });
    return null;
  },
  async isVisible({ context, selector }) {
    return await entry(context).page.locator(selector).first().isVisible();
  },
  async textContent({ context, selector }) {
    const locator = entry(context).page.locator(selector);
    if ((await locator.count()) === 0) return null;
    return await locator.first().textContent();
  },
  async url({ context }) {
    return entry(context).page.url();
  },
  async waitForUrl({ context, pattern, timeout }) {
    await entry(context).page.waitForURL(pattern, { timeout });
    return null;
  },
  async evaluate({ context, fn, arg }) {
    const pageFunction = new Function(`return (${fn});`)();
    const result = await entry(context).page.evaluate(pageFunction, arg);
    return result === undefined ? null : result;
  },
  async viewport({ context }) {
    return entry(context).page.viewportSize();
  },
  async screenshot({ context, path, fullPage }) {
    await entry(context).page.screenshot({ path, fullPage });
    return null;
  },
  async addCookies({ context, cookies }) {
    await entry(context).context.addCookies(cookies);
    return null;
  },
  async clearCookies({ context }) {
    await entry(context).context.clearCookies();
    return null;
  },
  async addInitScript({ context, script }) {
    await entry(context).context.addInitScript(script);
    return null;
  },
  async close() {
    if (browser) await browser.close();
    browser = null;
    return null;
  },
};

const rl = readline.createInterface({ input: process.stdin });

rl.on('line', (line) => {
  if (!line.trim()) return;
  let request;
  try {
    request = JSON.parse(line);
  } catch (_) {
    process.stderr.write(`malformed request: ${line}\n`);
    return;
  }
  const { id, method, params } = request;
  Promise.resolve()
    .then(() => {
      const handler = handlers[method];
      if (!handler) throw new Error(`unknown method ${method}`);
      return handler(params || {});
    })
    .then((result) => reply({ id, ok: true, result: result === undefined ? null : result }))
    .catch((error) =>
      reply({
        id,
        ok: false,
        error: String((error && error.message) || error),
        name: error && error.name,
      })
    );
});

rl.on('close', async () => {
  if (browser) await browser.close().catch(() => {});
  process.exit(0);
});
"#;

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl BridgeReply {
    fn into_result(self, method: &str) -> E2eResult<Value> {
        if self.ok {
            return Ok(self.result);
        }
        let message = self.error.unwrap_or_else(|| "unknown error".to_string());
        if self.name.as_deref() == Some("TimeoutError") {
            Err(E2eError::Timeout(format!("{}: {}", method, message)))
        } else {
            Err(E2eError::Playwright(format!("{}: {}", method, message)))
        }
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<BridgeReply>>>>;

/// One Node process driving one browser
pub struct PlaywrightBridge {
    config: PlaywrightConfig,
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Pending,
    next_id: AtomicU64,
    child: tokio::sync::Mutex<Child>,
    reader: JoinHandle<()>,
    _script_dir: tempfile::TempDir,
}

impl PlaywrightBridge {
    /// Spawn the bridge and launch the configured browser
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Arc<Self>> {
        Self::check_playwright_installed().await?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let mut cmd = Command::new("node");
        cmd.arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(node_path) = resolve_node_path(config.node_path.as_deref()) {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[playwright] {}", line);
                }
            });
        }

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<BridgeReply>(&line) {
                    Ok(reply) => {
                        if let Some(tx) = reader_pending.lock().remove(&reply.id) {
                            let _ = tx.send(reply);
                        }
                    }
                    Err(_) => debug!("[playwright] {}", line),
                }
            }
            // Dropping the senders fails every outstanding request
            reader_pending.lock().clear();
        });

        let bridge = Arc::new(Self {
            config,
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            child: tokio::sync::Mutex::new(child),
            reader,
            _script_dir: script_dir,
        });

        let launched = bridge
            .call(
                "launch",
                json!({
                    "browser": bridge.config.browser.as_str(),
                    "headless": bridge.config.headless,
                }),
            )
            .await?;
        info!(
            "Launched {} {}",
            bridge.config.browser.as_str(),
            launched["version"].as_str().unwrap_or("")
        );

        Ok(bridge)
    }

    /// Check if Playwright is installed
    async fn check_playwright_installed() -> E2eResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub fn browser(&self) -> Browser {
        self.config.browser
    }

    /// Send one request and wait for its reply
    pub async fn call(&self, method: &str, params: Value) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let mut line = serde_json::to_string(&json!({
            "id": id,
            "method": method,
            "params": params,
        }))?;
        line.push('\n');

        let written = {
            let mut stdin = self.stdin.lock().await;
            match stdin.write_all(line.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = written {
            self.pending.lock().remove(&id);
            return Err(E2eError::Playwright(format!("bridge write failed: {}", e)));
        }

        debug!("-> {} #{}", method, id);
        let reply = rx
            .await
            .map_err(|_| E2eError::Playwright(format!("bridge exited during {}", method)))?;
        reply.into_result(method)
    }

    /// Open an isolated context with a single page
    pub async fn new_session(self: &Arc<Self>, viewport: Viewport) -> E2eResult<PlaywrightSession> {
        let created = self
            .call("newContext", json!({ "viewport": viewport }))
            .await?;
        let context = created["id"]
            .as_u64()
            .ok_or_else(|| E2eError::Playwright("newContext returned no id".into()))?;

        Ok(PlaywrightSession {
            bridge: self.clone(),
            context,
            action_timeout: self.config.action_timeout,
            navigation_timeout: self.config.navigation_timeout,
        })
    }

    /// Close the browser and wait for the bridge to exit
    pub async fn shutdown(&self) -> E2eResult<()> {
        if let Err(e) = self.call("close", Value::Null).await {
            warn!("Browser close failed: {}", e);
        }
        let mut child = self.child.lock().await;
        if tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .is_err()
        {
            child.start_kill()?;
        }
        Ok(())
    }
}

impl Drop for PlaywrightBridge {
    fn drop(&mut self) {
        self.reader.abort();
        let _ = self.child.get_mut().start_kill();
    }
}

/// Explicit node path, else `./node_modules` when present
fn resolve_node_path(configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(path) => Some(path.to_path_buf()),
        None => std::fs::canonicalize("node_modules").ok(),
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// A browser context and its page, owned by one test
pub struct PlaywrightSession {
    bridge: Arc<PlaywrightBridge>,
    context: u64,
    action_timeout: Duration,
    navigation_timeout: Duration,
}

impl PlaywrightSession {
    async fn call(&self, method: &str, mut params: Value) -> E2eResult<Value> {
        params["context"] = json!(self.context);
        self.bridge.call(method, params).await
    }
}

#[async_trait]
impl BrowserPage for PlaywrightSession {
    async fn goto(&self, url: &str, wait_until: LoadState) -> E2eResult<()> {
        self.call(
            "goto",
            json!({
                "url": url,
                "waitUntil": wait_until,
                "timeout": millis(self.navigation_timeout),
            }),
        )
        .await
        .map(|_| ())
    }

    async fn wait_for_load_state(&self, state: LoadState) -> E2eResult<()> {
        self.call(
            "waitForLoadState",
            json!({ "state": state, "timeout": millis(self.navigation_timeout) }),
        )
        .await
        .map(|_| ())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<()> {
        self.call(
            "waitForSelector",
            json!({ "selector": selector, "state": state, "timeout": millis(timeout) }),
        )
        .await
        .map(|_| ())
    }

    async fn click(&self, selector: &str, timeout: Option<Duration>) -> E2eResult<()> {
        let timeout = timeout.unwrap_or(self.action_timeout);
        self.call("click", json!({ "selector": selector, "timeout": millis(timeout) }))
            .await
            .map(|_| ())
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.call(
            "fill",
            json!({
                "selector": selector,
                "value": value,
                "timeout": millis(self.action_timeout),
            }),
        )
        .await
        .map(|_| ())
    }

    async fn clear(&self, selector: &str) -> E2eResult<()> {
        self.call(
            "clear",
            json!({ "selector": selector, "timeout": millis(self.action_timeout) }),
        )
        .await
        .map(|_| ())
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        let visible = self.call("isVisible", json!({ "selector": selector })).await?;
        Ok(visible.as_bool().unwrap_or(false))
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        let text = self.call("textContent", json!({ "selector": selector })).await?;
        Ok(text.as_str().map(String::from))
    }

    async fn url(&self) -> E2eResult<String> {
        let url = self.call("url", json!({})).await?;
        Ok(url.as_str().unwrap_or_default().to_string())
    }

    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> E2eResult<()> {
        self.call(
            "waitForUrl",
            json!({ "pattern": pattern, "timeout": millis(timeout) }),
        )
        .await
        .map(|_| ())
    }

    async fn evaluate(&self, function: &str, arg: Option<Value>) -> E2eResult<Value> {
        self.call(
            "evaluate",
            json!({ "fn": function, "arg": arg.unwrap_or(Value::Null) }),
        )
        .await
    }

    async fn viewport(&self) -> E2eResult<Viewport> {
        let size = self.call("viewport", json!({})).await?;
        if size.is_null() {
            return Ok(Viewport::default());
        }
        Ok(serde_json::from_value(size)?)
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.call(
            "screenshot",
            json!({ "path": path.to_string_lossy(), "fullPage": true }),
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl BrowserContext for PlaywrightSession {
    async fn add_cookies(&self, cookies: &[SessionCookie]) -> E2eResult<()> {
        self.call("addCookies", json!({ "cookies": cookies }))
            .await
            .map(|_| ())
    }

    async fn clear_cookies(&self) -> E2eResult<()> {
        self.call("clearCookies", json!({})).await.map(|_| ())
    }

    async fn add_init_script(&self, script: &str) -> E2eResult<()> {
        self.call("addInitScript", json!({ "script": script }))
            .await
            .map(|_| ())
    }
    async fn close(&self) -> E2eResult<()> {
        self.call("closeContext", json!({})).await.map(|_| ())
    }
}
