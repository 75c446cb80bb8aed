//! Browser automation ports
//!
//! Page objects and the session sequencer only talk to these traits, so the
//! same flows run against Playwright or an in-process fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

use rwa_common::Viewport;

use crate::cookie::SessionCookie;
use crate::error::{E2eError, E2eResult};

/// Navigation milestone to wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Element condition to wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

/// A single tab
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str, wait_until: LoadState) -> E2eResult<()>;

    async fn wait_for_load_state(&self, state: LoadState) -> E2eResult<()>;

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<()>;

    /// Click; `None` uses the session's action timeout
    async fn click(&self, selector: &str, timeout: Option<Duration>) -> E2eResult<()>;

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()>;

    async fn clear(&self, selector: &str) -> E2eResult<()>;

    async fn is_visible(&self, selector: &str) -> E2eResult<bool>;

    /// Text of the first match, `None` when nothing matches
    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>>;

    async fn url(&self) -> E2eResult<String>;

    /// Wait for the URL to match an exact URL or a `**` glob
    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> E2eResult<()>;

    /// Evaluate a JS function source in the page, passing `arg` as its argument
    async fn evaluate(&self, function: &str, arg: Option<Value>) -> E2eResult<Value>;

    /// Re-evaluate `function` every `polling` until it returns a truthy value
    async fn wait_for_function(
        &self,
        function: &str,
        timeout: Duration,
        polling: Duration,
    ) -> E2eResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(value) = self.evaluate(function, None).await {
                if is_truthy(&value) {
                    return Ok(());
                }
            }
            if Instant::now() + polling > deadline {
                return Err(E2eError::Timeout(format!(
                    "function {} after {:?}",
                    function, timeout
                )));
            }
            tokio::time::sleep(polling).await;
        }
    }

    async fn viewport(&self) -> E2eResult<Viewport>;

    async fn screenshot(&self, path: &Path) -> E2eResult<()>;
}

/// An isolated cookie jar / storage partition
#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn add_cookies(&self, cookies: &[SessionCookie]) -> E2eResult<()>;

    async fn clear_cookies(&self) -> E2eResult<()>;

    /// Script run in every document before the page's own scripts
    async fn add_init_script(&self, script: &str) -> E2eResult<()>;

    /// Dispose the context and its pages
    async fn close(&self) -> E2eResult<()>;
}

/// A page together with the context that owns it
pub trait BrowserSession: BrowserPage + BrowserContext {
    fn as_page(&self) -> &dyn BrowserPage;

    fn as_context(&self) -> &dyn BrowserContext;
}

impl<T: BrowserPage + BrowserContext> BrowserSession for T {
    fn as_page(&self) -> &dyn BrowserPage {
        self
    }

    fn as_context(&self) -> &dyn BrowserContext {
        self
    }
}

/// JavaScript truthiness of a JSON value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Match a URL against an exact URL or a glob where `**` spans anything
pub fn url_matches(url: &str, pattern: &str) -> bool {
    if !pattern.contains("**") {
        return url == pattern;
    }
    let parts: Vec<&str> = pattern.split("**").collect();
    let mut rest = url;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
    }
    true
}
