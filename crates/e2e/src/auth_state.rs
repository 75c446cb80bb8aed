//! Probe into the app's client-side authentication state machine
//!
//! The app exposes `window.authService` (an XState interpreter) when it runs
//! under automation. We only read `state.value` and `send` events into it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use rwa_common::AuthState;

use crate::driver::BrowserPage;
use crate::error::{E2eError, E2eResult};

/// Reads the current state value, or null when the handle is absent
pub const STATE_VALUE_SCRIPT: &str = "() => window.authService?.state?.value ?? null";

/// Truthy once the state machine accepts events
pub const SEND_READY_SCRIPT: &str = "() => typeof window.authService?.send === 'function'";

/// Sends `[event, payload]` into the state machine
pub const DISPATCH_SCRIPT: &str =
    "([event, payload]) => { window.authService.send(event, payload); return null; }";

/// Init script marking the window as automated; the app only exposes
/// `authService` when it sees this flag
pub const AUTOMATION_FLAG_SCRIPT: &str = "Object.defineProperty(window, 'Cypress', { value: true });";

/// Read/dispatch seam onto the app's auth state machine
#[async_trait]
pub trait AuthStatePort: Send + Sync {
    /// Current value; `None` when the state machine is not exposed
    async fn current_state(&self) -> E2eResult<Option<AuthState>>;

    /// Request a transition; the state changes asynchronously, if at all
    async fn dispatch(&self, event: &str, payload: Value) -> E2eResult<()>;
}

/// `window.authService` reached through page evaluation
pub struct WindowAuthService<'a> {
    page: &'a dyn BrowserPage,
}

impl<'a> WindowAuthService<'a> {
    pub fn new(page: &'a dyn BrowserPage) -> Self {
        Self { page }
    }

    /// Wait until `send` is callable, i.e. client initialisation finished
    pub async fn wait_until_ready(&self, timeout: Duration, polling: Duration) -> E2eResult<()> {
        self.page
            .wait_for_function(SEND_READY_SCRIPT, timeout, polling)
            .await
            .map_err(|e| {
                E2eError::Setup(format!(
                    "auth state machine was not exposed within {:?}: {}",
                    timeout, e
                ))
            })
    }
}

#[async_trait]
impl AuthStatePort for WindowAuthService<'_> {
    async fn current_state(&self) -> E2eResult<Option<AuthState>> {
        let value = self.page.evaluate(STATE_VALUE_SCRIPT, None).await?;
        Ok(match value {
            Value::String(s) => s.parse().ok(),
            // Nested states serialise as objects; keep them as transitional
            Value::Object(_) => Some(AuthState::Other(value.to_string())),
            _ => None,
        })
    }

    async fn dispatch(&self, event: &str, payload: Value) -> E2eResult<()> {
        self.page
            .evaluate(DISPATCH_SCRIPT, Some(json!([event, payload])))
            .await
            .map(|_| ())
    }
}
