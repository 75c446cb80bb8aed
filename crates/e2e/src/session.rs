//! Hybrid login: authenticate over the API, then bring the client-side
//! state machine in line with the server session.
//!
//! API login alone leaves the app's state machine unaware of the session;
//! form login is slow. So we take the session cookie from the API, hand it
//! to the browser context, and replay the `LOGIN` event in the page.

use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use rwa_common::fixtures::{join_url, ui};
use rwa_common::{AuthState, Credentials, User};

use crate::api::{ApiClient, LoginBody};
use crate::auth_state::{AuthStatePort, WindowAuthService, AUTOMATION_FLAG_SCRIPT};
use crate::cookie::SessionCookie;
use crate::driver::{BrowserContext, BrowserPage, LoadState};
use crate::error::{E2eError, E2eResult};
use crate::poll::{wait_for_auth_state, PollPolicy};

/// A browser session signed in through [`HybridLogin`]
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user: User,
}

pub struct HybridLogin<'a> {
    api: &'a ApiClient,
    ui_base_url: String,
    /// Budget for the app to expose its state machine
    pub handle_timeout: Duration,
    /// Kept coarse so the evaluation channel is not flooded
    pub handle_polling: Duration,
    pub policy: PollPolicy,
}

impl<'a> HybridLogin<'a> {
    pub fn new(api: &'a ApiClient, ui_base_url: &str) -> Self {
        Self {
            api,
            ui_base_url: ui_base_url.to_string(),
            handle_timeout: Duration::from_secs(15),
            handle_polling: Duration::from_secs(1),
            policy: PollPolicy::default(),
        }
    }

    pub async fn establish(
        &self,
        context: &dyn BrowserContext,
        page: &dyn BrowserPage,
        credentials: &Credentials,
    ) -> E2eResult<AuthenticatedSession> {
        context.clear_cookies().await?;
        context.add_init_script(AUTOMATION_FLAG_SCRIPT).await?;

        let outcome = self
            .api
            .login(credentials.username, credentials.password)
            .await?;
        if outcome.status != reqwest::StatusCode::OK {
            return Err(E2eError::Authentication(format!(
                "login API returned {} for {}",
                outcome.status, credentials.username
            )));
        }
        let user = match outcome.body {
            LoginBody::Authenticated(ref resp) => resp.user.clone(),
            LoginBody::Unauthorized => {
                return Err(E2eError::Authentication(format!(
                    "login API rejected {}",
                    credentials.username
                )))
            }
            LoginBody::Other(ref body) => {
                return Err(E2eError::Authentication(format!(
                    "login API returned no user: {}",
                    body
                )))
            }
        };

        if outcome.set_cookie.is_none() {
            return Err(E2eError::Setup("login response has no set-cookie header".into()));
        }
        let token = outcome
            .session_token()
            .ok_or_else(|| E2eError::Setup("set-cookie header has no connect.sid".into()))?;

        let cookie = SessionCookie::for_origin(&self.ui_base_url, &token)?;
        context.add_cookies(&[cookie]).await?;
        debug!("Session cookie injected for {}", user.username);

        page.goto(&join_url(&self.ui_base_url, ui::HOME_PAGE), LoadState::NetworkIdle)
            .await?;

        let auth = WindowAuthService::new(page);
        auth.wait_until_ready(self.handle_timeout, self.handle_polling)
            .await?;
        auth.dispatch(
            "LOGIN",
            json!({
                "username": credentials.username,
                "password": credentials.password,
            }),
        )
        .await?;

        if !wait_for_auth_state(&auth, &AuthState::Authorized, self.policy).await {
            return Err(E2eError::Setup("Failed to reach authorized state".into()));
        }

        info!("Signed in as {} via API", user.username);
        Ok(AuthenticatedSession { user })
    }
}
