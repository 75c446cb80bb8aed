//! Login page object
//!
//! Wraps the sign-in form: filling credentials, submitting, and deciding
//! whether the app accepted or rejected them.

use std::time::Duration;
use tracing::{debug, warn};

use rwa_common::fixtures::{errors, join_url, ui};
use rwa_common::LoginErrorKind;

use crate::driver::{BrowserPage, LoadState, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::expect::{expect, expect_url_contains, expect_url_eq};
use crate::pages::selectors::*;

/// What the app did with a submitted form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Signed-in view rendered
    Succeeded,
    /// Error banner rendered
    Rejected,
    /// An empty field kept the form from submitting
    Blocked,
}

/// Waits used by the login flow
#[derive(Debug, Clone, Copy)]
pub struct LoginTimings {
    /// Budget for the signed-in vs error race after submit
    pub outcome: Duration,
    /// Pause after the race so the DOM can settle
    pub settle: Duration,
    /// Follow-up waits (user details, fallback error banner)
    pub follow_up: Duration,
    /// Click budget when a field is empty
    pub blocked_click: Duration,
    pub navigation: Duration,
    pub expect: Duration,
}

impl Default for LoginTimings {
    fn default() -> Self {
        Self {
            outcome: Duration::from_secs(10),
            settle: Duration::from_secs(1),
            follow_up: Duration::from_secs(5),
            blocked_click: Duration::from_secs(1),
            navigation: Duration::from_secs(15),
            expect: Duration::from_secs(5),
        }
    }
}

pub struct LoginPage<'a> {
    page: &'a dyn BrowserPage,
    base_url: String,
    timings: LoginTimings,
}

impl<'a> LoginPage<'a> {
    pub fn new(page: &'a dyn BrowserPage, base_url: &str) -> Self {
        Self {
            page,
            base_url: base_url.to_string(),
            timings: LoginTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: LoginTimings) -> Self {
        self.timings = timings;
        self
    }

    fn login_url(&self) -> String {
        join_url(&self.base_url, ui::LOGIN_PAGE)
    }

    /// Open the sign-in route and wait until the form is interactive
    pub async fn navigate(&self) -> E2eResult<()> {
        let url = self.login_url();
        let loaded = async {
            self.page.goto(&url, LoadState::NetworkIdle).await?;
            let timeout = self.timings.navigation;
            futures::try_join!(
                self.page.wait_for_selector(USERNAME_INPUT, WaitState::Visible, timeout),
                self.page.wait_for_selector(PASSWORD_INPUT, WaitState::Visible, timeout),
                self.page.wait_for_selector(SIGNIN_SUBMIT, WaitState::Visible, timeout),
            )?;
            Ok::<_, E2eError>(())
        };
        loaded
            .await
            .map_err(|e| E2eError::PageLoad(format!("Failed to load login page: {}", e)))
    }

    /// Fill and submit the form.
    ///
    /// With an empty field the click is best effort, since client-side
    /// validation is expected to block it. Otherwise the first of "signed in"
    /// and "error banner" to appear decides; if neither does, the error
    /// banner must show up, as an ambiguous timeout is never a success.
    pub async fn submit_credentials(&self, username: &str, password: &str) -> E2eResult<SubmitOutcome> {
        self.page.clear(USERNAME_INPUT).await?;
        self.page.fill(USERNAME_INPUT, username).await?;
        self.page.clear(PASSWORD_INPUT).await?;
        self.page.fill(PASSWORD_INPUT, password).await?;

        if username.is_empty() || password.is_empty() {
            if let Err(e) = self
                .page
                .click(SIGNIN_SUBMIT, Some(self.timings.blocked_click))
                .await
            {
                warn!("Submit with an empty field was not clickable: {}", e);
            }
            return Ok(SubmitOutcome::Blocked);
        }

        self.page.click(SIGNIN_SUBMIT, None).await?;

        let timings = self.timings;
        let decided = async {
            let raced = tokio::select! {
                r = self.page.wait_for_selector(SIDENAV_SIGNOUT, WaitState::Visible, timings.outcome) => {
                    r.map(|()| SubmitOutcome::Succeeded)
                }
                r = self.page.wait_for_selector(SIGNIN_ERROR, WaitState::Visible, timings.outcome) => {
                    r.map(|()| SubmitOutcome::Rejected)
                }
            };
            let winner = raced?;

            tokio::time::sleep(timings.settle).await;

            if winner == SubmitOutcome::Succeeded {
                futures::try_join!(
                    self.page.wait_for_selector(SIDENAV_USER_FULL_NAME, WaitState::Visible, timings.follow_up),
                    self.page.wait_for_selector(SIDENAV_USER_BALANCE, WaitState::Visible, timings.follow_up),
                )?;
            }
            Ok::<_, E2eError>(winner)
        };

        match decided.await {
            Ok(outcome) => {
                debug!("Login as {} -> {:?}", username, outcome);
                Ok(outcome)
            }
            Err(e) => {
                debug!("No clear login outcome ({}); expecting the error banner", e);
                self.page
                    .wait_for_selector(SIGNIN_ERROR, WaitState::Visible, timings.follow_up)
                    .await
                    .map(|()| SubmitOutcome::Rejected)
                    .map_err(|fallback| {
                        E2eError::Authentication(format!(
                            "login showed neither the signed-in view nor an error ({}; {})",
                            e, fallback
                        ))
                    })
            }
        }
    }

    /// Home route with the signed-in chrome rendered
    pub async fn assert_login_succeeded(&self) -> E2eResult<()> {
        expect_url_eq(self.page, &join_url(&self.base_url, ui::HOME_PAGE)).await?;
        for selector in [
            SIDENAV_SIGNOUT,
            SIDENAV_USER_FULL_NAME,
            SIDENAV_USER_BALANCE,
            TRANSACTION_LIST,
        ] {
            expect(self.page, selector)
                .with_timeout(self.timings.expect)
                .to_be_visible()
                .await?;
        }
        Ok(())
    }

    /// The expected error is shown and we are still on the sign-in route
    pub async fn assert_login_failed(&self, kind: LoginErrorKind) -> E2eResult<()> {
        if kind.is_field_level() {
            let wait = self.timings.expect;
            // Username first when both fields are empty
            let raced = tokio::select! {
                biased;
                r = self.page.wait_for_selector(USERNAME_HELPER, WaitState::Visible, wait) => {
                    r.map(|()| (USERNAME_HELPER, errors::ui::USERNAME_REQUIRED))
                }
                r = self.page.wait_for_selector(PASSWORD_HELPER, WaitState::Visible, wait) => {
                    r.map(|()| (PASSWORD_HELPER, errors::ui::PASSWORD_REQUIRED))
                }
            };
            let (helper, message) = raced.map_err(|e| {
                E2eError::AssertionFailed(format!("no required-field helper text is visible: {}", e))
            })?;

            expect(self.page, helper)
                .with_timeout(wait)
                .to_contain_text(message)
                .await?;
        } else {
            expect(self.page, SIGNIN_ERROR)
                .with_timeout(self.timings.expect)
                .to_contain_text(kind.message())
                .await?;
        }
        expect_url_contains(self.page, ui::LOGIN_PAGE).await
    }

    /// Sign out and confirm the logged-out view rendered, not just the URL
    pub async fn logout(&self) -> E2eResult<()> {
        self.page.click(SIDENAV_SIGNOUT, None).await?;
        self.page
            .wait_for_url(&self.login_url(), self.timings.navigation)
            .await?;
        expect(self.page, SIGNIN_SUBMIT)
            .with_timeout(self.timings.expect)
            .to_be_visible()
            .await
    }
}
