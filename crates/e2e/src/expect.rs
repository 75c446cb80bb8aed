//! Auto-retrying assertions in the style of Playwright's `expect`

use std::time::Duration;
use tokio::time::Instant;

use crate::driver::{BrowserPage, WaitState};
use crate::error::{E2eError, E2eResult};

pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

const TEXT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Assertion builder for one selector
pub struct Expect<'a> {
    page: &'a dyn BrowserPage,
    selector: &'a str,
    timeout: Duration,
}

pub fn expect<'a>(page: &'a dyn BrowserPage, selector: &'a str) -> Expect<'a> {
    Expect {
        page,
        selector,
        timeout: DEFAULT_EXPECT_TIMEOUT,
    }
}

impl<'a> Expect<'a> {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn to_be_visible(self) -> E2eResult<()> {
        self.page
            .wait_for_selector(self.selector, WaitState::Visible, self.timeout)
            .await
            .map_err(|e| {
                E2eError::AssertionFailed(format!("expected {} to be visible: {}", self.selector, e))
            })
    }

    pub async fn to_be_hidden(self) -> E2eResult<()> {
        self.page
            .wait_for_selector(self.selector, WaitState::Hidden, self.timeout)
            .await
            .map_err(|e| {
                E2eError::AssertionFailed(format!("expected {} to be hidden: {}", self.selector, e))
            })
    }

    pub async fn to_contain_text(self, expected: &str) -> E2eResult<()> {
        let deadline = Instant::now() + self.timeout;
        let mut last = None;
        loop {
            if let Ok(text) = self.page.text_content(self.selector).await {
                if text.as_deref().is_some_and(|t| t.contains(expected)) {
                    return Ok(());
                }
                last = text;
            }
            if Instant::now() >= deadline {
                return Err(E2eError::AssertionFailed(format!(
                    "expected {} to contain {:?}, found {:?}",
                    self.selector, expected, last
                )));
            }
            tokio::time::sleep(TEXT_POLL_INTERVAL).await;
        }
    }
}

pub async fn expect_url_eq(page: &dyn BrowserPage, expected: &str) -> E2eResult<()> {
    let url = page.url().await?;
    if url == expected {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "expected URL {}, found {}",
            expected, url
        )))
    }
}

pub async fn expect_url_contains(page: &dyn BrowserPage, fragment: &str) -> E2eResult<()> {
    let url = page.url().await?;
    if url.contains(fragment) {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "expected URL containing {}, found {}",
            fragment, url
        )))
    }
}
