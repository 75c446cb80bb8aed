//! Side navigation shown to signed-in users

use std::time::Duration;

use crate::driver::{BrowserPage, LoadState};
use crate::error::E2eResult;
use crate::expect::{expect, DEFAULT_EXPECT_TIMEOUT};
use crate::pages::selectors::*;

const SIGN_OUT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SideNav<'a> {
    page: &'a dyn BrowserPage,
}

impl<'a> SideNav<'a> {
    pub fn new(page: &'a dyn BrowserPage) -> Self {
        Self { page }
    }

    /// On narrow viewports the drawer starts closed; toggling an open one
    /// would close it again
    pub async fn reveal(&self) -> E2eResult<()> {
        if self.page.viewport().await?.is_mobile() && !self.page.is_visible(SIDENAV_SIGNOUT).await? {
            self.page.click(SIDENAV_TOGGLE, None).await?;
        }
        Ok(())
    }

    pub async fn assert_signed_in(&self) -> E2eResult<()> {
        for selector in [SIDENAV_SIGNOUT, SIDENAV_USER_FULL_NAME, SIDENAV_USERNAME] {
            expect(self.page, selector)
                .with_timeout(DEFAULT_EXPECT_TIMEOUT)
                .to_be_visible()
                .await?;
        }
        Ok(())
    }

    pub async fn sign_out(&self) -> E2eResult<()> {
        expect(self.page, SIDENAV_SIGNOUT).to_be_visible().await?;
        self.page.click(SIDENAV_SIGNOUT, None).await?;
        self.page.wait_for_load_state(LoadState::Load).await?;
        self.page.wait_for_url("**/signin", SIGN_OUT_TIMEOUT).await
    }

    pub async fn assert_signed_out(&self) -> E2eResult<()> {
        expect(self.page, SIGNIN_USERNAME)
            .with_timeout(SIGN_OUT_TIMEOUT)
            .to_be_visible()
            .await?;
        expect(self.page, SIDENAV_SIGNOUT).to_be_hidden().await
    }
}
