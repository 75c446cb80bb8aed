//! Signed-in flows, set up through the API

use rwa_common::fixtures::{ui, VALID_USER};
use rwa_common::AuthState;

use super::{ensure, Scenario, ScenarioContext, ScenarioFuture, Suite};
use crate::auth_state::WindowAuthService;
use crate::error::E2eResult;
use crate::expect::expect_url_contains;
use crate::pages::SideNav;
use crate::poll::{wait_for_auth_state, PollPolicy};
use crate::session::{AuthenticatedSession, HybridLogin};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "e2e: is logged in via API",
            suite: Suite::E2e,
            tags: &["auth", "session"],
            run: logged_in_via_api,
        },
        Scenario {
            name: "e2e: logs out",
            suite: Suite::E2e,
            tags: &["auth", "session"],
            run: logs_out,
        },
    ]
}

async fn sign_in(ctx: &ScenarioContext) -> E2eResult<AuthenticatedSession> {
    let browser = ctx.browser()?;
    HybridLogin::new(&ctx.api, &ctx.config.ui_base_url)
        .establish(browser.as_context(), browser.as_page(), &VALID_USER.credentials())
        .await
}

fn logged_in_via_api(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        sign_in(&ctx).await?;
        let nav = SideNav::new(ctx.browser()?.as_page());
        nav.reveal().await?;
        nav.assert_signed_in().await
    })
}

fn logs_out(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        sign_in(&ctx).await?;
        let page = ctx.browser()?.as_page();
        let nav = SideNav::new(page);
        nav.reveal().await?;
        nav.sign_out().await?;

        expect_url_contains(page, ui::LOGIN_PAGE).await?;
        let auth = WindowAuthService::new(page);
        let converged =
            wait_for_auth_state(&auth, &AuthState::Unauthorized, PollPolicy::default()).await;
        ensure(converged, || {
            format!("auth state did not reach {} after sign out", AuthState::Unauthorized)
        })?;
        nav.assert_signed_out().await
    })
}
