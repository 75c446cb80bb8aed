//! Login form scenarios

use rwa_common::fixtures::{INVALID_USER, VALID_USER};
use rwa_common::LoginErrorKind;

use super::{ensure, Scenario, ScenarioContext, ScenarioFuture, Suite};
use crate::error::E2eResult;
use crate::pages::login::LoginTimings;
use crate::pages::{LoginPage, SubmitOutcome};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "ui: logs in with valid credentials",
            suite: Suite::Ui,
            tags: &["auth", "smoke"],
            run: valid_credentials,
        },
        Scenario {
            name: "ui: shows an error for a wrong password",
            suite: Suite::Ui,
            tags: &["auth", "negative"],
            run: wrong_password,
        },
        Scenario {
            name: "ui: shows an error for an unknown username",
            suite: Suite::Ui,
            tags: &["auth", "negative"],
            run: unknown_username,
        },
        Scenario {
            name: "ui: requires both fields",
            suite: Suite::Ui,
            tags: &["auth", "validation"],
            run: both_fields_empty,
        },
        Scenario {
            name: "ui: requires a password",
            suite: Suite::Ui,
            tags: &["auth", "validation"],
            run: password_empty,
        },
        Scenario {
            name: "ui: requires a username",
            suite: Suite::Ui,
            tags: &["auth", "validation"],
            run: username_empty,
        },
    ]
}

fn timings(ctx: &ScenarioContext) -> LoginTimings {
    LoginTimings {
        navigation: ctx.config.timeouts.navigation(),
        expect: ctx.config.timeouts.expect(),
        ..LoginTimings::default()
    }
}

/// Open the form, submit, and check the outcome kind before the caller asserts
async fn submit(
    ctx: &ScenarioContext,
    username: &str,
    password: &str,
    expected: SubmitOutcome,
) -> E2eResult<()> {
    let page = ctx.browser()?.as_page();
    let login = LoginPage::new(page, &ctx.config.ui_base_url).with_timings(timings(ctx));
    login.navigate().await?;

    let outcome = login.submit_credentials(username, password).await?;
    ensure(outcome == expected, || {
        format!("submitting {:?} gave {:?}, expected {:?}", username, outcome, expected)
    })
}

async fn expect_failure(
    ctx: &ScenarioContext,
    username: &str,
    password: &str,
    expected: SubmitOutcome,
    kind: LoginErrorKind,
) -> E2eResult<()> {
    submit(ctx, username, password, expected).await?;
    let page = ctx.browser()?.as_page();
    LoginPage::new(page, &ctx.config.ui_base_url)
        .with_timings(timings(ctx))
        .assert_login_failed(kind)
        .await
}

fn valid_credentials(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        submit(&ctx, VALID_USER.username, VALID_USER.password, SubmitOutcome::Succeeded).await?;
        let page = ctx.browser()?.as_page();
        LoginPage::new(page, &ctx.config.ui_base_url)
            .with_timings(timings(&ctx))
            .assert_login_succeeded()
            .await
    })
}

fn wrong_password(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        expect_failure(
            &ctx,
            VALID_USER.username,
            INVALID_USER.password,
            SubmitOutcome::Rejected,
            LoginErrorKind::InvalidPassword,
        )
        .await
    })
}

fn unknown_username(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        expect_failure(
            &ctx,
            INVALID_USER.username,
            VALID_USER.password,
            SubmitOutcome::Rejected,
            LoginErrorKind::InvalidUsername,
        )
        .await
    })
}

fn both_fields_empty(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        expect_failure(&ctx, "", "", SubmitOutcome::Blocked, LoginErrorKind::RequiredField).await
    })
}

fn password_empty(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        expect_failure(
            &ctx,
            VALID_USER.username,
            "",
            SubmitOutcome::Blocked,
            LoginErrorKind::RequiredPassword,
        )
        .await
    })
}

fn username_empty(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        expect_failure(
            &ctx,
            "",
            VALID_USER.password,
            SubmitOutcome::Blocked,
            LoginErrorKind::RequiredField,
        )
        .await
    })
}
