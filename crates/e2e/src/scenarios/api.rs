//! Direct API authentication

use reqwest::StatusCode;
use tracing::debug;

use rwa_common::fixtures::{errors, INVALID_USER, VALID_USERS};

use super::{ensure, Scenario, ScenarioContext, ScenarioFuture, Suite};
use crate::api::LoginBody;
use crate::error::{E2eError, E2eResult};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "api: authenticates valid credentials",
            suite: Suite::Api,
            tags: &["auth", "smoke"],
            run: valid_credentials,
        },
        Scenario {
            name: "api: rejects invalid credentials",
            suite: Suite::Api,
            tags: &["auth"],
            run: invalid_credentials,
        },
    ]
}

/// Every seeded account gets a 200, its own user back and a session cookie
fn valid_credentials(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        for user in VALID_USERS {
            let outcome = ctx.api.login(user.username, user.password).await?;
            check_status(outcome.status, &format!("login as {}", user.username))?;

            let returned = outcome.user().map(|u| u.username.as_str());
            ensure(returned == Some(user.username), || {
                format!("login as {} returned user {:?}", user.username, returned)
            })?;

            ensure(outcome.session_token().is_some(), || {
                format!("login as {} set no connect.sid cookie", user.username)
            })?;
            debug!("API login accepted {}", user.username);
        }
        Ok(())
    })
}

/// Bad credentials are a 200 whose body is exactly `Unauthorized`
fn invalid_credentials(ctx: ScenarioContext) -> ScenarioFuture {
    Box::pin(async move {
        let outcome = ctx
            .api
            .login(INVALID_USER.username, INVALID_USER.password)
            .await?;
        check_status(outcome.status, "login with bad credentials")?;
        match outcome.body {
            LoginBody::Unauthorized => Ok(()),
            LoginBody::Authenticated(resp) => Err(E2eError::AssertionFailed(format!(
                "bad credentials authenticated as {}",
                resp.user.username
            ))),
            LoginBody::Other(body) => Err(E2eError::AssertionFailed(format!(
                "expected body {:?}, got {:?}",
                errors::api::UNAUTHORIZED,
                body
            ))),
        }
    })
}

/// `POST /login` answers 200 for good and bad credentials alike
fn check_status(status: StatusCode, call: &str) -> E2eResult<()> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(E2eError::Validation(format!("{} returned {}, expected 200", call, status)))
    }
}
