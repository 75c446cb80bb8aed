//! HTTP client for the backend API

use reqwest::header::{ACCEPT, CONTENT_TYPE, ORIGIN, SET_COOKIE};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use rwa_common::fixtures::{api, errors, join_url};
use rwa_common::AuthResponse;

use crate::cookie::extract_session_token;
use crate::driver::is_truthy;
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Parsed body of `POST /login`
#[derive(Debug, Clone)]
pub enum LoginBody {
    Authenticated(AuthResponse),
    /// Exactly `Unauthorized`; the API reports bad credentials with a 200
    Unauthorized,
    Other(String),
}

impl LoginBody {
    pub fn parse(text: &str) -> Self {
        if text == errors::api::UNAUTHORIZED {
            return LoginBody::Unauthorized;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
            return LoginBody::Other(text.to_string());
        };
        match value.get("user").filter(|user| is_truthy(user)) {
            // Any truthy user authenticates; its fields are read best-effort
            Some(user) => LoginBody::Authenticated(AuthResponse {
                user: serde_json::from_value(user.clone()).unwrap_or_default(),
                token: value.get("token").and_then(|t| t.as_str()).map(str::to_string),
            }),
            None => LoginBody::Other(text.to_string()),
        }
    }
}

/// Everything a login call returned
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub status: StatusCode,
    /// All `set-cookie` headers joined by newlines
    pub set_cookie: Option<String>,
    pub body: LoginBody,
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        self.status == StatusCode::OK && matches!(self.body, LoginBody::Authenticated(_))
    }

    pub fn user(&self) -> Option<&rwa_common::User> {
        match &self.body {
            LoginBody::Authenticated(resp) => Some(&resp.user),
            _ => None,
        }
    }

    /// `connect.sid` value from the response, if the server issued one
    pub fn session_token(&self) -> Option<String> {
        self.set_cookie.as_deref().and_then(extract_session_token)
    }
}

/// Client for the Real World App backend
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    ui_origin: String,
}

impl ApiClient {
    pub fn new(base_url: &str, ui_origin: &str) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            ui_origin: ui_origin.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Liveness probe against the API root.
    ///
    /// Client errors still prove the API is up; a 5xx usually comes from a
    /// proxy in front of a dead backend and counts as unreachable.
    pub async fn ping(&self) -> E2eResult<String> {
        let resp = self.client.get(&self.base_url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_server_error() {
            return Err(E2eError::BackendUnreachable {
                url: self.base_url.clone(),
                hint: format!("it answered {}: {}", status, body.trim()),
            });
        }
        Ok(body)
    }

    /// Reset the data store to the seed fixtures
    pub async fn seed(&self) -> E2eResult<String> {
        let url = join_url(&self.base_url, api::SEED);
        let resp = self.client.post(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(E2eError::SeedFailed(format!("{} returned {}: {}", url, status, body)));
        }
        Ok(body)
    }

    /// Authenticate directly against `POST /login`
    pub async fn login(&self, username: &str, password: &str) -> E2eResult<LoginOutcome> {
        let url = join_url(&self.base_url, api::AUTH);
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(ORIGIN, &self.ui_origin)
            .json(&LoginRequest {
                username,
                password,
                kind: "LOGIN",
            })
            .send()
            .await?;

        let status = resp.status();
        let cookies: Vec<&str> = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let set_cookie = if cookies.is_empty() {
            None
        } else {
            Some(cookies.join("\n"))
        };
        let text = resp.text().await?;
        debug!("POST {} as {} -> {}", url, username, status);

        Ok(LoginOutcome {
            status,
            set_cookie,
            body: LoginBody::parse(&text),
        })
    }
}
