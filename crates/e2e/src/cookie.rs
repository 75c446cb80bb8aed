//! Session cookie injected into a browser context

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use rwa_common::fixtures::SESSION_COOKIE_NAME;

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

/// Cookie in the shape Playwright's `context.addCookies` takes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl SessionCookie {
    /// `connect.sid` scoped to the host of `base_url`, root path, http-only
    pub fn for_origin(base_url: &str, token: &str) -> E2eResult<Self> {
        let url = reqwest::Url::parse(base_url)
            .map_err(|e| E2eError::Config(format!("invalid UI base URL {}: {}", base_url, e)))?;
        let domain = url
            .host_str()
            .ok_or_else(|| E2eError::Config(format!("UI base URL has no host: {}", base_url)))?;

        Ok(Self {
            name: SESSION_COOKIE_NAME.to_string(),
            value: token.to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            http_only: true,
            same_site: SameSite::Lax,
        })
    }
}

fn session_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"connect\.sid=([^;]+)").expect("static regex"))
}

/// Pull the session token out of a (possibly multi-line) `set-cookie` value
pub fn extract_session_token(set_cookie: &str) -> Option<String> {
    session_pattern()
        .captures(set_cookie)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
