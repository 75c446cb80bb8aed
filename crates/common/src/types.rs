//! Core types for the RWA test suite

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::fixtures::errors;

/// Body returned by `POST /login` on success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(default)]
    pub token: Option<String>,
}

/// Account as returned by the API. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Cents, but not always integral in seed data
    pub balance: f64,
}

/// Value of the client-side authentication state machine.
///
/// Owned by the application under test; the suite only observes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthState {
    Unauthorized,
    Authorized,
    /// Any transitional value (`loading`, `refreshing`, ...)
    Other(String),
}

impl AuthState {
    pub fn as_str(&self) -> &str {
        match self {
            AuthState::Unauthorized => "unauthorized",
            AuthState::Authorized => "authorized",
            AuthState::Other(value) => value,
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "unauthorized" => AuthState::Unauthorized,
            "authorized" => AuthState::Authorized,
            other => AuthState::Other(other.to_string()),
        })
    }
}

/// Login failure the UI is expected to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoginErrorKind {
    InvalidPassword,
    InvalidUsername,
    LoginRequired,
    RequiredField,
    RequiredPassword,
}

impl LoginErrorKind {
    /// Text the app renders for this failure
    pub fn message(&self) -> &'static str {
        match self {
            LoginErrorKind::InvalidPassword | LoginErrorKind::InvalidUsername => {
                errors::ui::INVALID_CREDENTIALS
            }
            LoginErrorKind::LoginRequired => errors::ui::LOGIN_REQUIRED,
            LoginErrorKind::RequiredField => errors::ui::USERNAME_REQUIRED,
            LoginErrorKind::RequiredPassword => errors::ui::PASSWORD_REQUIRED,
        }
    }

    /// Whether the error shows as helper text under a field rather than in
    /// the shared banner
    pub fn is_field_level(&self) -> bool {
        matches!(self, LoginErrorKind::RequiredField | LoginErrorKind::RequiredPassword)
    }
}

/// Browser viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Below this width the side navigation collapses behind a toggle
    pub const MOBILE_BREAKPOINT: u32 = 600;

    pub fn is_mobile(&self) -> bool {
        self.width < Self::MOBILE_BREAKPOINT
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
