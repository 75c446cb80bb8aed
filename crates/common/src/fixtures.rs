//! Seeded test data: accounts, routes and the error strings the app renders

use serde::Serialize;

/// A username/password pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: &'static str,
    pub password: &'static str,
}

/// A seeded (or deliberately unknown) account
#[derive(Debug, Clone, Copy)]
pub struct TestUser {
    pub username: &'static str,
    pub password: &'static str,
    /// Backend id, when the account exists in the seed data
    pub id: Option<&'static str>,
}

impl TestUser {
    pub const fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username,
            password: self.password,
        }
    }
}

pub const VALID_USER: TestUser = TestUser {
    username: "Heath93",
    password: "s3cret",
    id: Some("qywYhB50P"),
};

pub const VALID_USER_2: TestUser = TestUser {
    username: "Katharina_Bernier",
    password: "s3cret",
    id: Some("5"),
};

pub const INVALID_USER: TestUser = TestUser {
    username: "invaliduser",
    password: "wrongpassword",
    id: None,
};

/// Every account present in the seed data
pub const VALID_USERS: [TestUser; 2] = [VALID_USER, VALID_USER_2];

/// Name of the session cookie issued by the API
pub const SESSION_COOKIE_NAME: &str = "connect.sid";

/// Front-end routes
pub mod ui {
    pub const BASE_URL: &str = "http://localhost:3000";
    pub const LOGIN_PAGE: &str = "/signin";
    pub const SIGNUP_PAGE: &str = "/signup";
    pub const HOME_PAGE: &str = "/";
    pub const TRANSACTIONS_PAGE: &str = "/transactions";
    pub const USER_SETTINGS_PAGE: &str = "/user/settings";
}

/// Backend routes
pub mod api {
    pub const BASE_URL: &str = "http://localhost:3001";
    pub const AUTH: &str = "/login";
    pub const TRANSACTIONS: &str = "/transactions";
    pub const TRANSFER: &str = "/bankTransfers";
    pub const CONTACTS: &str = "/contacts";
    pub const BANK_ACCOUNTS: &str = "/bankAccounts";
    pub const NOTIFICATIONS: &str = "/notifications";
    pub const USERS: &str = "/users";
    pub const SEED: &str = "/testData/seed";
}

/// Messages rendered by the app
pub mod errors {
    pub mod ui {
        pub const INVALID_CREDENTIALS: &str = "Username or password is invalid";
        pub const LOGIN_REQUIRED: &str = "Please sign in to continue";
        pub const USERNAME_REQUIRED: &str = "Username is required";
        pub const PASSWORD_REQUIRED: &str = "Password is required";
    }

    pub mod api {
        pub const UNAUTHORIZED: &str = "Unauthorized";
        pub const FORBIDDEN: &str = "Forbidden";
        pub const NOT_FOUND: &str = "Not found";
        pub const INVALID_REQUEST: &str = "Bad request";
    }
}

/// Join a base URL and a route without doubling or dropping the `/`
pub fn join_url(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}
