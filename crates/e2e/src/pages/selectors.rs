//! Element hooks the app exposes for automation

pub const USERNAME_INPUT: &str = "#username";
pub const PASSWORD_INPUT: &str = "#password";
pub const SIGNIN_SUBMIT: &str = r#"[data-test="signin-submit"]"#;
pub const SIGNIN_ERROR: &str = r#"[data-test="signin-error"]"#;
pub const SIGNIN_USERNAME: &str = r#"[data-test="signin-username"]"#;
pub const USERNAME_HELPER: &str = "#username-helper-text";
pub const PASSWORD_HELPER: &str = "#password-helper-text";

pub const SIDENAV_TOGGLE: &str = r#"[data-test="sidenav-toggle"]"#;
pub const SIDENAV_SIGNOUT: &str = r#"[data-test="sidenav-signout"]"#;
pub const SIDENAV_USER_FULL_NAME: &str = r#"[data-test="sidenav-user-full-name"]"#;
pub const SIDENAV_USERNAME: &str = r#"[data-test="sidenav-username"]"#;
pub const SIDENAV_USER_BALANCE: &str = r#"[data-test="sidenav-user-balance"]"#;

pub const TRANSACTION_LIST: &str = r#"[data-test="transaction-list"]"#;
