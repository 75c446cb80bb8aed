//! RWA Common Library
//!
//! Seeded fixtures and the data model shared by the API, UI and end-to-end
//! suites of the Real World App test harness.

pub mod fixtures;
pub mod types;

// Re-export commonly used types
pub use fixtures::{Credentials, TestUser, INVALID_USER, VALID_USER, VALID_USER_2, VALID_USERS};
pub use types::*;

/// Suite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
