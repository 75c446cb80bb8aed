//! Page objects for the Real World App

pub mod login;
pub mod selectors;
pub mod sidenav;

pub use login::{LoginPage, SubmitOutcome};
pub use sidenav::SideNav;
