//! Real World App E2E Test Framework
//!
//! Rust-controlled end-to-end and API tests for the Real World App:
//! - Gates the run on a reachable, freshly seeded backend
//! - Drives browsers through a long-lived Playwright bridge
//! - Models the sign-in flow with page objects
//! - Signs in through the API and syncs the in-page auth state machine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── ReadinessGate::ensure_ready()   ping + seed, once    │
//! │    ├── plan(scenarios, projects) -> [Job]                   │
//! │    ├── PlaywrightBridge::launch() per browser               │
//! │    └── execute(jobs) -> TestSuiteResult                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (async fn over ScenarioContext)                   │
//! │    ├── api:  ApiClient::login                               │
//! │    ├── ui:   LoginPage { navigate, submit, assert_* }       │
//! │    └── e2e:  HybridLogin::establish + SideNav               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Ports                                                      │
//! │    ├── BrowserPage / BrowserContext  (PlaywrightSession)    │
//! │    └── AuthStatePort                 (window.authService)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod auth_state;
pub mod backend;
pub mod config;
pub mod cookie;
pub mod driver;
pub mod error;
pub mod expect;
pub mod pages;
pub mod playwright;
pub mod poll;
pub mod runner;
pub mod scenarios;
pub mod session;

pub use api::ApiClient;
pub use config::SuiteConfig;
pub use error::{E2eError, E2eResult, ErrorCategory};
pub use runner::{Filter, TestRunner, TestSuiteResult};
pub use scenarios::{catalogue, Scenario, Suite};
