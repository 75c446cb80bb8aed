//! Test scenarios
//!
//! Each scenario is a plain async function over a [`ScenarioContext`]. The
//! runner decides how often it runs (once, or once per browser project) and
//! hands it a fresh browser session when the suite needs one.

pub mod api;
pub mod login;
pub mod session;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::SuiteConfig;
use crate::driver::BrowserSession;
use crate::error::{E2eError, E2eResult};

pub type ScenarioFuture = BoxFuture<'static, E2eResult<()>>;

/// Which suite a scenario belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    /// HTTP only, no browser
    Api,
    /// Login form, fully parallel
    Ui,
    /// Signed-in flows, run in order within a project
    E2e,
}

impl Suite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Suite::Api => "api",
            Suite::Ui => "ui",
            Suite::E2e => "e2e",
        }
    }

    pub fn needs_browser(&self) -> bool {
        !matches!(self, Suite::Api)
    }

    pub fn is_serial(&self) -> bool {
        matches!(self, Suite::E2e)
    }
}

impl std::fmt::Display for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named test
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub suite: Suite,
    pub tags: &'static [&'static str],
    pub run: fn(ScenarioContext) -> ScenarioFuture,
}

impl Scenario {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| *t == tag)
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("suite", &self.suite)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Everything one scenario run gets
#[derive(Clone)]
pub struct ScenarioContext {
    pub api: Arc<ApiClient>,
    pub config: Arc<SuiteConfig>,
    /// Fresh context + page, present for browser suites
    pub browser: Option<Arc<dyn BrowserSession>>,
}

impl ScenarioContext {
    pub fn browser(&self) -> E2eResult<&dyn BrowserSession> {
        self.browser
            .as_deref()
            .ok_or_else(|| E2eError::Setup("scenario requires a browser session".into()))
    }
}

/// All scenarios, in declaration order
pub fn catalogue() -> Vec<Scenario> {
    let mut all = Vec::new();
    all.extend(api::scenarios());
    all.extend(login::scenarios());
    all.extend(session::scenarios());
    all
}

/// `AssertionFailed` unless `condition` holds
pub(crate) fn ensure(condition: bool, message: impl FnOnce() -> String) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_names_unique() {
        let all = catalogue();
        let names: HashSet<_> = all.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_catalogue_suites() {
        let all = catalogue();
        let count = |suite| all.iter().filter(|s| s.suite == suite).count();
        assert_eq!(count(Suite::Api), 2);
        assert_eq!(count(Suite::Ui), 6);
        assert_eq!(count(Suite::E2e), 2);
    }

    #[test]
    fn test_suite_flags() {
        assert!(!Suite::Api.needs_browser());
        assert!(Suite::Ui.needs_browser());
        assert!(Suite::E2e.is_serial());
        assert!(!Suite::Ui.is_serial());
        assert_eq!(serde_json::to_value(Suite::E2e).unwrap(), "e2e");
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, String::new).is_ok());
        let err = ensure(false, || "status was 500".into()).unwrap_err();
        assert!(matches!(err, E2eError::AssertionFailed(m) if m == "status was 500"));
    }
}
