//! Suite configuration
//!
//! Loaded from YAML; every field has a default so an empty (or missing)
//! file yields the stock local setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rwa_common::fixtures::{api, ui};
use rwa_common::Viewport;

use crate::error::{E2eError, E2eResult};
use crate::playwright::Browser;

/// Complete suite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Origin of the front-end under test
    pub ui_base_url: String,

    /// Origin of the backend API
    pub api_base_url: String,

    pub timeouts: Timeouts,

    /// Retries per failed test (None = resolved from the CI flag)
    pub retries: Option<u32>,

    /// Concurrent tests (None = resolved from the CI flag)
    pub workers: Option<usize>,

    /// Browser projects every UI/E2E scenario runs against
    pub projects: Vec<Project>,

    pub headless: bool,

    /// Where results and failure screenshots go
    pub output_dir: PathBuf,

    /// `node_modules` directory that provides `playwright`
    pub node_path: Option<PathBuf>,

    pub backend: BackendConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            ui_base_url: ui::BASE_URL.to_string(),
            api_base_url: api::BASE_URL.to_string(),
            timeouts: Timeouts::default(),
            retries: None,
            workers: None,
            projects: Project::desktop_defaults(),
            headless: true,
            output_dir: PathBuf::from("test-results"),
            node_path: None,
            backend: BackendConfig::default(),
        }
    }
}

/// Timeouts, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub test_ms: u64,
    /// Serial end-to-end tests drive the full state machine and get longer
    pub serial_test_ms: u64,
    pub action_ms: u64,
    pub navigation_ms: u64,
    pub expect_ms: u64,
}

impl Timeouts {
    pub fn test(&self) -> Duration {
        Duration::from_millis(self.test_ms)
    }

    pub fn serial_test(&self) -> Duration {
        Duration::from_millis(self.serial_test_ms)
    }

    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn expect(&self) -> Duration {
        Duration::from_millis(self.expect_ms)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            test_ms: 30_000,
            serial_test_ms: 45_000,
            action_ms: 10_000,
            navigation_ms: 15_000,
            expect_ms: 5_000,
        }
    }
}

/// A browser + viewport combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub browser: Browser,
    #[serde(default)]
    pub viewport: Viewport,
}

impl Project {
    /// Desktop Chrome, Firefox and Safari
    pub fn desktop_defaults() -> Vec<Self> {
        [Browser::Chromium, Browser::Firefox, Browser::Webkit]
            .into_iter()
            .map(|browser| Project {
                name: browser.as_str().to_string(),
                browser,
                viewport: Viewport::default(),
            })
            .collect()
    }
}

/// How to bring the backend up when it is not already running
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Shell command that starts the API (None = never start it)
    pub start_command: Option<String>,
    pub working_dir: PathBuf,
    /// Liveness probes, one per second, before giving up
    pub startup_attempts: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            start_command: Some("yarn dev".to_string()),
            working_dir: PathBuf::from("../new-project"),
            startup_attempts: 30,
        }
    }
}

impl BackendConfig {
    /// Human-readable instruction for starting the backend by hand
    pub fn start_hint(&self) -> String {
        match &self.start_command {
            Some(cmd) => format!("cd {} && {}", self.working_dir.display(), cmd),
            None => "start the API server".to_string(),
        }
    }
}

impl SuiteConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_yaml(&content)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> E2eResult<()> {
        if self.projects.is_empty() {
            return Err(E2eError::Config("at least one project is required".into()));
        }
        if self.workers == Some(0) {
            return Err(E2eError::Config("workers must be at least 1".into()));
        }
        for url in [&self.ui_base_url, &self.api_base_url] {
            reqwest::Url::parse(url)
                .map_err(|e| E2eError::Config(format!("invalid URL {}: {}", url, e)))?;
        }
        Ok(())
    }

    /// Fill unset retries/workers: CI gets more retries and a single worker
    pub fn resolve_ci(&mut self, ci: bool) {
        if self.retries.is_none() {
            self.retries = Some(if ci { 3 } else { 1 });
        }
        if self.workers.is_none() {
            self.workers = Some(if ci {
                1
            } else {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            });
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(1)
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or(1).max(1)
    }
}

/// Whether the suite runs under CI (`CI` set to anything but empty, `0` or `false`)
pub fn is_ci() -> bool {
    ci_flag(std::env::var("CI").ok().as_deref())
}

fn ci_flag(value: Option<&str>) -> bool {
    match value {
        Some(v) => !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = SuiteConfig::from_yaml("{}").unwrap();
        assert_eq!(config.ui_base_url, "http://localhost:3000");
        assert_eq!(config.api_base_url, "http://localhost:3001");
        assert_eq!(config.projects.len(), 3);
        assert_eq!(config.timeouts.expect(), Duration::from_secs(5));
        assert!(config.headless);
    }

    #[test]
    fn test_parse_projects() {
        let yaml = r#"
ui_base_url: http://127.0.0.1:4000
retries: 0
timeouts:
  test_ms: 60000
projects:
  - name: mobile-chrome
    browser: chromium
    viewport:
      width: 390
      height: 844
"#;
        let config = SuiteConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.retries(), 0);
        assert_eq!(config.timeouts.test(), Duration::from_secs(60));
        assert_eq!(config.timeouts.action_ms, 10_000);
        assert!(config.projects[0].viewport.is_mobile());
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(SuiteConfig::from_yaml("projects: []").is_err());
        assert!(SuiteConfig::from_yaml("workers: 0").is_err());
        assert!(SuiteConfig::from_yaml("api_base_url: not a url").is_err());
    }

    #[test]
    fn test_resolve_ci() {
        let mut ci = SuiteConfig::default();
        ci.resolve_ci(true);
        assert_eq!(ci.retries(), 3);
        assert_eq!(ci.workers(), 1);

        let mut local = SuiteConfig::default();
        local.resolve_ci(false);
        assert_eq!(local.retries(), 1);
        assert!(local.workers() >= 1);

        let mut pinned = SuiteConfig {
            retries: Some(0),
            ..Default::default()
        };
        pinned.resolve_ci(true);
        assert_eq!(pinned.retries(), 0);
    }

    #[test]
    fn test_ci_flag() {
        assert!(ci_flag(Some("true")));
        assert!(ci_flag(Some("1")));
        assert!(!ci_flag(Some("")));
        assert!(!ci_flag(Some("0")));
        assert!(!ci_flag(Some("FALSE")));
        assert!(!ci_flag(None));
    }

    #[test]
    fn test_start_hint() {
        assert_eq!(BackendConfig::default().start_hint(), "cd ../new-project && yarn dev");
    }
}
