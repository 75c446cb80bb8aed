//! Suite runner: readiness gate, job planning, workers, retries and results

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use rwa_common::Viewport;

use crate::api::ApiClient;
use crate::backend::ReadinessGate;
use crate::config::{Project, SuiteConfig};
use crate::driver::BrowserSession;
use crate::error::{E2eError, E2eResult, ErrorCategory};
use crate::playwright::{Browser, PlaywrightBridge, PlaywrightConfig};
use crate::scenarios::{Scenario, ScenarioContext, Suite};

/// Final state of one test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    /// Passed after at least one retry
    Flaky,
    Failed,
    /// Not run because an earlier test in its serial group failed
    Skipped,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub suite: Suite,
    pub project: Option<String>,
    pub outcome: Outcome,
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub category: Option<ErrorCategory>,
    /// Page capture from the last failed attempt
    pub screenshot: Option<PathBuf>,
}

impl TestResult {
    fn new(scenario: &Scenario, project: Option<&Project>, outcome: Outcome) -> Self {
        Self {
            name: scenario.name.to_string(),
            suite: scenario.suite,
            project: project.map(|p| p.name.clone()),
            outcome,
            attempts: 0,
            duration_ms: 0,
            error: None,
            category: None,
            screenshot: None,
        }
    }

    fn label(&self) -> String {
        match &self.project {
            Some(project) => format!("[{}] {}", project, self.name),
            None => self.name.clone(),
        }
    }

    fn log(&self) {
        match self.outcome {
            Outcome::Passed => info!("✓ {} ({} ms)", self.label(), self.duration_ms),
            Outcome::Flaky => warn!(
                "✓ {} passed on attempt {} (flaky, {} ms)",
                self.label(),
                self.attempts,
                self.duration_ms
            ),
            Outcome::Failed => error!(
                "✗ {} - {}",
                self.label(),
                self.error.as_deref().unwrap_or("unknown error")
            ),
            Outcome::Skipped => info!("- {} (skipped)", self.label()),
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub flaky: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(results: Vec<TestResult>, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();
        Self {
            total: results.len(),
            passed: count(Outcome::Passed),
            failed: count(Outcome::Failed),
            flaky: count(Outcome::Flaky),
            skipped: count(Outcome::Skipped),
            duration_ms: elapsed.as_millis() as u64,
            started_at,
            results,
        }
    }

    /// No failures; flaky and skipped tests do not fail the run
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Which scenarios and projects to run
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Substring of the scenario name
    pub name: Option<String>,
    pub tag: Option<String>,
    pub suite: Option<Suite>,
    /// Project name
    pub project: Option<String>,
}

impl Filter {
    pub fn matches(&self, scenario: &Scenario) -> bool {
        self.name.as_deref().map_or(true, |n| scenario.name.contains(n))
            && self.tag.as_deref().map_or(true, |t| scenario.has_tag(t))
            && self.suite.map_or(true, |s| scenario.suite == s)
    }

    pub fn includes_project(&self, project: &Project) -> bool {
        self.project.as_deref().map_or(true, |p| project.name == p)
    }
}

/// A unit of scheduling: one worker runs its scenarios in order
#[derive(Debug, Clone)]
pub struct Job {
    /// Browser project; `None` for API scenarios
    pub project: Option<Project>,
    pub scenarios: Vec<Scenario>,
}

impl Job {
    pub fn describe(&self) -> Vec<String> {
        self.scenarios
            .iter()
            .map(|s| match &self.project {
                Some(p) => format!("[{}] {}", p.name, s.name),
                None => s.name.to_string(),
            })
            .collect()
    }
}

/// Expand scenarios into jobs.
///
/// API scenarios run once. Browser scenarios run once per project; a serial
/// suite becomes a single job per project so its tests run in order.
pub fn plan(scenarios: &[Scenario], projects: &[Project], filter: &Filter) -> Vec<Job> {
    let selected: Vec<&Scenario> = scenarios.iter().filter(|s| filter.matches(s)).collect();
    let projects: Vec<&Project> = projects
        .iter()
        .filter(|p| filter.includes_project(p))
        .collect();

    let mut jobs: Vec<Job> = selected
        .iter()
        .filter(|s| !s.suite.needs_browser())
        .map(|s| Job {
            project: None,
            scenarios: vec![**s],
        })
        .collect();

    for project in &projects {
        for scenario in selected
            .iter()
            .filter(|s| s.suite.needs_browser() && !s.suite.is_serial())
        {
            jobs.push(Job {
                project: Some((*project).clone()),
                scenarios: vec![**scenario],
            });
        }
    }

    for project in &projects {
        let serial: Vec<Scenario> = selected
            .iter()
            .filter(|s| s.suite.is_serial())
            .map(|s| **s)
            .collect();
        if !serial.is_empty() {
            jobs.push(Job {
                project: Some((*project).clone()),
                scenarios: serial,
            });
        }
    }

    jobs
}

/// Opens isolated browser sessions for one engine
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, viewport: Viewport) -> E2eResult<Arc<dyn BrowserSession>>;
}

#[async_trait]
impl SessionFactory for Arc<PlaywrightBridge> {
    async fn open(&self, viewport: Viewport) -> E2eResult<Arc<dyn BrowserSession>> {
        let session = self.new_session(viewport).await?;
        Ok(Arc::new(session))
    }
}

pub type Factories = HashMap<Browser, Arc<dyn SessionFactory>>;

/// Main E2E test runner
pub struct TestRunner {
    config: Arc<SuiteConfig>,
    api: Arc<ApiClient>,
}

impl TestRunner {
    pub fn new(config: SuiteConfig) -> E2eResult<Self> {
        let api = ApiClient::new(&config.api_base_url, &config.ui_base_url)?;
        Ok(Self {
            config: Arc::new(config),
            api: Arc::new(api),
        })
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Gate the backend, launch the browsers the plan needs, and run it.
    ///
    /// Environment faults return `Err`; test failures are in the result.
    pub async fn run(&self, scenarios: &[Scenario], filter: &Filter) -> E2eResult<TestSuiteResult> {
        let jobs = plan(scenarios, &self.config.projects, filter);
        if jobs.is_empty() {
            warn!("No tests match the filter");
        }

        ReadinessGate::new(&self.api, &self.config.backend)
            .ensure_ready()
            .await?;

        let mut bridges: HashMap<Browser, Arc<PlaywrightBridge>> = HashMap::new();
        for project in jobs.iter().filter_map(|j| j.project.as_ref()) {
            if !bridges.contains_key(&project.browser) {
                let bridge = PlaywrightBridge::launch(self.playwright_config(project.browser)).await?;
                bridges.insert(project.browser, bridge);
            }
        }
        let factories: Factories = bridges
            .iter()
            .map(|(browser, bridge)| (*browser, Arc::new(bridge.clone()) as Arc<dyn SessionFactory>))
            .collect();

        let result = self.execute(jobs, &factories).await;

        for bridge in bridges.values() {
            if let Err(e) = bridge.shutdown().await {
                warn!("Failed to shut down {} bridge: {}", bridge.browser().as_str(), e);
            }
        }
        Ok(result)
    }

    /// Run planned jobs on the configured number of workers
    pub async fn execute(&self, jobs: Vec<Job>, factories: &Factories) -> TestSuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let workers = self.config.workers();
        let tests: usize = jobs.iter().map(|j| j.scenarios.len()).sum();
        info!("Running {} test(s) on {} worker(s)...", tests, workers);

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();
        let mut pending: BTreeMap<usize, Job> = BTreeMap::new();
        for (index, job) in jobs.into_iter().enumerate() {
            pending.insert(index, job.clone());
            let worker = Worker {
                api: self.api.clone(),
                config: self.config.clone(),
                factory: job
                    .project
                    .as_ref()
                    .and_then(|p| factories.get(&p.browser).cloned()),
            };
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, worker.run_job(job).await)
            });
        }

        let mut finished = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, results)) => {
                    finished.insert(index, results);
                }
                Err(e) => error!("Test worker panicked: {}", e),
            }
        }

        // A worker that died still owes a result for every test it held
        for (index, job) in pending {
            if !finished.contains_key(&index) {
                finished.insert(index, lost_job_results(&job));
            }
        }
        let results: Vec<TestResult> = finished.into_values().flatten().collect();

        let suite = TestSuiteResult::from_results(results, started_at, start.elapsed());
        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} flaky, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.flaky, suite.skipped, suite.duration_ms
        );
        suite
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    fn playwright_config(&self, browser: Browser) -> PlaywrightConfig {
        PlaywrightConfig {
            browser,
            headless: self.config.headless,
            node_path: self.config.node_path.clone(),
            action_timeout: self.config.timeouts.action(),
            navigation_timeout: self.config.timeouts.navigation(),
        }
    }
}

struct Worker {
    api: Arc<ApiClient>,
    config: Arc<SuiteConfig>,
    factory: Option<Arc<dyn SessionFactory>>,
}

impl Worker {
    async fn run_job(&self, job: Job) -> Vec<TestResult> {
        let project = job.project.as_ref();
        let mut results = Vec::with_capacity(job.scenarios.len());
        let mut failed = false;

        for scenario in &job.scenarios {
            let result = if failed {
                TestResult::new(scenario, project, Outcome::Skipped)
            } else {
                self.run_test(scenario, project).await
            };
            failed |= result.outcome == Outcome::Failed;
            result.log();
            results.push(result);
        }
        results
    }

    async fn run_test(&self, scenario: &Scenario, project: Option<&Project>) -> TestResult {
        let start = Instant::now();
        let max_attempts = self.config.retries() + 1;
        let mut result = TestResult::new(scenario, project, Outcome::Failed);

        for attempt in 1..=max_attempts {
            result.attempts = attempt;
            let (outcome, screenshot) = self.attempt(scenario, project, attempt).await;
            match outcome {
                Ok(()) => {
                    result.outcome = if attempt > 1 { Outcome::Flaky } else { Outcome::Passed };
                    result.error = None;
                    result.category = None;
                    break;
                }
                Err(e) => {
                    let fatal = e.is_fatal();
                    result.error = Some(e.to_string());
                    result.category = Some(e.category());
                    result.screenshot = screenshot;
                    if fatal {
                        break;
                    }
                    if attempt < max_attempts {
                        warn!(
                            "{} failed on attempt {}/{}: {}",
                            scenario.name, attempt, max_attempts, e
                        );
                    }
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    async fn attempt(
        &self,
        scenario: &Scenario,
        project: Option<&Project>,
        attempt: u32,
    ) -> (E2eResult<()>, Option<PathBuf>) {
        let session = match self.open_session(scenario, project).await {
            Ok(session) => session,
            Err(e) => return (Err(e), None),
        };

        let ctx = ScenarioContext {
            api: self.api.clone(),
            config: self.config.clone(),
            browser: session.clone(),
        };
        let budget = if scenario.suite.is_serial() {
            self.config.timeouts.serial_test()
        } else {
            self.config.timeouts.test()
        };
        debug!("Running test: {} (attempt {})", scenario.name, attempt);
        let run = AssertUnwindSafe((scenario.run)(ctx)).catch_unwind();
        let outcome = match tokio::time::timeout(budget, run).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(payload)) => Err(E2eError::AssertionFailed(format!(
                "test panicked: {}",
                panic_message(payload.as_ref())
            ))),
            Err(_) => Err(E2eError::Timeout(format!(
                "test exceeded {} ms",
                budget.as_millis()
            ))),
        };

        let mut screenshot = None;
        if let Some(session) = session {
            if outcome.is_err() {
                let path = self.screenshot_path(scenario, project, attempt);
                match session.screenshot(&path).await {
                    Ok(()) => screenshot = Some(path),
                    Err(e) => debug!("Failure screenshot not captured: {}", e),
                }
            }
            if let Err(e) = session.close().await {
                debug!("Failed to close browser context: {}", e);
            }
        }
        (outcome, screenshot)
    }

    async fn open_session(
        &self,
        scenario: &Scenario,
        project: Option<&Project>,
    ) -> E2eResult<Option<Arc<dyn BrowserSession>>> {
        if !scenario.suite.needs_browser() {
            return Ok(None);
        }
        let project = project.ok_or_else(|| {
            E2eError::Setup(format!("{} needs a browser project", scenario.name))
        })?;
        let factory = self.factory.as_ref().ok_or_else(|| {
            E2eError::Setup(format!("no {} browser was launched", project.browser.as_str()))
        })?;
        factory.open(project.viewport).await.map(Some)
    }

    fn screenshot_path(&self, scenario: &Scenario, project: Option<&Project>, attempt: u32) -> PathBuf {
        let mut file = slug(scenario.name);
        if let Some(project) = project {
            file.push('-');
            file.push_str(&slug(&project.name));
        }
        self.config
            .output_dir
            .join("screenshots")
            .join(format!("{}-{}.png", file, attempt))
    }
}

fn lost_job_results(job: &Job) -> Vec<TestResult> {
    job.scenarios
        .iter()
        .map(|scenario| {
            let mut result = TestResult::new(scenario, job.project.as_ref(), Outcome::Failed);
            result.error = Some("test worker panicked".to_string());
            result.category = Some(ErrorCategory::Setup);
            result.log();
            result
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Lowercase file-name-safe form of a test name
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}
