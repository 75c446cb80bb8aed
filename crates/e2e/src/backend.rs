//! Backend management - readiness gate, seeding and optional startup

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::config::BackendConfig;
use crate::error::{E2eError, E2eResult};
use crate::poll::{poll_until, PollPolicy};

/// Global precondition for a run: API reachable, data store seeded.
///
/// Neither step is retried; a failure here is an environment fault.
pub struct ReadinessGate<'a> {
    api: &'a ApiClient,
    start_hint: String,
}

impl<'a> ReadinessGate<'a> {
    pub fn new(api: &'a ApiClient, backend: &BackendConfig) -> Self {
        Self {
            api,
            start_hint: backend.start_hint(),
        }
    }

    pub async fn ensure_ready(&self) -> E2eResult<()> {
        match self.api.ping().await {
            Ok(body) => info!("Backend is running: {}", body.trim()),
            Err(e) => {
                warn!("Backend liveness probe failed: {}", e);
                return Err(E2eError::BackendUnreachable {
                    url: self.api.base_url().to_string(),
                    hint: self.start_hint.clone(),
                });
            }
        }

        let seeded = self.api.seed().await.map_err(|e| match e {
            E2eError::SeedFailed(_) => e,
            other => E2eError::SeedFailed(other.to_string()),
        })?;
        info!("Database seeded: {}", seeded.trim());
        Ok(())
    }
}

/// Backend process started by the suite.
///
/// The start command runs in its own process group so stopping it also
/// stops whatever it spawned (`yarn dev` forks node).
#[derive(Debug)]
pub struct BackendProcess {
    child: Option<Child>,
}

impl BackendProcess {
    /// Start the backend unless it already answers.
    ///
    /// Returns `None` when it was already running.
    pub async fn ensure_running(api: &ApiClient, config: &BackendConfig) -> E2eResult<Option<Self>> {
        if api.ping().await.is_ok() {
            info!("Backend is already running");
            return Ok(None);
        }
        let Some(command) = config.start_command.as_deref() else {
            return Err(E2eError::BackendUnreachable {
                url: api.base_url().to_string(),
                hint: config.start_hint(),
            });
        };

        info!("Backend is not running, starting `{}` in {}", command, config.working_dir.display());
        let process = Self::spawn(command, &config.working_dir)?;

        let policy = PollPolicy {
            max_attempts: config.startup_attempts,
            interval: Duration::from_secs(1),
        };
        if !poll_until(policy, move || async move { api.ping().await.is_ok() }).await {
            return Err(E2eError::BackendStartup(config.startup_attempts));
        }

        info!("Backend is now running (pid: {})", process.id().unwrap_or_default());
        Ok(Some(process))
    }

    /// Run `command` through `sh -c` as the leader of a new process group
    pub fn spawn(command: &str, working_dir: &Path) -> E2eResult<Self> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let child = cmd
            .spawn()
            .map_err(|e| E2eError::Config(format!("failed to spawn `{}`: {}", command, e)))?;
        Ok(Self { child: Some(child) })
    }

    /// Pid of the shell, which is also the process group id
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Stop the backend and everything in its process group
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping backend (pid: {})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let group = Pid::from_raw(child.id() as i32);
            if killpg(group, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
            // Force kill stragglers
            let _ = killpg(group, Signal::SIGKILL);
        }

        let _ = child.kill();
        child.wait()?;
        Ok(())
    }
}

impl Drop for BackendProcess {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop backend: {}", e);
        }
    }
}
