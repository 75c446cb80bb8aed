//! Bounded fixed-interval polling

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use rwa_common::AuthState;

use crate::auth_state::AuthStatePort;

/// Attempt budget and the pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

impl PollPolicy {
    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Run `probe` until it returns true or the budget is spent.
///
/// Never fails; the caller decides whether `false` is fatal.
pub async fn poll_until<F, Fut>(policy: PollPolicy, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.max_attempts {
        if probe().await {
            return true;
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    false
}

/// Poll the app's auth state until it equals `expected`.
///
/// A sample that errors or finds no state machine counts as a mismatch.
pub async fn wait_for_auth_state(
    port: &dyn AuthStatePort,
    expected: &AuthState,
    policy: PollPolicy,
) -> bool {
    let mut attempt = 0u32;
    let converged = poll_until(policy, move || {
        attempt += 1;
        let n = attempt;
        async move {
            match port.current_state().await {
                Ok(Some(state)) => {
                    debug!("auth state sample {}: {}", n, state);
                    state == *expected
                }
                Ok(None) => {
                    debug!("auth state sample {}: no state machine", n);
                    false
                }
                Err(e) => {
                    debug!("auth state sample {} failed: {}", n, e);
                    false
                }
            }
        }
    })
    .await;

    if !converged {
        debug!(
            "auth state did not reach {} within {} attempts",
            expected, policy.max_attempts
        );
    }
    converged
}
