//! Bounded status polling for long-running upstream operations.
//!
//! Fixed interval, capped attempts, progress reported per attempt. The
//! upstream operation keeps running if the cap is hit — only the watching
//! stops, and the exhaustion surfaces as a timeout-shaped failure.

use std::future::Future;
use std::time::Duration;

use crate::progress::ProgressReporter;
use crate::FathomError;

/// Outcome of one status check.
#[derive(Debug)]
pub enum PollStatus<T> {
    /// Still running; optional human-readable status message.
    Running(Option<String>),
    Done(T),
    Failed(FathomError),
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_attempts: usize,
}

/// Poll `check` until it reports a terminal status or attempts run out.
pub async fn poll_until<T, F, Fut>(
    mut check: F,
    config: &PollConfig,
    progress: &dyn ProgressReporter,
    label: &str,
) -> Result<T, FathomError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, FathomError>>,
{
    for attempt in 1..=config.max_attempts {
        match check().await? {
            PollStatus::Done(value) => {
                progress
                    .report(1.0, 1.0, Some(format!("{} complete", label)))
                    .await;
                return Ok(value);
            }
            PollStatus::Failed(err) => return Err(err),
            PollStatus::Running(message) => {
                let message = message.unwrap_or_else(|| format!("{} still running", label));
                progress
                    .attempt(attempt, config.max_attempts, &message)
                    .await;
            }
        }
        if attempt < config.max_attempts {
            tokio::time::sleep(Duration::from_millis(config.interval_ms)).await;
        }
    }

    Err(FathomError::Timeout {
        label: label.to_string(),
        deadline_ms: config.interval_ms * config.max_attempts as u64,
    })
}
