//! Polling for async vendor jobs
//!
//! Checks a job at a fixed interval until it succeeds, fails or the overall
//! timeout passes. One check is in flight at a time.

use crate::llm::adapters::AdapterError;
use serde_json::Value as JsonValue;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Interval and overall timeout of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Outcome of one job check
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    Pending,
    Done(T),
    /// Vendor reported the job as failed; carries the job info
    Failed(JsonValue),
}

/// Polling errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Task failed: {0}")]
    Failed(JsonValue),

    #[error("Task timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Run `check` until it reports done or failed, or the timeout passes
///
/// The timeout is checked after each pending result, so a zero timeout
/// still checks once.
pub fn poll_until<T>(
    policy: &PollPolicy,
    mut check: impl FnMut() -> Result<PollStatus<T>, AdapterError>,
) -> Result<T, JobError> {
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match check()? {
            PollStatus::Done(value) => {
                debug!(attempts, "job done");
                return Ok(value);
            }
            PollStatus::Failed(info) => return Err(JobError::Failed(info)),
            PollStatus::Pending => {}
        }
        if start.elapsed() >= policy.timeout {
            return Err(JobError::TimedOut(policy.timeout));
        }
        thread::sleep(policy.interval);
    }
}
