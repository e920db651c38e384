//! Waiting for a resource to reach a terminal status.
//!
//! Provides the single polling primitive every lifecycle stage uses: call a
//! describe function at a fixed interval until it reports one of the
//! requested statuses, the ceiling elapses, or the caller cancels.

use crate::aws::error::{ServiceError, classify_anyhow_error};
use recsys_common::ResourceStatus;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Polling cadence and ceiling for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between describe calls
    pub interval: Duration,
    /// Maximum total time to wait
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Why a wait ended without reaching a requested status
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PollError {
    /// The ceiling elapsed; the resource's final fate is unknown
    #[error("no terminal status after {timeout:?} (last status: {})", last_status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    DeadlineExceeded {
        last_status: Option<ResourceStatus>,
        timeout: Duration,
    },

    /// The caller's cancellation token fired
    #[error("wait cancelled")]
    Cancelled,

    /// The describe call failed with something other than not-found
    #[error("describe failed")]
    Describe(#[source] ServiceError),
}

/// Wait until `describe` reports a status in `terminal`.
///
/// A not-found error from `describe` ends the wait with
/// [`ResourceStatus::Absent`], whether or not `Absent` is in `terminal`;
/// callers waiting for creation treat that as unexpected, delete-waits treat
/// it as success. Both the describe call and the sleep between polls race the
/// cancellation token. The describe call also races the ceiling, so a
/// describe that is slow or retrying internally cannot stretch the wait past
/// `config.timeout`.
///
/// # Example
/// ```ignore
/// let status = wait_until_terminal(
///     || client.describe(ResourceKind::Campaign, &arn),
///     ResourceStatus::CREATION_TERMINAL,
///     &PollConfig::new(Duration::from_secs(60), Duration::from_secs(3 * 3600)),
///     &cancel,
///     "campaign",
/// )
/// .await?;
/// ```
pub async fn wait_until_terminal<F, Fut>(
    mut describe: F,
    terminal: &[ResourceStatus],
    config: &PollConfig,
    cancel: &CancellationToken,
    resource_name: &str,
) -> Result<ResourceStatus, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<ResourceStatus>>,
{
    let start = Instant::now();
    let deadline = start + config.timeout;
    let mut last_status: Option<ResourceStatus> = None;
    let mut polls = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        polls += 1;
        let described = tokio::select! {
            biased;
            result = describe() => result,
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => {
                debug!(resource = %resource_name, polls, "Ceiling reached during describe");
                return Err(PollError::DeadlineExceeded {
                    last_status,
                    timeout: config.timeout,
                });
            }
        };

        match described {
            Ok(status) => {
                if last_status != Some(status) {
                    info!(resource = %resource_name, status = %status, "Status changed");
                }
                last_status = Some(status);

                if terminal.contains(&status) {
                    debug!(resource = %resource_name, polls, status = %status, "Reached terminal status");
                    return Ok(status);
                }
            }
            Err(e) => {
                let service = classify_anyhow_error(&e);
                if service.is_not_found() {
                    debug!(resource = %resource_name, polls, "Resource not found, treating as absent");
                    return Ok(ResourceStatus::Absent);
                }
                if cancel.is_cancelled() {
                    return Err(PollError::Cancelled);
                }
                debug!(resource = %resource_name, error = ?e, "Describe failed");
                return Err(PollError::Describe(service));
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(PollError::DeadlineExceeded {
                last_status,
                timeout: config.timeout,
            });
        }

        let delay = config.interval.min(config.timeout - elapsed);
        debug!(
            resource = %resource_name,
            poll = polls,
            delay_ms = delay.as_millis(),
            "Not terminal yet, waiting"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
        }
    }
}
