//! Bounded fixed-interval retry used for the last report of a run.

use crate::notify::error::DeliveryError;
use crate::notify::report::Report;
use crate::notify::sink::ReportSink;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_FINAL_ATTEMPTS: usize = 5;
pub const DEFAULT_FINAL_RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalRetryPolicy {
    pub max_attempts: usize,
    pub interval: Duration,
}

impl Default for FinalRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_FINAL_ATTEMPTS,
            interval: DEFAULT_FINAL_RETRY_INTERVAL,
        }
    }
}

/// Result of the final delivery. Never an error: exhaustion is reported and the
/// run terminates anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalDelivery {
    Delivered { attempts: usize },
    Exhausted { attempts: usize, last_error: DeliveryError },
    /// No sink configured or nothing to report.
    Skipped,
}

impl FinalDelivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, FinalDelivery::Delivered { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            FinalDelivery::Delivered { attempts } | FinalDelivery::Exhausted { attempts, .. } => {
                *attempts
            }
            FinalDelivery::Skipped => 0,
        }
    }
}

/// Tries `sink` up to `policy.max_attempts` times with `policy.interval` between
/// attempts. Cancelling `force` abandons the remaining attempts.
pub(crate) async fn deliver_with_retry(
    sink: &dyn ReportSink,
    report: &Report,
    policy: FinalRetryPolicy,
    force: Option<&CancellationToken>,
) -> FinalDelivery {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match sink.deliver(report).await {
            Ok(()) => {
                tracing::debug!(target: "simwatch::notify", attempt, "final report delivered");
                return FinalDelivery::Delivered { attempts: attempt };
            }
            Err(err) => err,
        };

        if attempt >= max_attempts {
            return exhausted(attempt, err);
        }

        tracing::warn!(
            target: "simwatch::notify",
            attempt,
            max_attempts,
            retry_in_ms = duration_to_millis(policy.interval),
            error = %err,
            "final report delivery failed; retrying"
        );

        if !sleep_with_cancellation(policy.interval, force).await {
            tracing::warn!(target: "simwatch::notify", attempt, "final report retries abandoned");
            return exhausted(attempt, err);
        }
    }
}

fn exhausted(attempts: usize, last_error: DeliveryError) -> FinalDelivery {
    tracing::error!(
        target: "simwatch::notify",
        attempts,
        error = %last_error,
        "failed to report final state"
    );
    FinalDelivery::Exhausted {
        attempts,
        last_error,
    }
}

/// Returns `false` when the wait was cut short by `cancellation`.
async fn sleep_with_cancellation(delay: Duration, cancellation: Option<&CancellationToken>) -> bool {
    match cancellation {
        Some(token) if token.is_cancelled() => false,
        Some(token) => tokio::select! {
            _ = token.cancelled() => false,
            _ = sleep(delay) => true,
        },
        None => {
            sleep(delay).await;
            true
        }
    }
}

pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}
