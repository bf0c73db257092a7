use crate::engine::RawProgressEvent;
use crate::progress::bounds::RunBounds;
use crate::progress::snapshot::Snapshot;
use std::time::Duration;

/// Derives a [`Snapshot`] from cumulative engine counters.
///
/// Wall-clock remaining time is a linear extrapolation: wall time spent per unit of
/// simulated time so far, multiplied by the simulated time still ahead. The returned
/// snapshot carries no faults; attach them with [`Snapshot::with_faults`].
pub fn project(event: &RawProgressEvent, bounds: &RunBounds) -> Snapshot {
    let elapsed_secs = event.elapsed_time.as_secs_f64();

    let (pending_time, simulated_pending_time) = match bounds.span() {
        Some(span) => {
            let remaining = span.saturating_sub(event.simulated_elapsed_time);
            (
                extrapolate(remaining, event.elapsed_time, event.simulated_elapsed_time),
                Some(remaining),
            )
        }
        None => (None, None),
    };

    Snapshot {
        total_requests: event.updates_requested,
        elapsed_time: event.elapsed_time,
        simulated_elapsed_time: event.simulated_elapsed_time,
        throughput: ratio(event.updates_requested as f64, elapsed_secs),
        delayed_rate_pct: percentage(event.delayed_update_requests, event.updates_processed),
        error_rate_pct: percentage(event.error_update_requests, event.updates_processed),
        pending_time,
        simulated_pending_time,
        faults: Vec::new(),
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator <= f64::EPSILON {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

fn percentage(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    ratio(100.0 * part as f64, whole as f64)
}

fn extrapolate(
    simulated_remaining: Duration,
    elapsed: Duration,
    simulated_elapsed: Duration,
) -> Option<Duration> {
    if simulated_elapsed.is_zero() {
        return None;
    }
    let seconds = ratio(
        simulated_remaining.as_secs_f64() * elapsed.as_secs_f64(),
        simulated_elapsed.as_secs_f64(),
    )?;
    Duration::try_from_secs_f64(seconds).ok()
}
