//! Wall-clock hourly scheduler.
//!
//! Fires at the top of every hour in a fixed IANA timezone. Ticks that are
//! missed while the process is down or while a previous action is still
//! running are not replayed.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use std::{fmt::Display, future::Future};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Every zone in use today has an offset that is a multiple of 15 minutes.
const OFFSET_GRANULARITY_SECS: i64 = 15 * 60;

/// Computes the next top-of-hour instant in a timezone.
#[derive(Debug, Clone, Copy)]
pub struct HourlySchedule {
    tz: Tz,
}

impl HourlySchedule {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// First instant strictly after `now` at which the local clock reads `HH:00:00`.
    ///
    /// Local hours skipped by a DST gap get no tick. A local hour that occurs
    /// twice when clocks fall back gets a tick at each occurrence, so ticks are
    /// never more than one real hour apart.
    pub fn next_tick_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let next_boundary =
            (now.timestamp().div_euclid(OFFSET_GRANULARITY_SECS) + 1) * OFFSET_GRANULARITY_SECS;
        let step = Duration::seconds(OFFSET_GRANULARITY_SECS);

        if let Some(mut candidate) = DateTime::from_timestamp(next_boundary, 0) {
            // Four boundaries per hour; two days of them is far more than needed.
            for _ in 0..(4 * 48) {
                let local = candidate.with_timezone(&self.tz);
                if local.minute() == 0 && local.second() == 0 {
                    return candidate;
                }
                candidate += step;
            }
        }

        // Unreachable for real tz data; fall back to a plain hourly cadence.
        now + Duration::hours(1)
    }
}

/// Run `action` once, catching both returned errors and panics.
///
/// Returns `true` when the action completed successfully.
pub async fn run_guarded<F, Fut, E>(action: &F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    match tokio::spawn(action()).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!(error = %err, "Scheduled job failed");
            false
        }
        Err(join_err) if join_err.is_panic() => {
            error!("Scheduled job panicked");
            false
        }
        Err(join_err) => {
            error!(error = %join_err, "Scheduled job was cancelled");
            false
        }
    }
}

/// Spawn the scheduler loop on its own task. It runs until the handle is
/// aborted or the runtime shuts down.
pub fn spawn_hourly<F, Fut, E>(schedule: HourlySchedule, action: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(run_hourly(schedule, action, Utc::now))
}

/// The scheduler loop, reading wall-clock time from `clock`.
pub async fn run_hourly<F, Fut, E, C>(schedule: HourlySchedule, action: F, clock: C)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
    C: Fn() -> DateTime<Utc> + Send + 'static,
{
    info!(timezone = %schedule.timezone(), "Hourly scheduler started");
    loop {
        let now = clock();
        let next = schedule.next_tick_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        debug!(next = %next.with_timezone(&schedule.timezone()), "Waiting for next tick");

        tokio::time::sleep(wait).await;
        run_guarded(&action).await;
    }
}
