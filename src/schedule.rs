//! Turns a [`Schedule`] into concrete run times.

use chrono::{
    DateTime,
    Local,
};
use croner::Cron;
use speedtest_gsheet_config::Schedule;
use std::time::Duration;
use tokio::time::Instant;

/// Delay between start and the first run of an interval schedule.
pub const FIRST_RUN_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextRun {
    pub at: Instant,
    /// Scheduled runs that fell due while the previous run was still busy.
    pub skipped: u32,
}

/// When the first run after `start` is due.
pub fn first_run(schedule: &Schedule, start: Instant) -> Option<Instant> {
    match schedule {
        Schedule::Interval { .. } => Some(start + FIRST_RUN_DELAY),
        Schedule::Cron { cron, .. } => next_cron_run(cron, start, Local::now()),
    }
}

/// When the run following the one scheduled at `scheduled` is due, given the current time.
///
/// Interval runs stay on the fixed grid `start + 1s + k * period`: a run that took longer than
/// the period does not push later runs back, the slots it overlapped are skipped instead.
pub fn next_run(schedule: &Schedule, scheduled: Instant, now: Instant) -> Option<NextRun> {
    match schedule {
        Schedule::Interval { .. } => {
            let period = schedule.period()?;
            Some(next_interval_run(scheduled, period, now))
        }
        Schedule::Cron { cron, .. } => next_cron_run(cron, now, Local::now()).map(|at| NextRun { at, skipped: 0 }),
    }
}

fn next_interval_run(scheduled: Instant, period: Duration, now: Instant) -> NextRun {
    let mut at = scheduled + period;
    let mut skipped = 0;
    while at <= now {
        at += period;
        skipped += 1;
    }
    NextRun { at, skipped }
}

fn next_cron_run(cron: &Cron, now: Instant, wall_clock: DateTime<Local>) -> Option<Instant> {
    let occurrence = next_occurrence(cron, wall_clock)?;
    let delay = (occurrence - wall_clock).to_std().unwrap_or_default();
    Some(now + delay)
}

/// Next cron occurrence strictly after `after`, in local time.
pub fn next_occurrence(cron: &Cron, after: DateTime<Local>) -> Option<DateTime<Local>> {
    match cron.find_next_occurrence(&after, false) {
        Ok(next) => Some(next),
        Err(err) => {
            error!("No upcoming time matches the cron schedule: {err}");
            None
        }
    }
}
