use crate::{
    job::Job,
    schedule::{
        first_run,
        next_run,
    },
    Schedule,
};
use tokio::{
    sync::watch,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    ShuttingDown,
}

/// Triggers one job on a schedule until the shutdown token is cancelled.
///
/// Runs never overlap: a trigger that falls due while the job is still busy is skipped.
/// Cancelling the token stops future triggers but lets an in-flight run finish.
pub struct Scheduler<J> {
    schedule: Schedule,
    job: J,
    shutdown: CancellationToken,
    state: watch::Sender<SchedulerState>,
}

impl<J: Job> Scheduler<J> {
    pub fn new(schedule: Schedule, job: J, shutdown: CancellationToken) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            schedule,
            job,
            shutdown,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub async fn run(self) {
        match &self.schedule {
            Schedule::Interval { minutes } => info!("Adding job to run every {minutes} minutes..."),
            Schedule::Cron { expression, .. } => {
                info!("Adding job to run on the following cron schedule: {expression}")
            }
        }
        self.state.send_replace(SchedulerState::Running);

        let mut next = first_run(&self.schedule, Instant::now());
        while let Some(scheduled) = next {
            debug!(
                "Next run of job [{}] in {:?}",
                self.job.name(),
                scheduled.saturating_duration_since(Instant::now())
            );

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(scheduled) => {}
            }

            self.run_job().await;
            if self.shutdown.is_cancelled() {
                break;
            }

            next = next_run(&self.schedule, scheduled, Instant::now()).map(|next| {
                if next.skipped > 0 {
                    warn!(
                        "Job [{}] overran its schedule, skipped {} run(s)",
                        self.job.name(),
                        next.skipped
                    );
                }
                next.at
            });
        }

        self.state.send_replace(SchedulerState::ShuttingDown);
        info!("Scheduler shutdown.");
    }

    /// Run the job once. A shutdown request during the run is noted but the run is not cut short.
    async fn run_job(&self) {
        let run = self.job.run();
        tokio::pin!(run);

        let result = tokio::select! {
            biased;
            result = &mut run => result,
            _ = self.shutdown.cancelled() => {
                self.state.send_replace(SchedulerState::ShuttingDown);
                info!("Waiting for job [{}] to finish...", self.job.name());
                run.await
            }
        };

        if let Err(err) = result {
            error!("Job [{}] failed: {err}", self.job.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error,
        Result,
    };
    use std::{
        future::Future,
        pin::Pin,
        sync::{
            atomic::{
                AtomicUsize,
                Ordering,
            },
            Arc,
        },
        time::Duration,
    };
    use tokio::sync::mpsc;

    const MINUTE: Duration = Duration::from_secs(60);

    /// Reports each start, then takes `duration` to finish.
    struct TestJob {
        started: mpsc::UnboundedSender<Instant>,
        finished: Arc<AtomicUsize>,
        duration: Duration,
        fail: bool,
    }

    impl Job for TestJob {
        fn run(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                let _ = self.started.send(Instant::now());
                tokio::time::sleep(self.duration).await;
                self.finished.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    return Err(Error::Mapping("invalid timestamp \"\"".to_string()));
                }
                Ok(())
            })
        }

        fn name(&self) -> &'static str {
            "test"
        }
    }

    fn test_job(duration: Duration, fail: bool) -> (TestJob, mpsc::UnboundedReceiver<Instant>, Arc<AtomicUsize>) {
        let (started, runs) = mpsc::unbounded_channel();
        let finished = Arc::new(AtomicUsize::new(0));
        let job = TestJob {
            started,
            finished: finished.clone(),
            duration,
            fail,
        };
        (job, runs, finished)
    }

    /// The paused clock may fire timers up to a millisecond after their deadline.
    #[track_caller]
    fn assert_at(actual: Instant, expected: Instant) {
        assert!(
            actual >= expected && actual - expected <= Duration::from_millis(5),
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interval_runs_on_fixed_grid() {
        let (job, mut runs, _) = test_job(10 * MINUTE, false);
        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(Schedule::interval(60).unwrap(), job, shutdown.clone());

        let start = Instant::now();
        let handle = tokio::spawn(scheduler.run());

        let first = runs.recv().await.unwrap();
        assert_at(first, start + Duration::from_secs(1));

        // Ten minutes of work do not push the next run back.
        let second = runs.recv().await.unwrap();
        assert_at(second, start + Duration::from_secs(1) + 60 * MINUTE);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_job_never_overlaps() {
        let (job, mut runs, _) = test_job(90 * MINUTE, false);
        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(Schedule::interval(60).unwrap(), job, shutdown.clone());

        let start = Instant::now();
        let handle = tokio::spawn(scheduler.run());

        let first = runs.recv().await.unwrap();
        let second = runs.recv().await.unwrap();
        assert_at(first, start + Duration::from_secs(1));
        // The slot at +60 minutes fell inside the first run and was skipped.
        assert_at(second, start + Duration::from_secs(1) + 120 * MINUTE);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_lets_running_job_finish() {
        let (job, mut runs, finished) = test_job(10 * MINUTE, false);
        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(Schedule::interval(60).unwrap(), job, shutdown.clone());
        let mut state = scheduler.state();
        assert_eq!(*state.borrow(), SchedulerState::Idle);

        let handle = tokio::spawn(scheduler.run());
        runs.recv().await.unwrap();
        assert_eq!(*state.borrow(), SchedulerState::Running);

        shutdown.cancel();
        state
            .wait_for(|state| *state == SchedulerState::ShuttingDown)
            .await
            .unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        handle.await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(runs.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_waits_for_next_trigger() {
        let (job, mut runs, finished) = test_job(MINUTE, true);
        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(Schedule::interval(5).unwrap(), job, shutdown.clone());

        let start = Instant::now();
        let handle = tokio::spawn(scheduler.run());

        runs.recv().await.unwrap();
        let second = runs.recv().await.unwrap();
        assert_at(second, start + Duration::from_secs(1) + 5 * MINUTE);
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_first_run() {
        let (job, mut runs, finished) = test_job(MINUTE, false);
        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(Schedule::interval(60).unwrap(), job, shutdown.clone());
        let state = scheduler.state();

        shutdown.cancel();
        scheduler.run().await;

        assert_eq!(*state.borrow(), SchedulerState::ShuttingDown);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(runs.try_recv().is_err());
    }
}
