//! A cancellable periodic task.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Why a [`PeriodicTask`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A step reported that there is nothing left to do.
    Completed,
    /// `cancel`/`stop` was called or the handle was dropped.
    Cancelled,
}

/// Runs an async step on a fixed interval until it reports completion or
/// the task is cancelled.
///
/// The first tick fires immediately. A failing step is logged and retried on
/// the next tick. `on_stop` runs exactly once, whichever way the task ends.
/// Dropping the handle cancels the task.
pub struct PeriodicTask {
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn start<F, Fut, E, S>(interval: Duration, mut step: F, on_stop: S) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: fmt::Display + 'static,
        S: FnOnce(StopReason) + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let reason = loop {
                tokio::select! {
                    _ = &mut cancel_rx => break StopReason::Cancelled,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = &mut cancel_rx => break StopReason::Cancelled,
                    outcome = step() => match outcome {
                        Ok(true) => break StopReason::Completed,
                        Ok(false) => {}
                        Err(e) => warn!(error = %e, "periodic step failed; retrying next tick"),
                    },
                }
            };

            debug!(?reason, "periodic task stopped");
            on_stop(reason);
        });

        Self {
            cancel: Some(cancel_tx),
            handle: Some(handle),
        }
    }

    /// Signal cancellation without waiting for the task to wind down.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Cancel and wait until `on_stop` has run.
    pub async fn stop(mut self) {
        self.cancel();
        self.join_inner().await;
    }

    /// Wait for the task to finish on its own.
    pub async fn wait(mut self) {
        self.join_inner().await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    async fn join_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "periodic task ended abnormally");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct StepLog {
        steps: AtomicUsize,
        stops: Mutex<Vec<StopReason>>,
    }

    impl StepLog {
        fn steps(&self) -> usize {
            self.steps.load(Ordering::SeqCst)
        }

        fn stops(&self) -> Vec<StopReason> {
            self.stops.lock().unwrap().clone()
        }
    }

    /// Start a task whose step succeeds with `done` once `finish_after`
    /// steps have run and fails on the steps listed in `fail_on`.
    fn start(
        log: &Arc<StepLog>,
        finish_after: Option<usize>,
        fail_on: &'static [usize],
    ) -> PeriodicTask {
        let step_log = log.clone();
        let stop_log = log.clone();
        PeriodicTask::start(
            Duration::from_secs(10),
            move || {
                let log = step_log.clone();
                async move {
                    let n = log.steps.fetch_add(1, Ordering::SeqCst) + 1;
                    if fail_on.contains(&n) {
                        return Err(format!("step {n} failed"));
                    }
                    Ok(finish_after.is_some_and(|limit| n >= limit))
                }
            },
            move |reason| stop_log.stops.lock().unwrap().push(reason),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate() {
        let log = Arc::new(StepLog::default());
        let _task = start(&log, None, &[]);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(log.steps(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(log.steps(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn completes_and_stops_exactly_once() {
        let log = Arc::new(StepLog::default());
        let task = start(&log, Some(3), &[]);

        task.wait().await;
        assert_eq!(log.steps(), 3);
        assert_eq!(log.stops(), vec![StopReason::Completed]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(log.steps(), 3);
        assert_eq!(log.stops().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_steps_are_retried_next_tick() {
        let log = Arc::new(StepLog::default());
        let task = start(&log, Some(3), &[1, 2]);

        task.wait().await;
        assert_eq!(log.steps(), 3);
        assert_eq!(log.stops(), vec![StopReason::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_and_runs_on_stop_once() {
        let log = Arc::new(StepLog::default());
        let task = start(&log, None, &[]);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(log.steps(), 3);

        task.stop().await;
        assert_eq!(log.stops(), vec![StopReason::Cancelled]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(log.steps(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let log = Arc::new(StepLog::default());
        let task = start(&log, None, &[]);
        tokio::time::sleep(Duration::from_millis(1)).await;

        drop(task);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(log.stops(), vec![StopReason::Cancelled]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(log.steps(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_completion_is_harmless() {
        let log = Arc::new(StepLog::default());
        let mut task = start(&log, Some(1), &[]);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(task.is_finished());
        task.cancel();
        task.stop().await;
        assert_eq!(log.stops(), vec![StopReason::Completed]);
    }
}
