//! Tracking of background revalidations.

use crate::{HttpClientError, Result};
use parking_lot::Mutex;
use std::future::Future;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// Outcome of [`RevalidationTracker::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Revalidations that got a response.
    pub completed: usize,
    /// Of those, how many updated the cache.
    pub stored: usize,
    /// Revalidations that failed or panicked.
    pub failed: usize,
}

impl DrainReport {
    fn record(&mut self, finished: std::result::Result<Result<bool>, JoinError>) {
        match finished {
            Ok(Ok(stored)) => {
                self.completed += 1;
                if stored {
                    self.stored += 1;
                }
            }
            Ok(Err(error)) => {
                self.failed += 1;
                log_failure(&error);
            }
            Err(error) => {
                self.failed += 1;
                warn!(error = %error, "Background revalidation task panicked");
            }
        }
    }

    fn merge(&mut self, other: DrainReport) {
        self.completed += other.completed;
        self.stored += other.stored;
        self.failed += other.failed;
    }
}

fn log_failure(error: &HttpClientError) {
    warn!(error = %error, transport = error.is_transport(), "Background revalidation failed");
}

#[derive(Default)]
struct Tasks {
    running: JoinSet<Result<bool>>,
    reaped: DrainReport,
}

/// Owns the revalidations spawned after serving stale responses.
///
/// A failed revalidation is logged and otherwise ignored; the stale entry
/// stays as it was. Finished tasks are reaped whenever a new one is
/// spawned. Tasks still running when the tracker is dropped are detached,
/// not aborted.
#[derive(Default)]
pub struct RevalidationTracker {
    tasks: Mutex<Tasks>,
}

impl RevalidationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `revalidation` on the current runtime.
    pub fn spawn<F>(&self, revalidation: F)
    where
        F: Future<Output = Result<bool>> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        while let Some(finished) = tasks.running.try_join_next() {
            tasks.reaped.record(finished);
        }
        tasks.running.spawn(revalidation);
    }

    /// Revalidations not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks.lock().running.len()
    }

    /// Wait for every outstanding revalidation, including ones spawned
    /// while draining. The report also covers tasks reaped since the
    /// previous drain.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            let (mut batch, reaped) = {
                let mut tasks = self.tasks.lock();
                (
                    std::mem::take(&mut tasks.running),
                    std::mem::take(&mut tasks.reaped),
                )
            };
            report.merge(reaped);
            if batch.is_empty() {
                break;
            }
            while let Some(finished) = batch.join_next().await {
                report.record(finished);
            }
        }
        debug!(
            completed = report.completed,
            stored = report.stored,
            failed = report.failed,
            "Drained background revalidations"
        );
        report
    }
}

impl Drop for RevalidationTracker {
    fn drop(&mut self) {
        self.tasks.get_mut().running.detach_all();
    }
}

impl std::fmt::Debug for RevalidationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevalidationTracker")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_counts_outcomes() {
        let tracker = RevalidationTracker::new();
        tracker.spawn(async { Ok(true) });
        tracker.spawn(async { Ok(false) });
        tracker.spawn(async { Err(HttpClientError::Connection("refused".into())) });

        let report = tracker.drain().await;
        assert_eq!(
            report,
            DrainReport {
                completed: 2,
                stored: 1,
                failed: 1
            }
        );
        assert_eq!(tracker.pending(), 0);
        assert_eq!(tracker.drain().await, DrainReport::default());
    }

    #[tokio::test]
    async fn test_panics_are_contained() {
        let tracker = RevalidationTracker::new();
        tracker.spawn(async {
            let stored: Option<bool> = None;
            Ok(stored.expect("revalidation panicked"))
        });
        assert_eq!(tracker.drain().await.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_tasks_are_reaped_on_spawn() {
        let tracker = RevalidationTracker::new();
        tracker.spawn(async { Ok(true) });
        tokio::time::sleep(Duration::from_millis(10)).await;

        tracker.spawn(async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(false)
        });
        assert_eq!(tracker.pending(), 1);

        let report = tracker.drain().await;
        assert_eq!(report.completed, 2);
        assert_eq!(report.stored, 1);
    }

    #[tokio::test]
    async fn test_drop_detaches_running_tasks() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        {
            let tracker = RevalidationTracker::new();
            tracker.spawn(async move {
                tokio::task::yield_now().await;
                let _ = tx.send(());
                Ok(true)
            });
        }
        assert!(rx.await.is_ok());
    }
}
