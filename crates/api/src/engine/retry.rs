//! Randomized retry loops around [`JobDispatcher::dispatch`].
//!
//! Each loop attempts a dispatch; on failure it sleeps a fresh random delay
//! drawn from `[0, window)` and tries again. Loops have no attempt bound and
//! no deadline: they end on success or when the shutdown token is
//! cancelled. A dispatch already in flight is allowed to finish so that its
//! compensation logic runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use labcoord_core::options::OptionMap;
use labcoord_core::retry::random_delay;
use labcoord_core::types::DbId;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::engine::dispatcher::{JobDispatcher, JobHandle};
use crate::error::{AppError, AppResult};

/// Spawns and tracks retrying dispatches.
#[derive(Clone)]
pub struct RetryOrchestrator {
    dispatcher: Arc<JobDispatcher>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl RetryOrchestrator {
    pub fn new(dispatcher: Arc<JobDispatcher>, cancel: CancellationToken) -> Self {
        Self {
            dispatcher,
            cancel,
            tracker: TaskTracker::new(),
        }
    }

    /// Start a retry loop for one job; returns immediately.
    ///
    /// `on_success` runs once with the handle of the successful dispatch.
    /// Its failure is logged and not retried.
    pub fn dispatch_with_retry<F, Fut>(
        &self,
        project_id: DbId,
        options: OptionMap,
        window_secs: u64,
        on_success: F,
    ) where
        F: FnOnce(JobHandle) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        let dispatcher = Arc::clone(&self.dispatcher);
        let cancel = self.cancel.clone();

        self.tracker.spawn(async move {
            let mut attempt: u64 = 0;
            loop {
                if cancel.is_cancelled() {
                    tracing::debug!(project_id, attempt, "Retry loop cancelled");
                    return;
                }
                attempt += 1;

                match dispatcher.dispatch(project_id, options.clone(), Vec::new()).await {
                    Ok(handle) => {
                        let experiment_id = handle.experiment_id;
                        if let Err(e) = on_success(handle).await {
                            tracing::error!(
                                project_id,
                                experiment_id,
                                error = %e,
                                "Dispatch succeeded but recording it failed"
                            );
                        }
                        return;
                    }
                    Err(e) => {
                        let delay = random_delay(window_secs);
                        let delay_ms = delay.as_millis() as u64;
                        if matches!(&e, AppError::Core(core) if core.is_transient()) {
                            tracing::debug!(project_id, attempt, delay_ms, error = %e, "Dispatch failed, retrying");
                        } else {
                            tracing::warn!(project_id, attempt, delay_ms, error = %e, "Dispatch failed, retrying");
                        }
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                tracing::debug!(project_id, attempt, "Retry loop cancelled");
                                return;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        });
    }

    /// Number of retry loops still running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel every loop and wait up to `timeout` for them to exit.
    ///
    /// Returns `false` if loops were still running at the deadline.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.cancel.cancel();
        self.tracker.close();
        tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok()
    }
}
