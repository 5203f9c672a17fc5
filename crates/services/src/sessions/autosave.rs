use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::warn;

use super::active::ActiveExam;
use super::workflow::ExamSessionService;

/// Default period between background checkpoints.
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Background task that checkpoints a shared session on a fixed period.
///
/// Catches any state change that skipped the per-action checkpoint. The task
/// stops when this handle is stopped or dropped.
pub struct Autosave {
    handle: JoinHandle<()>,
}

impl Autosave {
    /// Spawn on the current tokio runtime.
    #[must_use]
    pub fn spawn(
        service: ExamSessionService,
        exam: Arc<Mutex<ActiveExam>>,
        every: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            loop {
                ticker.tick().await;
                let guard = exam.lock().await;
                if let Err(e) = service.checkpoint(&guard).await {
                    warn!(error = %e, "autosave checkpoint failed");
                }
            }
        });
        Self { handle }
    }

    /// Stop checkpointing.
    pub fn stop(self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
