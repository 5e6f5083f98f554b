use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::gateway::Transport;
use crate::http::EventSource;

use super::controller::RunController;
use super::types::RunProgress;

pub const PROGRESS_EVENT: &str = "bulk-collection-progress";

/// Live subscription to the progress channel. Dropping it releases the
/// channel; events still queued are discarded.
pub struct Subscription {
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Listen for progress events and feed them to `controller`. Safe to call
    /// before any run is tracked.
    pub async fn activate<T, S>(controller: Arc<RunController<T>>, source: &S) -> Result<Self>
    where
        T: Transport,
        S: EventSource,
    {
        let mut events = source
            .listen(PROGRESS_EVENT)
            .await
            .with_context(|| format!("failed to subscribe to {PROGRESS_EVENT}"))?;
        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);

        let task = tokio::spawn(async move {
            while let Some(payload) = events.recv().await {
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                match serde_json::from_value::<RunProgress>(payload) {
                    Ok(progress) => {
                        tracing::debug!(
                            run_id = %progress.run_id,
                            completed = progress.completed_count,
                            total = progress.total_targets,
                            "progress event"
                        );
                        controller.handle_progress(progress).await;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping undecodable progress event");
                    }
                }
            }
        });
        tracing::debug!("progress subscription active");

        Ok(Self { active, task })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}
