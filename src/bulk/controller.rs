use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;

use crate::contracts::commands;
use crate::gateway::{CommandFailure, CommandGateway, Transport};

use super::store::{Applied, RunStore, RunView, Update};
use super::types::{RunHandle, RunProgress, RunStatus};

/// A guard that failed before any engine call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("no bulk collection run is being tracked")]
    NoTrackedRun,
    #[error("the tracked run is not running")]
    NotRunning,
    #[error("a bulk collection run is already running")]
    AlreadyRunning,
    #[error("the tracked run has no failed targets to retry")]
    NoFailedTargets,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BulkError {
    #[error(transparent)]
    Precondition(#[from] Precondition),
    #[error("{0}")]
    Command(String),
}

impl From<CommandFailure> for BulkError {
    fn from(err: CommandFailure) -> Self {
        BulkError::Command(err.0)
    }
}

pub type BulkResult<T> = Result<T, BulkError>;

/// Owns the tracked run and is the only writer of its [`RunStore`].
pub struct RunController<T> {
    gateway: CommandGateway<T>,
    state: watch::Sender<RunStore>,
    pull_seq: AtomicU64,
}

impl<T: Transport> RunController<T> {
    pub fn new(gateway: CommandGateway<T>) -> Self {
        let (state, _) = watch::channel(RunStore::default());
        Self {
            gateway,
            state,
            pull_seq: AtomicU64::new(0),
        }
    }

    pub fn view(&self) -> RunView {
        self.state.borrow().view()
    }

    pub fn watch(&self) -> watch::Receiver<RunStore> {
        self.state.subscribe()
    }

    /// Start a bulk run over every registered target.
    pub async fn start(&self) -> BulkResult<RunHandle> {
        if self.state.borrow().is_running() {
            return Err(Precondition::AlreadyRunning.into());
        }

        let handle: RunHandle = match self
            .gateway
            .invoke(commands::COLLECT_COMMITS_BULK, json!({}))
            .await
        {
            Ok(handle) => handle,
            Err(err) => return Err(self.record_failure(err)),
        };
        tracing::info!(run_id = %handle.run_id, total = handle.total_targets, "bulk run started");

        self.adopt(handle).await
    }

    /// Ask the engine to stop the tracked run. The local status becomes
    /// `cancelling` until a pull confirms or contradicts it.
    pub async fn cancel(&self) -> BulkResult<()> {
        let run_id = {
            let store = self.state.borrow();
            let handle = store.tracked().ok_or(Precondition::NoTrackedRun)?;
            if !store.is_running() {
                return Err(Precondition::NotRunning.into());
            }
            handle.run_id.clone()
        };

        if let Err(err) = self
            .gateway
            .invoke::<()>(commands::CANCEL_BULK_COLLECTION, json!({}))
            .await
        {
            return Err(self.record_failure(err));
        }
        tracing::info!(run_id = %run_id, "cancel requested");

        // Pulls issued before the engine acknowledged the cancel cannot
        // contradict it.
        let watermark = self.pull_seq.load(Ordering::SeqCst);

        self.state
            .send_if_modified(|store| store.apply(Update::BeginCancel { watermark }) == Applied::Changed);

        if let Err(err) = self.reconcile(&run_id).await {
            tracing::warn!(run_id = %run_id, error = %err, "pull after cancel failed");
        }
        Ok(())
    }

    /// Re-run only the failed targets of the tracked run as a new run.
    pub async fn retry_failed(&self) -> BulkResult<RunHandle> {
        let run_id = {
            let store = self.state.borrow();
            let handle = store.tracked().ok_or(Precondition::NoTrackedRun)?;
            if store.is_running() {
                return Err(Precondition::AlreadyRunning.into());
            }
            if store.failed_count() == 0 {
                return Err(Precondition::NoFailedTargets.into());
            }
            handle.run_id.clone()
        };

        let handle: RunHandle = match self
            .gateway
            .invoke(
                commands::RETRY_FAILED_TARGETS,
                json!({ "request": { "runId": run_id } }),
            )
            .await
        {
            Ok(handle) => handle,
            Err(err) => return Err(self.record_failure(err)),
        };
        tracing::info!(
            previous = %run_id,
            run_id = %handle.run_id,
            total = handle.total_targets,
            "retry run started"
        );

        self.adopt(handle).await
    }

    /// Pull the authoritative status of the tracked run. Does nothing when
    /// no run is tracked.
    pub async fn refresh(&self) -> BulkResult<()> {
        let Some(run_id) = self.state.borrow().tracked().map(|h| h.run_id.clone()) else {
            return Ok(());
        };
        self.reconcile(&run_id).await
    }

    /// Track a run started by an earlier session.
    pub fn resume(&self, handle: RunHandle) {
        tracing::debug!(run_id = %handle.run_id, "resuming run");
        self.state
            .send_if_modified(|store| store.apply(Update::Resume(handle)) == Applied::Changed);
    }

    /// Merge one pushed progress event, issuing the completion pull when the
    /// event is the first to report the run as complete.
    pub async fn handle_progress(&self, progress: RunProgress) {
        let mut claimed = false;
        self.state.send_if_modified(|store| {
            let applied = store.apply(Update::Progress(progress.clone()));
            if applied == Applied::Stale {
                tracing::debug!(run_id = %progress.run_id, completed = progress.completed_count, "stale progress ignored");
            }
            claimed = store.claim_completion_pull(&progress);
            applied == Applied::Changed
        });

        if claimed {
            tracing::debug!(run_id = %progress.run_id, "run looks complete; pulling status");
            if let Err(err) = self.reconcile(&progress.run_id).await {
                tracing::warn!(run_id = %progress.run_id, error = %err, "completion pull failed");
            }
        }
    }

    async fn adopt(&self, handle: RunHandle) -> BulkResult<RunHandle> {
        self.state
            .send_if_modified(|store| store.apply(Update::Adopt(handle.clone())) == Applied::Changed);
        if let Err(err) = self.reconcile(&handle.run_id).await {
            tracing::warn!(run_id = %handle.run_id, error = %err, "initial pull failed");
        }
        Ok(handle)
    }

    async fn reconcile(&self, run_id: &str) -> BulkResult<()> {
        let seq = self.pull_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let status: RunStatus = match self
            .gateway
            .invoke(
                commands::GET_BULK_COLLECTION_STATUS,
                json!({ "runId": run_id }),
            )
            .await
        {
            Ok(status) => status,
            Err(err) => return Err(self.record_failure(err)),
        };

        self.state.send_if_modified(|store| {
            match store.apply(Update::Pull { seq, status }) {
                Applied::Changed => true,
                Applied::Stale => {
                    tracing::debug!(run_id, seq, "stale pull discarded");
                    false
                }
                Applied::Foreign => {
                    tracing::debug!(run_id, seq, "pull for untracked run discarded");
                    false
                }
                Applied::Unchanged => false,
            }
        });
        Ok(())
    }

    fn record_failure(&self, err: CommandFailure) -> BulkError {
        tracing::warn!(error = %err, "engine command failed");
        self.state
            .send_modify(|store| {
                store.apply(Update::Failed(err.message().to_string()));
            });
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::store::LocalStatus;
    use crate::testing::FakeEngine;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn status_json(run_id: &str, status: &str, total: u64, completed: u64, failed: u64) -> Value {
        json!({
            "runId": run_id,
            "status": status,
            "totalTargets": total,
            "completedCount": completed,
            "successCount": completed - failed,
            "failedCount": failed,
            "startedAt": "2026-02-07T00:00:00Z",
            "completedAt": if status == "running" { Value::Null } else { json!("2026-02-07T00:10:00Z") },
            "results": []
        })
    }

    fn progress(run_id: &str, total: u64, completed: u64, success: u64, failed: u64) -> RunProgress {
        RunProgress {
            run_id: run_id.into(),
            total_targets: total,
            completed_count: completed,
            success_count: success,
            failed_count: failed,
            current_target: None,
        }
    }

    fn controller(engine: &FakeEngine) -> RunController<FakeEngine> {
        RunController::new(CommandGateway::new(engine.clone()))
    }

    async fn started(engine: &FakeEngine, run_id: &str, total: u64) -> RunController<FakeEngine> {
        engine.respond_once(
            commands::COLLECT_COMMITS_BULK,
            json!({"runId": run_id, "totalTargets": total}),
        );
        engine.respond_once(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json(run_id, "running", total, 0, 0),
        );
        let controller = controller(engine);
        controller.start().await.unwrap();
        controller
    }

    #[tokio::test]
    async fn start_adopts_run_and_pulls_once() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 3).await;

        assert_eq!(
            engine.call_names(),
            vec![
                commands::COLLECT_COMMITS_BULK.to_string(),
                commands::GET_BULK_COLLECTION_STATUS.to_string(),
            ]
        );
        assert_eq!(
            engine.calls_to(commands::GET_BULK_COLLECTION_STATUS),
            vec![json!({"runId": "run-1"})]
        );
        let view = controller.view();
        assert!(view.is_running());
        assert_eq!(view.summary_line(), "0 / 3 completed (success: 0, failed: 0)");
    }

    #[tokio::test]
    async fn progress_event_updates_summary() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 3).await;

        let mut event = progress("run-1", 3, 1, 1, 0);
        event.current_target = Some(crate::bulk::types::CollectionTarget {
            project_id: 1,
            branch_name: "main".into(),
        });
        controller.handle_progress(event).await;

        let view = controller.view();
        assert_eq!(view.summary_line(), "1 / 3 completed (success: 1, failed: 0)");
        assert_eq!(view.current_target.map(|t| t.branch_name), Some("main".into()));
    }

    #[tokio::test]
    async fn completion_pull_happens_once() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 3).await;
        engine.respond(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "completed", 3, 3, 0),
        );

        controller.handle_progress(progress("run-1", 3, 3, 3, 0)).await;
        controller.handle_progress(progress("run-1", 3, 3, 3, 0)).await;

        assert_eq!(engine.calls_to(commands::GET_BULK_COLLECTION_STATUS).len(), 2);
        assert!(!controller.view().is_running());
    }

    #[tokio::test]
    async fn completed_pull_stops_running() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 3).await;
        engine.respond(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "completed", 3, 3, 0),
        );

        controller.refresh().await.unwrap();
        let view = controller.view();
        assert!(!view.is_running());
        assert_eq!(view.status, Some(LocalStatus::Completed));
        assert_eq!(view.completed_count, 3);
    }

    #[tokio::test]
    async fn retry_tracks_new_run_with_zeroed_counters() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 3).await;
        engine.respond_once(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "completed", 3, 3, 1),
        );
        controller.refresh().await.unwrap();

        engine.respond(
            commands::RETRY_FAILED_TARGETS,
            json!({"runId": "run-2", "totalTargets": 1}),
        );
        engine.fail(commands::GET_BULK_COLLECTION_STATUS, "status unavailable");

        let handle = controller.retry_failed().await.unwrap();
        assert_eq!(handle.run_id, "run-2");
        assert_eq!(
            engine.calls_to(commands::RETRY_FAILED_TARGETS),
            vec![json!({"request": {"runId": "run-1"}})]
        );

        let view = controller.view();
        assert_eq!(view.run_id.as_deref(), Some("run-2"));
        assert_eq!(view.total_targets, 1);
        assert_eq!(view.completed_count, 0);
        assert_eq!(view.failed_count, 0);
        assert!(view.is_running());
    }

    #[tokio::test]
    async fn retry_without_failures_issues_no_call() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 2).await;
        engine.respond(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "completed", 2, 2, 0),
        );
        controller.refresh().await.unwrap();
        let before = engine.calls().len();

        let err = controller.retry_failed().await.unwrap_err();
        assert_eq!(err, BulkError::Precondition(Precondition::NoFailedTargets));
        assert_eq!(engine.calls().len(), before);
    }

    #[tokio::test]
    async fn retry_while_running_is_rejected() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 2).await;
        controller.handle_progress(progress("run-1", 2, 1, 0, 1)).await;

        let err = controller.retry_failed().await.unwrap_err();
        assert_eq!(err, BulkError::Precondition(Precondition::AlreadyRunning));
        assert!(engine.calls_to(commands::RETRY_FAILED_TARGETS).is_empty());
    }

    #[tokio::test]
    async fn guards_without_tracked_run_issue_no_calls() {
        let engine = FakeEngine::default();
        let controller = controller(&engine);

        assert_eq!(
            controller.cancel().await.unwrap_err(),
            BulkError::Precondition(Precondition::NoTrackedRun)
        );
        assert_eq!(
            controller.retry_failed().await.unwrap_err(),
            BulkError::Precondition(Precondition::NoTrackedRun)
        );
        controller.refresh().await.unwrap();
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn cancel_when_not_running_issues_no_call() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 2).await;
        engine.respond(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "completed", 2, 2, 0),
        );
        controller.refresh().await.unwrap();

        let err = controller.cancel().await.unwrap_err();
        assert_eq!(err, BulkError::Precondition(Precondition::NotRunning));
        assert!(engine.calls_to(commands::CANCEL_BULK_COLLECTION).is_empty());
    }

    #[tokio::test]
    async fn start_while_running_is_rejected() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 2).await;
        let err = controller.start().await.unwrap_err();
        assert_eq!(err, BulkError::Precondition(Precondition::AlreadyRunning));
        assert_eq!(engine.calls_to(commands::COLLECT_COMMITS_BULK).len(), 1);
    }

    #[tokio::test]
    async fn failed_start_keeps_prior_state() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 2).await;
        engine.respond(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "completed", 2, 2, 1),
        );
        controller.refresh().await.unwrap();
        let before = controller.view();

        engine.fail(commands::COLLECT_COMMITS_BULK, "no targets registered");
        let err = controller.start().await.unwrap_err();
        assert_eq!(err, BulkError::Command("no targets registered".into()));

        let after = controller.view();
        assert_eq!(after.run_id, before.run_id);
        assert_eq!(after.status, before.status);
        assert_eq!(after.completed_count, before.completed_count);
        assert_eq!(after.last_error.as_deref(), Some("no targets registered"));
    }

    #[tokio::test]
    async fn cancel_confirmed_by_pull() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 4).await;
        engine.respond(commands::CANCEL_BULK_COLLECTION, Value::Null);
        engine.respond(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "cancelled", 4, 1, 0),
        );
        let rx = controller.watch();

        controller.cancel().await.unwrap();

        assert_eq!(controller.view().status, Some(LocalStatus::Cancelled));
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn cancel_reverted_when_engine_still_running() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 4).await;
        engine.respond(commands::CANCEL_BULK_COLLECTION, Value::Null);
        engine.respond(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "running", 4, 2, 0),
        );

        controller.cancel().await.unwrap();
        assert!(controller.view().is_running());
    }

    #[tokio::test]
    async fn cancel_is_tentative_while_pull_fails() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 4).await;
        engine.respond(commands::CANCEL_BULK_COLLECTION, Value::Null);
        engine.fail(commands::GET_BULK_COLLECTION_STATUS, "timeout");

        controller.cancel().await.unwrap();
        let view = controller.view();
        assert_eq!(view.status, Some(LocalStatus::Cancelling));
        assert!(!view.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn pull_in_flight_during_cancel_does_not_revert_it() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 4).await;
        engine.respond(commands::CANCEL_BULK_COLLECTION, Value::Null);
        engine.delay(commands::CANCEL_BULK_COLLECTION, Duration::from_millis(10));
        engine.respond_once(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "running", 4, 1, 0),
        );
        engine.fail(commands::GET_BULK_COLLECTION_STATUS, "timeout");
        engine.delay(commands::GET_BULK_COLLECTION_STATUS, Duration::from_millis(20));

        let (cancelled, refreshed) = tokio::join!(controller.cancel(), controller.refresh());

        assert_eq!(cancelled, Ok(()));
        assert_eq!(refreshed, Ok(()));
        assert_eq!(controller.view().status, Some(LocalStatus::Cancelling));
        assert_eq!(engine.calls_to(commands::GET_BULK_COLLECTION_STATUS).len(), 3);
    }

    #[tokio::test]
    async fn failed_cancel_keeps_running() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 4).await;
        engine.fail(commands::CANCEL_BULK_COLLECTION, "not running");

        let err = controller.cancel().await.unwrap_err();
        assert_eq!(err, BulkError::Command("not running".into()));
        assert!(controller.view().is_running());
    }

    #[tokio::test]
    async fn refresh_is_idempotent() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 3).await;
        engine.respond(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-1", "running", 3, 2, 1),
        );

        controller.refresh().await.unwrap();
        let first = controller.view();
        controller.refresh().await.unwrap();
        assert_eq!(controller.view(), first);
    }

    #[tokio::test]
    async fn resumed_run_can_be_refreshed() {
        let engine = FakeEngine::default();
        engine.respond(
            commands::GET_BULK_COLLECTION_STATUS,
            status_json("run-7", "running", 5, 2, 0),
        );
        let controller = controller(&engine);
        controller.resume(RunHandle {
            run_id: "run-7".into(),
            total_targets: 5,
        });
        assert!(engine.calls().is_empty());

        controller.refresh().await.unwrap();
        let view = controller.view();
        assert!(view.is_running());
        assert_eq!(view.completed_count, 2);
    }

    #[tokio::test]
    async fn refresh_failure_is_reported() {
        let engine = FakeEngine::default();
        let controller = started(&engine, "run-1", 3).await;
        engine.fail(commands::GET_BULK_COLLECTION_STATUS, "engine unreachable");

        let err = controller.refresh().await.unwrap_err();
        assert_eq!(err.to_string(), "engine unreachable");
        assert!(controller.view().is_running());
    }
}
