//! Merged view of the tracked bulk-collection run.
//!
//! Two inputs feed the store: push deltas ([`RunProgress`]) and pull
//! snapshots ([`RunStatus`]). `status`, timestamps and per-target results
//! only ever come from pulls; counters come from whichever input is newer
//! and never move backwards within a run. Pulls carry the sequence number
//! they were issued with so that a slow response cannot overwrite a newer
//! one.

use serde::Serialize;

use super::types::{
    CollectionTarget, Counters, RunHandle, RunProgress, RunStatus, RunStatusKind, TargetResult,
};

/// Local view of the run's lifecycle. `Cancelling` is the tentative state
/// between a successful cancel call and the pull that confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalStatus {
    /// Resumed from a saved handle; no pull has landed yet.
    Unknown,
    Running,
    Cancelling,
    Completed,
    Cancelled,
}

impl LocalStatus {
    pub fn is_running(self) -> bool {
        self == LocalStatus::Running
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LocalStatus::Completed | LocalStatus::Cancelled)
    }

    pub fn label(self) -> &'static str {
        match self {
            LocalStatus::Unknown => "unknown",
            LocalStatus::Running => "running",
            LocalStatus::Cancelling => "cancelling",
            LocalStatus::Completed => "completed",
            LocalStatus::Cancelled => "cancelled",
        }
    }
}

impl From<RunStatusKind> for LocalStatus {
    fn from(kind: RunStatusKind) -> Self {
        match kind {
            RunStatusKind::Running => LocalStatus::Running,
            RunStatusKind::Completed => LocalStatus::Completed,
            RunStatusKind::Cancelled => LocalStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Update {
    /// A start or retry call returned a new run.
    Adopt(RunHandle),
    /// Track a run known from an earlier session.
    Resume(RunHandle),
    Progress(RunProgress),
    Pull { seq: u64, status: RunStatus },
    /// The engine accepted a cancel. Pulls issued at or before `watermark`
    /// predate the cancel and may not revert it.
    BeginCancel { watermark: u64 },
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
    /// Older than what the store already holds.
    Stale,
    /// Belongs to a run this store does not track.
    Foreign,
}

#[derive(Debug, Clone)]
struct TrackedRun {
    handle: RunHandle,
    status: LocalStatus,
    counters: Counters,
    current_target: Option<CollectionTarget>,
    started_at: Option<String>,
    completed_at: Option<String>,
    results: Vec<TargetResult>,
    last_pull_seq: u64,
    cancel_watermark: Option<u64>,
}

impl TrackedRun {
    fn new(handle: RunHandle, status: LocalStatus) -> Self {
        Self {
            handle,
            status,
            counters: Counters::default(),
            current_target: None,
            started_at: None,
            completed_at: None,
            results: Vec::new(),
            last_pull_seq: 0,
            cancel_watermark: None,
        }
    }

    fn apply_progress(&mut self, progress: RunProgress) -> Applied {
        if self.status.is_terminal() {
            return Applied::Stale;
        }
        if progress.completed_count < self.counters.completed {
            return Applied::Stale;
        }
        let counters = progress.counters();
        if counters == self.counters
            && progress.current_target == self.current_target
            && progress.total_targets == self.handle.total_targets
        {
            return Applied::Unchanged;
        }
        self.counters = counters;
        self.current_target = progress.current_target;
        self.handle.total_targets = progress.total_targets;
        Applied::Changed
    }

    fn apply_pull(&mut self, seq: u64, status: RunStatus) -> Applied {
        if seq <= self.last_pull_seq {
            return Applied::Stale;
        }
        self.last_pull_seq = seq;

        self.status = match (self.status, status.status) {
            // Terminal is final; a later "running" answer is out of date.
            (current, RunStatusKind::Running) if current.is_terminal() => current,
            (LocalStatus::Cancelling, RunStatusKind::Running)
                if self.cancel_watermark.is_some_and(|w| seq <= w) =>
            {
                LocalStatus::Cancelling
            }
            (_, kind) => {
                self.cancel_watermark = None;
                kind.into()
            }
        };

        let counters = status.counters();
        if counters.completed >= self.counters.completed {
            if counters.completed > self.counters.completed || self.status.is_terminal() {
                self.current_target = None;
            }
            self.counters = counters;
            self.handle.total_targets = status.total_targets;
        }

        self.started_at = Some(status.started_at);
        self.completed_at = status.completed_at;
        self.results = status
            .results
            .into_iter()
            .map(TargetResult::normalized)
            .collect();
        Applied::Changed
    }
}

/// The single mutable resource of the coordinator. Only the lifecycle
/// controller writes to it.
#[derive(Debug, Clone, Default)]
pub struct RunStore {
    tracked: Option<TrackedRun>,
    /// Latest progress for a run that is not (yet) tracked.
    pending: Option<RunProgress>,
    /// Run id for which a completion pull has already been issued.
    completion_pulled: Option<String>,
    last_error: Option<String>,
}

impl RunStore {
    pub fn tracked(&self) -> Option<&RunHandle> {
        self.tracked.as_ref().map(|run| &run.handle)
    }

    pub fn status(&self) -> Option<LocalStatus> {
        self.tracked.as_ref().map(|run| run.status)
    }

    pub fn is_running(&self) -> bool {
        self.status().is_some_and(LocalStatus::is_running)
    }

    pub fn failed_count(&self) -> u64 {
        self.tracked
            .as_ref()
            .map(|run| run.counters.failed)
            .unwrap_or_default()
    }

    pub fn apply(&mut self, update: Update) -> Applied {
        match update {
            Update::Adopt(handle) => self.adopt(handle, LocalStatus::Running),
            Update::Resume(handle) => self.adopt(handle, LocalStatus::Unknown),
            Update::Progress(progress) => self.apply_progress(progress),
            Update::Pull { seq, status } => self.apply_pull(seq, status),
            Update::BeginCancel { watermark } => match self.tracked.as_mut() {
                Some(run) if run.status.is_running() => {
                    run.status = LocalStatus::Cancelling;
                    run.cancel_watermark = Some(watermark);
                    Applied::Changed
                }
                _ => Applied::Unchanged,
            },
            Update::Failed(message) => {
                self.last_error = Some(message);
                Applied::Changed
            }
        }
    }

    fn adopt(&mut self, handle: RunHandle, status: LocalStatus) -> Applied {
        self.last_error = None;
        if let Some(run) = self.tracked.as_mut() {
            if run.handle.run_id == handle.run_id {
                if status == LocalStatus::Running && run.status == LocalStatus::Unknown {
                    run.status = LocalStatus::Running;
                }
                return Applied::Changed;
            }
        }

        let mut run = TrackedRun::new(handle, status);
        if let Some(early) = self.pending.take() {
            if early.run_id == run.handle.run_id {
                // The engine can emit before the start response arrives.
                run.counters = early.counters();
                run.current_target = early.current_target;
            }
        }
        if self.completion_pulled.as_deref() != Some(run.handle.run_id.as_str()) {
            self.completion_pulled = None;
        }
        self.tracked = Some(run);
        Applied::Changed
    }

    fn apply_progress(&mut self, progress: RunProgress) -> Applied {
        match self.tracked.as_mut() {
            Some(run) if run.handle.run_id == progress.run_id => run.apply_progress(progress),
            tracked => {
                if let Some(pending) = &self.pending {
                    if pending.run_id == progress.run_id
                        && progress.completed_count < pending.completed_count
                    {
                        return Applied::Stale;
                    }
                }
                self.pending = Some(progress);
                if tracked.is_some() {
                    Applied::Foreign
                } else {
                    Applied::Changed
                }
            }
        }
    }

    fn apply_pull(&mut self, seq: u64, status: RunStatus) -> Applied {
        match self.tracked.as_mut() {
            Some(run) if run.handle.run_id == status.run_id => run.apply_pull(seq, status),
            Some(_) => Applied::Foreign,
            None => {
                // A run observed only through its events; start tracking it.
                let handle = RunHandle {
                    run_id: status.run_id.clone(),
                    total_targets: status.total_targets,
                };
                let mut run = TrackedRun::new(handle, LocalStatus::Unknown);
                if let Some(early) = self.pending.take() {
                    if early.run_id == run.handle.run_id {
                        run.counters = early.counters();
                        run.current_target = early.current_target;
                    }
                }
                run.apply_pull(seq, status);
                self.tracked = Some(run);
                Applied::Changed
            }
        }
    }

    /// Decide whether `progress` warrants the one-off completion pull.
    /// Returns `true` at most once per run id.
    pub fn claim_completion_pull(&mut self, progress: &RunProgress) -> bool {
        if !progress.looks_complete() {
            return false;
        }
        if let Some(run) = &self.tracked {
            if run.handle.run_id != progress.run_id {
                return false;
            }
        }
        if self.completion_pulled.as_deref() == Some(progress.run_id.as_str()) {
            return false;
        }
        self.completion_pulled = Some(progress.run_id.clone());
        true
    }

    pub fn view(&self) -> RunView {
        match &self.tracked {
            Some(run) => RunView {
                run_id: Some(run.handle.run_id.clone()),
                status: Some(run.status),
                total_targets: run.handle.total_targets,
                completed_count: run.counters.completed,
                success_count: run.counters.success,
                failed_count: run.counters.failed,
                current_target: run.current_target.clone(),
                started_at: run.started_at.clone(),
                completed_at: run.completed_at.clone(),
                results: run.results.clone(),
                last_error: self.last_error.clone(),
            },
            None => {
                let mut view = RunView {
                    last_error: self.last_error.clone(),
                    ..RunView::default()
                };
                if let Some(progress) = &self.pending {
                    view.total_targets = progress.total_targets;
                    view.completed_count = progress.completed_count;
                    view.success_count = progress.success_count;
                    view.failed_count = progress.failed_count;
                    view.current_target = progress.current_target.clone();
                }
                view
            }
        }
    }
}

/// Consistent snapshot handed to presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    pub run_id: Option<String>,
    pub status: Option<LocalStatus>,
    pub total_targets: u64,
    pub completed_count: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub current_target: Option<CollectionTarget>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub results: Vec<TargetResult>,
    pub last_error: Option<String>,
}

impl RunView {
    pub fn is_running(&self) -> bool {
        self.status.is_some_and(LocalStatus::is_running)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(LocalStatus::is_terminal)
    }

    pub fn can_retry(&self) -> bool {
        self.run_id.is_some() && !self.is_running() && self.failed_count > 0
    }

    pub fn percent(&self) -> u64 {
        if self.total_targets == 0 {
            return 0;
        }
        let scaled = self
            .completed_count
            .saturating_mul(100)
            .saturating_add(self.total_targets / 2);
        (scaled / self.total_targets).min(100)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} / {} completed (success: {}, failed: {})",
            self.completed_count, self.total_targets, self.success_count, self.failed_count
        )
    }
}
