use std::fmt;

use serde::{Deserialize, Serialize};

/// One (project, branch) pair subject to commit collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionTarget {
    pub project_id: i64,
    pub branch_name: String,
}

impl fmt::Display for CollectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.project_id, self.branch_name)
    }
}

/// The run currently tracked by a controller. Returned by the engine when a
/// run is started or retried, and persisted between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunHandle {
    pub run_id: String,
    pub total_targets: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Pending,
    Success,
    Failed,
}

impl TargetStatus {
    pub fn label(self) -> &'static str {
        match self {
            TargetStatus::Pending => "pending",
            TargetStatus::Success => "success",
            TargetStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResult {
    pub project_id: i64,
    pub branch_name: String,
    pub status: TargetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_commits_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
}

impl TargetResult {
    /// `new_commits_count` only exists for successes and `error_message`
    /// only for failures.
    pub fn normalized(mut self) -> Self {
        if self.status != TargetStatus::Success && self.new_commits_count.take().is_some() {
            tracing::debug!(
                project_id = self.project_id,
                branch = %self.branch_name,
                "dropping commit count on non-successful target"
            );
        }
        if self.status != TargetStatus::Failed && self.error_message.take().is_some() {
            tracing::debug!(
                project_id = self.project_id,
                branch = %self.branch_name,
                "dropping error message on non-failed target"
            );
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatusKind {
    Running,
    Completed,
    Cancelled,
}

/// Authoritative snapshot of a run, as returned by
/// `get_bulk_collection_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub run_id: String,
    pub status: RunStatusKind,
    pub total_targets: u64,
    pub completed_count: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub started_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub results: Vec<TargetResult>,
}

impl RunStatus {
    pub fn counters(&self) -> Counters {
        Counters {
            completed: self.completed_count,
            success: self.success_count,
            failed: self.failed_count,
        }
    }
}

/// Best-effort progress delta pushed on `bulk-collection-progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub run_id: String,
    pub total_targets: u64,
    pub completed_count: u64,
    pub success_count: u64,
    pub failed_count: u64,
    #[serde(default)]
    pub current_target: Option<CollectionTarget>,
}

impl RunProgress {
    pub fn counters(&self) -> Counters {
        Counters {
            completed: self.completed_count,
            success: self.success_count,
            failed: self.failed_count,
        }
    }

    pub fn looks_complete(&self) -> bool {
        self.completed_count >= self.total_targets
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub completed: u64,
    pub success: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_decodes_wire_shape() {
        let status: RunStatus = serde_json::from_value(json!({
            "runId": "run-1",
            "status": "completed",
            "totalTargets": 1,
            "completedCount": 1,
            "successCount": 0,
            "failedCount": 1,
            "startedAt": "2026-02-07T00:00:00Z",
            "completedAt": "2026-02-07T00:10:00Z",
            "results": [{
                "projectId": 1,
                "branchName": "main",
                "status": "failed",
                "newCommitsCount": null,
                "errorMessage": "error",
                "processedAt": "2026-02-07T00:05:00Z"
            }]
        }))
        .unwrap();

        assert_eq!(status.status, RunStatusKind::Completed);
        assert_eq!(status.results[0].status, TargetStatus::Failed);
        assert_eq!(status.results[0].error_message.as_deref(), Some("error"));
        assert_eq!(status.counters().failed, 1);
    }

    #[test]
    fn status_results_are_optional() {
        let status: RunStatus = serde_json::from_value(json!({
            "runId": "run-1",
            "status": "running",
            "totalTargets": 3,
            "completedCount": 0,
            "successCount": 0,
            "failedCount": 0,
            "startedAt": "2026-02-07T00:00:00Z"
        }))
        .unwrap();
        assert!(status.results.is_empty());
        assert_eq!(status.completed_at, None);
    }

    #[test]
    fn progress_without_current_target() {
        let progress: RunProgress = serde_json::from_value(json!({
            "runId": "run-1",
            "totalTargets": 3,
            "completedCount": 3,
            "successCount": 2,
            "failedCount": 1,
            "currentTarget": null
        }))
        .unwrap();
        assert_eq!(progress.current_target, None);
        assert!(progress.looks_complete());
    }

    #[test]
    fn normalized_drops_fields_that_contradict_status() {
        let result = TargetResult {
            project_id: 7,
            branch_name: "main".into(),
            status: TargetStatus::Success,
            new_commits_count: Some(4),
            error_message: Some("stale".into()),
            processed_at: None,
        }
        .normalized();
        assert_eq!(result.new_commits_count, Some(4));
        assert_eq!(result.error_message, None);

        let pending = TargetResult {
            status: TargetStatus::Pending,
            ..result
        }
        .normalized();
        assert_eq!(pending.new_commits_count, None);
    }
}
