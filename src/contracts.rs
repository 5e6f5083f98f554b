//! Wire types for the engine commands outside the bulk coordinator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Command names exposed by the engine.
pub mod commands {
    pub const GET_GITLAB_CONNECTION: &str = "get_gitlab_connection";
    pub const SET_GITLAB_CONNECTION: &str = "set_gitlab_connection";
    pub const GET_PROJECTS: &str = "get_projects";
    pub const SYNC_PROJECTS: &str = "sync_projects";
    pub const LIST_BRANCHES: &str = "list_branches";
    pub const COLLECT_COMMITS: &str = "collect_commits";
    pub const COLLECT_COMMITS_BULK: &str = "collect_commits_bulk";
    pub const CANCEL_BULK_COLLECTION: &str = "cancel_bulk_collection";
    pub const RETRY_FAILED_TARGETS: &str = "retry_failed_targets";
    pub const GET_BULK_COLLECTION_STATUS: &str = "get_bulk_collection_status";
    pub const GET_MONTHLY_STATS_PROJECT_VIEW: &str = "get_monthly_stats_project_view";
    pub const GET_MONTHLY_STATS_CROSS_VIEW: &str = "get_monthly_stats_cross_view";
    pub const USER_FILTER_GET: &str = "user_filter_get";
    pub const USER_FILTER_SET: &str = "user_filter_set";
    pub const GET_BRANCH_DELETE_IMPACT: &str = "get_branch_delete_impact";
    pub const DELETE_BRANCH_COMMITS: &str = "delete_branch_commits";
}

/// Stored GitLab connection. The access token is never returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitLabConnection {
    pub base_url: String,
    pub updated_at_utc: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitLabConnectionInput {
    pub base_url: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: i64,
    pub name: String,
    pub path_with_namespace: String,
    pub web_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub is_default: Option<bool>,
}

impl Branch {
    pub fn is_default(&self) -> bool {
        self.is_default.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectCommitsRequest {
    pub project_id: i64,
    pub branch_name: String,
    pub since_utc: Option<String>,
    pub until_utc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectCommitsResult {
    pub inserted_count: u64,
    pub skipped_duplicate_count: u64,
    pub missing_stats_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectViewStatsRequest {
    pub project_id: i64,
    pub branch_name: String,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_keys: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossViewStatsRequest {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_keys: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStatsResponse {
    pub months: Vec<u32>,
    pub series: Vec<UserMonthlySeries>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMonthlySeries {
    pub user_key: String,
    pub display_name: String,
    pub totals: Vec<i64>,
    #[serde(default)]
    pub missing_counts: Vec<i64>,
}

impl UserMonthlySeries {
    pub fn total(&self) -> i64 {
        self.totals.iter().sum()
    }
}

impl MonthlyStatsResponse {
    pub fn missing_total(&self) -> i64 {
        self.series
            .iter()
            .flat_map(|series| series.missing_counts.iter())
            .sum()
    }
}

/// Stats view a saved user selection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ViewType {
    #[serde(rename = "project-view")]
    #[value(name = "project-view")]
    ProjectView,
    #[serde(rename = "cross-view")]
    #[value(name = "cross-view")]
    CrossView,
}

impl ViewType {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewType::ProjectView => "project-view",
            ViewType::CrossView => "cross-view",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRef {
    pub project_id: i64,
    pub branch_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Ok,
    Blocked,
    NoCommits,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchDeleteImpact {
    pub project_id: i64,
    pub branch_name: String,
    pub commit_count: u64,
    #[serde(default)]
    pub affected_views: Vec<ViewType>,
    pub can_delete: bool,
    #[serde(default)]
    pub block_reason: Option<String>,
    pub status: DeleteStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchDeleteResult {
    pub project_id: i64,
    pub branch_name: String,
    pub deleted_count: u64,
    #[serde(default)]
    pub affected_views: Vec<ViewType>,
    pub status: DeleteStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_may_be_absent() {
        let conn: Option<GitLabConnection> = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(conn, None);
    }

    #[test]
    fn stats_request_omits_empty_user_filter() {
        let request = CrossViewStatsRequest {
            year: 2026,
            user_keys: None,
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"year": 2026}));
    }

    #[test]
    fn delete_impact_decodes_blocked() {
        let impact: BranchDeleteImpact = serde_json::from_value(json!({
            "projectId": 1,
            "branchName": "main",
            "commitCount": 12,
            "affectedViews": ["project-view", "cross-view"],
            "canDelete": false,
            "blockReason": "collection in progress",
            "status": "blocked"
        }))
        .unwrap();
        assert_eq!(impact.status, DeleteStatus::Blocked);
        assert_eq!(impact.affected_views, vec![ViewType::ProjectView, ViewType::CrossView]);
    }

    #[test]
    fn missing_total_sums_all_series() {
        let stats: MonthlyStatsResponse = serde_json::from_value(json!({
            "months": [1, 2],
            "series": [
                {"userKey": "a@example.com", "displayName": "A", "totals": [10, 5], "missingCounts": [1, 0]},
                {"userKey": "b@example.com", "displayName": "B", "totals": [0, 3], "missingCounts": [0, 2]}
            ]
        }))
        .unwrap();
        assert_eq!(stats.missing_total(), 3);
        assert_eq!(stats.series[0].total(), 15);
    }
}
