use anyhow::Result;
use serde_json::json;

use crate::contracts::{
    commands, CrossViewStatsRequest, MonthlyStatsResponse, ProjectViewStatsRequest, ViewType,
};
use crate::gateway::{CommandGateway, Transport};

pub async fn project_view<T: Transport>(
    gateway: &CommandGateway<T>,
    request: &ProjectViewStatsRequest,
) -> Result<MonthlyStatsResponse> {
    Ok(gateway
        .invoke(
            commands::GET_MONTHLY_STATS_PROJECT_VIEW,
            json!({ "request": request }),
        )
        .await?)
}

pub async fn cross_view<T: Transport>(
    gateway: &CommandGateway<T>,
    request: &CrossViewStatsRequest,
) -> Result<MonthlyStatsResponse> {
    Ok(gateway
        .invoke(
            commands::GET_MONTHLY_STATS_CROSS_VIEW,
            json!({ "request": request }),
        )
        .await?)
}

/// Saved user selection for a view. Empty means every user is selected.
pub async fn get_user_filter<T: Transport>(
    gateway: &CommandGateway<T>,
    view: ViewType,
    context_key: &str,
) -> Result<Vec<String>> {
    Ok(gateway
        .invoke(
            commands::USER_FILTER_GET,
            json!({ "viewType": view, "contextKey": context_key }),
        )
        .await?)
}

/// Replace the saved selection for `view` and `context_key`.
pub async fn set_user_filter<T: Transport>(
    gateway: &CommandGateway<T>,
    view: ViewType,
    context_key: &str,
    selected_users: &[String],
) -> Result<()> {
    let _: serde_json::Value = gateway
        .invoke(
            commands::USER_FILTER_SET,
            json!({
                "viewType": view,
                "contextKey": context_key,
                "selectedUsers": selected_users,
            }),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;

    #[tokio::test]
    async fn project_view_request_shape() {
        let engine = FakeEngine::default();
        engine.respond(
            commands::GET_MONTHLY_STATS_PROJECT_VIEW,
            json!({"months": [1], "series": []}),
        );
        let gateway = CommandGateway::new(engine.clone());
        let request = ProjectViewStatsRequest {
            project_id: 7,
            branch_name: "main".into(),
            year: 2026,
            user_keys: Some(vec!["a@example.com".into()]),
        };

        let stats = project_view(&gateway, &request).await.unwrap();
        assert_eq!(stats.months, vec![1]);
        assert_eq!(
            engine.calls_to(commands::GET_MONTHLY_STATS_PROJECT_VIEW),
            vec![json!({"request": {
                "projectId": 7,
                "branchName": "main",
                "year": 2026,
                "userKeys": ["a@example.com"]
            }})]
        );
    }

    #[tokio::test]
    async fn filter_calls_use_wire_view_names() {
        let engine = FakeEngine::default();
        engine.respond(commands::USER_FILTER_GET, json!([]));
        engine.respond(commands::USER_FILTER_SET, json!(null));
        let gateway = CommandGateway::new(engine.clone());

        let saved = get_user_filter(&gateway, ViewType::CrossView, "2026")
            .await
            .unwrap();
        assert!(saved.is_empty());

        set_user_filter(
            &gateway,
            ViewType::ProjectView,
            "web/main/2026",
            &["a@example.com".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(
            engine.calls_to(commands::USER_FILTER_GET),
            vec![json!({"viewType": "cross-view", "contextKey": "2026"})]
        );
        assert_eq!(
            engine.calls_to(commands::USER_FILTER_SET),
            vec![json!({
                "viewType": "project-view",
                "contextKey": "web/main/2026",
                "selectedUsers": ["a@example.com"]
            })]
        );
    }
}
