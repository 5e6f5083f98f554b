use anyhow::Result;
use serde_json::json;

use crate::contracts::{commands, Project};
use crate::gateway::{CommandGateway, Transport};

pub async fn list_projects<T: Transport>(gateway: &CommandGateway<T>) -> Result<Vec<Project>> {
    Ok(gateway.invoke(commands::GET_PROJECTS, json!({})).await?)
}

/// Refresh the engine's project cache from GitLab and return the new list.
pub async fn sync_projects<T: Transport>(gateway: &CommandGateway<T>) -> Result<Vec<Project>> {
    Ok(gateway.invoke(commands::SYNC_PROJECTS, json!({})).await?)
}

pub async fn find_project<T: Transport>(
    gateway: &CommandGateway<T>,
    project_id: i64,
) -> Result<Option<Project>> {
    let projects = list_projects(gateway).await?;
    Ok(projects.into_iter().find(|p| p.project_id == project_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;

    fn project_json(id: i64, name: &str) -> serde_json::Value {
        json!({
            "projectId": id,
            "name": name,
            "pathWithNamespace": format!("group/{name}"),
            "webUrl": format!("https://gitlab.example.com/group/{name}")
        })
    }

    #[tokio::test]
    async fn find_project_by_id() {
        let engine = FakeEngine::default();
        engine.respond(
            commands::GET_PROJECTS,
            json!([project_json(1, "alpha"), project_json(2, "beta")]),
        );
        let gateway = CommandGateway::new(engine);

        let found = find_project(&gateway, 2).await.unwrap().unwrap();
        assert_eq!(found.name, "beta");
        assert_eq!(find_project(&gateway, 9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sync_failure_surfaces_engine_message() {
        let engine = FakeEngine::default();
        engine.fail(commands::SYNC_PROJECTS, "GitLab connection is not configured");
        let gateway = CommandGateway::new(engine);

        let err = sync_projects(&gateway).await.unwrap_err();
        assert_eq!(err.to_string(), "GitLab connection is not configured");
    }
}
