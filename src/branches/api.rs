use anyhow::Result;
use serde_json::json;

use crate::contracts::{commands, Branch, BranchDeleteImpact, BranchDeleteResult, BranchRef};
use crate::gateway::{CommandGateway, Transport};

pub async fn list_branches<T: Transport>(
    gateway: &CommandGateway<T>,
    project_id: i64,
) -> Result<Vec<Branch>> {
    Ok(gateway
        .invoke(commands::LIST_BRANCHES, json!({ "projectId": project_id }))
        .await?)
}

pub async fn delete_impact<T: Transport>(
    gateway: &CommandGateway<T>,
    request: &BranchRef,
) -> Result<BranchDeleteImpact> {
    Ok(gateway
        .invoke(
            commands::GET_BRANCH_DELETE_IMPACT,
            json!({ "request": request }),
        )
        .await?)
}

pub async fn delete_commits<T: Transport>(
    gateway: &CommandGateway<T>,
    request: &BranchRef,
) -> Result<BranchDeleteResult> {
    Ok(gateway
        .invoke(commands::DELETE_BRANCH_COMMITS, json!({ "request": request }))
        .await?)
}
