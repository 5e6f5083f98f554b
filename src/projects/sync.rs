use anyhow::Result;

use crate::gateway::{CommandGateway, Transport};
use crate::ui::{print_command_status, with_spinner, CommandStatus};
use crate::utils::pluralize;

use super::api;

pub async fn run<T: Transport>(gateway: &CommandGateway<T>, json: bool) -> Result<()> {
    let projects = match with_spinner("Syncing projects from GitLab...", api::sync_projects(gateway)).await {
        Ok(projects) => projects,
        Err(err) => {
            print_command_status(CommandStatus::Error, "Failed to sync projects");
            return Err(err);
        }
    };

    if json {
        println!("{}", serde_json::to_string(&projects)?);
        return Ok(());
    }

    print_command_status(
        CommandStatus::Success,
        &format!(
            "Synced {} {}",
            projects.len(),
            pluralize(projects.len() as u64, "project", None)
        ),
    );
    Ok(())
}
