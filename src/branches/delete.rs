use anyhow::{bail, Result};
use dialoguer::Confirm;

use crate::contracts::{BranchDeleteImpact, BranchRef, DeleteStatus, ViewType};
use crate::gateway::{CommandGateway, Transport};
use crate::ui::{is_interactive, print_command_status, with_spinner, CommandStatus};
use crate::utils::pluralize;

use super::api;

pub async fn run<T: Transport>(
    gateway: &CommandGateway<T>,
    request: BranchRef,
    yes: bool,
    json: bool,
) -> Result<()> {
    let label = format!("{} / {}", request.project_id, request.branch_name);
    let impact = with_spinner(
        "Checking delete impact...",
        api::delete_impact(gateway, &request),
    )
    .await?;

    match impact.status {
        DeleteStatus::Blocked => {
            let reason = impact
                .block_reason
                .as_deref()
                .unwrap_or("the engine refused the deletion");
            print_command_status(CommandStatus::Error, &format!("Cannot delete {label}"));
            bail!("{reason}");
        }
        DeleteStatus::NoCommits => {
            print_command_status(
                CommandStatus::Warning,
                &format!("No collected commits for {label}"),
            );
            return Ok(());
        }
        _ if !impact.can_delete => bail!("deletion of {label} is not allowed"),
        _ => {}
    }

    eprintln!("{}", describe_impact(&impact));

    if !yes {
        if !is_interactive() {
            bail!("refusing to delete without confirmation. Use --yes");
        }
        let confirm = Confirm::new()
            .with_prompt(format!("Delete collected commits for {label}?"))
            .default(false)
            .interact()?;
        if !confirm {
            return Ok(());
        }
    }

    let result = match with_spinner("Deleting commits...", api::delete_commits(gateway, &request))
        .await
    {
        Ok(result) => result,
        Err(err) => {
            print_command_status(CommandStatus::Error, &format!("Failed to delete {label}"));
            return Err(err);
        }
    };
    tracing::info!(
        project_id = result.project_id,
        branch = %result.branch_name,
        deleted = result.deleted_count,
        "branch commits deleted"
    );

    if json {
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }
    print_command_status(
        CommandStatus::Success,
        &format!(
            "Deleted {} {} from {label}",
            result.deleted_count,
            pluralize(result.deleted_count, "commit", None)
        ),
    );
    if let Some(message) = result.message.as_deref().filter(|m| !m.is_empty()) {
        eprintln!("{message}");
    }
    Ok(())
}

fn describe_impact(impact: &BranchDeleteImpact) -> String {
    let mut text = format!(
        "{} collected {} will be removed",
        impact.commit_count,
        pluralize(impact.commit_count, "commit", None)
    );
    if !impact.affected_views.is_empty() {
        let views: Vec<&str> = impact.affected_views.iter().map(|v| ViewType::as_str(*v)).collect();
        text.push_str(&format!(" (affects {})", views.join(", ")));
    }
    text
}
