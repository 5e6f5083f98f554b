use anyhow::Result;

use crate::contracts::ViewType;
use crate::gateway::{CommandGateway, Transport};
use crate::ui::{print_command_status, with_spinner, CommandStatus};
use crate::utils::pluralize;

use super::api;

/// Key a saved selection is stored under: `<project>/<branch>/<year>` for the
/// project view, `<year>` for the cross view.
pub fn context_key(view: ViewType, project: Option<&str>, branch: Option<&str>, year: i32) -> String {
    match (view, project, branch) {
        (ViewType::ProjectView, Some(project), Some(branch)) => {
            format!("{project}/{branch}/{year}")
        }
        _ => year.to_string(),
    }
}

pub async fn get<T: Transport>(
    gateway: &CommandGateway<T>,
    view: ViewType,
    context: &str,
    json: bool,
) -> Result<()> {
    let users = with_spinner(
        "Loading user filter...",
        api::get_user_filter(gateway, view, context),
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string(&users)?);
        return Ok(());
    }
    if users.is_empty() {
        println!("All users ({view} {context})");
    } else {
        for user in &users {
            println!("{user}");
        }
    }
    Ok(())
}

pub async fn set<T: Transport>(
    gateway: &CommandGateway<T>,
    view: ViewType,
    context: &str,
    users: Vec<String>,
) -> Result<()> {
    let mut users = users;
    users.sort();
    users.dedup();

    if let Err(err) = with_spinner(
        "Saving user filter...",
        api::set_user_filter(gateway, view, context, &users),
    )
    .await
    {
        print_command_status(CommandStatus::Error, "Failed to save user filter");
        return Err(err);
    }

    let message = if users.is_empty() {
        format!("Showing all users for {view} {context}")
    } else {
        format!(
            "Saved {} {} for {view} {context}",
            users.len(),
            pluralize(users.len() as u64, "user", None)
        )
    };
    print_command_status(CommandStatus::Success, &message);
    Ok(())
}
