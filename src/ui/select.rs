use std::io::IsTerminal;

use anyhow::{bail, Result};
use dialoguer::{theme::ColorfulTheme, FuzzySelect};

use crate::gateway::{CommandGateway, Transport};
use crate::projects::api;
use crate::ui::with_spinner;

/// Fuzzy select from a list of items. Requires TTY.
pub fn fuzzy_select<T: ToString>(prompt: &str, items: &[T]) -> Result<usize> {
    if !std::io::stdin().is_terminal() {
        bail!("interactive mode requires TTY");
    }

    if items.is_empty() {
        bail!("no items to select from");
    }

    let labels: Vec<String> = items.iter().map(|i| i.to_string()).collect();

    let selection = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(selection)
}

/// Pick a project from the engine's cached list and return its id.
pub async fn select_project_interactive<T: Transport>(gateway: &CommandGateway<T>) -> Result<i64> {
    let mut projects = with_spinner("Loading projects...", api::list_projects(gateway)).await?;

    if projects.is_empty() {
        bail!("no projects cached. Run `gla projects sync` first");
    }

    projects.sort_by(|a, b| a.path_with_namespace.cmp(&b.path_with_namespace));
    let labels: Vec<&str> = projects
        .iter()
        .map(|p| p.path_with_namespace.as_str())
        .collect();

    let selection = fuzzy_select("Select project", &labels)?;
    Ok(projects[selection].project_id)
}
