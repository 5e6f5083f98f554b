use std::fmt::Write as _;

use anyhow::Result;
use dialoguer::console;

use crate::contracts::Project;
use crate::gateway::{CommandGateway, Transport};
use crate::ui::{
    apply_column_padding, header, print_command_status, print_with_pager, styled_table, truncate,
    with_spinner, CommandStatus,
};

use super::api;
use super::filter::{filter_projects, FilterOptions};

pub async fn run<T: Transport>(
    gateway: &CommandGateway<T>,
    query: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let projects = with_spinner("Loading projects...", api::list_projects(gateway)).await?;
    let options = FilterOptions {
        max_results: limit,
        ..FilterOptions::default()
    };
    let result = filter_projects(&projects, query, options);

    if json {
        println!("{}", serde_json::to_string(&result.items)?);
        return Ok(());
    }

    if result.is_empty() {
        if projects.is_empty() {
            print_command_status(
                CommandStatus::Warning,
                "No projects cached yet. Run `gla projects sync` to fetch them from GitLab.",
            );
        } else {
            print_command_status(
                CommandStatus::Warning,
                &format!("No projects match '{}'", query.trim()),
            );
        }
        return Ok(());
    }

    let mut output = String::new();
    writeln!(
        output,
        "{} of {} projects\n",
        console::style(result.items.len()).bold(),
        projects.len()
    )?;
    write!(output, "{}", format_table(&result.items))?;
    if result.is_truncated() {
        write!(
            output,
            "\n\n{}",
            console::style(format!(
                "Showing the first {} of {} matches. Narrow the filter to see more.",
                result.items.len(),
                result.matched
            ))
            .dim()
        )?;
    }

    print_with_pager(&output)?;
    Ok(())
}

fn format_table(projects: &[&Project]) -> String {
    let mut table = styled_table();
    table.set_header(vec![header("ID"), header("Name"), header("Path")]);
    apply_column_padding(&mut table, (0, 4));
    for project in projects {
        table.add_row(vec![
            project.project_id.to_string(),
            truncate(&project.name, 40),
            truncate(&project.path_with_namespace, 60),
        ]);
    }
    table.to_string()
}
