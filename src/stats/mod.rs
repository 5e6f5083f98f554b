use anyhow::Result;
use chrono::Datelike;
use clap::{Args, Subcommand};

use crate::args::BaseArgs;
use crate::contracts::{
    CrossViewStatsRequest, MonthlyStatsResponse, ProjectViewStatsRequest, ViewType,
};
use crate::gateway::{CommandGateway, Transport};
use crate::http;
use crate::projects::api::find_project;
use crate::ui::{print_command_status, print_with_pager, with_spinner, CommandStatus};
use crate::utils::format_count;

mod api;
mod filter;
mod table;

#[derive(Debug, Clone, Args)]
pub struct StatsArgs {
    #[command(subcommand)]
    command: StatsCommands,
}

#[derive(Debug, Clone, Subcommand)]
enum StatsCommands {
    /// Monthly line counts per user for one project branch
    Project(ProjectStatsArgs),
    /// Monthly line counts per user across all projects
    Cross(CrossStatsArgs),
    /// Show or save the user selection of a stats view
    Filter(FilterArgs),
}

#[derive(Debug, Clone, Args)]
struct OutputArgs {
    /// Year to aggregate (defaults to the current year)
    #[arg(long)]
    year: Option<i32>,

    /// Only include these users (repeatable)
    #[arg(long = "user", value_name = "KEY")]
    users: Vec<String>,

    /// Use the saved user selection for this view when no --user is given
    #[arg(long, conflicts_with = "users")]
    saved_filter: bool,

    /// Print tab-separated values instead of a table
    #[arg(long)]
    tsv: bool,
}

#[derive(Debug, Clone, Args)]
struct ProjectStatsArgs {
    /// GitLab project id
    #[arg(long)]
    project: i64,

    /// Branch to aggregate
    #[arg(long)]
    branch: String,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Clone, Args)]
struct CrossStatsArgs {
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Clone, Args)]
struct FilterArgs {
    #[command(subcommand)]
    command: FilterCommands,
}

#[derive(Debug, Clone, Subcommand)]
enum FilterCommands {
    /// Print the saved selection (empty means all users)
    Get(FilterTarget),
    /// Replace the saved selection; pass no users to select everyone
    Set(FilterSetArgs),
}

#[derive(Debug, Clone, Args)]
struct FilterTarget {
    /// Stats view the selection belongs to
    #[arg(long, value_enum)]
    view: ViewType,

    /// `<project>/<branch>/<year>` for project-view, `<year>` for cross-view
    #[arg(long)]
    context: String,
}

#[derive(Debug, Clone, Args)]
struct FilterSetArgs {
    #[command(flatten)]
    target: FilterTarget,

    /// User keys to keep selected
    #[arg(value_name = "USER")]
    users: Vec<String>,
}

pub async fn run(base: BaseArgs, args: StatsArgs) -> Result<()> {
    let gateway = http::connect(&base)?;

    match args.command {
        StatsCommands::Project(project_args) => project(&base, &gateway, project_args).await,
        StatsCommands::Cross(cross_args) => cross(&base, &gateway, cross_args).await,
        StatsCommands::Filter(filter_args) => match filter_args.command {
            FilterCommands::Get(target) => {
                filter::get(&gateway, target.view, &target.context, base.json).await
            }
            FilterCommands::Set(set_args) => {
                filter::set(
                    &gateway,
                    set_args.target.view,
                    &set_args.target.context,
                    set_args.users,
                )
                .await
            }
        },
    }
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// Explicit `--user` values win; otherwise the saved selection is used when
/// asked for. `None` means every user.
async fn resolve_user_keys<T: Transport>(
    gateway: &CommandGateway<T>,
    output: &OutputArgs,
    view: ViewType,
    context: &str,
) -> Result<Option<Vec<String>>> {
    if !output.users.is_empty() {
        return Ok(Some(output.users.clone()));
    }
    if !output.saved_filter {
        return Ok(None);
    }
    let saved = api::get_user_filter(gateway, view, context).await?;
    tracing::debug!(%view, context, users = saved.len(), "loaded saved user filter");
    Ok((!saved.is_empty()).then_some(saved))
}

async fn project<T: Transport>(
    base: &BaseArgs,
    gateway: &CommandGateway<T>,
    args: ProjectStatsArgs,
) -> Result<()> {
    let year = args.output.year.unwrap_or_else(current_year);
    let project_name = find_project(gateway, args.project)
        .await?
        .map(|p| p.name)
        .unwrap_or_else(|| args.project.to_string());
    let context = filter::context_key(
        ViewType::ProjectView,
        Some(project_name.as_str()),
        Some(args.branch.as_str()),
        year,
    );
    let user_keys =
        resolve_user_keys(gateway, &args.output, ViewType::ProjectView, &context).await?;

    let request = ProjectViewStatsRequest {
        project_id: args.project,
        branch_name: args.branch.clone(),
        year,
        user_keys,
    };
    let stats = with_spinner("Loading stats...", api::project_view(gateway, &request)).await?;
    let title = format!("{project_name} / {} {year}", args.branch);
    emit(base, &args.output, &stats, &title)
}

async fn cross<T: Transport>(
    base: &BaseArgs,
    gateway: &CommandGateway<T>,
    args: CrossStatsArgs,
) -> Result<()> {
    let year = args.output.year.unwrap_or_else(current_year);
    let context = filter::context_key(ViewType::CrossView, None, None, year);
    let user_keys = resolve_user_keys(gateway, &args.output, ViewType::CrossView, &context).await?;

    let request = CrossViewStatsRequest { year, user_keys };
    let stats = with_spinner("Loading stats...", api::cross_view(gateway, &request)).await?;
    emit(base, &args.output, &stats, &format!("All projects {year}"))
}

fn emit(
    base: &BaseArgs,
    output: &OutputArgs,
    stats: &MonthlyStatsResponse,
    title: &str,
) -> Result<()> {
    if base.json {
        println!("{}", serde_json::to_string(stats)?);
        return Ok(());
    }

    if output.tsv {
        println!("{}", table::to_tsv(stats));
    } else {
        print_with_pager(&table::format_table(stats, title)?)?;
    }

    let missing = stats.missing_total();
    if missing > 0 {
        print_command_status(
            CommandStatus::Warning,
            &format!(
                "{} commits have no line stats and are not counted",
                format_count(missing)
            ),
        );
    }
    Ok(())
}
