use anyhow::Result;
use clap::{Args, Subcommand};

use crate::args::BaseArgs;
use crate::http;

pub mod api;
mod filter;
mod list;
mod sync;

#[derive(Debug, Clone, Args)]
pub struct ProjectsArgs {
    #[command(subcommand)]
    command: Option<ProjectsCommands>,
}

#[derive(Debug, Clone, Subcommand)]
enum ProjectsCommands {
    /// List projects cached by the engine
    List(ListArgs),
    /// Refresh the project list from GitLab
    Sync,
}

#[derive(Debug, Clone, Args)]
struct ListArgs {
    /// Case-insensitive match on project name or path
    #[arg(long, short = 'f', default_value = "")]
    filter: String,

    /// Maximum number of projects to show
    #[arg(long, default_value_t = filter::DEFAULT_MAX_RESULTS)]
    limit: usize,
}

pub async fn run(base: BaseArgs, args: ProjectsArgs) -> Result<()> {
    let gateway = http::connect(&base)?;

    match args.command {
        None => list::run(&gateway, "", filter::DEFAULT_MAX_RESULTS, base.json).await,
        Some(ProjectsCommands::List(list_args)) => {
            list::run(&gateway, &list_args.filter, list_args.limit, base.json).await
        }
        Some(ProjectsCommands::Sync) => sync::run(&gateway, base.json).await,
    }
}
