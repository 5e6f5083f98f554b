use anyhow::Result;
use clap::{Args, Subcommand};

use crate::args::BaseArgs;
use crate::contracts::BranchRef;
use crate::http;
use crate::ui::{is_interactive, select_project_interactive};

mod api;
mod delete;
mod list;

#[derive(Debug, Clone, Args)]
pub struct BranchesArgs {
    #[command(subcommand)]
    command: BranchesCommands,
}

#[derive(Debug, Clone, Subcommand)]
enum BranchesCommands {
    /// List branches of a project
    List(ListArgs),
    /// Delete the collected commits of one branch
    Delete(DeleteArgs),
}

#[derive(Debug, Clone, Args)]
struct ListArgs {
    /// GitLab project id (prompted when omitted on a terminal)
    #[arg(long)]
    project: Option<i64>,
}

#[derive(Debug, Clone, Args)]
struct DeleteArgs {
    /// GitLab project id
    #[arg(long)]
    project: i64,

    /// Branch whose collected commits are removed
    #[arg(long)]
    branch: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,
}

pub async fn run(base: BaseArgs, args: BranchesArgs) -> Result<()> {
    let gateway = http::connect(&base)?;

    match args.command {
        BranchesCommands::List(list_args) => {
            let project_id = match list_args.project {
                Some(id) => id,
                None if is_interactive() => select_project_interactive(&gateway).await?,
                None => anyhow::bail!("--project is required"),
            };
            list::run(&gateway, project_id, base.json).await
        }
        BranchesCommands::Delete(delete_args) => {
            let request = BranchRef {
                project_id: delete_args.project,
                branch_name: delete_args.branch,
            };
            delete::run(&gateway, request, delete_args.yes, base.json).await
        }
    }
}
