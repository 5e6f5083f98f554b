use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsString;

mod args;
mod branches;
mod bulk;
mod collect;
mod config;
mod connection;
mod contracts;
mod env;
mod gateway;
mod http;
mod logging;
mod projects;
mod stats;
#[cfg(test)]
mod testing;
mod ui;
mod utils;

use crate::args::CLIArgs;

const DEFAULT_CANARY_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-canary.dev");
const CLI_VERSION: &str = match option_env!("GLA_VERSION_STRING") {
    Some(version) => version,
    None => DEFAULT_CANARY_VERSION,
};

#[derive(Debug, Parser)]
#[command(
    name = "gla",
    about = "GitLab commit-line analyzer CLI",
    version = CLI_VERSION
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect commits for every target and follow the run
    Bulk(CLIArgs<bulk::BulkArgs>),
    /// Manage the GitLab connection
    Connection(CLIArgs<connection::ConnectionArgs>),
    /// List and sync GitLab projects
    Projects(CLIArgs<projects::ProjectsArgs>),
    /// List branches and delete collected branch data
    Branches(CLIArgs<branches::BranchesArgs>),
    /// Collect commits for a single project branch
    Collect(CLIArgs<collect::CollectArgs>),
    /// Monthly line statistics per user
    Stats(CLIArgs<stats::StatsArgs>),
    /// View and modify CLI configuration
    Config(CLIArgs<config::ConfigArgs>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let env_files = env::bootstrap_from_args(&argv)?;
    let cli = Cli::parse_from(argv);
    logging::init(cli.verbose);
    for path in &env_files {
        tracing::debug!(path = %path.display(), "loaded env file");
    }

    match cli.command {
        Commands::Bulk(cmd) => bulk::run(cmd.base, cmd.args).await?,
        Commands::Connection(cmd) => connection::run(cmd.base, cmd.args).await?,
        Commands::Projects(cmd) => projects::run(cmd.base, cmd.args).await?,
        Commands::Branches(cmd) => branches::run(cmd.base, cmd.args).await?,
        Commands::Collect(cmd) => collect::run(cmd.base, cmd.args).await?,
        Commands::Stats(cmd) => stats::run(cmd.base, cmd.args).await?,
        Commands::Config(cmd) => config::run(cmd.base, cmd.args)?,
    }

    Ok(())
}
