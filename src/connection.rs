use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use dialoguer::console;
use serde_json::json;

use crate::args::BaseArgs;
use crate::bulk::format_timestamp;
use crate::contracts::{commands, GitLabConnection, GitLabConnectionInput};
use crate::gateway::{CommandGateway, Transport};
use crate::http;
use crate::ui::{is_interactive, print_command_status, with_spinner, CommandStatus};

#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    #[command(subcommand)]
    command: Option<ConnectionCommands>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConnectionCommands {
    /// Show the stored GitLab connection
    Get,
    /// Store the GitLab URL and access token
    Set(SetArgs),
}

#[derive(Debug, Clone, Args)]
struct SetArgs {
    /// GitLab base URL, e.g. https://gitlab.example.com
    #[arg(long)]
    base_url: String,

    /// Personal access token (prompted when omitted)
    #[arg(long, env = "GLA_GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

pub async fn run(base: BaseArgs, args: ConnectionArgs) -> Result<()> {
    let gateway = http::connect(&base)?;

    match args.command {
        None | Some(ConnectionCommands::Get) => get(&gateway, base.json).await,
        Some(ConnectionCommands::Set(set_args)) => set(&gateway, set_args).await,
    }
}

pub async fn fetch<T: Transport>(gateway: &CommandGateway<T>) -> Result<Option<GitLabConnection>> {
    Ok(gateway
        .invoke(commands::GET_GITLAB_CONNECTION, json!({}))
        .await?)
}

async fn get<T: Transport>(gateway: &CommandGateway<T>, json: bool) -> Result<()> {
    let connection = with_spinner("Loading connection...", fetch(gateway)).await?;

    if json {
        println!("{}", serde_json::to_string(&connection)?);
        return Ok(());
    }
    match connection {
        Some(connection) => {
            println!(
                "{} {}",
                console::style("GitLab:").dim(),
                console::style(&connection.base_url).bold()
            );
            println!(
                "{} {}",
                console::style("Updated:").dim(),
                format_timestamp(&connection.updated_at_utc)
            );
        }
        None => print_command_status(
            CommandStatus::Warning,
            "No GitLab connection. Run `gla connection set --base-url URL`",
        ),
    }
    Ok(())
}

fn validate_base_url(raw: &str) -> Result<String> {
    let url = raw.trim().trim_end_matches('/');
    if url.is_empty() {
        bail!("base URL cannot be empty");
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("base URL must start with http:// or https://");
    }
    Ok(url.to_string())
}

fn read_token(token: Option<String>) -> Result<String> {
    let token = match token {
        Some(token) => token,
        None if is_interactive() => dialoguer::Password::new()
            .with_prompt("GitLab access token")
            .interact()?,
        None => bail!("--token is required when not running interactively"),
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        bail!("access token cannot be empty");
    }
    Ok(token)
}

pub async fn save<T: Transport>(
    gateway: &CommandGateway<T>,
    input: &GitLabConnectionInput,
) -> Result<()> {
    let _: serde_json::Value = gateway
        .invoke(commands::SET_GITLAB_CONNECTION, json!({ "input": input }))
        .await?;
    Ok(())
}

async fn set<T: Transport>(gateway: &CommandGateway<T>, args: SetArgs) -> Result<()> {
    let input = GitLabConnectionInput {
        base_url: validate_base_url(&args.base_url)?,
        access_token: read_token(args.token)?,
    };

    if let Err(err) = with_spinner("Saving connection...", save(gateway, &input)).await {
        print_command_status(CommandStatus::Error, "Failed to save GitLab connection");
        return Err(err);
    }
    tracing::info!(base_url = %input.base_url, "gitlab connection saved");
    print_command_status(
        CommandStatus::Success,
        &format!("Connected to {}", input.base_url),
    );
    Ok(())
}
