use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{Args, Subcommand};
use dialoguer::Confirm;

use crate::args::BaseArgs;
use crate::gateway::CommandGateway;
use crate::http::{EngineClient, EngineSettings};
use crate::ui::{print_command_status, with_spinner, CommandStatus};
use crate::utils::pluralize;

mod controller;
mod handle;
mod render;
mod store;
mod subscriber;
mod types;

pub use render::format_timestamp;

use controller::RunController;
use render::WatchOutcome;
use store::LocalStatus;
use subscriber::Subscription;
use types::RunHandle;

type Controller = RunController<EngineClient>;

#[derive(Debug, Clone, Args)]
pub struct BulkArgs {
    #[command(subcommand)]
    command: BulkCommands,
}

#[derive(Debug, Clone, Subcommand)]
enum BulkCommands {
    /// Start collecting commits for every registered target
    Start(FollowArgs),
    /// Show the status and per-target results of a run
    Status(RunIdArgs),
    /// Cancel the running collection
    Cancel(CancelArgs),
    /// Retry only the failed targets of the last run
    Retry(FollowArgs),
    /// Follow progress of a run until it finishes
    Watch(WatchArgs),
}

#[derive(Debug, Clone, Args)]
struct FollowArgs {
    /// Return as soon as the run is started instead of following it
    #[arg(long)]
    detach: bool,
}

#[derive(Debug, Clone, Args)]
struct RunIdArgs {
    /// Run to inspect (defaults to the last run started from this machine)
    #[arg(long)]
    run_id: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct CancelArgs {
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Debug, Clone, Args)]
struct WatchArgs {
    #[command(flatten)]
    run: RunIdArgs,

    /// Seconds between status pulls (overrides poll_interval_secs)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: Option<u64>,
}

pub async fn run(base: BaseArgs, args: BulkArgs) -> Result<()> {
    let (client, settings) = EngineClient::from_base(&base)?;
    let controller = Arc::new(RunController::new(CommandGateway::new(client.clone())));

    match args.command {
        BulkCommands::Start(follow) => {
            start(&base, &controller, &client, &settings, follow.detach).await
        }
        BulkCommands::Status(run) => status(&base, &controller, run.run_id).await,
        BulkCommands::Cancel(cancel_args) => cancel(&base, &controller, cancel_args.yes).await,
        BulkCommands::Retry(follow) => {
            retry(&base, &controller, &client, &settings, follow.detach).await
        }
        BulkCommands::Watch(watch_args) => {
            let poll_interval = watch_args
                .poll_interval
                .map(Duration::from_secs)
                .unwrap_or(settings.poll_interval);
            resume(&controller, watch_args.run.run_id)?;
            let subscription = Subscription::activate(Arc::clone(&controller), &client).await?;
            note_subscription(&subscription);
            follow(&base, &controller, poll_interval).await
        }
    }
}

/// Track `run_id`, or the saved handle when none is given.
fn resume(controller: &Controller, run_id: Option<String>) -> Result<RunHandle> {
    let handle = match run_id {
        Some(run_id) => RunHandle {
            run_id,
            total_targets: 0,
        },
        None => handle::load()?.ok_or_else(|| {
            anyhow!("no bulk collection run found. Start one with `gla bulk start`")
        })?,
    };
    controller.resume(handle.clone());
    Ok(handle)
}

fn note_subscription(subscription: &Subscription) {
    if !subscription.is_active() {
        tracing::warn!("progress channel closed; relying on status pulls");
    }
}

async fn refresh(controller: &Controller) -> Result<()> {
    with_spinner("Loading run status...", controller.refresh()).await?;
    Ok(())
}

async fn start(
    base: &BaseArgs,
    controller: &Arc<Controller>,
    client: &EngineClient,
    settings: &EngineSettings,
    detach: bool,
) -> Result<()> {
    if let Some(previous) = handle::load()? {
        controller.resume(previous);
        if let Err(err) = controller.refresh().await {
            tracing::warn!(error = %err, "could not refresh previous run");
        }
    }

    let subscription = Subscription::activate(Arc::clone(controller), client).await?;
    note_subscription(&subscription);
    let handle = match with_spinner("Starting bulk collection...", controller.start()).await {
        Ok(handle) => handle,
        Err(err) => {
            print_command_status(CommandStatus::Error, "Failed to start bulk collection");
            return Err(err.into());
        }
    };
    handle::save(&handle)?;
    print_command_status(
        CommandStatus::Success,
        &format!(
            "Started run {} ({} {})",
            handle.run_id,
            handle.total_targets,
            pluralize(handle.total_targets, "target", None)
        ),
    );

    if detach {
        if base.json {
            println!("{}", serde_json::to_string(&handle)?);
        }
        return Ok(());
    }
    follow(base, controller, settings.poll_interval).await
}

async fn status(base: &BaseArgs, controller: &Controller, run_id: Option<String>) -> Result<()> {
    resume(controller, run_id)?;
    refresh(controller).await?;
    render::print_view(&controller.view(), base.json)
}

async fn cancel(base: &BaseArgs, controller: &Controller, yes: bool) -> Result<()> {
    let handle = resume(controller, None)?;
    refresh(controller).await?;

    let view = controller.view();
    if !view.is_running() {
        bail!(
            "run {} is not running ({})",
            handle.run_id,
            view.status.map(LocalStatus::label).unwrap_or("unknown")
        );
    }

    if !yes && std::io::stdin().is_terminal() {
        let confirm = Confirm::new()
            .with_prompt(format!("Cancel run {}?", handle.run_id))
            .default(false)
            .interact()?;
        if !confirm {
            return Ok(());
        }
    }

    if let Err(err) = with_spinner("Cancelling...", controller.cancel()).await {
        print_command_status(CommandStatus::Error, &format!("Failed to cancel {}", handle.run_id));
        return Err(err.into());
    }

    let view = controller.view();
    match view.status {
        Some(LocalStatus::Cancelled) => print_command_status(
            CommandStatus::Success,
            &format!("Cancelled run {}", handle.run_id),
        ),
        Some(LocalStatus::Running) => print_command_status(
            CommandStatus::Warning,
            &format!("Engine still reports run {} as running", handle.run_id),
        ),
        _ => print_command_status(
            CommandStatus::Warning,
            &format!(
                "Cancel requested for {}; waiting for the engine to confirm",
                handle.run_id
            ),
        ),
    }
    if base.json {
        println!("{}", serde_json::to_string(&view)?);
    }
    Ok(())
}

async fn retry(
    base: &BaseArgs,
    controller: &Arc<Controller>,
    client: &EngineClient,
    settings: &EngineSettings,
    detach: bool,
) -> Result<()> {
    resume(controller, None)?;
    refresh(controller).await?;

    let subscription = Subscription::activate(Arc::clone(controller), client).await?;
    note_subscription(&subscription);
    let handle = match with_spinner("Retrying failed targets...", controller.retry_failed()).await {
        Ok(handle) => handle,
        Err(err) => {
            print_command_status(CommandStatus::Error, "Failed to retry");
            return Err(err.into());
        }
    };
    handle::save(&handle)?;
    print_command_status(
        CommandStatus::Success,
        &format!(
            "Retrying {} failed {} as run {}",
            handle.total_targets,
            pluralize(handle.total_targets, "target", None),
            handle.run_id
        ),
    );

    if detach {
        if base.json {
            println!("{}", serde_json::to_string(&handle)?);
        }
        return Ok(());
    }
    follow(base, controller, settings.poll_interval).await
}

/// Watch the tracked run. The caller keeps the progress subscription alive.
async fn follow(base: &BaseArgs, controller: &Controller, poll_interval: Duration) -> Result<()> {
    if let Err(err) = controller.refresh().await {
        tracing::warn!(error = %err, "initial status pull failed");
    }

    match render::watch(controller, poll_interval, base.json).await? {
        WatchOutcome::Finished(view) => {
            match view.status {
                Some(LocalStatus::Cancelled) => {
                    print_command_status(CommandStatus::Warning, "Run cancelled")
                }
                _ if view.can_retry() => print_command_status(
                    CommandStatus::Warning,
                    &format!(
                        "Run finished with {} failed {}. Use `gla bulk retry` to retry them.",
                        view.failed_count,
                        pluralize(view.failed_count, "target", None)
                    ),
                ),
                _ => print_command_status(CommandStatus::Success, "Run completed"),
            }
            render::print_view(&view, base.json)
        }
        WatchOutcome::Detached(view) => {
            eprintln!(
                "Detached from {}. Run `gla bulk watch` to follow it again.",
                view.run_id.as_deref().unwrap_or("run")
            );
            Ok(())
        }
    }
}
