use std::fmt::Write as _;
use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use dialoguer::console;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::time::MissedTickBehavior;

use crate::gateway::Transport;
use crate::ui::{apply_column_padding, header, print_with_pager, styled_table, truncate};

use super::controller::RunController;
use super::store::{LocalStatus, RunView};
use super::types::TargetStatus;

pub enum WatchOutcome {
    /// A pull confirmed the run as completed or cancelled.
    Finished(RunView),
    /// The user pressed Ctrl+C; the run keeps going on the engine.
    Detached(RunView),
}

/// Render a timestamp from the engine in local time. Unparseable values are
/// shown as-is.
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

fn styled_status(status: LocalStatus) -> String {
    let label = status.label();
    match status {
        LocalStatus::Running | LocalStatus::Cancelling => console::style(label).cyan().to_string(),
        LocalStatus::Completed => console::style(label).green().to_string(),
        LocalStatus::Cancelled => console::style(label).yellow().to_string(),
        LocalStatus::Unknown => console::style(label).dim().to_string(),
    }
}

fn styled_target_status(status: TargetStatus) -> String {
    let label = status.label();
    match status {
        TargetStatus::Success => console::style(label).green().to_string(),
        TargetStatus::Failed => console::style(label).red().to_string(),
        TargetStatus::Pending => console::style(label).dim().to_string(),
    }
}

pub fn format_view(view: &RunView) -> Result<String> {
    let mut output = String::new();

    match &view.run_id {
        Some(run_id) => writeln!(
            output,
            "Run {} {}",
            console::style(run_id).bold(),
            view.status.map(styled_status).unwrap_or_default()
        )?,
        None => writeln!(output, "{}", console::style("Untracked run").bold())?,
    }
    writeln!(output, "{} [{}%]", view.summary_line(), view.percent())?;

    if let Some(started) = &view.started_at {
        writeln!(
            output,
            "{} {}",
            console::style("Started:").dim(),
            format_timestamp(started)
        )?;
    }
    if let Some(completed) = &view.completed_at {
        writeln!(
            output,
            "{} {}",
            console::style("Completed:").dim(),
            format_timestamp(completed)
        )?;
    }
    if let Some(target) = &view.current_target {
        writeln!(output, "{} {target}", console::style("Current:").dim())?;
    }
    if let Some(error) = &view.last_error {
        writeln!(output, "{} {error}", console::style("Last error:").red())?;
    }

    if !view.results.is_empty() {
        writeln!(output)?;
        let mut table = styled_table();
        table.set_header(vec![
            header("Project"),
            header("Branch"),
            header("Status"),
            header("New commits"),
            header("Processed at"),
            header("Error"),
        ]);
        apply_column_padding(&mut table, (0, 3));

        for result in &view.results {
            table.add_row(vec![
                result.project_id.to_string(),
                result.branch_name.clone(),
                styled_target_status(result.status),
                result
                    .new_commits_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                result
                    .processed_at
                    .as_deref()
                    .map(format_timestamp)
                    .unwrap_or_else(|| "-".to_string()),
                result
                    .error_message
                    .as_deref()
                    .map(|e| truncate(e, 60))
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }
        write!(output, "{table}")?;
    }

    Ok(output)
}

pub fn print_view(view: &RunView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(view)?);
        return Ok(());
    }
    print_with_pager(&format_view(view)?)?;
    Ok(())
}

fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
    if !visible {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    }
    let style = ProgressStyle::default_bar()
        .template("{bar:30.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}

fn bar_message(view: &RunView) -> String {
    let mut message = format!(
        "success: {}, failed: {}",
        view.success_count, view.failed_count
    );
    if view.status == Some(LocalStatus::Cancelling) {
        message.push_str(" (cancelling)");
    } else if let Some(target) = &view.current_target {
        message.push_str(&format!(" | {target}"));
    }
    message
}

/// Follow the tracked run until a pull reports it terminal. Pushed events
/// redraw the bar; every `poll_interval` a pull fills in anything the push
/// channel missed.
pub async fn watch<T: Transport>(
    controller: &RunController<T>,
    poll_interval: Duration,
    json: bool,
) -> Result<WatchOutcome> {
    let mut updates = controller.watch();
    let visible = !json && std::io::stderr().is_terminal();
    let bar = progress_bar(controller.view().total_targets, visible);

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ctrl_c_armed = true;

    loop {
        let view = controller.view();
        bar.set_length(view.total_targets);
        bar.set_position(view.completed_count);
        bar.set_message(bar_message(&view));

        if view.is_terminal() {
            bar.finish_and_clear();
            return Ok(WatchOutcome::Finished(view));
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    bar.abandon();
                    return Ok(WatchOutcome::Detached(controller.view()));
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = controller.refresh().await {
                    tracing::warn!(error = %err, "status pull failed; will retry");
                }
            }
            signal = &mut ctrl_c, if ctrl_c_armed => {
                match signal {
                    Ok(()) => {
                        bar.abandon();
                        return Ok(WatchOutcome::Detached(controller.view()));
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "ctrl-c handler unavailable");
                        ctrl_c_armed = false;
                    }
                }
            }
        }
    }
}
