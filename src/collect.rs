use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use clap::Args;
use dialoguer::console;
use serde_json::json;

use crate::args::BaseArgs;
use crate::contracts::{commands, CollectCommitsRequest, CollectCommitsResult};
use crate::gateway::{CommandGateway, Transport};
use crate::http;
use crate::ui::{print_command_status, with_spinner, CommandStatus};
use crate::utils::pluralize;

#[derive(Debug, Clone, Args)]
pub struct CollectArgs {
    /// GitLab project id
    #[arg(long)]
    project: i64,

    /// Branch to collect
    #[arg(long)]
    branch: String,

    /// Earliest commit date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    since: Option<String>,

    /// Latest commit date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    until: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Accept a bare date or a full timestamp. Bare dates cover the whole day.
fn parse_bound(raw: &str, bound: Bound) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}' (expected YYYY-MM-DD)"))?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
    };
    Ok(date.and_time(time).and_utc())
}

fn build_request(args: &CollectArgs) -> Result<CollectCommitsRequest> {
    let since = args
        .since
        .as_deref()
        .map(|raw| parse_bound(raw, Bound::Start))
        .transpose()?;
    let until = args
        .until
        .as_deref()
        .map(|raw| parse_bound(raw, Bound::End))
        .transpose()?;

    if let (Some(since), Some(until)) = (since, until) {
        if since > until {
            bail!("--since must not be later than --until");
        }
    }

    let to_wire = |ts: DateTime<Utc>| ts.to_rfc3339_opts(SecondsFormat::Secs, true);
    Ok(CollectCommitsRequest {
        project_id: args.project,
        branch_name: args.branch.clone(),
        since_utc: since.map(to_wire),
        until_utc: until.map(to_wire),
    })
}

pub async fn collect<T: Transport>(
    gateway: &CommandGateway<T>,
    request: &CollectCommitsRequest,
) -> Result<CollectCommitsResult> {
    Ok(gateway
        .invoke(commands::COLLECT_COMMITS, json!({ "request": request }))
        .await?)
}

fn format_result(result: &CollectCommitsResult) -> Result<String> {
    let mut output = String::new();
    let label = |text: &str| console::style(text.to_string()).dim();
    writeln!(output, "{} {}", label("Inserted:"), result.inserted_count)?;
    writeln!(
        output,
        "{} {}",
        label("Skipped duplicates:"),
        result.skipped_duplicate_count
    )?;
    write!(output, "{} {}", label("Missing stats:"), result.missing_stats_count)?;
    if result.missing_stats_count > 0 {
        write!(output, " {}", console::style("(counted as 0)").yellow())?;
    }
    Ok(output)
}

pub async fn run(base: BaseArgs, args: CollectArgs) -> Result<()> {
    let request = build_request(&args)?;
    let gateway = http::connect(&base)?;
    let target = format!("{} / {}", request.project_id, request.branch_name);

    let result = match with_spinner(
        &format!("Collecting commits for {target}..."),
        collect(&gateway, &request),
    )
    .await
    {
        Ok(result) => result,
        Err(err) => {
            print_command_status(CommandStatus::Error, &format!("Failed to collect {target}"));
            return Err(err);
        }
    };
    tracing::info!(
        project_id = request.project_id,
        branch = %request.branch_name,
        inserted = result.inserted_count,
        skipped = result.skipped_duplicate_count,
        "collection finished"
    );

    if base.json {
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }

    let processed = result.inserted_count + result.skipped_duplicate_count;
    print_command_status(
        CommandStatus::Success,
        &format!(
            "Processed {processed} {} for {target}",
            pluralize(processed, "commit", None)
        ),
    );
    println!("{}", format_result(&result)?);
    Ok(())
}
