use std::fmt::Write as _;

use anyhow::Result;
use dialoguer::console;

use crate::contracts::Branch;
use crate::gateway::{CommandGateway, Transport};
use crate::ui::{apply_column_padding, header, print_with_pager, styled_table, with_spinner};

use super::api;

pub async fn run<T: Transport>(
    gateway: &CommandGateway<T>,
    project_id: i64,
    json: bool,
) -> Result<()> {
    let mut branches =
        with_spinner("Loading branches...", api::list_branches(gateway, project_id)).await?;

    if json {
        println!("{}", serde_json::to_string(&branches)?);
        return Ok(());
    }

    sort_default_first(&mut branches);

    let mut output = String::new();
    writeln!(
        output,
        "{} branches in project {}\n",
        console::style(branches.len()).bold(),
        project_id
    )?;

    let mut table = styled_table();
    table.set_header(vec![header("Branch"), header("Default")]);
    apply_column_padding(&mut table, (0, 4));
    for branch in &branches {
        let marker = if branch.is_default() { "*" } else { "" };
        table.add_row(vec![branch.name.as_str(), marker]);
    }
    write!(output, "{table}")?;

    print_with_pager(&output)?;
    Ok(())
}

fn sort_default_first(branches: &mut [Branch]) {
    branches.sort_by(|a, b| {
        b.is_default()
            .cmp(&a.is_default())
            .then_with(|| a.name.cmp(&b.name))
    });
}
