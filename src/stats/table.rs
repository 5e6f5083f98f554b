use std::fmt::Write as _;

use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use dialoguer::console;

use crate::contracts::MonthlyStatsResponse;
use crate::ui::{apply_column_padding, header, styled_table};
use crate::utils::format_count;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_label(month: u32) -> String {
    month
        .checked_sub(1)
        .and_then(|index| MONTH_ABBREVIATIONS.get(index as usize))
        .map(|label| label.to_string())
        .unwrap_or_else(|| month.to_string())
}

pub fn headers(stats: &MonthlyStatsResponse) -> Vec<String> {
    let mut headers = Vec::with_capacity(stats.months.len() + 2);
    headers.push("User".to_string());
    headers.extend(stats.months.iter().map(|m| month_label(*m)));
    headers.push("Total".to_string());
    headers
}

/// Tab-separated table for pasting into spreadsheets. Only display names are
/// written; user keys (emails) never appear.
pub fn to_tsv(stats: &MonthlyStatsResponse) -> String {
    let mut lines = vec![headers(stats).join("\t")];
    for series in &stats.series {
        let mut row = Vec::with_capacity(series.totals.len() + 2);
        row.push(series.display_name.clone());
        row.extend(series.totals.iter().map(|value| format_count(*value)));
        row.push(format_count(series.total()));
        lines.push(row.join("\t"));
    }
    lines.join("\n")
}

pub fn format_table(stats: &MonthlyStatsResponse, title: &str) -> Result<String> {
    let mut output = String::new();
    writeln!(output, "{}\n", console::style(title).bold())?;

    if stats.series.is_empty() {
        writeln!(output, "No commits collected for this period.")?;
        return Ok(output);
    }

    let mut table = styled_table();
    table.set_header(headers(stats).iter().map(|h| header(h)).collect::<Vec<_>>());
    apply_column_padding(&mut table, (0, 2));

    for series in &stats.series {
        let mut row = vec![Cell::new(&series.display_name)];
        row.extend(
            series
                .totals
                .iter()
                .map(|value| Cell::new(format_count(*value)).set_alignment(CellAlignment::Right)),
        );
        row.push(
            Cell::new(format_count(series.total()))
                .set_alignment(CellAlignment::Right)
                .add_attribute(comfy_table::Attribute::Bold),
        );
        table.add_row(row);
    }
    write!(output, "{table}")?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::UserMonthlySeries;

    fn stats() -> MonthlyStatsResponse {
        MonthlyStatsResponse {
            months: vec![1, 2, 3],
            series: vec![
                UserMonthlySeries {
                    user_key: "alice@example.com".into(),
                    display_name: "Alice".into(),
                    totals: vec![1200, 0, 35],
                    missing_counts: vec![0, 0, 1],
                },
                UserMonthlySeries {
                    user_key: "bob@example.com".into(),
                    display_name: "Bob".into(),
                    totals: vec![5, 10, 15],
                    missing_counts: vec![],
                },
            ],
        }
    }

    #[test]
    fn tsv_has_header_and_rows() {
        let tsv = to_tsv(&stats());
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines[0], "User\tJan\tFeb\tMar\tTotal");
        assert_eq!(lines[1], "Alice\t1,200\t0\t35\t1,235");
        assert_eq!(lines[2], "Bob\t5\t10\t15\t30");
    }

    #[test]
    fn tsv_never_contains_user_keys() {
        let tsv = to_tsv(&stats());
        assert!(!tsv.contains("alice@example.com"));
        assert!(!tsv.contains("bob@example.com"));
    }

    #[test]
    fn full_year_uses_month_abbreviations() {
        let stats = MonthlyStatsResponse {
            months: (1..=12).collect(),
            series: vec![],
        };
        let headers = headers(&stats);
        assert_eq!(headers.len(), 14);
        assert_eq!(headers[1], "Jan");
        assert_eq!(headers[12], "Dec");
        assert_eq!(headers[13], "Total");
    }

    #[test]
    fn empty_series_renders_notice() {
        let output = format_table(&MonthlyStatsResponse::default(), "Cross view 2026").unwrap();
        assert!(output.contains("No commits collected"));
    }

    #[test]
    fn table_lists_display_names() {
        console::set_colors_enabled(false);
        let output = format_table(&stats(), "web / main 2026").unwrap();
        assert!(output.contains("Alice"));
        assert!(output.contains("1,235"));
        assert!(!output.contains("alice@example.com"));
    }
}
