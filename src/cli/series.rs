use chrono::{DateTime, Utc};
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{session, FilterArgs};
use crate::error::Result;
use crate::fmt::{amount, row_count};
use crate::reports::{get_expense_time_series, Series};

fn month_label(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%b %Y").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// One row per series, one column per month present in any series.
pub fn format_series(series: &[Series]) -> String {
    let mut months: Vec<i64> = series
        .iter()
        .flat_map(|s| s.data.iter().map(|(ts, _)| *ts))
        .collect();
    months.sort_unstable();
    months.dedup();

    let mut header = vec!["Category".to_string()];
    header.extend(months.iter().map(|ts| month_label(*ts)));

    let mut table = Table::new();
    table.set_header(header);
    for s in series {
        let mut row = vec![Cell::new(&s.name)];
        for ts in &months {
            let value = s
                .data
                .iter()
                .find(|(t, _)| t == ts)
                .map(|(_, v)| amount(*v))
                .unwrap_or_default();
            row.push(Cell::new(value).set_alignment(CellAlignment::Right));
        }
        table.add_row(row);
    }
    format!("Monthly Expenses\n{table}\n{}", row_count(series.len()))
}

pub fn run(filter: &FilterArgs, json: bool) -> Result<()> {
    let store = session()?;
    let series = get_expense_time_series(&store, &filter.to_filter(&store)?)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&series)?);
    } else {
        println!("{}", format_series(&series));
    }
    Ok(())
}
