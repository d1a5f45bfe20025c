use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{session, FilterArgs};
use crate::error::Result;
use crate::expenses::{get_expenses, get_uncategorized};
use crate::fmt::{amount, bar};
use crate::reports::{expense_totals, monthly_totals, MonthTotal};

const BAR_WIDTH: usize = 30;
const TOP_CATEGORIES: usize = 5;

fn month_name(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|| format!("{year}-{month:02}"))
}

pub fn format_months(months: &[MonthTotal]) -> String {
    let max = months.iter().map(|m| m.total).fold(0.0, f64::max);
    let mut table = Table::new();
    table.set_header(vec!["Month", "Spent", ""]);
    for m in months {
        table.add_row(vec![
            Cell::new(month_name(m.year, m.month)),
            Cell::new(amount(m.total)).set_alignment(CellAlignment::Right),
            Cell::new(bar(m.total, max, BAR_WIDTH).cyan()),
        ]);
    }
    format!("Monthly Spending\n{table}")
}

pub fn run(filter: &FilterArgs) -> Result<()> {
    let store = session()?;
    let filter = filter.to_filter(&store)?;
    let rows = get_expenses(&store, &filter)?;

    let total: f64 = rows.iter().map(|r| r.expense.amount).sum();
    println!(
        "{} to {}: {} across {} expenses",
        filter.range.start_date,
        filter.range.end_date,
        amount(total).bold(),
        rows.len()
    );

    let months = monthly_totals(&rows);
    if !months.is_empty() {
        let average = total / months.len() as f64;
        println!("Monthly average: {}", amount(average));
        println!();
        println!("{}", format_months(&months));
    }

    let mut totals = expense_totals(&rows);
    totals.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));
    if !totals.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Top Categories", "Amount", "%"]);
        for t in totals.iter().take(TOP_CATEGORIES) {
            let name: &str = if t.category_name.is_empty() { "Uncategorized" } else { &t.category_name };
            table.add_row(vec![
                Cell::new(name),
                Cell::new(amount(t.total_amount)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.1}%", t.percent)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!();
        println!("{table}");
    }

    let uncategorized = get_uncategorized(&store)?.len();
    if uncategorized > 0 {
        println!();
        println!(
            "{}",
            format!("{uncategorized} expenses need a category. Run `spendbook categorize` or add match texts.")
                .yellow()
        );
    }
    Ok(())
}
