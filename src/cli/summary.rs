use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{session, FilterArgs};
use crate::error::Result;
use crate::fmt::{amount, row_count};
use crate::reports::{get_expense_totals, CategoryTotal};

fn label(name: &str) -> &str {
    if name.is_empty() {
        "Uncategorized"
    } else {
        name
    }
}

pub fn format_summary(totals: &[CategoryTotal]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount", "%"]);
    let mut grand_total = 0.0;
    for cat in totals {
        grand_total += cat.total_amount;
        table.add_row(vec![
            Cell::new(label(&cat.category_name).bold()),
            Cell::new(amount(cat.total_amount)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}%", cat.percent)).set_alignment(CellAlignment::Right),
        ]);
        // Expenses without a subcategory fold into the category line.
        for sub in cat.subcategory_totals.iter().filter(|s| !s.subcategory_name.is_empty()) {
            table.add_row(vec![
                Cell::new(format!("  {}", sub.subcategory_name)),
                Cell::new(amount(sub.total_amount)).set_alignment(CellAlignment::Right),
                Cell::new(""),
            ]);
        }
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(amount(grand_total)).set_alignment(CellAlignment::Right),
        Cell::new(""),
    ]);
    format!("Expense Summary\n{table}\n{}", row_count(totals.len()))
}

pub fn run(filter: &FilterArgs) -> Result<()> {
    let store = session()?;
    let filter = filter.to_filter(&store)?;
    let totals = get_expense_totals(&store, &filter)?;
    println!(
        "{} to {}",
        filter.range.start_date, filter.range.end_date
    );
    println!("{}", format_summary(&totals));
    Ok(())
}
