use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::categories::{find_category_by_name, get_category_info};
use crate::cli::{resolve_id, session, short_id, FilterArgs};
use crate::error::{Result, TrackerError};
use crate::expenses::{delete_expense, get_expense, get_expenses, save_expense};
use crate::fmt::{amount, row_count};
use crate::models::{Expense, ExpenseRow};
use crate::store::{Collection, Store};

/// Resolves category and subcategory names to ids.
fn resolve_category(
    store: &Store,
    category: Option<&str>,
    subcategory: Option<&str>,
) -> Result<(Option<String>, Option<String>)> {
    match (category, subcategory) {
        (None, None) => Ok((None, None)),
        (None, Some(_)) => Err(TrackerError::Other(
            "--subcategory requires --category".to_string(),
        )),
        (Some(cat_name), sub_name) => {
            let cat = find_category_by_name(store, cat_name)?;
            let sub_id = match sub_name {
                Some(name) => Some(
                    cat.find_subcategory(name)
                        .ok_or_else(|| TrackerError::UnknownSubcategory(format!("{} / {name}", cat.name)))?
                        .id
                        .clone(),
                ),
                None => None,
            };
            Ok((Some(cat.id), sub_id))
        }
    }
}

pub fn format_expenses(rows: &[ExpenseRow]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Category", "Subcategory", "Amount"]);
    let mut total = 0.0;
    for row in rows {
        let exp = &row.expense;
        total += exp.amount;
        table.add_row(vec![
            Cell::new(short_id(&exp.id)),
            Cell::new(&exp.trx_date),
            Cell::new(&exp.description),
            Cell::new(&row.category_name),
            Cell::new(&row.subcategory_name),
            Cell::new(amount(exp.amount)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(amount(total)).set_alignment(CellAlignment::Right),
    ]);
    format!("Expenses\n{table}\n{}", row_count(rows.len()))
}

pub fn list(filter: &FilterArgs) -> Result<()> {
    let store = session()?;
    let mut rows = get_expenses(&store, &filter.to_filter(&store)?)?;
    rows.sort_by(|a, b| {
        a.expense
            .trx_date
            .cmp(&b.expense.trx_date)
            .then_with(|| a.expense.description.cmp(&b.expense.description))
    });
    println!("{}", format_expenses(&rows));
    Ok(())
}

pub fn add(
    date: &str,
    description: &str,
    amount_value: f64,
    category: Option<&str>,
    subcategory: Option<&str>,
) -> Result<()> {
    let store = session()?;
    let (category_id, subcategory_id) = resolve_category(&store, category, subcategory)?;
    let expense = save_expense(
        &store,
        Expense {
            id: String::new(),
            category_id,
            subcategory_id,
            import_id: None,
            trx_date: date.trim().to_string(),
            trx_year: 0,
            trx_month: 0,
            description: description.trim().to_string(),
            amount: amount_value,
        },
    )?;
    println!(
        "Added expense {}: {} {} {}",
        short_id(&expense.id),
        expense.trx_date,
        expense.description,
        amount(expense.amount)
    );
    Ok(())
}

pub struct ExpenseEdit<'a> {
    pub date: Option<&'a str>,
    pub description: Option<&'a str>,
    pub amount: Option<f64>,
    pub category: Option<&'a str>,
    pub subcategory: Option<&'a str>,
    pub uncategorize: bool,
}

pub fn edit(id: &str, changes: ExpenseEdit<'_>) -> Result<()> {
    let store = session()?;
    let id = resolve_id(&store, Collection::Expenses, id)?;
    let mut expense = get_expense(&store, &id)?;

    if let Some(date) = changes.date {
        expense.trx_date = date.trim().to_string();
    }
    if let Some(description) = changes.description {
        expense.description = description.trim().to_string();
    }
    if let Some(value) = changes.amount {
        expense.amount = value;
    }
    if changes.uncategorize {
        expense.category_id = None;
        expense.subcategory_id = None;
    } else if changes.category.is_some() {
        let (category_id, subcategory_id) =
            resolve_category(&store, changes.category, changes.subcategory)?;
        expense.category_id = category_id;
        expense.subcategory_id = subcategory_id;
    } else if let Some(sub_name) = changes.subcategory {
        // Subcategory alone: look it up under the expense's current category.
        let category_id = expense
            .category_id
            .clone()
            .ok_or_else(|| TrackerError::Other("--subcategory requires --category".to_string()))?;
        let info = get_category_info(&store)?;
        let cat = info
            .category_map
            .get(&category_id)
            .ok_or_else(|| TrackerError::UnknownCategory(category_id.clone()))?;
        let sub = cat
            .find_subcategory(sub_name)
            .ok_or_else(|| TrackerError::UnknownSubcategory(format!("{} / {sub_name}", cat.name)))?;
        expense.subcategory_id = Some(sub.id.clone());
    }

    let expense = save_expense(&store, expense)?;
    println!("Updated expense {}", short_id(&expense.id));
    Ok(())
}

pub fn delete(id: &str) -> Result<()> {
    let store = session()?;
    let id = resolve_id(&store, Collection::Expenses, id)?;
    let expense = get_expense(&store, &id)?;
    delete_expense(&store, &id)?;
    println!(
        "Deleted expense {}: {} {}",
        short_id(&id),
        expense.trx_date,
        expense.description
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{add_subcategory, create_category};
    use crate::store::test_store;

    #[test]
    fn test_resolve_category_by_name() {
        let (_dir, store) = test_store();
        let auto = create_category(&store, "Auto").unwrap();
        let gas = add_subcategory(&store, &auto.id, "Gas").unwrap();

        let (cat, sub) = resolve_category(&store, Some("auto"), Some("GAS")).unwrap();
        assert_eq!(cat.as_deref(), Some(auto.id.as_str()));
        assert_eq!(sub.as_deref(), Some(gas.id.as_str()));

        let (cat, sub) = resolve_category(&store, Some("Auto"), None).unwrap();
        assert!(cat.is_some());
        assert!(sub.is_none());

        assert_eq!(resolve_category(&store, None, None).unwrap(), (None, None));
        assert!(resolve_category(&store, None, Some("Gas")).is_err());
        assert!(matches!(
            resolve_category(&store, Some("Auto"), Some("Tires")),
            Err(TrackerError::UnknownSubcategory(_))
        ));
        assert!(matches!(
            resolve_category(&store, Some("Travel"), None),
            Err(TrackerError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_format_expenses_lists_rows_and_total() {
        let row = ExpenseRow {
            expense: Expense {
                id: "0123456789".to_string(),
                category_id: None,
                subcategory_id: None,
                import_id: None,
                trx_date: "2024-03-04".to_string(),
                trx_year: 2024,
                trx_month: 3,
                description: "COSTCO WHSE".to_string(),
                amount: 1234.5,
            },
            category_name: "Groceries".to_string(),
            subcategory_name: "Costco".to_string(),
        };
        let out = format_expenses(&[row.clone(), row]);
        assert!(out.contains("01234567"));
        assert!(!out.contains("0123456789"));
        assert!(out.contains("COSTCO WHSE"));
        assert!(out.contains("1,234.50"));
        assert!(out.contains("2,469.00"));
        assert!(out.ends_with("2 rows"));
    }
}
