use serde_json::Value;
use uuid::Uuid;

use crate::categories::{category_map, get_categories, subcategory_map};
use crate::error::{Result, TrackerError};
use crate::models::{Expense, ExpenseFilter, ExpenseRow};
use crate::store::{Collection, Query, Store};

/// Expenses dated within the filter range (and, when given, in one of the
/// filter's categories), with category and subcategory names resolved.
pub fn get_expenses(store: &Store, filter: &ExpenseFilter) -> Result<Vec<ExpenseRow>> {
    let categories = get_categories(store)?;
    let categories_by_id = category_map(&categories);
    let subcategories_by_id = subcategory_map(&categories);

    let mut query = Query::new(Collection::Expenses)
        .where_gte("trxDate", filter.range.start_date.as_str())
        .where_lte("trxDate", filter.range.end_date.as_str());
    if !filter.category_ids.is_empty() {
        query = query.where_in("categoryId", filter.category_ids.iter().map(String::as_str));
    }

    let expenses: Vec<Expense> = store
        .get_docs(&query)
        .inspect_err(|e| tracing::error!(error = %e, "get_expenses failed"))?;

    let rows = expenses
        .into_iter()
        .map(|expense| {
            let category_name = expense
                .category_id
                .as_ref()
                .and_then(|id| categories_by_id.get(id))
                .map(|c| c.name.clone())
                .unwrap_or_default();
            // A subcategory name is only meaningful under a resolved category.
            let subcategory_name = if category_name.is_empty() {
                String::new()
            } else {
                expense
                    .subcategory_id
                    .as_ref()
                    .and_then(|id| subcategories_by_id.get(id))
                    .map(|s| s.name.clone())
                    .unwrap_or_default()
            };
            ExpenseRow {
                expense,
                category_name,
                subcategory_name,
            }
        })
        .collect();
    Ok(rows)
}

pub fn get_expense(store: &Store, id: &str) -> Result<Expense> {
    store
        .get_doc(Collection::Expenses, id)?
        .ok_or_else(|| TrackerError::NotFound {
            collection: Collection::Expenses.name().to_string(),
            id: id.to_string(),
        })
}

/// Expenses that have no category yet.
pub fn get_uncategorized(store: &Store) -> Result<Vec<Expense>> {
    store.get_docs(&Query::new(Collection::Expenses).where_eq("categoryId", Value::Null))
}

fn validate(expense: &Expense) -> Result<()> {
    if expense.trx_date.trim().is_empty() {
        return Err(TrackerError::Required("date"));
    }
    if expense.description.trim().is_empty() {
        return Err(TrackerError::Required("description"));
    }
    if !expense.amount.is_finite() {
        return Err(TrackerError::Required("amount"));
    }
    Ok(())
}

/// Creates the expense when it has no id yet, otherwise updates it.
pub fn save_expense(store: &Store, expense: Expense) -> Result<Expense> {
    if expense.id.is_empty() {
        create_expense(store, expense)
    } else {
        update_expense(store, expense)
    }
}

pub fn create_expense(store: &Store, mut expense: Expense) -> Result<Expense> {
    validate(&expense)?;
    expense.id = Uuid::new_v4().to_string();
    expense.derive_period()?;
    store
        .set_doc(Collection::Expenses, &expense.id, &expense)
        .inspect_err(|e| tracing::error!(error = %e, "create_expense failed"))?;
    Ok(expense)
}

pub fn update_expense(store: &Store, mut expense: Expense) -> Result<Expense> {
    validate(&expense)?;
    get_expense(store, &expense.id)?;
    expense.derive_period()?;
    store
        .set_doc(Collection::Expenses, &expense.id, &expense)
        .inspect_err(|e| tracing::error!(error = %e, "update_expense failed"))?;
    Ok(expense)
}

pub fn delete_expense(store: &Store, id: &str) -> Result<()> {
    store
        .delete_doc(Collection::Expenses, id)
        .inspect_err(|e| tracing::error!(error = %e, "delete_expense failed"))
}

/// Deletes an import summary and every expense it created, atomically.
/// Returns the number of expenses removed.
pub fn delete_expenses_by_import_id(store: &Store, import_id: &str) -> Result<usize> {
    let expenses: Vec<Expense> =
        store.get_docs(&Query::new(Collection::Expenses).where_eq("importId", import_id))?;

    let mut batch = store.batch();
    batch.delete(Collection::Imports, import_id);
    for exp in &expenses {
        batch.delete(Collection::Expenses, &exp.id);
    }
    batch
        .commit()
        .inspect_err(|e| tracing::error!(error = %e, import_id, "delete_expenses_by_import_id failed"))?;
    Ok(expenses.len())
}

pub fn is_category_in_use(store: &Store, category_id: &str) -> Result<bool> {
    store.exists(&Query::new(Collection::Expenses).where_eq("categoryId", category_id))
}

pub fn is_subcategory_in_use(store: &Store, subcategory_id: &str) -> Result<bool> {
    store.exists(&Query::new(Collection::Expenses).where_eq("subcategoryId", subcategory_id))
}

#[cfg(test)]
pub(crate) fn new_expense(date: &str, description: &str, amount: f64) -> Expense {
    Expense {
        id: String::new(),
        category_id: None,
        subcategory_id: None,
        import_id: None,
        trx_date: date.to_string(),
        trx_year: 0,
        trx_month: 0,
        description: description.to_string(),
        amount,
    }
}
