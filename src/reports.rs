use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::expenses::get_expenses;
use crate::models::{ExpenseFilter, ExpenseRow};
use crate::store::Store;

// ---------------------------------------------------------------------------
// Category / subcategory totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryTotal {
    pub subcategory_id: Option<String>,
    pub subcategory_name: String,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category_id: Option<String>,
    pub category_name: String,
    pub total_amount: f64,
    /// Share of the grand total, 0-100.
    pub percent: f64,
    pub subcategory_totals: Vec<SubcategoryTotal>,
}

fn by_name(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Groups rows by category and then subcategory, summing amounts.
///
/// Categories come out ordered by name, subcategories by name within their
/// category. Ids break name ties so that every group is contiguous after the
/// sort, which is what lets a single pass do the grouping.
pub fn expense_totals(rows: &[ExpenseRow]) -> Vec<CategoryTotal> {
    let mut sorted: Vec<&ExpenseRow> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        by_name(&a.category_name, &b.category_name)
            .then_with(|| a.expense.category_id.cmp(&b.expense.category_id))
            .then_with(|| by_name(&a.subcategory_name, &b.subcategory_name))
            .then_with(|| a.expense.subcategory_id.cmp(&b.expense.subcategory_id))
    });

    let mut totals: Vec<CategoryTotal> = Vec::new();
    let mut grand_total = 0.0f64;

    for row in sorted {
        let exp = &row.expense;
        grand_total += exp.amount;

        let same_category = totals
            .last()
            .is_some_and(|t| t.category_id == exp.category_id);
        if !same_category {
            totals.push(CategoryTotal {
                category_id: exp.category_id.clone(),
                category_name: row.category_name.clone(),
                total_amount: 0.0,
                percent: 0.0,
                subcategory_totals: Vec::new(),
            });
        }
        let Some(current) = totals.last_mut() else {
            continue;
        };
        current.total_amount += exp.amount;

        match current.subcategory_totals.last_mut() {
            Some(sub) if sub.subcategory_id == exp.subcategory_id => sub.total_amount += exp.amount,
            _ => current.subcategory_totals.push(SubcategoryTotal {
                subcategory_id: exp.subcategory_id.clone(),
                subcategory_name: row.subcategory_name.clone(),
                total_amount: exp.amount,
            }),
        }
    }

    if grand_total != 0.0 {
        for t in &mut totals {
            t.percent = t.total_amount / grand_total * 100.0;
        }
    }
    totals
}

// ---------------------------------------------------------------------------
// Monthly time series
// ---------------------------------------------------------------------------

/// One chart line: `(epoch millis of the first of the month, total)` points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub data: Vec<(i64, f64)>,
}

fn month_start_millis(year: i32, month: u32) -> i64 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Per-category monthly totals, one series per category ordered by
/// category id, points ordered by month.
pub fn expense_time_series(rows: &[ExpenseRow]) -> Vec<Series> {
    // (category id, year, month) -> (category name, total)
    let mut buckets: BTreeMap<(String, i32, u32), (String, f64)> = BTreeMap::new();
    for row in rows {
        let exp = &row.expense;
        let key = (
            exp.category_id.clone().unwrap_or_default(),
            exp.trx_year,
            exp.trx_month,
        );
        let entry = buckets
            .entry(key)
            .or_insert_with(|| (row.category_name.clone(), 0.0));
        entry.1 += exp.amount;
    }

    let mut series: Vec<Series> = Vec::new();
    let mut prev_category: Option<String> = None;
    for ((category_id, year, month), (category_name, total)) in buckets {
        let point = (month_start_millis(year, month), round2(total));
        if prev_category.as_deref() == Some(category_id.as_str()) {
            if let Some(current) = series.last_mut() {
                current.data.push(point);
            }
            continue;
        }
        let name = if category_name.is_empty() {
            "Unknown".to_string()
        } else {
            category_name
        };
        series.push(Series {
            name,
            data: vec![point],
        });
        prev_category = Some(category_id);
    }
    series
}

// ---------------------------------------------------------------------------
// Month totals (dashboard)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonthTotal {
    pub year: i32,
    pub month: u32,
    pub total: f64,
}

pub fn monthly_totals(rows: &[ExpenseRow]) -> Vec<MonthTotal> {
    let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for row in rows {
        *by_month
            .entry((row.expense.trx_year, row.expense.trx_month))
            .or_default() += row.expense.amount;
    }
    by_month
        .into_iter()
        .map(|((year, month), total)| MonthTotal { year, month, total })
        .collect()
}

// ---------------------------------------------------------------------------
// Store-backed wrappers
// ---------------------------------------------------------------------------

pub fn get_expense_totals(store: &Store, filter: &ExpenseFilter) -> Result<Vec<CategoryTotal>> {
    let rows = get_expenses(store, filter)
        .inspect_err(|e| tracing::error!(error = %e, "get_expense_totals failed"))?;
    Ok(expense_totals(&rows))
}

pub fn get_expense_time_series(store: &Store, filter: &ExpenseFilter) -> Result<Vec<Series>> {
    let rows = get_expenses(store, filter)
        .inspect_err(|e| tracing::error!(error = %e, "get_expense_time_series failed"))?;
    Ok(expense_time_series(&rows))
}
