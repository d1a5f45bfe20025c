use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: String,
    pub name: String,
    /// Description fragments that identify this subcategory on import.
    #[serde(default)]
    pub match_text: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

/// Case-insensitive name comparison shared by every name lookup and
/// uniqueness check.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl Category {
    pub fn find_subcategory(&self, name: &str) -> Option<&Subcategory> {
        self.subcategories
            .iter()
            .find(|s| same_name(&s.name, name))
    }
}

/// An (id, name) pair for category pickers.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOption {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub subcategory_id: Option<String>,
    #[serde(default)]
    pub import_id: Option<String>,
    /// Always `YYYY-MM-DD`, so string comparison is date order.
    pub trx_date: String,
    #[serde(default)]
    pub trx_year: i32,
    #[serde(default)]
    pub trx_month: u32,
    pub description: String,
    pub amount: f64,
}

impl Expense {
    /// Recomputes `trx_year` and `trx_month` from `trx_date`.
    pub fn derive_period(&mut self) -> Result<()> {
        let date = parse_iso_date(&self.trx_date)?;
        self.trx_year = date.year();
        self.trx_month = date.month();
        Ok(())
    }
}

/// An expense with its category and subcategory names resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRow {
    #[serde(flatten)]
    pub expense: Expense,
    pub category_name: String,
    pub subcategory_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub import_date: String,
    pub file_name: String,
    #[serde(default)]
    pub description: String,
    pub record_count: usize,
    #[serde(default)]
    pub date_format: String,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Inclusive `YYYY-MM-DD` bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

impl DateRange {
    pub fn new(start_date: &str, end_date: &str) -> Result<Self> {
        parse_iso_date(start_date)?;
        parse_iso_date(end_date)?;
        Ok(Self {
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
        })
    }

    /// January 1st of the current year through today.
    pub fn year_to_date() -> Self {
        let today = Local::now().date_naive();
        let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        Self {
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: today.format("%Y-%m-%d").to_string(),
        }
    }

    /// Either bound may be omitted; missing bounds fall back to year-to-date.
    pub fn from_options(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let ytd = Self::year_to_date();
        Self::new(
            from.unwrap_or(&ytd.start_date),
            to.unwrap_or(&ytd.end_date),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseFilter {
    pub range: DateRange,
    pub category_ids: Vec<String>,
}

impl ExpenseFilter {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            category_ids: Vec::new(),
        }
    }
}

pub fn parse_iso_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| TrackerError::InvalidDate {
        value: raw.to_string(),
        format: "YYYY-MM-DD".to_string(),
    })
}
