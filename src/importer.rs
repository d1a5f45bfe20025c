use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Local, NaiveDate};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::categories::get_categories;
use crate::categorizer::match_subcategory;
use crate::error::{Result, TrackerError};
use crate::expenses::delete_expenses_by_import_id;
use crate::models::{DateRange, Expense, ImportSummary};
use crate::store::{Collection, Query, Store};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parses a money cell: `$`, thousands separators and quotes are dropped,
/// `(12.34)` is negative. `None` when nothing numeric is left.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace(|c: char| matches!(c, ',' | '"' | '$'), "");
    let s = s.trim();
    let value = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => inner.trim().parse::<f64>().ok().map(|v| -v),
        None => s.parse::<f64>().ok(),
    };
    value.filter(|v| v.is_finite())
}

fn format_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"YYYY|YY|MM|M|DD|D").expect("static pattern"))
}

/// Translates a `YYYY-MM-DD` style pattern into a chrono format string.
/// Everything other than the year, month and day tokens is literal.
pub fn to_chrono_format(pattern: &str) -> String {
    let escaped = pattern.replace('%', "%%");
    format_token_regex()
        .replace_all(&escaped, |caps: &Captures| match &caps[0] {
            "YYYY" => "%Y",
            "YY" => "%y",
            "MM" | "M" => "%m",
            _ => "%d",
        })
        .into_owned()
}

/// Parses `raw` with a `MM/DD/YYYY` style pattern into `YYYY-MM-DD`.
pub fn parse_date(raw: &str, pattern: &str) -> Result<String> {
    NaiveDate::parse_from_str(raw.trim(), &to_chrono_format(pattern))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| TrackerError::InvalidDate {
            value: raw.to_string(),
            format: pattern.to_string(),
        })
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// CSV layout
// ---------------------------------------------------------------------------

/// A CSV column, addressed by header text or zero-based position.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Name(String),
    Index(usize),
}

impl FromStr for Column {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().parse::<usize>() {
            Ok(i) => Self::Index(i),
            Err(_) => Self::Name(s.trim().to_string()),
        })
    }
}

impl Column {
    fn resolve(&self, headers: Option<&csv::StringRecord>) -> Result<usize> {
        match (self, headers) {
            (Self::Index(i), _) => Ok(*i),
            (Self::Name(name), Some(headers)) => headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| TrackerError::Other(format!("Column not found in CSV header: {name}"))),
            (Self::Name(name), None) => Err(TrackerError::Other(format!(
                "Column '{name}' given by name but the file has no header row"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvLayout {
    pub date_column: Column,
    pub description_column: Column,
    pub amount_column: Column,
    pub has_headers: bool,
    /// Flip the sign of every amount, for exports that list charges as negatives.
    pub negate: bool,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            date_column: Column::Name("Date".to_string()),
            description_column: Column::Name("Description".to_string()),
            amount_column: Column::Name("Amount".to_string()),
            has_headers: true,
            negate: false,
        }
    }
}

/// One CSV line before any normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub trx_date: String,
    pub description: String,
    pub amount: String,
}

pub fn parse_csv(file_path: &Path, layout: &CsvLayout) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(layout.has_headers)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let headers = if layout.has_headers {
        Some(rdr.headers()?.clone())
    } else {
        None
    };
    let idx_date = layout.date_column.resolve(headers.as_ref())?;
    let idx_desc = layout.description_column.resolve(headers.as_ref())?;
    let idx_amount = layout.amount_column.resolve(headers.as_ref())?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let field = |i: usize| record.get(i).map(str::trim).unwrap_or("").to_string();
        let row = RawRow {
            trx_date: field(idx_date),
            description: field(idx_desc),
            amount: field(idx_amount),
        };
        if row.trx_date.is_empty() && row.description.is_empty() && row.amount.is_empty() {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Turns raw rows into unsaved expenses. Rows whose date or amount cannot be
/// read, or that lack a description, are skipped; the count is returned.
pub fn normalize_rows(rows: &[RawRow], date_format: &str, negate: bool) -> (Vec<Expense>, usize) {
    let mut expenses = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for row in rows {
        let Ok(trx_date) = parse_date(&row.trx_date, date_format) else {
            tracing::warn!(value = %row.trx_date, format = date_format, "skipping row with unreadable date");
            skipped += 1;
            continue;
        };
        let Some(amount) = parse_amount(&row.amount).filter(|v| v.is_finite()) else {
            tracing::warn!(value = %row.amount, "skipping row with unreadable amount");
            skipped += 1;
            continue;
        };
        if row.description.is_empty() {
            skipped += 1;
            continue;
        }
        let mut exp = Expense {
            id: String::new(),
            category_id: None,
            subcategory_id: None,
            import_id: None,
            trx_date,
            trx_year: 0,
            trx_month: 0,
            description: row.description.clone(),
            amount: if negate { -amount } else { amount },
        };
        if exp.derive_period().is_err() {
            skipped += 1;
            continue;
        }
        expenses.push(exp);
    }
    (expenses, skipped)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ImportDetails {
    pub file_name: String,
    pub description: String,
    pub date_format: String,
    pub checksum: Option<String>,
}

/// Writes the import summary and all of its expenses as one batch. Every
/// expense gets a fresh id and the summary's id as `import_id`.
pub fn import_expenses(
    store: &Store,
    expenses: Vec<Expense>,
    details: &ImportDetails,
) -> Result<ImportSummary> {
    let summary = ImportSummary {
        id: Uuid::new_v4().to_string(),
        import_date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
        file_name: details.file_name.clone(),
        description: details.description.clone(),
        record_count: expenses.len(),
        date_format: details.date_format.clone(),
        checksum: details.checksum.clone(),
    };

    let mut batch = store.batch();
    batch.set(Collection::Imports, &summary.id, &summary)?;
    for mut exp in expenses {
        exp.id = Uuid::new_v4().to_string();
        exp.import_id = Some(summary.id.clone());
        batch.set(Collection::Expenses, &exp.id, &exp)?;
    }
    batch
        .commit()
        .inspect_err(|e| tracing::error!(error = %e, file = %summary.file_name, "import_expenses failed"))?;
    Ok(summary)
}

pub struct ImportResult {
    pub summary: Option<ImportSummary>,
    pub imported: usize,
    pub skipped: usize,
    pub categorized: usize,
    pub duplicate_file: bool,
}

/// Parses, normalizes, auto-categorizes and stores a CSV export.
/// A file whose checksum matches an earlier import is refused unless `force`.
pub fn import_file(
    store: &Store,
    file_path: &Path,
    layout: &CsvLayout,
    description: &str,
    date_format: &str,
    force: bool,
) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    if !force {
        let seen = store.exists(&Query::new(Collection::Imports).where_eq("checksum", checksum.as_str()))?;
        if seen {
            return Ok(ImportResult {
                summary: None,
                imported: 0,
                skipped: 0,
                categorized: 0,
                duplicate_file: true,
            });
        }
    }

    let raw = parse_csv(file_path, layout)?;
    let (mut expenses, skipped) = normalize_rows(&raw, date_format, layout.negate);

    let categories = get_categories(store)?;
    let mut categorized = 0usize;
    for exp in &mut expenses {
        if let Some((cat_id, sub_id)) = match_subcategory(&categories, &exp.description) {
            exp.category_id = Some(cat_id.to_string());
            exp.subcategory_id = Some(sub_id.to_string());
            categorized += 1;
        }
    }

    let details = ImportDetails {
        file_name: file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string(),
        description: description.to_string(),
        date_format: date_format.to_string(),
        checksum: Some(checksum),
    };
    let imported = expenses.len();
    let summary = import_expenses(store, expenses, &details)?;
    tracing::info!(file = %summary.file_name, imported, skipped, "import finished");

    Ok(ImportResult {
        summary: Some(summary),
        imported,
        skipped,
        categorized,
        duplicate_file: false,
    })
}

/// Import summaries whose import date falls within `range`, oldest first.
pub fn get_imports(store: &Store, range: &DateRange) -> Result<Vec<ImportSummary>> {
    let mut imports: Vec<ImportSummary> = store
        .get_docs(
            &Query::new(Collection::Imports)
                .where_gte("importDate", range.start_date.as_str())
                .where_lte("importDate", range.end_date.as_str()),
        )
        .inspect_err(|e| tracing::error!(error = %e, "get_imports failed"))?;
    imports.sort_by(|a, b| {
        a.import_date
            .cmp(&b.import_date)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    Ok(imports)
}

/// Removes an import summary together with every expense it created.
pub fn delete_import(store: &Store, import_id: &str) -> Result<usize> {
    let existing: Option<ImportSummary> = store.get_doc(Collection::Imports, import_id)?;
    if existing.is_none() {
        return Err(TrackerError::NotFound {
            collection: Collection::Imports.name().to_string(),
            id: import_id.to_string(),
        });
    }
    delete_expenses_by_import_id(store, import_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{add_match_text, add_subcategory, create_category};
    use crate::expenses::{get_expenses, new_expense, save_expense};
    use crate::models::ExpenseFilter;
    use crate::store::test_store;

    fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    const VISA: &str = "\
Date,Description,Amount
01/05/2020,HARRIS TEETER #0042,$74.15
01/09/2020,VALERO 1234,\"1,025.32\"
02/14/2020,Florist,(12.00)
not a date,Broken row,1.00
02/20/2020,Bad amount,abc
";

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$74.15"), Some(74.15));
        assert_eq!(parse_amount("\"1,234.56\""), Some(1234.56));
        assert_eq!(parse_amount("(50.00)"), Some(-50.0));
        assert_eq!(parse_amount("-$5"), Some(-5.0));
        assert_eq!(parse_amount(" 12 "), Some(12.0));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("(inf)"), None);
        assert_eq!(parse_amount("(1e999)"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn test_to_chrono_format() {
        assert_eq!(to_chrono_format("MM/DD/YYYY"), "%m/%d/%Y");
        assert_eq!(to_chrono_format("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(to_chrono_format("D.M.YY"), "%d.%m.%y");
        assert_eq!(to_chrono_format("100%"), "100%%");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("01/15/2025", "MM/DD/YYYY").unwrap(), "2025-01-15");
        assert_eq!(parse_date("15.01.2025", "DD.MM.YYYY").unwrap(), "2025-01-15");
        assert_eq!(parse_date("2025-01-15", "YYYY-MM-DD").unwrap(), "2025-01-15");
        assert!(parse_date("02/30/2025", "MM/DD/YYYY").is_err());
        assert!(parse_date("13/01/2025", "MM/DD/YYYY").is_err());
        assert!(parse_date("garbage", "MM/DD/YYYY").is_err());
    }

    #[test]
    fn test_column_from_str() {
        assert_eq!("2".parse::<Column>().unwrap(), Column::Index(2));
        assert_eq!(" Posted Date ".parse::<Column>().unwrap(), Column::Name("Posted Date".into()));
    }

    #[test]
    fn test_parse_and_normalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "visa.csv", VISA);
        let raw = parse_csv(&path, &CsvLayout::default()).unwrap();
        assert_eq!(raw.len(), 5);

        let (expenses, skipped) = normalize_rows(&raw, "MM/DD/YYYY", false);
        assert_eq!(skipped, 2);
        assert_eq!(expenses.len(), 3);
        assert_eq!(expenses[0].trx_date, "2020-01-05");
        assert_eq!(expenses[0].amount, 74.15);
        assert_eq!((expenses[1].trx_year, expenses[1].trx_month), (2020, 1));
        assert_eq!(expenses[1].amount, 1025.32);
        assert_eq!(expenses[2].amount, -12.0);

        let (negated, _) = normalize_rows(&raw, "MM/DD/YYYY", true);
        assert_eq!(negated[0].amount, -74.15);
    }

    #[test]
    fn test_non_finite_amount_rows_are_skipped() {
        let (_dir, store) = test_store();
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "huge.csv",
            "Date,Description,Amount\n01/02/2020,SMALL,1.00\n01/03/2020,HUGE,(1e999)\n",
        );
        let result = import_file(&store, &path, &CsvLayout::default(), "", "MM/DD/YYYY", false).unwrap();
        assert_eq!(result.imported, 1);
        assert_eq!(result.skipped, 1);

        let range = DateRange::new("2020-01-01", "2020-12-31").unwrap();
        let rows = get_expenses(&store, &ExpenseFilter::new(range)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].expense.description, "SMALL");
    }

    #[test]
    fn test_headerless_layout_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "bank.csv", "x,2020-03-04,-19.99,NETFLIX\n");
        let layout = CsvLayout {
            date_column: Column::Index(1),
            description_column: Column::Index(3),
            amount_column: Column::Index(2),
            has_headers: false,
            negate: true,
        };
        let raw = parse_csv(&path, &layout).unwrap();
        let (expenses, skipped) = normalize_rows(&raw, "YYYY-MM-DD", layout.negate);
        assert_eq!(skipped, 0);
        assert_eq!(expenses[0].description, "NETFLIX");
        assert_eq!(expenses[0].amount, 19.99);
    }

    #[test]
    fn test_missing_named_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "odd.csv", "When,What,HowMuch\n01/01/2020,x,1\n");
        assert!(parse_csv(&path, &CsvLayout::default()).is_err());
    }

    #[test]
    fn test_import_file_writes_summary_and_expenses() {
        let (dir, store) = test_store();
        let groceries = create_category(&store, "Groceries").unwrap();
        let teeter = add_subcategory(&store, &groceries.id, "Harris Teeter").unwrap();
        add_match_text(&store, &groceries.id, &teeter.id, "Harris Teeter").unwrap();

        let path = write_csv(dir.path(), "Visa1-01_01_2020_to_04_05_2020.CSV", VISA);
        let result = import_file(&store, &path, &CsvLayout::default(), "mycreditcard1", "MM/DD/YYYY", false).unwrap();
        assert!(!result.duplicate_file);
        assert_eq!(result.imported, 3);
        assert_eq!(result.skipped, 2);
        assert_eq!(result.categorized, 1);

        let summary = result.summary.unwrap();
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.file_name, "Visa1-01_01_2020_to_04_05_2020.CSV");
        assert_eq!(summary.description, "mycreditcard1");

        let filter = ExpenseFilter::new(DateRange::new("2020-01-01", "2020-12-31").unwrap());
        let rows = get_expenses(&store, &filter).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.expense.import_id.as_deref() == Some(summary.id.as_str())));
        let teeter_row = rows.iter().find(|r| r.expense.description.starts_with("HARRIS")).unwrap();
        assert_eq!(teeter_row.subcategory_name, "Harris Teeter");
    }

    #[test]
    fn test_import_file_refuses_same_file_twice() {
        let (dir, store) = test_store();
        let path = write_csv(dir.path(), "visa.csv", VISA);
        let layout = CsvLayout::default();
        import_file(&store, &path, &layout, "", "MM/DD/YYYY", false).unwrap();
        let again = import_file(&store, &path, &layout, "", "MM/DD/YYYY", false).unwrap();
        assert!(again.duplicate_file);
        assert_eq!(store.count(Collection::Imports).unwrap(), 1);

        let forced = import_file(&store, &path, &layout, "", "MM/DD/YYYY", true).unwrap();
        assert!(!forced.duplicate_file);
        assert_eq!(store.count(Collection::Imports).unwrap(), 2);
    }

    #[test]
    fn test_get_and_delete_imports() {
        let (dir, store) = test_store();
        let path = write_csv(dir.path(), "visa.csv", VISA);
        let result = import_file(&store, &path, &CsvLayout::default(), "card", "MM/DD/YYYY", false).unwrap();
        let summary = result.summary.unwrap();
        save_expense(&store, new_expense("2020-01-10", "typed by hand", 3.0)).unwrap();

        let imports = get_imports(&store, &DateRange::year_to_date()).unwrap();
        assert_eq!(imports.len(), 1);
        assert!(get_imports(&store, &DateRange::new("1999-01-01", "1999-12-31").unwrap())
            .unwrap()
            .is_empty());

        let removed = delete_import(&store, &summary.id).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(store.count(Collection::Expenses).unwrap(), 1);
        assert!(matches!(delete_import(&store, &summary.id), Err(TrackerError::NotFound { .. })));
    }
}
