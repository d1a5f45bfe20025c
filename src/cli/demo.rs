use chrono::{Datelike, Local, Months, NaiveDate};

use crate::categories::{
    add_match_text, add_subcategory, create_category, find_category_by_name, get_categories,
};
use crate::categorizer::categorize_expenses;
use crate::cli::open_store;
use crate::error::{Result, TrackerError};
use crate::importer::{import_expenses, ImportDetails};
use crate::models::Expense;
use crate::settings::{load_settings, save_settings};
use crate::store::{Collection, Query};
use crate::users::{create_user, get_user, login};

const DEMO_USER: &str = "demo";
const DEMO_FILE: &str = "demo.csv";

/// (category, subcategory, match texts)
const SUBCATEGORIES: &[(&str, &str, &[&str])] = &[
    ("Auto", "Auto Insurance", &["PROGRESSIVE"]),
    ("Auto", "Auto Service", &["JIFFY LUBE", "FIRESTONE"]),
    ("Auto", "Gas", &["EXXONMOBIL", "SHELL OIL"]),
    ("Dining", "Coffee", &["STARBUCKS"]),
    ("Dining", "Restaurants", &["CHIPOTLE", "OLIVE GARDEN"]),
    ("Groceries", "Costco", &["COSTCO"]),
    ("Groceries", "Harris Teeter", &["HARRIS TEETER", "HARRISTEETER"]),
    ("Utilities", "Electric", &["DUKE ENERGY"]),
    ("Utilities", "Internet", &["SPECTRUM"]),
    ("Utilities", "Water", &["CITY WATER"]),
];

/// Charges made every month: (day, description, amount).
const MONTHLY: &[(u32, &str, f64)] = &[
    (1, "PROGRESSIVE INSURANCE", 112.40),
    (3, "SPECTRUM INTERNET", 79.99),
    (9, "DUKE ENERGY PAYMENT", 134.17),
    (14, "CITY WATER UTILITY", 48.30),
];

/// Charges rotated across months: (day, description, amount).
const ROTATING: &[(u32, &str, f64)] = &[
    (4, "COSTCO WHSE #1203", 186.52),
    (6, "STARBUCKS STORE 0412", 6.45),
    (8, "EXXONMOBIL 4471", 41.18),
    (11, "HARRISTEETER 0093", 92.74),
    (13, "CHIPOTLE 2231", 14.85),
    (17, "SHELL OIL 5521", 38.02),
    (19, "HARRIS TEETER #12", 64.10),
    (21, "JIFFY LUBE #882", 79.95),
    (24, "OLIVE GARDEN 1180", 58.60),
    (26, "AMAZON MKTPLACE", 27.99),
    (27, "COSTCO GAS #1203", 45.33),
    (29, "TARGET T-1422", 53.21),
];

fn make_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?.day();
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

fn expense(date: NaiveDate, description: &str, amount: f64) -> Result<Expense> {
    let mut exp = Expense {
        id: String::new(),
        category_id: None,
        subcategory_id: None,
        import_id: None,
        trx_date: date.format("%Y-%m-%d").to_string(),
        trx_year: 0,
        trx_month: 0,
        description: description.to_string(),
        amount,
    };
    exp.derive_period()?;
    Ok(exp)
}

/// Expenses from January of `today`'s year through `today`.
fn generate_expenses(today: NaiveDate) -> Result<Vec<Expense>> {
    let mut expenses = Vec::new();
    for month in 1..=today.month() {
        let idx = month as usize - 1;
        let mut charges: Vec<(u32, &str, f64)> = MONTHLY.to_vec();
        // Five rotating charges per month, with a small monthly drift.
        for j in 0..5usize {
            let (day, desc, amount) = ROTATING[(idx * 5 + j) % ROTATING.len()];
            let drift = 1.0 + ((idx + j) % 7) as f64 * 0.02;
            charges.push((day, desc, (amount * drift * 100.0).round() / 100.0));
        }
        for (day, desc, amount) in charges {
            let Some(date) = make_date(today.year(), month, day) else {
                continue;
            };
            if date <= today {
                expenses.push(expense(date, desc, amount)?);
            }
        }
    }
    Ok(expenses)
}

pub fn run() -> Result<()> {
    let store = open_store()?;

    let loaded = store.exists(&Query::new(Collection::Imports).where_eq("fileName", DEMO_FILE))?;
    if loaded {
        println!("Demo data is already loaded. Delete the demo import to start over.");
        return Ok(());
    }

    match get_user(&store, DEMO_USER) {
        Ok(_) => {}
        Err(TrackerError::UnknownUser(_)) => {
            create_user(&store, DEMO_USER, "Demo User")?;
        }
        Err(e) => return Err(e),
    }
    let mut settings = load_settings();
    login(&store, &mut settings, DEMO_USER)?;
    save_settings(&settings)?;

    for &(cat_name, sub_name, texts) in SUBCATEGORIES {
        let category = match find_category_by_name(&store, cat_name) {
            Ok(existing) => existing,
            Err(TrackerError::UnknownCategory(_)) => create_category(&store, cat_name)?,
            Err(e) => return Err(e),
        };
        let sub_id = match category.find_subcategory(sub_name) {
            Some(existing) => existing.id.clone(),
            None => add_subcategory(&store, &category.id, sub_name)?.id,
        };
        for text in texts {
            add_match_text(&store, &category.id, &sub_id, text)?;
        }
    }

    let expenses = generate_expenses(Local::now().date_naive())?;
    let details = ImportDetails {
        file_name: DEMO_FILE.to_string(),
        description: "Sample data".to_string(),
        date_format: "YYYY-MM-DD".to_string(),
        checksum: None,
    };
    let summary = import_expenses(&store, expenses, &details)?;
    let result = categorize_expenses(&store)?;

    println!("Logged in as {DEMO_USER}");
    println!(
        "Loaded {} categories and {} expenses",
        get_categories(&store)?.len(),
        summary.record_count
    );
    println!(
        "{} categorized, {} still uncategorized",
        result.categorized, result.still_uncategorized
    );
    Ok(())
}
