pub mod backup;
pub mod categories;
pub mod categorize;
pub mod dashboard;
pub mod demo;
pub mod expenses;
pub mod import;
pub mod init;
pub mod login;
pub mod series;
pub mod status;
pub mod summary;

use clap::{Args, Parser, Subcommand};

use crate::categories::get_category_select;
use crate::error::{Result, TrackerError};
use crate::models::{same_name, DateRange, ExpenseFilter};
use crate::settings::{get_db_path, load_settings};
use crate::store::{Collection, Query, Store};
use crate::users::current_user;

/// Opens the store in the configured data directory.
pub(crate) fn open_store() -> Result<Store> {
    let path = get_db_path();
    if !path.exists() {
        return Err(TrackerError::Other(
            "Database not found. Run `spendbook init` to set up.".to_string(),
        ));
    }
    Store::open(&path)
}

/// Opens the store for a command that needs a logged-in user.
pub(crate) fn session() -> Result<Store> {
    let store = open_store()?;
    current_user(&store, &load_settings())?;
    Ok(store)
}

/// Resolves a full document id or a unique prefix of one, as shown in the
/// shortened ID columns.
pub(crate) fn resolve_id(store: &Store, collection: Collection, prefix: &str) -> Result<String> {
    let prefix = prefix.trim();
    let not_found = || TrackerError::NotFound {
        collection: collection.name().to_string(),
        id: prefix.to_string(),
    };
    if prefix.is_empty() {
        return Err(not_found());
    }
    let docs: Vec<serde_json::Value> = store.get_docs(&Query::new(collection))?;
    let ids: Vec<&str> = docs
        .iter()
        .filter_map(|d| d.get("_id").and_then(|v| v.as_str()))
        .filter(|id| id.starts_with(prefix))
        .collect();
    match ids.as_slice() {
        [id] => Ok(id.to_string()),
        [] => Err(not_found()),
        many if many.contains(&prefix) => Ok(prefix.to_string()),
        _ => Err(TrackerError::Other(format!(
            "Id prefix '{prefix}' matches {} {}",
            ids.len(),
            collection.name()
        ))),
    }
}

/// First eight characters of a uuid, for table display.
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Shared date/category filter flags.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Start date: YYYY-MM-DD (default: January 1st of this year)
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date: YYYY-MM-DD (default: today)
    #[arg(long = "to")]
    pub to_date: Option<String>,
    /// Restrict to a category (by name); repeat for several
    #[arg(long = "category")]
    pub categories: Vec<String>,
}

impl FilterArgs {
    pub(crate) fn range(&self) -> Result<DateRange> {
        DateRange::from_options(self.from_date.as_deref(), self.to_date.as_deref())
    }

    pub(crate) fn to_filter(&self, store: &Store) -> Result<ExpenseFilter> {
        let mut filter = ExpenseFilter::new(self.range()?);
        if self.categories.is_empty() {
            return Ok(filter);
        }
        let options = get_category_select(store)?;
        for name in &self.categories {
            let option = options
                .iter()
                .find(|o| same_name(&o.name, name))
                .ok_or_else(|| TrackerError::UnknownCategory(name.clone()))?;
            filter.category_ids.push(option.id.clone());
        }
        Ok(filter)
    }
}

#[derive(Parser)]
#[command(name = "spendbook", about = "Personal expense tracker.", version)]
pub struct Cli {
    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the store.
    Init {
        /// Path for spendbook data (default: ~/Documents/spendbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Log in as an existing user.
    Login {
        user_id: String,
    },
    /// Forget the logged-in user.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Manage users.
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Manage categories, subcategories and their match texts.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// List, add, edit and delete expenses.
    Expenses {
        #[command(subcommand)]
        command: ExpensesCommands,
    },
    /// Totals by category and subcategory.
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Monthly totals per category, for charting.
    Series {
        #[command(flatten)]
        filter: FilterArgs,
        /// Print the series as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Month-by-month spending overview.
    Dashboard {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Import expenses from a CSV export.
    Import(ImportArgs),
    /// Manage past imports.
    Imports {
        #[command(subcommand)]
        command: ImportsCommands,
    },
    /// Assign categories to uncategorized expenses using match texts.
    Categorize,
    /// Load a sample user, categories and a year of expenses.
    Demo,
    /// Show the current store and summary statistics.
    Status,
    /// Back up the store.
    Backup {
        /// Output path (default: <data_dir>/backups/spendbook-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// Add a user.
    Add {
        user_id: String,
        /// Display name
        #[arg(long, default_value = "")]
        name: String,
    },
    /// List users.
    List,
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Show the category tree.
    List,
    /// Add a category.
    Add { name: String },
    /// Rename a category.
    Rename { category: String, new_name: String },
    /// Delete a category that no expense uses.
    Delete { category: String },
    /// Add a subcategory.
    SubAdd { category: String, name: String },
    /// Rename a subcategory.
    SubRename {
        category: String,
        subcategory: String,
        new_name: String,
    },
    /// Remove a subcategory that no expense uses.
    SubRemove { category: String, subcategory: String },
    /// Add text that identifies a subcategory in imported descriptions.
    MatchAdd {
        category: String,
        subcategory: String,
        text: String,
    },
    /// Remove a match text.
    MatchRemove {
        category: String,
        subcategory: String,
        text: String,
    },
}

#[derive(Subcommand)]
pub enum ExpensesCommands {
    /// List expenses.
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Add an expense.
    Add {
        /// Transaction date: YYYY-MM-DD
        #[arg(long)]
        date: String,
        #[arg(long)]
        description: String,
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,
        /// Category name
        #[arg(long)]
        category: Option<String>,
        /// Subcategory name (requires --category)
        #[arg(long)]
        subcategory: Option<String>,
    },
    /// Edit an expense by id (or unique id prefix).
    Edit {
        id: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<f64>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
        /// Remove the category and subcategory
        #[arg(long, conflicts_with_all = ["category", "subcategory"])]
        uncategorize: bool,
    },
    /// Delete an expense by id (or unique id prefix).
    Delete { id: String },
}

#[derive(Args)]
pub struct ImportArgs {
    /// Path to the CSV file
    pub file: String,
    /// Note stored with the import, e.g. the card name
    #[arg(long, default_value = "")]
    pub description: String,
    /// Date pattern of the file, e.g. MM/DD/YYYY (default from settings)
    #[arg(long = "date-format")]
    pub date_format: Option<String>,
    /// Date column: header name or zero-based index
    #[arg(long = "date-column", default_value = "Date")]
    pub date_column: String,
    /// Description column: header name or zero-based index
    #[arg(long = "description-column", default_value = "Description")]
    pub description_column: String,
    /// Amount column: header name or zero-based index
    #[arg(long = "amount-column", default_value = "Amount")]
    pub amount_column: String,
    /// The file has no header row
    #[arg(long = "no-headers")]
    pub no_headers: bool,
    /// Flip amount signs (for exports listing charges as negatives)
    #[arg(long)]
    pub negate: bool,
    /// Import even if this exact file was imported before
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum ImportsCommands {
    /// List imports.
    List {
        /// Start date: YYYY-MM-DD (default: January 1st of this year)
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD (default: today)
        #[arg(long = "to")]
        to_date: Option<String>,
    },
    /// Delete an import and every expense it created.
    Delete { id: String },
}
