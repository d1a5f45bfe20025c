use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Document encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate category: {0}")]
    DuplicateCategory(String),

    #[error("Duplicate subcategory: {0}")]
    DuplicateSubcategory(String),

    #[error("No {collection} document with id {id}")]
    NotFound { collection: String, id: String },

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Not logged in. Run `spendbook login <user-id>` first.")]
    NotLoggedIn,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown subcategory: {0}")]
    UnknownSubcategory(String),

    #[error("Category is in use by existing expenses: {0}")]
    CategoryInUse(String),

    #[error("Subcategory is in use by existing expenses: {0}")]
    SubcategoryInUse(String),

    #[error("Invalid date '{value}' (expected {format})")]
    InvalidDate { value: String, format: String },

    #[error("{0}: Value is required")]
    Required(&'static str),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
