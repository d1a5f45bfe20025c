use crate::categorizer::categorize_expenses;
use crate::cli::session;
use crate::error::Result;

pub fn run() -> Result<()> {
    let store = session()?;
    let result = categorize_expenses(&store)?;
    println!(
        "{} categorized, {} still uncategorized",
        result.categorized, result.still_uncategorized
    );
    Ok(())
}
