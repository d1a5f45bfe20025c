use crate::error::Result;
use crate::expenses::get_uncategorized;
use crate::fmt::format_bytes;
use crate::settings::{get_db_path, load_settings};
use crate::store::{Collection, Store};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = get_db_path();

    println!(
        "User:        {}",
        settings.login_token.as_deref().unwrap_or("(not logged in)")
    );
    println!("Data dir:    {}", settings.data_dir);
    println!("Store:       {}", db_path.display());
    println!("Date format: {}", settings.date_format);

    if !db_path.exists() {
        println!();
        println!("Store not found. Run `spendbook init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("Store size:  {}", format_bytes(size));

    let store = Store::open(&db_path)?;
    let uncategorized = get_uncategorized(&store)?.len();

    println!();
    println!("Users:          {}", store.count(Collection::Users)?);
    println!("Categories:     {}", store.count(Collection::Categories)?);
    println!("Expenses:       {}", store.count(Collection::Expenses)?);
    println!("Uncategorized:  {uncategorized}");
    println!("Imports:        {}", store.count(Collection::Imports)?);
    Ok(())
}
