use comfy_table::{Cell, Table};

use crate::cli::{open_store, session};
use crate::error::Result;
use crate::fmt::row_count;
use crate::models::User;
use crate::settings::{load_settings, save_settings};
use crate::store::{Collection, Query};
use crate::users::{create_user, current_user, login, logout};

pub fn run_login(user_id: &str) -> Result<()> {
    let store = open_store()?;
    let mut settings = load_settings();
    let user = login(&store, &mut settings, user_id)?;
    save_settings(&settings)?;
    println!("Logged in as {}", display_name(&user));
    Ok(())
}

pub fn run_logout() -> Result<()> {
    let mut settings = load_settings();
    logout(&mut settings);
    save_settings(&settings)?;
    println!("Logged out.");
    Ok(())
}

pub fn whoami() -> Result<()> {
    let store = open_store()?;
    let settings = load_settings();
    match current_user(&store, &settings)? {
        Some(user) => println!("{}", display_name(&user)),
        None => println!(
            "{} (user record not found)",
            settings.login_token.unwrap_or_default()
        ),
    }
    Ok(())
}

pub fn add_user(user_id: &str, name: &str) -> Result<()> {
    let store = open_store()?;
    let user = create_user(&store, user_id, name)?;
    println!("Added user: {}", display_name(&user));
    Ok(())
}

pub fn list_users() -> Result<()> {
    let store = session()?;
    let users: Vec<User> = store.get_docs(&Query::new(Collection::Users))?;
    let active = load_settings().login_token;

    let mut table = Table::new();
    table.set_header(vec!["", "User ID", "Name"]);
    for user in &users {
        let marker = if active.as_deref() == Some(user.user_id.as_str()) { "*" } else { "" };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(&user.user_id),
            Cell::new(&user.name),
        ]);
    }
    println!("Users\n{table}");
    println!("{}", row_count(users.len()));
    Ok(())
}

fn display_name(user: &User) -> String {
    if user.name.is_empty() {
        user.user_id.clone()
    } else {
        format!("{} ({})", user.user_id, user.name)
    }
}
