use comfy_table::{Cell, Table};

use crate::categories::{
    add_match_text, add_subcategory, create_category, delete_category, find_category_by_name,
    get_category_info, remove_match_text, remove_subcategory, rename_category, rename_subcategory,
};
use crate::cli::session;
use crate::error::{Result, TrackerError};
use crate::fmt::row_count;
use crate::models::{Category, Subcategory};
use crate::store::Store;

fn find_subcategory<'a>(category: &'a Category, name: &str) -> Result<&'a Subcategory> {
    category
        .find_subcategory(name)
        .ok_or_else(|| TrackerError::UnknownSubcategory(format!("{} / {name}", category.name)))
}

fn lookup(store: &Store, category: &str, subcategory: &str) -> Result<(Category, String)> {
    let cat = find_category_by_name(store, category)?;
    let sub_id = find_subcategory(&cat, subcategory)?.id.clone();
    Ok((cat, sub_id))
}

pub fn list() -> Result<()> {
    let store = session()?;
    let info = get_category_info(&store)?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Subcategory", "Match Text"]);
    for cat in &info.categories {
        table.add_row(vec![Cell::new(&cat.name), Cell::new(""), Cell::new("")]);
        for sub in &cat.subcategories {
            table.add_row(vec![
                Cell::new(""),
                Cell::new(&sub.name),
                Cell::new(sub.match_text.join(", ")),
            ]);
        }
    }
    println!("Categories\n{table}");
    println!(
        "{}, {} subcategories",
        row_count(info.categories.len()),
        info.subcategories.len()
    );
    Ok(())
}

pub fn add(name: &str) -> Result<()> {
    let store = session()?;
    let category = create_category(&store, name)?;
    println!("Added category: {}", category.name);
    Ok(())
}

pub fn rename(category: &str, new_name: &str) -> Result<()> {
    let store = session()?;
    let cat = find_category_by_name(&store, category)?;
    let renamed = rename_category(&store, &cat.id, new_name)?;
    println!("Renamed category {} to: {}", cat.name, renamed.name);
    Ok(())
}

pub fn delete(category: &str) -> Result<()> {
    let store = session()?;
    let cat = find_category_by_name(&store, category)?;
    delete_category(&store, &cat.id)?;
    println!("Deleted category: {}", cat.name);
    Ok(())
}

pub fn sub_add(category: &str, name: &str) -> Result<()> {
    let store = session()?;
    let cat = find_category_by_name(&store, category)?;
    let sub = add_subcategory(&store, &cat.id, name)?;
    println!("Added subcategory: {} / {}", cat.name, sub.name);
    Ok(())
}

pub fn sub_rename(category: &str, subcategory: &str, new_name: &str) -> Result<()> {
    let store = session()?;
    let (cat, sub_id) = lookup(&store, category, subcategory)?;
    rename_subcategory(&store, &cat.id, &sub_id, new_name)?;
    println!("Renamed subcategory {} / {subcategory} to: {}", cat.name, new_name.trim());
    Ok(())
}

pub fn sub_remove(category: &str, subcategory: &str) -> Result<()> {
    let store = session()?;
    let (cat, sub_id) = lookup(&store, category, subcategory)?;
    remove_subcategory(&store, &cat.id, &sub_id)?;
    println!("Removed subcategory: {} / {subcategory}", cat.name);
    Ok(())
}

pub fn match_add(category: &str, subcategory: &str, text: &str) -> Result<()> {
    let store = session()?;
    let (cat, sub_id) = lookup(&store, category, subcategory)?;
    add_match_text(&store, &cat.id, &sub_id, text)?;
    println!("Added match text '{}' \u{2192} {} / {subcategory}", text.trim(), cat.name);
    Ok(())
}

pub fn match_remove(category: &str, subcategory: &str, text: &str) -> Result<()> {
    let store = session()?;
    let (cat, sub_id) = lookup(&store, category, subcategory)?;
    remove_match_text(&store, &cat.id, &sub_id, text)?;
    println!("Removed match text '{}' from {} / {subcategory}", text.trim(), cat.name);
    Ok(())
}
