use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{Result, TrackerError};
use crate::expenses::{is_category_in_use, is_subcategory_in_use};
use crate::models::{same_name, Category, CategoryOption, Subcategory};
use crate::store::{Collection, Query, Store};

/// Everything a category picker or expense table needs, derived from one fetch.
#[derive(Debug, Clone)]
pub struct CategoryInfo {
    pub categories: Vec<Category>,
    pub select_categories: Vec<CategoryOption>,
    pub category_map: HashMap<String, Category>,
    pub subcategories: Vec<Subcategory>,
    pub subcategory_map: HashMap<String, Subcategory>,
}

/// All categories, sorted case-insensitively by name.
pub fn get_categories(store: &Store) -> Result<Vec<Category>> {
    let mut categories: Vec<Category> = store
        .get_docs(&Query::new(Collection::Categories))
        .inspect_err(|e| tracing::error!(error = %e, "get_categories failed"))?;
    categories.sort_by_key(|c| c.name.to_lowercase());
    Ok(categories)
}

pub fn get_category(store: &Store, id: &str) -> Result<Category> {
    store
        .get_doc(Collection::Categories, id)?
        .ok_or_else(|| TrackerError::NotFound {
            collection: Collection::Categories.name().to_string(),
            id: id.to_string(),
        })
}

pub fn find_category_by_name(store: &Store, name: &str) -> Result<Category> {
    get_categories(store)?
        .into_iter()
        .find(|c| same_name(&c.name, name))
        .ok_or_else(|| TrackerError::UnknownCategory(name.to_string()))
}

/// True when no other category carries the same name (ignoring case).
pub fn is_category_name_unique(store: &Store, category: &Category) -> Result<bool> {
    let categories = get_categories(store)?;
    let taken = categories
        .iter()
        .any(|c| c.id != category.id && same_name(&c.name, &category.name));
    Ok(!taken)
}

pub fn create_category(store: &Store, name: &str) -> Result<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TrackerError::Required("name"));
    }
    let category = Category {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        subcategories: Vec::new(),
    };
    if !is_category_name_unique(store, &category)? {
        tracing::error!(name, "create_category rejected duplicate name");
        return Err(TrackerError::DuplicateCategory(name.to_string()));
    }
    store
        .set_doc(Collection::Categories, &category.id, &category)
        .inspect_err(|e| tracing::error!(error = %e, "create_category failed"))?;
    Ok(category)
}

/// Persists `category` as a whole. `added_subcategory_name` is the name of a
/// subcategory the caller just added or renamed; it must be unique within the
/// category.
pub fn update_category(
    store: &Store,
    category: &Category,
    added_subcategory_name: Option<&str>,
) -> Result<()> {
    if category.name.trim().is_empty() {
        return Err(TrackerError::Required("name"));
    }
    get_category(store, &category.id)?;
    if !is_category_name_unique(store, category)? {
        tracing::error!(name = %category.name, "update_category rejected duplicate name");
        return Err(TrackerError::DuplicateCategory(category.name.clone()));
    }
    if let Some(added) = added_subcategory_name {
        let same = category
            .subcategories
            .iter()
            .filter(|s| same_name(&s.name, added))
            .count();
        if same > 1 {
            tracing::error!(name = added, "update_category rejected duplicate subcategory");
            return Err(TrackerError::DuplicateSubcategory(added.to_string()));
        }
    }
    store
        .set_doc(Collection::Categories, &category.id, category)
        .inspect_err(|e| tracing::error!(error = %e, "update_category failed"))?;
    Ok(())
}

/// Deletes a category that no expense references.
pub fn delete_category(store: &Store, id: &str) -> Result<()> {
    let category = get_category(store, id)?;
    if is_category_in_use(store, id)? {
        return Err(TrackerError::CategoryInUse(category.name));
    }
    store
        .delete_doc(Collection::Categories, id)
        .inspect_err(|e| tracing::error!(error = %e, "delete_category failed"))
}

pub fn rename_category(store: &Store, id: &str, new_name: &str) -> Result<Category> {
    let mut category = get_category(store, id)?;
    category.name = new_name.trim().to_string();
    update_category(store, &category, None)?;
    Ok(category)
}

// ---------------------------------------------------------------------------
// Subcategories
// ---------------------------------------------------------------------------

fn subcategory_index(category: &Category, subcategory_id: &str) -> Result<usize> {
    category
        .subcategories
        .iter()
        .position(|s| s.id == subcategory_id)
        .ok_or_else(|| TrackerError::UnknownSubcategory(subcategory_id.to_string()))
}

pub fn add_subcategory(store: &Store, category_id: &str, name: &str) -> Result<Subcategory> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TrackerError::Required("name"));
    }
    let mut category = get_category(store, category_id)?;
    let subcategory = Subcategory {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        match_text: Vec::new(),
    };
    category.subcategories.push(subcategory.clone());
    update_category(store, &category, Some(name))?;
    Ok(subcategory)
}

pub fn rename_subcategory(
    store: &Store,
    category_id: &str,
    subcategory_id: &str,
    new_name: &str,
) -> Result<()> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(TrackerError::Required("name"));
    }
    let mut category = get_category(store, category_id)?;
    let idx = subcategory_index(&category, subcategory_id)?;
    category.subcategories[idx].name = new_name.to_string();
    update_category(store, &category, Some(new_name))
}

/// Removes a subcategory that no expense references.
pub fn remove_subcategory(store: &Store, category_id: &str, subcategory_id: &str) -> Result<()> {
    let mut category = get_category(store, category_id)?;
    let idx = subcategory_index(&category, subcategory_id)?;
    if is_subcategory_in_use(store, subcategory_id)? {
        return Err(TrackerError::SubcategoryInUse(
            category.subcategories[idx].name.clone(),
        ));
    }
    category.subcategories.remove(idx);
    update_category(store, &category, None)
}

pub fn add_match_text(
    store: &Store,
    category_id: &str,
    subcategory_id: &str,
    text: &str,
) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TrackerError::Required("match text"));
    }
    let mut category = get_category(store, category_id)?;
    let idx = subcategory_index(&category, subcategory_id)?;
    let sub = &mut category.subcategories[idx];
    if !sub.match_text.iter().any(|t| same_name(t, text)) {
        sub.match_text.push(text.to_string());
    }
    update_category(store, &category, None)
}

pub fn remove_match_text(
    store: &Store,
    category_id: &str,
    subcategory_id: &str,
    text: &str,
) -> Result<()> {
    let mut category = get_category(store, category_id)?;
    let idx = subcategory_index(&category, subcategory_id)?;
    category.subcategories[idx]
        .match_text
        .retain(|t| !same_name(t, text));
    update_category(store, &category, None)
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

pub fn category_map(categories: &[Category]) -> HashMap<String, Category> {
    categories.iter().map(|c| (c.id.clone(), c.clone())).collect()
}

pub fn subcategory_map(categories: &[Category]) -> HashMap<String, Subcategory> {
    categories
        .iter()
        .flat_map(|c| c.subcategories.iter())
        .map(|s| (s.id.clone(), s.clone()))
        .collect()
}

fn select_options(categories: &[Category]) -> Vec<CategoryOption> {
    categories
        .iter()
        .map(|c| CategoryOption {
            id: c.id.clone(),
            name: c.name.clone(),
        })
        .collect()
}

pub fn get_category_select(store: &Store) -> Result<Vec<CategoryOption>> {
    Ok(select_options(&get_categories(store)?))
}

pub fn get_category_info(store: &Store) -> Result<CategoryInfo> {
    let categories = get_categories(store)?;
    let subcategories: Vec<Subcategory> = categories
        .iter()
        .flat_map(|c| c.subcategories.iter().cloned())
        .collect();
    Ok(CategoryInfo {
        select_categories: select_options(&categories),
        category_map: category_map(&categories),
        subcategory_map: subcategory_map(&categories),
        subcategories,
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Expense;
    use crate::store::test_store;

    #[test]
    fn test_categories_sorted_case_insensitively() {
        let (_dir, store) = test_store();
        for name in ["utilities", "Auto", "Groceries"] {
            create_category(&store, name).unwrap();
        }
        let names: Vec<String> = get_categories(&store).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Auto", "Groceries", "utilities"]);
    }

    #[test]
    fn test_create_rejects_duplicate_name() {
        let (_dir, store) = test_store();
        create_category(&store, "Auto").unwrap();
        let err = create_category(&store, "AUTO").unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateCategory(_)));
        assert!(matches!(create_category(&store, "  "), Err(TrackerError::Required(_))));
    }

    #[test]
    fn test_rename_to_own_name_is_allowed() {
        let (_dir, store) = test_store();
        let auto = create_category(&store, "Auto").unwrap();
        create_category(&store, "Groceries").unwrap();
        rename_category(&store, &auto.id, "auto").unwrap();
        let err = rename_category(&store, &auto.id, "groceries").unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateCategory(_)));
    }

    #[test]
    fn test_subcategory_names_unique_within_category() {
        let (_dir, store) = test_store();
        let auto = create_category(&store, "Auto").unwrap();
        let utilities = create_category(&store, "Utilities").unwrap();
        add_subcategory(&store, &auto.id, "Gas").unwrap();
        // Same name under a different category is fine.
        add_subcategory(&store, &utilities.id, "Gas").unwrap();
        let err = add_subcategory(&store, &auto.id, "gas").unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateSubcategory(_)));
        assert_eq!(get_category(&store, &auto.id).unwrap().subcategories.len(), 1);
    }

    #[test]
    fn test_match_text_add_and_remove() {
        let (_dir, store) = test_store();
        let cat = create_category(&store, "Groceries").unwrap();
        let sub = add_subcategory(&store, &cat.id, "Harris Teeter").unwrap();
        add_match_text(&store, &cat.id, &sub.id, "Harris Teeter").unwrap();
        add_match_text(&store, &cat.id, &sub.id, "HarrisTeeter").unwrap();
        add_match_text(&store, &cat.id, &sub.id, "harristeeter").unwrap();
        let saved = get_category(&store, &cat.id).unwrap();
        assert_eq!(saved.subcategories[0].match_text, vec!["Harris Teeter", "HarrisTeeter"]);

        remove_match_text(&store, &cat.id, &sub.id, "harris teeter").unwrap();
        let saved = get_category(&store, &cat.id).unwrap();
        assert_eq!(saved.subcategories[0].match_text, vec!["HarrisTeeter"]);
    }

    #[test]
    fn test_delete_blocked_while_in_use() {
        let (_dir, store) = test_store();
        let cat = create_category(&store, "Auto").unwrap();
        let sub = add_subcategory(&store, &cat.id, "Gas").unwrap();
        let exp = Expense {
            id: "e1".into(),
            category_id: Some(cat.id.clone()),
            subcategory_id: Some(sub.id.clone()),
            import_id: None,
            trx_date: "2024-01-02".into(),
            trx_year: 2024,
            trx_month: 1,
            description: "Valero".into(),
            amount: 30.0,
        };
        store.set_doc(Collection::Expenses, &exp.id, &exp).unwrap();

        assert!(matches!(
            remove_subcategory(&store, &cat.id, &sub.id),
            Err(TrackerError::SubcategoryInUse(_))
        ));
        assert!(matches!(
            delete_category(&store, &cat.id),
            Err(TrackerError::CategoryInUse(_))
        ));

        store.delete_doc(Collection::Expenses, "e1").unwrap();
        remove_subcategory(&store, &cat.id, &sub.id).unwrap();
        delete_category(&store, &cat.id).unwrap();
        assert!(get_categories(&store).unwrap().is_empty());
    }

    #[test]
    fn test_non_ascii_names_fold_the_same_everywhere() {
        let (_dir, store) = test_store();
        let cafe = create_category(&store, "Café").unwrap();
        assert!(matches!(
            create_category(&store, "CAFÉ"),
            Err(TrackerError::DuplicateCategory(_))
        ));
        assert_eq!(find_category_by_name(&store, "CAFÉ").unwrap().id, cafe.id);

        add_subcategory(&store, &cafe.id, "Crème").unwrap();
        assert!(matches!(
            add_subcategory(&store, &cafe.id, "CRÈME"),
            Err(TrackerError::DuplicateSubcategory(_))
        ));
        let saved = get_category(&store, &cafe.id).unwrap();
        assert!(saved.find_subcategory("CRÈME").is_some());
    }

    #[test]
    fn test_category_info_maps() {
        let (_dir, store) = test_store();
        let auto = create_category(&store, "Auto").unwrap();
        let groceries = create_category(&store, "Groceries").unwrap();
        let gas = add_subcategory(&store, &auto.id, "Gas").unwrap();
        add_subcategory(&store, &auto.id, "Auto Service").unwrap();
        add_subcategory(&store, &groceries.id, "Costco").unwrap();

        let info = get_category_info(&store).unwrap();
        assert_eq!(info.categories.len(), 2);
        assert_eq!(info.select_categories[0].name, "Auto");
        assert_eq!(info.subcategories.len(), 3);
        assert_eq!(info.category_map[&groceries.id].name, "Groceries");
        assert_eq!(info.subcategory_map[&gas.id].name, "Gas");
        assert_eq!(find_category_by_name(&store, "groceries").unwrap().id, groceries.id);
        assert!(find_category_by_name(&store, "Travel").is_err());
    }
}
