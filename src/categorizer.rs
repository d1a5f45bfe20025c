use crate::categories::get_categories;
use crate::error::Result;
use crate::expenses::get_uncategorized;
use crate::models::Category;
use crate::store::{Collection, Store};

fn matches(description: &str, match_text: &str) -> bool {
    let text = match_text.trim();
    !text.is_empty() && description.to_uppercase().contains(&text.to_uppercase())
}

/// The first subcategory (categories in name order, subcategories in their
/// stored order) with a match text contained in `description`.
/// Returns `(category_id, subcategory_id)`.
pub fn match_subcategory<'a>(
    categories: &'a [Category],
    description: &str,
) -> Option<(&'a str, &'a str)> {
    categories.iter().find_map(|cat| {
        cat.subcategories
            .iter()
            .find(|sub| sub.match_text.iter().any(|t| matches(description, t)))
            .map(|sub| (cat.id.as_str(), sub.id.as_str()))
    })
}

pub struct CategorizeResult {
    pub categorized: usize,
    pub still_uncategorized: usize,
}

/// Assigns a category to every uncategorized expense whose description
/// matches a subcategory's match text. Writes go out as one batch.
pub fn categorize_expenses(store: &Store) -> Result<CategorizeResult> {
    let categories = get_categories(store)?;
    let uncategorized = get_uncategorized(store)?;

    let mut batch = store.batch();
    let mut categorized = 0usize;
    let mut still_uncategorized = 0usize;

    for mut exp in uncategorized {
        match match_subcategory(&categories, &exp.description) {
            Some((cat_id, sub_id)) => {
                exp.category_id = Some(cat_id.to_string());
                exp.subcategory_id = Some(sub_id.to_string());
                batch.set(Collection::Expenses, &exp.id, &exp)?;
                categorized += 1;
            }
            None => still_uncategorized += 1,
        }
    }

    batch
        .commit()
        .inspect_err(|e| tracing::error!(error = %e, "categorize_expenses failed"))?;
    tracing::info!(categorized, still_uncategorized, "categorization pass finished");

    Ok(CategorizeResult {
        categorized,
        still_uncategorized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{add_match_text, add_subcategory, create_category};
    use crate::expenses::{get_expense, new_expense, save_expense};
    use crate::models::Subcategory;
    use crate::store::test_store;

    fn sub(id: &str, name: &str, texts: &[&str]) -> Subcategory {
        Subcategory {
            id: id.to_string(),
            name: name.to_string(),
            match_text: texts.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn cat(id: &str, name: &str, subcategories: Vec<Subcategory>) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            subcategories,
        }
    }

    fn sample() -> Vec<Category> {
        vec![
            cat("1", "Auto", vec![
                sub("101", "Auto Insurance", &["Progressive"]),
                sub("102", "Auto Service", &["Ford", "Subaru"]),
                sub("103", "Gas", &["ExxonMobil", "Valero"]),
            ]),
            cat("2", "Groceries", vec![
                sub("104", "Costco", &["Costco"]),
                sub("106", "Harris Teeter", &["Harris Teeter", "HarrisTeeter"]),
            ]),
            cat("3", "Utilities", vec![
                sub("107", "Electric", &[]),
                sub("108", "Gas", &["Valero"]),
                sub("109", "Internet", &["Spectrum"]),
            ]),
        ]
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let cats = sample();
        assert_eq!(match_subcategory(&cats, "HARRISTEETER #123 CHARLOTTE"), Some(("2", "106")));
        assert_eq!(match_subcategory(&cats, "spectrum internet bill"), Some(("3", "109")));
    }

    #[test]
    fn test_first_category_in_order_wins() {
        let cats = sample();
        // "Valero" appears under both Auto/Gas and Utilities/Gas.
        assert_eq!(match_subcategory(&cats, "VALERO 4412"), Some(("1", "103")));
    }

    #[test]
    fn test_no_match() {
        let cats = sample();
        assert_eq!(match_subcategory(&cats, "RANDOM VENDOR XYZ"), None);
        assert_eq!(match_subcategory(&[], "Costco"), None);
    }

    #[test]
    fn test_blank_match_text_never_matches() {
        let cats = vec![cat("1", "Misc", vec![sub("1a", "Anything", &["  "])])];
        assert_eq!(match_subcategory(&cats, "whatever"), None);
    }

    #[test]
    fn test_categorize_expenses_updates_store() {
        let (_dir, store) = test_store();
        let groceries = create_category(&store, "Groceries").unwrap();
        let costco = add_subcategory(&store, &groceries.id, "Costco").unwrap();
        add_match_text(&store, &groceries.id, &costco.id, "costco").unwrap();

        let hit = save_expense(&store, new_expense("2024-01-02", "COSTCO WHSE #1", 80.0)).unwrap();
        let miss = save_expense(&store, new_expense("2024-01-03", "CORNER STORE", 4.0)).unwrap();

        let result = categorize_expenses(&store).unwrap();
        assert_eq!(result.categorized, 1);
        assert_eq!(result.still_uncategorized, 1);

        let hit = get_expense(&store, &hit.id).unwrap();
        assert_eq!(hit.category_id.as_deref(), Some(groceries.id.as_str()));
        assert_eq!(hit.subcategory_id.as_deref(), Some(costco.id.as_str()));
        assert!(get_expense(&store, &miss.id).unwrap().category_id.is_none());

        // A second pass has nothing new to do.
        let again = categorize_expenses(&store).unwrap();
        assert_eq!(again.categorized, 0);
        assert_eq!(again.still_uncategorized, 1);
    }
}
