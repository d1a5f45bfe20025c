use std::path::PathBuf;

use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{resolve_id, session, short_id, ImportArgs};
use crate::error::{Result, TrackerError};
use crate::fmt::row_count;
use crate::importer::{delete_import, get_imports, import_file, Column, CsvLayout};
use crate::models::{DateRange, ImportSummary};
use crate::settings::load_settings;
use crate::store::Collection;

fn column(raw: &str) -> Column {
    match raw.parse() {
        Ok(col) => col,
        Err(never) => match never {},
    }
}

pub fn run(args: &ImportArgs) -> Result<()> {
    let file_path = PathBuf::from(&args.file);
    if !file_path.exists() {
        return Err(TrackerError::Other(format!("File not found: {}", args.file)));
    }
    let store = session()?;
    let date_format = args
        .date_format
        .clone()
        .unwrap_or_else(|| load_settings().date_format);
    let layout = CsvLayout {
        date_column: column(&args.date_column),
        description_column: column(&args.description_column),
        amount_column: column(&args.amount_column),
        has_headers: !args.no_headers,
        negate: args.negate,
    };

    let result = import_file(
        &store,
        &file_path,
        &layout,
        &args.description,
        &date_format,
        args.force,
    )?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum). Use --force to import it again.");
        return Ok(());
    }

    if let Some(summary) = &result.summary {
        println!("Import {} from {}", short_id(&summary.id), summary.file_name);
    }
    println!(
        "{} imported, {} skipped (unreadable rows)",
        result.imported, result.skipped
    );
    println!(
        "{} categorized, {} uncategorized",
        result.categorized,
        result.imported - result.categorized
    );
    Ok(())
}

pub fn format_imports(imports: &[ImportSummary]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "File", "Description", "Records", "Date Format"]);
    for imp in imports {
        table.add_row(vec![
            Cell::new(short_id(&imp.id)),
            Cell::new(&imp.import_date),
            Cell::new(&imp.file_name),
            Cell::new(&imp.description),
            Cell::new(imp.record_count).set_alignment(CellAlignment::Right),
            Cell::new(&imp.date_format),
        ]);
    }
    format!("Imports\n{table}\n{}", row_count(imports.len()))
}

pub fn list(from_date: Option<&str>, to_date: Option<&str>) -> Result<()> {
    let store = session()?;
    let imports = get_imports(&store, &DateRange::from_options(from_date, to_date)?)?;
    println!("{}", format_imports(&imports));
    Ok(())
}

pub fn delete(id: &str) -> Result<()> {
    let store = session()?;
    let id = resolve_id(&store, Collection::Imports, id)?;
    let removed = delete_import(&store, &id)?;
    println!("Deleted import {} and {removed} expenses", short_id(&id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_parsing() {
        assert_eq!(column("2"), Column::Index(2));
        assert_eq!(column("Posted Date"), Column::Name("Posted Date".into()));
    }

    #[test]
    fn test_format_imports() {
        let imports = vec![ImportSummary {
            id: "abcdef0123456789".into(),
            import_date: "2024-02-01".into(),
            file_name: "visa.csv".into(),
            description: "Visa card".into(),
            record_count: 42,
            date_format: "MM/DD/YYYY".into(),
            checksum: None,
        }];
        let out = format_imports(&imports);
        assert!(out.contains("abcdef01"));
        assert!(out.contains("visa.csv"));
        assert!(out.contains("42"));
        assert!(out.ends_with("1 row"));
    }
}
