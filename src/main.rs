mod categories;
mod categorizer;
mod cli;
mod error;
mod expenses;
mod fmt;
mod importer;
mod models;
mod reports;
mod settings;
mod store;
mod users;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::expenses::ExpenseEdit;
use cli::{
    CategoriesCommands, Cli, Commands, ExpensesCommands, ImportsCommands, UsersCommands,
};

fn init_tracing(verbose: bool) {
    // Logs go to stderr so table output on stdout stays clean.
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Login { user_id } => cli::login::run_login(&user_id),
        Commands::Logout => cli::login::run_logout(),
        Commands::Whoami => cli::login::whoami(),
        Commands::Users { command } => match command {
            UsersCommands::Add { user_id, name } => cli::login::add_user(&user_id, &name),
            UsersCommands::List => cli::login::list_users(),
        },
        Commands::Categories { command } => match command {
            CategoriesCommands::List => cli::categories::list(),
            CategoriesCommands::Add { name } => cli::categories::add(&name),
            CategoriesCommands::Rename { category, new_name } => {
                cli::categories::rename(&category, &new_name)
            }
            CategoriesCommands::Delete { category } => cli::categories::delete(&category),
            CategoriesCommands::SubAdd { category, name } => {
                cli::categories::sub_add(&category, &name)
            }
            CategoriesCommands::SubRename {
                category,
                subcategory,
                new_name,
            } => cli::categories::sub_rename(&category, &subcategory, &new_name),
            CategoriesCommands::SubRemove {
                category,
                subcategory,
            } => cli::categories::sub_remove(&category, &subcategory),
            CategoriesCommands::MatchAdd {
                category,
                subcategory,
                text,
            } => cli::categories::match_add(&category, &subcategory, &text),
            CategoriesCommands::MatchRemove {
                category,
                subcategory,
                text,
            } => cli::categories::match_remove(&category, &subcategory, &text),
        },
        Commands::Expenses { command } => match command {
            ExpensesCommands::List { filter } => cli::expenses::list(&filter),
            ExpensesCommands::Add {
                date,
                description,
                amount,
                category,
                subcategory,
            } => cli::expenses::add(
                &date,
                &description,
                amount,
                category.as_deref(),
                subcategory.as_deref(),
            ),
            ExpensesCommands::Edit {
                id,
                date,
                description,
                amount,
                category,
                subcategory,
                uncategorize,
            } => cli::expenses::edit(
                &id,
                ExpenseEdit {
                    date: date.as_deref(),
                    description: description.as_deref(),
                    amount,
                    category: category.as_deref(),
                    subcategory: subcategory.as_deref(),
                    uncategorize,
                },
            ),
            ExpensesCommands::Delete { id } => cli::expenses::delete(&id),
        },
        Commands::Summary { filter } => cli::summary::run(&filter),
        Commands::Series { filter, json } => cli::series::run(&filter, json),
        Commands::Dashboard { filter } => cli::dashboard::run(&filter),
        Commands::Import(args) => cli::import::run(&args),
        Commands::Imports { command } => match command {
            ImportsCommands::List { from_date, to_date } => {
                cli::import::list(from_date.as_deref(), to_date.as_deref())
            }
            ImportsCommands::Delete { id } => cli::import::delete(&id),
        },
        Commands::Categorize => cli::categorize::run(),
        Commands::Demo => cli::demo::run(),
        Commands::Status => cli::status::run(),
        Commands::Backup { output } => cli::backup::run(output),
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
