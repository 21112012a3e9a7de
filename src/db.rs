//! Creates the application's tables and fills in the default categories.

use crate::{Error, Store, category::create_category_table, expense::create_expense_table};

/// The categories a new database starts with, as `(name, color)` pairs.
pub const DEFAULT_CATEGORIES: [(&str, &str); 6] = [
    ("Food", "#FF6B6B"),
    ("Transport", "#4ECDC4"),
    ("Shopping", "#45B7D1"),
    ("Entertainment", "#96CEB4"),
    ("Bills", "#FFEAA7"),
    ("Other", "#DDA0DD"),
];

/// Prepare the database behind `store` for use.
///
/// Turns on foreign key enforcement, creates any missing tables and, if there
/// are no categories yet, inserts [DEFAULT_CATEGORIES] in a single
/// transaction. Calling this on an already initialized database changes
/// nothing.
///
/// # Errors
/// Returns an error if any of the statements fail. A failed seed is rolled
/// back as a whole.
pub fn initialize(store: &Store) -> Result<(), Error> {
    store.execute_batch("PRAGMA foreign_keys = ON;")?;

    create_category_table(store)?;
    create_expense_table(store)?;

    seed_default_categories(store)
}

fn seed_default_categories(store: &Store) -> Result<(), Error> {
    store.with_transaction(|transaction| {
        let category_count: i64 =
            transaction.query_row("SELECT COUNT(id) FROM categories;", [], |row| row.get(0))?;

        if category_count > 0 {
            tracing::debug!("Found {category_count} categories, skipping default categories");
            return Ok(());
        }

        let mut statement =
            transaction.prepare("INSERT INTO categories (name, color) VALUES (?1, ?2);")?;

        for (name, color) in DEFAULT_CATEGORIES {
            statement.execute((name, color))?;
        }

        tracing::info!("Added {} default categories", DEFAULT_CATEGORIES.len());

        Ok(())
    })
}
