//! Database operations for categories.

use rusqlite::Row;

use crate::{
    Error, Store,
    category::{Category, CategoryId, CategoryName},
};

/// Create a category and return it as stored, including its generated ID.
///
/// # Errors
/// Returns [Error::ConstraintViolation] if a category with the same name
/// already exists.
pub fn create_category(name: CategoryName, color: &str, store: &Store) -> Result<Category, Error> {
    let outcome = store.execute(
        "INSERT INTO categories (name, color) VALUES (?1, ?2);",
        (name.as_ref(), color),
    )?;

    let id = outcome.inserted_id.ok_or(Error::NotFound)?;
    tracing::debug!("Created category {id} \"{name}\"");

    get_category(id, store)
}

/// Retrieve a single category by ID.
///
/// # Errors
/// Returns [Error::NotFound] if there is no category with `category_id`.
pub fn get_category(category_id: CategoryId, store: &Store) -> Result<Category, Error> {
    store.query_one(
        "SELECT id, name, color FROM categories WHERE id = ?1;",
        [category_id],
        map_row,
    )
}

/// Retrieve all categories ordered alphabetically by name.
pub fn get_all_categories(store: &Store) -> Result<Vec<Category>, Error> {
    store.query_map(
        "SELECT id, name, color FROM categories ORDER BY name ASC;",
        [],
        map_row,
    )
}

/// Delete a category by ID along with all of its expenses.
///
/// Deleting a category that does not exist is not an error.
pub fn delete_category(category_id: CategoryId, store: &Store) -> Result<(), Error> {
    let outcome = store.execute("DELETE FROM categories WHERE id = ?1;", [category_id])?;

    if outcome.rows_affected == 0 {
        tracing::debug!("Tried to delete category {category_id} but it does not exist");
    }

    Ok(())
}

/// Get the total number of categories.
pub fn count_categories(store: &Store) -> Result<u32, Error> {
    store.query_one("SELECT COUNT(id) FROM categories;", [], |row| row.get(0))
}

/// Initialize the category table.
pub fn create_category_table(store: &Store) -> Result<(), Error> {
    store.execute_batch(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            color TEXT NOT NULL
        );",
    )
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let name = CategoryName::from_stored(row.get(1)?);
    let color = row.get(2)?;

    Ok(Category { id, name, color })
}
