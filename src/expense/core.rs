//! Defines the expense model and its database queries.

use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Store,
    category::CategoryId,
    window::{DateRange, Timestamp},
};

// ============================================================================
// MODELS
// ============================================================================

/// Database identifier for an expense.
pub type ExpenseId = i64;

/// Money spent on a given date, filed under one category.
///
/// To create a new `Expense`, use [Expense::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// The ID of the expense.
    pub id: ExpenseId,
    /// How much was spent. Always greater than zero.
    pub amount: f64,
    /// The category the expense is filed under.
    pub category_id: CategoryId,
    /// When the money was spent.
    pub date: Timestamp,
    /// Free-form notes, `None` if the user did not write any.
    pub notes: Option<String>,
}

impl Expense {
    /// Start describing a new expense.
    ///
    /// Shortcut for [ExpenseBuilder] for discoverability.
    pub fn build(amount: f64, category_id: CategoryId, date: Timestamp) -> ExpenseBuilder {
        ExpenseBuilder {
            amount,
            category_id,
            date,
            notes: None,
        }
    }
}

/// Every field of an expense except its ID.
///
/// Used both to create expenses and to overwrite all fields of an existing
/// one with [update_expense].
///
/// # Examples
///
/// ```ignore
/// let builder = Expense::build(45.5, food.id, "2025-01-10T12:00:00Z".parse()?)
///     .notes(Some("Lunch with Sam"));
/// let expense = create_expense(builder, &store)?;
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct ExpenseBuilder {
    /// How much was spent.
    pub amount: f64,
    /// The category the expense is filed under.
    pub category_id: CategoryId,
    /// When the money was spent.
    pub date: Timestamp,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl ExpenseBuilder {
    /// Set the notes for the expense.
    pub fn notes(mut self, notes: Option<&str>) -> Self {
        self.notes = notes.map(str::to_owned);
        self
    }
}

fn validate_amount(amount: f64) -> Result<(), Error> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidAmount(amount))
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new expense and return it as stored, including its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not a positive number,
/// - or [Error::ForeignKeyViolation] if the category ID does not refer to a real category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_expense(builder: ExpenseBuilder, store: &Store) -> Result<Expense, Error> {
    validate_amount(builder.amount)?;

    let outcome = store.execute(
        "INSERT INTO expenses (amount, categoryId, date, notes) VALUES (?1, ?2, ?3, ?4);",
        (
            builder.amount,
            builder.category_id,
            builder.date,
            builder.notes,
        ),
    )?;

    let id = outcome.inserted_id.ok_or(Error::NotFound)?;

    get_expense(id, store)
}

/// Retrieve an expense by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid expense,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_expense(id: ExpenseId, store: &Store) -> Result<Expense, Error> {
    store.query_one(
        "SELECT id, amount, categoryId, date, notes FROM expenses WHERE id = ?1;",
        [id],
        map_expense_row,
    )
}

/// Retrieve every expense, newest first.
///
/// Expenses with the same date are ordered by descending ID so the most
/// recently created one comes first.
pub fn get_all_expenses(store: &Store) -> Result<Vec<Expense>, Error> {
    store.query_map(
        "SELECT id, amount, categoryId, date, notes FROM expenses
         ORDER BY date DESC, id DESC;",
        [],
        map_expense_row,
    )
}

/// Retrieve the expenses dated within `range`, in the same order as
/// [get_all_expenses].
///
/// An expense dated exactly at the end of the range is not included.
pub fn get_expenses_in_range(range: &DateRange, store: &Store) -> Result<Vec<Expense>, Error> {
    store.query_map(
        "SELECT id, amount, categoryId, date, notes FROM expenses
         WHERE date >= ?1 AND date < ?2
         ORDER BY date DESC, id DESC;",
        (range.start(), range.end()),
        map_expense_row,
    )
}

/// Overwrite the amount, category, date and notes of the expense `id`.
///
/// Updating an expense that does not exist does nothing.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not a positive number,
/// - or [Error::ForeignKeyViolation] if the category ID does not refer to a real category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_expense(id: ExpenseId, builder: ExpenseBuilder, store: &Store) -> Result<(), Error> {
    validate_amount(builder.amount)?;

    let outcome = store.execute(
        "UPDATE expenses SET amount = ?1, categoryId = ?2, date = ?3, notes = ?4 WHERE id = ?5;",
        (
            builder.amount,
            builder.category_id,
            builder.date,
            builder.notes,
            id,
        ),
    )?;

    if outcome.rows_affected == 0 {
        tracing::debug!("Tried to update expense {id} but it does not exist");
    }

    Ok(())
}

/// Delete the expense `id`. Deleting an expense that does not exist is not an
/// error.
pub fn delete_expense(id: ExpenseId, store: &Store) -> Result<(), Error> {
    let outcome = store.execute("DELETE FROM expenses WHERE id = ?1;", [id])?;

    if outcome.rows_affected == 0 {
        tracing::debug!("Tried to delete expense {id} but it does not exist");
    }

    Ok(())
}

/// Get the total number of expenses in the database.
pub fn count_expenses(store: &Store) -> Result<u32, Error> {
    store.query_one("SELECT COUNT(id) FROM expenses;", [], |row| row.get(0))
}

/// Create the expense table in the database.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_expense_table(store: &Store) -> Result<(), Error> {
    store.execute_batch(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount REAL NOT NULL,
            categoryId INTEGER NOT NULL,
            date TEXT NOT NULL,
            notes TEXT,
            FOREIGN KEY(categoryId) REFERENCES categories(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_expenses_date_category ON expenses(date, categoryId);",
    )
}

fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let category_id = row.get(2)?;
    let date = row.get(3)?;
    let notes = row.get(4)?;

    Ok(Expense {
        id,
        amount,
        category_id,
        date,
        notes,
    })
}

// ============================================================================
// TESTS
// ============================================================================
