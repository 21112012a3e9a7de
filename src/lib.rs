//! Spendbook is the storage and aggregation core of a personal expense tracker.
//!
//! Expenses are recorded against user-defined categories in a local SQLite
//! database. The library exposes the repositories for both entities, a query
//! for per-category totals over a date window, and [AppState], an in-memory
//! cache that front ends render from.

#![warn(missing_docs)]

mod aggregation;
mod app_state;
mod category;
mod db;
mod expense;
mod store;
mod window;

pub use aggregation::{CategoryTotal, get_category_totals};
pub use app_state::AppState;
pub use category::{
    Category, CategoryId, CategoryName, count_categories, create_category, delete_category,
    get_all_categories, get_category,
};
pub use db::{DEFAULT_CATEGORIES, initialize};
pub use expense::{
    Expense, ExpenseBuilder, ExpenseId, count_expenses, create_expense, delete_expense,
    get_all_expenses, get_expense, get_expenses_in_range, update_expense,
};
pub use store::{DEFAULT_DB_PATH, ExecuteOutcome, RowMap, Store};
pub use window::{DateRange, Timestamp, month_range, previous_month_range};

use rusqlite::ErrorCode;

// Extended result codes, see https://www.sqlite.org/rescode.html
const SQLITE_CONSTRAINT_CHECK: i32 = 275;
const SQLITE_CONSTRAINT_FOREIGNKEY: i32 = 787;
const SQLITE_CONSTRAINT_NOTNULL: i32 = 1299;
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A uniqueness, primary key, check or not-null constraint failed, e.g.
    /// creating a category whose name is already taken.
    ///
    /// Holds the message reported by SQLite.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// An expense referred to a category that does not exist.
    #[error("the category ID does not refer to a valid category")]
    ForeignKeyViolation,

    /// The database could not be opened or read/written for environmental
    /// reasons, e.g. disk errors, file corruption or another process holding
    /// a lock on the file.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The requested row does not exist.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An empty string was used to create a category name.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// An expense amount was zero, negative, or not a finite number.
    #[error("{0} is not a valid expense amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// A date-time could not be parsed or lies outside of the years 0000-9999.
    #[error("invalid date-time: {0}")]
    InvalidDateTime(String),

    /// The end of a date range was before its start.
    #[error("the end of a date range must not be before its start")]
    InvalidDateRange,

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A blocking database task panicked or was cancelled.
    #[error("a background database task failed: {0}")]
    TaskFailed(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, description) => {
                classify_sqlite_failure(sql_error, description)
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

fn classify_sqlite_failure(sql_error: rusqlite::ffi::Error, description: Option<String>) -> Error {
    let message = description.clone().unwrap_or_else(|| sql_error.to_string());

    match sql_error.extended_code {
        SQLITE_CONSTRAINT_FOREIGNKEY => return Error::ForeignKeyViolation,
        SQLITE_CONSTRAINT_UNIQUE
        | SQLITE_CONSTRAINT_PRIMARYKEY
        | SQLITE_CONSTRAINT_CHECK
        | SQLITE_CONSTRAINT_NOTNULL => return Error::ConstraintViolation(message),
        _ => {}
    }

    match sql_error.code {
        ErrorCode::CannotOpen
        | ErrorCode::DatabaseBusy
        | ErrorCode::DatabaseLocked
        | ErrorCode::DatabaseCorrupt
        | ErrorCode::NotADatabase
        | ErrorCode::DiskFull
        | ErrorCode::SystemIoFailure
        | ErrorCode::ReadOnly
        | ErrorCode::PermissionDenied => Error::StorageUnavailable(message),
        ErrorCode::ConstraintViolation => Error::ConstraintViolation(message),
        _ => {
            let error = rusqlite::Error::SqliteFailure(sql_error, description);
            tracing::error!("an unhandled SQL error occurred: {}", error);
            Error::SqlError(error)
        }
    }
}
