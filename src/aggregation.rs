//! Per-category spending totals over a date window.

use rusqlite::Row;
use serde::Serialize;

use crate::{Error, Store, category::CategoryId, window::DateRange};

/// How much was spent in one category over some date window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The ID of the category.
    pub category_id: CategoryId,
    /// The name of the category.
    pub category_name: String,
    /// The display color of the category.
    pub color: String,
    /// The sum of the amounts of the category's expenses in the window, zero
    /// if there were none.
    pub total: f64,
}

/// Sum the expenses dated within `range` for each category.
///
/// Every category is included, with a total of zero if it has no expenses in
/// the window. Results are ordered by total, largest first, and categories
/// with the same total are ordered by name.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_category_totals(range: &DateRange, store: &Store) -> Result<Vec<CategoryTotal>, Error> {
    // The date filter must stay in the join condition, filtering in a WHERE
    // clause would drop the categories without expenses.
    store.query_map(
        "SELECT c.id, c.name, c.color, COALESCE(SUM(e.amount), 0.0) AS total
         FROM categories c
         LEFT JOIN expenses e
            ON e.categoryId = c.id AND e.date >= ?1 AND e.date < ?2
         GROUP BY c.id, c.name, c.color
         ORDER BY total DESC, c.name ASC;",
        (range.start(), range.end()),
        map_row,
    )
}

fn map_row(row: &Row) -> Result<CategoryTotal, rusqlite::Error> {
    Ok(CategoryTotal {
        category_id: row.get(0)?,
        category_name: row.get(1)?,
        color: row.get(2)?,
        total: row.get(3)?,
    })
}
