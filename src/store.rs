//! The database handle shared by the repositories and the primitives they use
//! to run SQL against it.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::{Connection, Params, Row, Transaction, types::Value};

use crate::Error;

/// The database file used when the caller does not pick one.
pub const DEFAULT_DB_PATH: &str = "spendbook.db";

/// A row returned by [Store::query], keyed by column name.
pub type RowMap = BTreeMap<String, Value>;

/// The result of running a mutating statement with [Store::execute].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOutcome {
    /// The number of rows inserted, updated or deleted.
    pub rows_affected: usize,
    /// The row ID of the row the statement inserted, `None` when it did not
    /// insert anything.
    pub inserted_id: Option<i64>,
}

/// An owned handle to the application's SQLite database.
///
/// Clones share the same underlying connection, so there is exactly one
/// connection per store no matter how many repositories hold it. The
/// connection is closed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Store {
    connection: Arc<Mutex<Connection>>,
}

impl Store {
    /// Wrap an existing connection.
    pub fn new(connection: Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns [Error::StorageUnavailable] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let connection = Connection::open(path)?;
        tracing::info!("Opened database at {}", path.display());

        Ok(Self::new(connection))
    }

    /// Open a private, in-memory database. Mostly useful for tests.
    ///
    /// # Errors
    /// Returns an error if SQLite fails to allocate the database.
    pub fn open_in_memory() -> Result<Self, Error> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    /// Run a mutating statement (`INSERT`, `UPDATE`, `DELETE`, DDL) with
    /// positional `params`.
    ///
    /// # Errors
    /// Constraint failures are returned as [Error::ConstraintViolation] or
    /// [Error::ForeignKeyViolation], other failures as the matching [Error].
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<ExecuteOutcome, Error> {
        let connection = self.lock()?;
        let previous_rowid = connection.last_insert_rowid();
        let rows_affected = connection.execute(sql, params)?;
        let rowid = connection.last_insert_rowid();
        let inserted_id = (rows_affected > 0 && rowid != previous_rowid).then_some(rowid);

        Ok(ExecuteOutcome {
            rows_affected,
            inserted_id,
        })
    }

    /// Run a read-only statement and return every row as a map from column
    /// name to value, in the order SQLite produced them.
    ///
    /// # Errors
    /// Returns an error if the statement cannot be prepared or a row cannot be
    /// read.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<RowMap>, Error> {
        let connection = self.lock()?;
        let mut statement = connection.prepare(sql)?;
        let column_names: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect();

        let mut rows = statement.query(params)?;
        let mut results = Vec::new();

        while let Some(row) = rows.next()? {
            let mut mapped = RowMap::new();
            for (index, name) in column_names.iter().enumerate() {
                mapped.insert(name.clone(), row.get::<_, Value>(index)?);
            }
            results.push(mapped);
        }

        Ok(results)
    }

    /// Run a read-only statement and convert each row with `map_row`.
    ///
    /// # Errors
    /// Returns an error if the statement fails or `map_row` fails for any row.
    pub fn query_map<T, P, F>(&self, sql: &str, params: P, map_row: F) -> Result<Vec<T>, Error>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        let connection = self.lock()?;
        let mut statement = connection.prepare(sql)?;
        let rows = statement
            .query_map(params, map_row)?
            .map(|maybe_row| maybe_row.map_err(Error::from))
            .collect::<Result<Vec<T>, Error>>();

        rows
    }

    /// Run a statement that is expected to return a single row.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the statement returned no rows.
    pub fn query_one<T, P, F>(&self, sql: &str, params: P, map_row: F) -> Result<T, Error>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        self.lock()?
            .query_row(sql, params, map_row)
            .map_err(|error| error.into())
    }

    /// Run several semicolon separated statements that take no parameters.
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), Error> {
        self.lock()?.execute_batch(sql)?;

        Ok(())
    }

    /// Run `body` inside a transaction that is committed if `body` succeeds and
    /// rolled back otherwise.
    pub(crate) fn with_transaction<T>(
        &self,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;
        let result = body(&transaction)?;
        transaction.commit()?;

        Ok(result)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)
    }
}

#[cfg(test)]
mod store_tests {
    use rusqlite::types::Value;

    use crate::{Error, store::Store};

    fn get_test_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE item (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    price REAL
                );",
            )
            .expect("Could not create test table");
        store
    }

    #[test]
    fn execute_returns_inserted_id() {
        let store = get_test_store();

        let first = store
            .execute("INSERT INTO item (name) VALUES (?1)", ["foo"])
            .unwrap();
        let second = store
            .execute("insert into item (name) values (?1)", ["bar"])
            .unwrap();

        assert_eq!(first.inserted_id, Some(1));
        assert_eq!(second.inserted_id, Some(2));
        assert_eq!(second.rows_affected, 1);
    }

    #[test]
    fn execute_returns_inserted_id_for_any_insert_form() {
        let store = get_test_store();

        let commented = store
            .execute("-- new item\nINSERT INTO item (name) VALUES (?1)", ["foo"])
            .unwrap();
        let with_cte = store
            .execute(
                "WITH names(name) AS (VALUES (?1)) INSERT INTO item (name) SELECT name FROM names",
                ["bar"],
            )
            .unwrap();
        let replaced = store
            .execute("REPLACE INTO item (name, price) VALUES (?1, ?2)", ("baz", 1.0))
            .unwrap();

        assert_eq!(commented.inserted_id, Some(1));
        assert_eq!(with_cte.inserted_id, Some(2));
        assert_eq!(replaced.inserted_id, Some(3));
    }

    #[test]
    fn execute_update_has_no_inserted_id() {
        let store = get_test_store();
        store
            .execute("INSERT INTO item (name) VALUES (?1)", ["foo"])
            .unwrap();

        let outcome = store
            .execute("UPDATE item SET price = ?1 WHERE name = ?2", (1.5, "foo"))
            .unwrap();

        assert_eq!(outcome.inserted_id, None);
        assert_eq!(outcome.rows_affected, 1);
    }

    #[test]
    fn execute_reports_unique_failure() {
        let store = get_test_store();
        store
            .execute("INSERT INTO item (name) VALUES (?1)", ["foo"])
            .unwrap();

        let result = store.execute("INSERT INTO item (name) VALUES (?1)", ["foo"]);

        assert!(matches!(result, Err(Error::ConstraintViolation(_))));
    }

    #[test]
    fn query_returns_rows_keyed_by_column() {
        let store = get_test_store();
        store
            .execute("INSERT INTO item (name, price) VALUES (?1, ?2)", ("foo", 2.5))
            .unwrap();
        store
            .execute("INSERT INTO item (name) VALUES (?1)", ["bar"])
            .unwrap();

        let rows = store
            .query("SELECT id, name, price FROM item ORDER BY id DESC", [])
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], Value::Text("bar".to_owned()));
        assert_eq!(rows[0]["price"], Value::Null);
        assert_eq!(rows[1]["id"], Value::Integer(1));
        assert_eq!(rows[1]["price"], Value::Real(2.5));
    }

    #[test]
    fn parameters_are_not_interpolated() {
        let store = get_test_store();
        let hostile_name = "x'); DROP TABLE item; --";

        store
            .execute("INSERT INTO item (name) VALUES (?1)", [hostile_name])
            .unwrap();

        let rows = store
            .query("SELECT name FROM item WHERE name = ?1", [hostile_name])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::Text(hostile_name.to_owned()));
    }

    #[test]
    fn query_one_with_no_rows_returns_not_found() {
        let store = get_test_store();

        let result = store.query_one("SELECT id FROM item WHERE id = ?1", [42], |row| {
            row.get::<_, i64>(0)
        });

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn failed_transaction_is_rolled_back() {
        let store = get_test_store();

        let result = store.with_transaction(|transaction| {
            transaction.execute("INSERT INTO item (name) VALUES (?1)", ["foo"])?;
            transaction.execute("INSERT INTO item (name) VALUES (?1)", ["foo"])?;
            Ok(())
        });

        assert!(result.is_err());
        let rows = store.query("SELECT id FROM item", []).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn clones_share_the_connection() {
        let store = get_test_store();
        let clone = store.clone();

        clone
            .execute("INSERT INTO item (name) VALUES (?1)", ["foo"])
            .unwrap();

        assert_eq!(store.query("SELECT id FROM item", []).unwrap().len(), 1);
    }
}
