//! Implements the in-memory copy of the database that front ends render from.

use time::OffsetDateTime;

use crate::{
    Error, Store,
    aggregation::{CategoryTotal, get_category_totals},
    category::{
        Category, CategoryId, CategoryName, create_category, delete_category, get_all_categories,
    },
    expense::{
        Expense, ExpenseBuilder, ExpenseId, create_expense, delete_expense, get_all_expenses,
        get_expenses_in_range, update_expense,
    },
    window::{DateRange, month_range, previous_month_range},
};

/// The categories, expenses and monthly totals last loaded from a [Store].
///
/// The cache is never written to directly: every mutation goes to the store
/// first and is followed by a full [AppState::reload]. If that reload fails
/// the cache is cleared instead, so it never holds rows the database no
/// longer agrees with. A mutation that reached the database always returns
/// `Ok`, even when the reload after it failed.
#[derive(Debug, Clone)]
pub struct AppState {
    store: Store,
    clock: fn() -> OffsetDateTime,

    /// All categories, ordered by name.
    pub categories: Vec<Category>,
    /// All expenses, newest first.
    pub expenses: Vec<Expense>,
    /// Totals per category for the current calendar month.
    pub this_month: Vec<CategoryTotal>,
    /// Totals per category for the previous calendar month.
    pub last_month: Vec<CategoryTotal>,
}

impl AppState {
    /// Create an empty cache for `store` without loading anything.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            clock: OffsetDateTime::now_utc,
            categories: Vec::new(),
            expenses: Vec::new(),
            this_month: Vec::new(),
            last_month: Vec::new(),
        }
    }

    /// Replace the clock used to decide what "this month" is.
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Create a cache for `store` and fill it.
    ///
    /// If loading fails the error is logged and the cache is left empty, so an
    /// empty cache may mean either "no data" or "could not load".
    pub async fn load(store: Store) -> Self {
        let mut state = Self::new(store);
        state.load_or_clear().await;
        state
    }

    /// Fill an existing cache with the same failure policy as [AppState::load].
    pub async fn load_or_clear(&mut self) {
        if let Err(error) = self.reload().await {
            tracing::error!("Could not load data, clearing the cached state: {error}");
            self.clear();
        }
    }

    /// The store the cache reads from.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Re-read all categories and expenses and recompute the monthly totals.
    ///
    /// The cache is only modified if every query succeeds.
    ///
    /// # Errors
    /// Returns the first error from any of the queries.
    pub async fn reload(&mut self) -> Result<(), Error> {
        let (categories, expenses) = tokio::try_join!(
            run_blocking(&self.store, get_all_categories),
            run_blocking(&self.store, get_all_expenses),
        )?;

        let now = (self.clock)();
        let this_month_range = month_range(now)?;
        let last_month_range = previous_month_range(now)?;

        let (this_month, last_month) = tokio::try_join!(
            run_blocking(&self.store, move |store| get_category_totals(&this_month_range, store)),
            run_blocking(&self.store, move |store| get_category_totals(&last_month_range, store)),
        )?;

        tracing::debug!(
            "Loaded {} categories and {} expenses",
            categories.len(),
            expenses.len()
        );

        self.categories = categories;
        self.expenses = expenses;
        self.this_month = this_month;
        self.last_month = last_month;

        Ok(())
    }

    /// Create a category, then reload.
    ///
    /// # Errors
    /// Returns [Error::ConstraintViolation] if the name is taken.
    pub async fn add_category(
        &mut self,
        name: CategoryName,
        color: &str,
    ) -> Result<Category, Error> {
        let color = color.to_owned();
        let category =
            run_blocking(&self.store, move |store| create_category(name, &color, store)).await?;

        self.load_or_clear().await;

        Ok(category)
    }

    /// Delete a category and its expenses, then reload.
    pub async fn delete_category(&mut self, category_id: CategoryId) -> Result<(), Error> {
        run_blocking(&self.store, move |store| delete_category(category_id, store)).await?;
        self.load_or_clear().await;

        Ok(())
    }

    /// Create an expense, then reload.
    ///
    /// Returns the expense as it was stored.
    pub async fn add_expense(&mut self, builder: ExpenseBuilder) -> Result<Expense, Error> {
        let expense =
            run_blocking(&self.store, move |store| create_expense(builder, store)).await?;

        self.load_or_clear().await;

        Ok(expense)
    }

    /// Overwrite an expense, then reload.
    pub async fn update_expense(
        &mut self,
        id: ExpenseId,
        builder: ExpenseBuilder,
    ) -> Result<(), Error> {
        run_blocking(&self.store, move |store| update_expense(id, builder, store)).await?;
        self.load_or_clear().await;

        Ok(())
    }

    /// Delete an expense, then reload.
    pub async fn delete_expense(&mut self, id: ExpenseId) -> Result<(), Error> {
        run_blocking(&self.store, move |store| delete_expense(id, store)).await?;
        self.load_or_clear().await;

        Ok(())
    }

    /// Query the store for the expenses in an arbitrary window. Does not touch
    /// the cache.
    pub async fn expenses_in_range(&self, range: DateRange) -> Result<Vec<Expense>, Error> {
        run_blocking(&self.store, move |store| get_expenses_in_range(&range, store)).await
    }

    /// Query the store for the category totals of an arbitrary window. Does
    /// not touch the cache.
    pub async fn category_totals(&self, range: DateRange) -> Result<Vec<CategoryTotal>, Error> {
        run_blocking(&self.store, move |store| get_category_totals(&range, store)).await
    }

    /// The total spent across all categories this month.
    pub fn this_month_total(&self) -> f64 {
        self.this_month.iter().map(|total| total.total).sum()
    }

    /// The total spent across all categories last month.
    pub fn last_month_total(&self) -> f64 {
        self.last_month.iter().map(|total| total.total).sum()
    }

    /// Up to `count` of the newest expenses.
    pub fn recent_expenses(&self, count: usize) -> &[Expense] {
        &self.expenses[..count.min(self.expenses.len())]
    }

    fn clear(&mut self) {
        self.categories.clear();
        self.expenses.clear();
        self.this_month.clear();
        self.last_month.clear();
    }
}

/// Run a blocking database call on tokio's blocking thread pool.
async fn run_blocking<T, F>(store: &Store, query: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> Result<T, Error> + Send + 'static,
{
    let store = store.clone();

    tokio::task::spawn_blocking(move || query(&store))
        .await
        .map_err(|error| Error::TaskFailed(error.to_string()))?
}

#[cfg(test)]
mod app_state_tests {
    use time::{OffsetDateTime, macros::datetime};

    use crate::{
        AppState, CategoryName, DEFAULT_CATEGORIES, DateRange, Error, Expense, Store, Timestamp,
        count_expenses, db::initialize,
    };

    fn fixed_clock() -> OffsetDateTime {
        datetime!(2025-01-20 09:00:00 UTC)
    }

    fn get_test_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        initialize(&store).unwrap();
        store
    }

    async fn get_test_state() -> AppState {
        let mut state = AppState::new(get_test_store()).with_clock(fixed_clock);
        state.reload().await.expect("Could not load state");
        state
    }

    fn timestamp(text: &str) -> Timestamp {
        text.parse().unwrap()
    }

    fn category_id(state: &AppState, name: &str) -> i64 {
        state
            .categories
            .iter()
            .find(|category| category.name.as_ref() == name)
            .map(|category| category.id)
            .unwrap()
    }

    #[tokio::test]
    async fn load_fills_categories_and_totals() {
        let state = get_test_state().await;

        assert_eq!(state.categories.len(), DEFAULT_CATEGORIES.len());
        assert!(state.expenses.is_empty());
        assert_eq!(state.this_month.len(), DEFAULT_CATEGORIES.len());
        assert_eq!(state.last_month.len(), DEFAULT_CATEGORIES.len());
    }

    #[tokio::test]
    async fn add_expense_reloads_cache() {
        let mut state = get_test_state().await;
        let food = category_id(&state, "Food");

        let expense = state
            .add_expense(Expense::build(45.5, food, timestamp("2025-01-10T12:00:00Z")))
            .await
            .unwrap();

        assert_eq!(state.expenses, vec![expense]);
        assert_eq!(state.this_month[0].category_id, food);
        assert_eq!(state.this_month_total(), 45.5);
        assert_eq!(state.last_month_total(), 0.0);
    }

    #[tokio::test]
    async fn totals_split_this_month_and_last_month() {
        let mut state = get_test_state().await;
        let food = category_id(&state, "Food");
        let bills = category_id(&state, "Bills");

        for (amount, category, date) in [
            (10.0, food, "2025-01-01T00:00:00Z"),
            (20.0, bills, "2024-12-31T23:59:59Z"),
            (30.0, bills, "2024-12-01T00:00:00Z"),
            (40.0, food, "2024-11-30T23:59:59Z"),
            (50.0, food, "2025-02-01T00:00:00Z"),
        ] {
            state
                .add_expense(Expense::build(amount, category, timestamp(date)))
                .await
                .unwrap();
        }

        assert_eq!(state.this_month_total(), 10.0);
        assert_eq!(state.last_month_total(), 50.0);
        assert_eq!(state.last_month[0].category_id, bills);
        assert_eq!(state.expenses.len(), 5);
    }

    #[tokio::test]
    async fn update_and_delete_expense_are_reflected() {
        let mut state = get_test_state().await;
        let food = category_id(&state, "Food");
        let other = category_id(&state, "Other");
        let expense = state
            .add_expense(Expense::build(5.0, food, timestamp("2025-01-05T00:00:00Z")))
            .await
            .unwrap();

        state
            .update_expense(
                expense.id,
                Expense::build(6.0, other, expense.date).notes(Some("moved")),
            )
            .await
            .unwrap();

        assert_eq!(state.expenses[0].amount, 6.0);
        assert_eq!(state.expenses[0].category_id, other);
        assert_eq!(state.this_month[0].category_id, other);

        state.delete_expense(expense.id).await.unwrap();

        assert!(state.expenses.is_empty());
        assert_eq!(state.this_month_total(), 0.0);
    }

    #[tokio::test]
    async fn delete_category_removes_its_expenses_from_cache() {
        let mut state = get_test_state().await;
        let category = state
            .add_category(CategoryName::new("Travel").unwrap(), "#123456")
            .await
            .unwrap();
        state
            .add_expense(Expense::build(
                300.0,
                category.id,
                timestamp("2025-01-02T00:00:00Z"),
            ))
            .await
            .unwrap();
        assert_eq!(state.categories.len(), DEFAULT_CATEGORIES.len() + 1);

        state.delete_category(category.id).await.unwrap();

        assert_eq!(state.categories.len(), DEFAULT_CATEGORIES.len());
        assert!(state.expenses.is_empty());
        assert!(
            state
                .this_month
                .iter()
                .all(|total| total.category_id != category.id)
        );
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_untouched() {
        let mut state = get_test_state().await;

        let result = state
            .add_category(CategoryName::new("Food").unwrap(), "#000000")
            .await;

        assert!(matches!(result, Err(Error::ConstraintViolation(_))));
        assert_eq!(state.categories.len(), DEFAULT_CATEGORIES.len());
    }

    #[tokio::test]
    async fn recent_expenses_are_newest_first() {
        let mut state = get_test_state().await;
        let food = category_id(&state, "Food");
        for day in 1..=5 {
            state
                .add_expense(Expense::build(
                    1.0,
                    food,
                    timestamp(&format!("2025-01-0{day}T00:00:00Z")),
                ))
                .await
                .unwrap();
        }

        let recent = state.recent_expenses(3);

        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].date, timestamp("2025-01-05T00:00:00Z"));
        assert_eq!(state.recent_expenses(100).len(), 5);
    }

    #[tokio::test]
    async fn window_queries_read_from_store() {
        let mut state = get_test_state().await;
        let food = category_id(&state, "Food");
        state
            .add_expense(Expense::build(8.0, food, timestamp("2024-06-01T00:00:00Z")))
            .await
            .unwrap();
        let june = DateRange::new(
            timestamp("2024-06-01T00:00:00Z"),
            timestamp("2024-07-01T00:00:00Z"),
        )
        .unwrap();

        let expenses = state.expenses_in_range(june).await.unwrap();
        let totals = state.category_totals(june).await.unwrap();

        assert_eq!(expenses.len(), 1);
        assert_eq!(totals[0].category_id, food);
        assert_eq!(totals[0].total, 8.0);
        assert_eq!(state.this_month_total(), 0.0);
    }

    #[tokio::test]
    async fn failed_initial_load_leaves_cache_empty() {
        // No tables, so every query fails.
        let store = Store::open_in_memory().unwrap();

        let state = AppState::load(store).await;

        assert!(state.categories.is_empty());
        assert!(state.expenses.is_empty());
        assert!(state.this_month.is_empty());
        assert!(state.last_month.is_empty());
    }

    #[tokio::test]
    async fn failed_reload_clears_stale_data() {
        let mut state = get_test_state().await;
        state
            .store()
            .execute("DROP TABLE expenses;", [])
            .expect("Could not drop table");

        state.load_or_clear().await;

        assert!(state.categories.is_empty());
        assert!(state.this_month.is_empty());
    }

    // December 9999 has no following month, so every reload fails.
    fn end_of_time_clock() -> OffsetDateTime {
        datetime!(9999-12-20 09:00:00 UTC)
    }

    #[tokio::test]
    async fn write_succeeds_when_reload_after_it_fails() {
        let store = get_test_store();
        let mut state = AppState::new(store.clone()).with_clock(end_of_time_clock);
        let food = store
            .query_one("SELECT id FROM categories WHERE name = 'Food'", [], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap();

        let expense = state
            .add_expense(Expense::build(5.0, food, timestamp("2025-01-01T00:00:00Z")))
            .await
            .expect("A committed write should be reported as a success");

        assert_eq!(expense.amount, 5.0);
        assert_eq!(count_expenses(&store), Ok(1));
        assert!(state.categories.is_empty());
        assert!(state.expenses.is_empty());
        assert!(state.this_month.is_empty());
    }

    #[tokio::test]
    async fn failed_reload_after_write_clears_stale_cache() {
        let mut state = get_test_state().await;
        let food = category_id(&state, "Food");
        let expense = state
            .add_expense(Expense::build(5.0, food, timestamp("2025-01-05T00:00:00Z")))
            .await
            .unwrap();
        assert_eq!(state.expenses.len(), 1);
        state.clock = end_of_time_clock;

        state.delete_expense(expense.id).await.unwrap();

        assert_eq!(count_expenses(state.store()), Ok(0));
        assert!(state.expenses.is_empty());
        assert!(state.categories.is_empty());
    }
}
