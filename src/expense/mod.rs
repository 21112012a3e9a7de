//! Expenses, i.e. money spent on a given date and filed under a category.

mod core;

pub use core::{
    Expense, ExpenseBuilder, ExpenseId, count_expenses, create_expense, create_expense_table,
    delete_expense, get_all_expenses, get_expense, get_expenses_in_range, update_expense,
};
