//! Categories that expenses are filed under.

mod db;
mod domain;

pub use db::{
    count_categories, create_category, create_category_table, delete_category,
    get_all_categories, get_category,
};
pub use domain::{Category, CategoryId, CategoryName};
