//! Categories that transactions are assigned to, either explicitly or by rules.

mod create;
mod db;
mod domain;
mod list;

pub use create::create_category_endpoint;
pub use db::{
    category_belongs_to_user, create_category, create_category_table, get_categories_by_user,
    get_category_by_name,
};
pub use domain::{Category, CategoryId, CategoryName};
pub use list::get_categories_endpoint;
