//! Database operations for categories.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Error,
    category::{Category, CategoryId, CategoryName},
    database_id::UserId,
};

/// Create a category for `user_id` and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategoryName] if the user already has a category called `name`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    name: CategoryName,
    user_id: UserId,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .execute(
            "INSERT INTO category (user_id, name) VALUES (?1, ?2);",
            (user_id, name.as_ref()),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateCategoryName(name.to_string()),
            error => error.into(),
        })?;

    let id = connection.last_insert_rowid();

    Ok(Category { id, user_id, name })
}

/// Retrieve all of a user's categories ordered alphabetically by name.
pub fn get_categories_by_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, user_id, name FROM category WHERE user_id = :user_id ORDER BY name ASC;")?
        .query_map(&[(":user_id", &user_id)], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Find one of the user's categories by its exact name.
///
/// Returns `Ok(None)` if the user has no category with that name.
pub fn get_category_by_name(
    name: &str,
    user_id: UserId,
    connection: &Connection,
) -> Result<Option<Category>, Error> {
    connection
        .prepare("SELECT id, user_id, name FROM category WHERE user_id = ?1 AND name = ?2;")?
        .query_row((user_id, name.trim()), map_row)
        .optional()
        .map_err(|error| error.into())
}

/// Check whether `category_id` refers to a category owned by `user_id`.
pub fn category_belongs_to_user(
    category_id: CategoryId,
    user_id: UserId,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM category WHERE id = ?1 AND user_id = ?2);",
            (category_id, user_id),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            UNIQUE(user_id, name)
        );

        CREATE INDEX IF NOT EXISTS idx_category_user_id ON category(user_id);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let raw_name: String = row.get(2)?;
    let name = CategoryName::new_unchecked(&raw_name);

    Ok(Category { id, user_id, name })
}
