//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    category::CategoryId,
    database_id::{DatabaseId, TransactionId, UserId},
};

// ============================================================================
// MODELS
// ============================================================================

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseId,
    /// The user that owns the transaction.
    pub user_id: UserId,
    /// The amount of money spent or earned in this transaction.
    pub amount: f64,
    /// When the transaction happened.
    pub posted_at: Date,
    /// Who the money was paid to or received from.
    pub merchant: Option<String>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// The ID of the category the transaction belongs to.
    pub category_id: Option<CategoryId>,
    /// Hash identifying a transaction ingested from a CSV file or webhook.
    pub import_id: Option<i64>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(user_id: UserId, amount: f64, posted_at: Date) -> TransactionBuilder {
        TransactionBuilder {
            user_id,
            amount,
            posted_at,
            merchant: None,
            description: None,
            category_id: None,
            import_id: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// # Examples
///
/// ```ignore
/// use time::macros::date;
///
/// use crate::transaction::Transaction;
///
/// let transaction = Transaction::build(1, -4.50, date!(2025 - 01 - 15))
///     .merchant(Some("Starbucks"))
///     .description(Some("Flat white"))
///     .import_id(Some(987654321));
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The user that owns the transaction.
    pub user_id: UserId,

    /// The monetary amount of the transaction.
    ///
    /// Positive values represent income/credits, negative values represent
    /// expenses/debits.
    pub amount: f64,

    /// The date when the money moved, not when it was recorded.
    pub posted_at: Date,

    /// The merchant name, matched by a rule's `merchantPattern`.
    pub merchant: Option<String>,

    /// The description, matched by a rule's `descriptionPattern`.
    ///
    /// For imported transactions this typically comes from the bank, e.g.
    /// `"POS W/D LOBSTER SEAFOO-19:47"`.
    pub description: Option<String>,

    /// The category of the transaction, e.g. "Groceries", "Transport", "Rent".
    ///
    /// Transactions created without a category are categorized by the user's
    /// rules.
    pub category_id: Option<CategoryId>,

    /// Optional unique identifier for ingested transactions.
    ///
    /// The database enforces uniqueness on this field, so ingesting the same
    /// transaction twice fails with [Error::DuplicateImportId] instead of
    /// creating a copy. See [crate::transaction::create_import_id].
    pub import_id: Option<i64>,
}

impl TransactionBuilder {
    /// Set the merchant, treating blank text as no merchant.
    pub fn merchant(mut self, merchant: Option<&str>) -> Self {
        self.merchant = non_blank(merchant);
        self
    }

    /// Set the description, treating blank text as no description.
    pub fn description(mut self, description: Option<&str>) -> Self {
        self.description = non_blank(description);
        self
    }

    /// Set the category id for the transaction.
    pub fn category_id(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set the import ID for the transaction.
    pub fn import_id(mut self, import_id: Option<i64>) -> Self {
        self.import_id = import_id;
        self
    }
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new transaction in the database from a builder.
///
/// The builder is stored as is: rules are applied by
/// [crate::transaction::record_transaction], not here.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the category ID does not refer to a real category,
/// - or [Error::DuplicateImportId] if a transaction with the specified import ID already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, amount, posted_at, merchant, description, category_id, import_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, user_id, amount, posted_at, merchant, description, category_id, import_id",
        )?
        .query_row(
            (
                builder.user_id,
                builder.amount,
                builder.posted_at,
                &builder.merchant,
                &builder.description,
                builder.category_id,
                builder.import_id,
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(builder.category_id),
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateImportId,
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Retrieve one of the user's transactions by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction of `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, user_id, amount, posted_at, merchant, description, category_id, import_id
             FROM \"transaction\" WHERE id = :id AND user_id = :user_id",
        )?
        .query_one(&[(":id", &id), (":user_id", &user_id)], map_transaction_row)?;

    Ok(transaction)
}

/// Retrieve the user's transactions that do not have a category, oldest first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_uncategorized_transactions(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, amount, posted_at, merchant, description, category_id, import_id
             FROM \"transaction\"
             WHERE user_id = :user_id AND category_id IS NULL
             ORDER BY posted_at ASC, id ASC",
        )?
        .query_map(&[(":user_id", &user_id)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Batch set the category of multiple transactions.
///
/// **Note**: If you want transactional integrity (all or nothing), pass in a
/// transaction for `connection`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if any category ID does not refer to a real category,
/// - [Error::SqlError] if there is some other SQL error.
pub fn set_transaction_categories(
    transaction_category_pairs: &[(TransactionId, CategoryId)],
    connection: &Connection,
) -> Result<(), Error> {
    if transaction_category_pairs.is_empty() {
        return Ok(());
    }

    let mut stmt =
        connection.prepare("UPDATE \"transaction\" SET category_id = ?2 WHERE id = ?1")?;

    for (transaction_id, category_id) in transaction_category_pairs {
        stmt.execute((transaction_id, category_id))
            .map_err(|error| match error {
                rusqlite::Error::SqliteFailure(error, _)
                    if error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
                {
                    Error::InvalidCategory(Some(*category_id))
                }
                error => error.into(),
            })?;
    }

    Ok(())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                posted_at TEXT NOT NULL,
                merchant TEXT,
                description TEXT,
                category_id INTEGER,
                import_id INTEGER UNIQUE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    // Used to find uncategorized transactions.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_category ON \"transaction\"(user_id, category_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let amount = row.get(2)?;
    let posted_at = row.get(3)?;
    let merchant = row.get(4)?;
    let description = row.get(5)?;
    let category_id = row.get(6)?;
    let import_id = row.get(7)?;

    Ok(Transaction {
        id,
        user_id,
        amount,
        posted_at,
        merchant,
        description,
        category_id,
        import_id,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        category::{CategoryName, create_category},
        db::initialize,
        transaction::{
            Transaction, create_transaction, get_transaction, get_uncategorized_transactions,
            set_transaction_categories,
        },
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();

        let result = create_transaction(
            Transaction::build(1, -4.5, date!(2025 - 10 - 05))
                .merchant(Some(" Starbucks "))
                .description(Some("")),
            &conn,
        );

        match result {
            Ok(transaction) => {
                assert_eq!(transaction.amount, -4.5);
                assert_eq!(transaction.posted_at, date!(2025 - 10 - 05));
                assert_eq!(transaction.merchant.as_deref(), Some("Starbucks"));
                assert_eq!(transaction.description, None);
                assert_eq!(transaction.category_id, None);
            }
            Err(error) => panic!("Unexpected error: {error}"),
        }
    }

    #[test]
    fn create_fails_on_duplicate_import_id() {
        let conn = get_test_connection();
        let import_id = Some(123456789);
        let today = date!(2025 - 10 - 04);
        create_transaction(
            Transaction::build(1, 123.45, today).import_id(import_id),
            &conn,
        )
        .expect("Could not create transaction");

        let duplicate_transaction = create_transaction(
            Transaction::build(1, 123.45, today).import_id(import_id),
            &conn,
        );

        assert_eq!(duplicate_transaction, Err(Error::DuplicateImportId));
    }

    #[test]
    fn create_fails_on_invalid_category_id() {
        let conn = get_test_connection();
        let category_id = Some(42);

        let result = create_transaction(
            Transaction::build(1, 123.45, date!(2025 - 10 - 04)).category_id(category_id),
            &conn,
        );

        assert_eq!(result, Err(Error::InvalidCategory(category_id)));
    }

    #[test]
    fn get_transaction_of_other_user_is_not_found() {
        let conn = get_test_connection();
        let transaction =
            create_transaction(Transaction::build(1, 1.0, date!(2025 - 10 - 04)), &conn).unwrap();

        assert_eq!(
            get_transaction(transaction.id, 1, &conn),
            Ok(transaction.clone())
        );
        assert_eq!(
            get_transaction(transaction.id, 2, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn uncategorized_transactions_are_set() {
        let conn = get_test_connection();
        let category = create_category(CategoryName::new_unchecked("Food"), 1, &conn).unwrap();
        let uncategorized =
            create_transaction(Transaction::build(1, 1.0, date!(2025 - 10 - 04)), &conn).unwrap();
        create_transaction(
            Transaction::build(1, 2.0, date!(2025 - 10 - 04)).category_id(Some(category.id)),
            &conn,
        )
        .unwrap();
        create_transaction(Transaction::build(2, 3.0, date!(2025 - 10 - 04)), &conn).unwrap();

        let got = get_uncategorized_transactions(1, &conn).unwrap();
        assert_eq!(got, vec![uncategorized.clone()]);

        set_transaction_categories(&[(uncategorized.id, category.id)], &conn).unwrap();

        assert!(get_uncategorized_transactions(1, &conn).unwrap().is_empty());
    }

    #[test]
    fn set_categories_fails_on_invalid_category() {
        let conn = get_test_connection();
        let transaction =
            create_transaction(Transaction::build(1, 1.0, date!(2025 - 10 - 04)), &conn).unwrap();

        let result = set_transaction_categories(&[(transaction.id, 99)], &conn);

        assert_eq!(result, Err(Error::InvalidCategory(Some(99))));
    }
}
