//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of the user that owns categories, rules and transactions.
///
/// Users are managed outside of this service, so the ID is opaque here.
pub type UserId = i64;

/// Alias for the integer type used for transaction IDs.
pub type TransactionId = DatabaseId;
