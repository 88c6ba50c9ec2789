//! Transactions and the workflows that create them.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing and querying transactions
//! - The categorization workflow that runs the user's rules on new transactions
//! - Route handlers for manual creation, CSV import and webhook ingestion

mod categorize;
mod core;
mod create_endpoint;
mod csv;
mod import;
mod webhook;

pub use categorize::{Categorization, apply_rules, record_transaction};
pub use core::{
    Transaction, TransactionBuilder, create_transaction, create_transaction_table,
    get_transaction, get_uncategorized_transactions, map_transaction_row,
    set_transaction_categories,
};
pub use create_endpoint::{create_transaction_endpoint, get_transaction_endpoint};
pub use csv::create_import_id;
pub use import::import_transactions_endpoint;
pub use webhook::transactions_webhook_endpoint;
