//! Ingests transactions pushed by a bank data provider.

use axum::{Json, extract::State};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    category::get_category_by_name,
    database_id::UserId,
    transaction::{
        Categorization, Transaction, TransactionBuilder, create_endpoint::TransactionState,
        csv::create_import_id, record_transaction,
    },
};

/// The only event type this endpoint handles.
pub const NEW_TRANSACTIONS_EVENT: &str = "transactions.new";

/// The body of a webhook call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// The kind of event, only [NEW_TRANSACTIONS_EVENT] is accepted.
    pub event_type: String,
    /// The user the transactions belong to.
    pub user_id: UserId,
    /// The new transactions.
    #[serde(default)]
    pub transactions: Vec<WebhookTransaction>,
}

/// A transaction as sent by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTransaction {
    /// The provider's ID for the transaction, used to detect redelivery.
    pub transaction_id: String,
    /// The value of the transaction in dollars.
    pub amount: f64,
    /// The date the transaction was posted.
    pub posted_at: Date,
    /// The merchant name, if the provider knows it.
    #[serde(default)]
    pub merchant: Option<String>,
    /// The provider's description of the transaction.
    #[serde(default)]
    pub description: Option<String>,
    /// The provider's category name. Only used if the user has a category
    /// with the same name.
    #[serde(default)]
    pub category: Option<String>,
}

/// Summary of a processed webhook call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResult {
    /// Number of transactions in the payload.
    pub received: usize,
    /// Number of transactions stored.
    pub created: usize,
    /// Number of transactions skipped because they were already ingested.
    pub duplicates: usize,
    /// Number of transactions that could not be stored.
    pub failed: usize,
    /// Number of stored transactions that a rule categorized.
    pub categorized: usize,
}

/// Route handler for transaction webhooks.
///
/// A failure to store one transaction is logged and counted without stopping
/// the rest of the batch.
pub async fn transactions_webhook_endpoint(
    State(state): State<TransactionState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<WebhookResult>, Error> {
    if payload.event_type != NEW_TRANSACTIONS_EVENT {
        tracing::warn!("Ignoring webhook with event type \"{}\"", payload.event_type);
        return Err(Error::UnsupportedWebhookEvent(payload.event_type));
    }

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let tx = connection
        .unchecked_transaction()
        .inspect_err(|error| tracing::error!("could not start transaction: {error}"))?;

    let result = ingest_transactions(payload.user_id, &payload.transactions, &tx)?;

    tx.commit()
        .inspect_err(|error| tracing::error!("could not commit transaction: {error}"))?;

    tracing::info!(
        "Webhook for user #{}: {} received, {} created, {} duplicates, {} failed",
        payload.user_id,
        result.received,
        result.created,
        result.duplicates,
        result.failed
    );

    Ok(Json(result))
}

fn ingest_transactions(
    user_id: UserId,
    transactions: &[WebhookTransaction],
    connection: &Connection,
) -> Result<WebhookResult, Error> {
    let mut result = WebhookResult {
        received: transactions.len(),
        ..Default::default()
    };

    for incoming in transactions {
        let builder = to_builder(user_id, incoming, connection)?;

        match record_transaction(builder, connection) {
            Ok((_, categorization)) => {
                result.created += 1;
                if matches!(categorization, Categorization::Rule(_)) {
                    result.categorized += 1;
                }
            }
            Err(Error::DuplicateImportId) => {
                tracing::debug!(
                    "Skipping transaction \"{}\" that was already ingested",
                    incoming.transaction_id
                );
                result.duplicates += 1;
            }
            Err(error @ (Error::SqlError(_) | Error::DatabaseLockError)) => return Err(error),
            Err(error) => {
                tracing::error!(
                    "Failed to process transaction \"{}\": {error}",
                    incoming.transaction_id
                );
                result.failed += 1;
            }
        }
    }

    Ok(result)
}

fn to_builder(
    user_id: UserId,
    incoming: &WebhookTransaction,
    connection: &Connection,
) -> Result<TransactionBuilder, Error> {
    let category_id = match incoming.category.as_deref() {
        Some(name) if !name.trim().is_empty() => {
            get_category_by_name(name, user_id, connection)?.map(|category| category.id)
        }
        _ => None,
    };

    let import_id = create_import_id(&format!("{user_id}:{}", incoming.transaction_id));

    Ok(Transaction::build(user_id, incoming.amount, incoming.posted_at)
        .merchant(incoming.merchant.as_deref())
        .description(incoming.description.as_deref())
        .category_id(category_id)
        .import_id(Some(import_id)))
}
