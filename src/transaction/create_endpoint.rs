//! Defines the endpoints for creating and fetching a transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error,
    category::CategoryId,
    database_id::TransactionId,
    transaction::{Transaction, core::get_transaction, record_transaction},
    user::UserQuery,
};

/// The state needed to get or create a transaction.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    /// The value of the transaction in dollars.
    pub amount: f64,
    /// The date when the transaction occurred, e.g. `2025-01-15`.
    pub posted_at: Date,
    /// Who was paid or who paid, matched by merchant patterns.
    #[serde(default)]
    pub merchant: Option<String>,
    /// Free text matched by description patterns.
    #[serde(default)]
    pub description: Option<String>,
    /// An explicit category. When absent, the user's rules pick one.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

/// A route handler for creating a new transaction.
///
/// Responds with `201 Created` and the stored transaction, including the
/// category assigned by a rule if one matched.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Query(user): Query<UserQuery>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<Response, Error> {
    let builder = Transaction::build(user.user_id, request.amount, request.posted_at)
        .merchant(request.merchant.as_deref())
        .description(request.description.as_deref())
        .category_id(request.category_id);

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let (transaction, categorization) = record_transaction(builder, &connection)?;

    tracing::info!(
        "Created transaction #{} for user #{} ({categorization:?})",
        transaction.id,
        transaction.user_id
    );

    Ok((StatusCode::CREATED, Json(transaction)).into_response())
}

/// A route handler for fetching one of the user's transactions.
pub async fn get_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<TransactionState>,
    Query(user): Query<UserQuery>,
) -> Result<Json<Transaction>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = get_transaction(transaction_id, user.user_id, &connection)?;

    Ok(Json(transaction))
}
