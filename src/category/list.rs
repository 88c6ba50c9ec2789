//! Category listing endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    category::{Category, get_categories_by_user},
    user::UserQuery,
};

/// The state needed for listing categories.
#[derive(Debug, Clone)]
pub struct CategoriesState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoriesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the user's categories sorted by name.
pub async fn get_categories_endpoint(
    State(state): State<CategoriesState>,
    Query(user): Query<UserQuery>,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let categories = get_categories_by_user(user.user_id, &connection)
        .inspect_err(|error| tracing::error!("Failed to retrieve categories: {error}"))?;

    Ok(Json(categories))
}
