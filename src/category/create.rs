//! Category creation endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    category::{CategoryName, create_category, domain::CategoryRequest},
    user::UserQuery,
};

/// The state needed for creating a category.
#[derive(Debug, Clone)]
pub struct CreateCategoryEndpointState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateCategoryEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Handle a request to create a category for the user.
///
/// Responds with `201 Created` and the new category.
pub async fn create_category_endpoint(
    State(state): State<CreateCategoryEndpointState>,
    Query(user): Query<UserQuery>,
    Json(new_category): Json<CategoryRequest>,
) -> Result<Response, Error> {
    let name = CategoryName::new(&new_category.name)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let category = create_category(name, user.user_id, &connection).inspect_err(|error| {
        if !matches!(error, Error::DuplicateCategoryName(_)) {
            tracing::error!("An unexpected error occurred while creating a category: {error}");
        }
    })?;

    tracing::info!(
        "Created category #{} \"{}\" for user #{}",
        category.id,
        category.name,
        category.user_id
    );

    Ok((StatusCode::CREATED, Json(category)).into_response())
}
