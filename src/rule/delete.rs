use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    Error,
    rule::{
        db::delete_rule,
        models::{RuleId, RuleState},
    },
    user::UserQuery,
};

/// A route handler for deleting a rule. Responds with `204 No Content`.
pub async fn delete_rule_endpoint(
    Path(rule_id): Path<RuleId>,
    State(state): State<RuleState>,
    Query(user): Query<UserQuery>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_rule(rule_id, user.user_id, &connection).inspect_err(|error| match error {
        Error::DeleteMissingRule => {}
        error => {
            tracing::error!("An unexpected error occurred while deleting rule {rule_id}: {error}")
        }
    })?;

    tracing::info!("Deleted rule #{rule_id} of user #{}", user.user_id);

    Ok(StatusCode::NO_CONTENT)
}
