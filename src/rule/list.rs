use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    Error,
    rule::{
        db::{get_rule, get_rules_by_user},
        models::{Rule, RuleId, RuleState},
    },
    user::UserQuery,
};

/// List all of the user's rules, including disabled ones, in evaluation order.
pub async fn get_rules_endpoint(
    State(state): State<RuleState>,
    Query(user): Query<UserQuery>,
) -> Result<Json<Vec<Rule>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let rules = get_rules_by_user(user.user_id, &connection)
        .inspect_err(|error| tracing::error!("Failed to retrieve rules: {error}"))?;

    Ok(Json(rules))
}

/// Fetch a single rule of the user.
pub async fn get_rule_endpoint(
    Path(rule_id): Path<RuleId>,
    State(state): State<RuleState>,
    Query(user): Query<UserQuery>,
) -> Result<Json<Rule>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let rule = get_rule(rule_id, user.user_id, &connection).inspect_err(|error| match error {
        Error::NotFound => {}
        error => {
            tracing::error!("An unexpected error occurred when fetching rule #{rule_id}: {error}");
        }
    })?;

    Ok(Json(rule))
}
