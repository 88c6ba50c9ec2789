use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    rule::{
        db::{get_rules_by_user, reorder_rules},
        models::{Rule, RuleId, RuleState},
    },
    user::UserQuery,
};

/// Request body for reordering rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRulesRequest {
    /// Rule IDs in the order they should be evaluated.
    pub rule_ids: Vec<RuleId>,
}

/// A route handler that sets the evaluation order of the user's rules.
///
/// Each listed rule gets its position in the list as its priority. Responds
/// with all of the user's rules in their new order.
pub async fn reorder_rules_endpoint(
    State(state): State<RuleState>,
    Query(user): Query<UserQuery>,
    Json(request): Json<ReorderRulesRequest>,
) -> Result<Json<Vec<Rule>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    reorder_rules(user.user_id, &request.rule_ids, &connection).inspect_err(|error| {
        if !matches!(error, Error::InvalidRuleOrder(_)) {
            tracing::error!("An unexpected error occurred while reordering rules: {error}");
        }
    })?;

    tracing::info!(
        "Reordered {} rules of user #{}",
        request.rule_ids.len(),
        user.user_id
    );

    let rules = get_rules_by_user(user.user_id, &connection)?;

    Ok(Json(rules))
}
