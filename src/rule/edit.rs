use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    Error,
    rule::{
        create::ensure_category_belongs_to_user,
        db::{get_rule, update_rule},
        models::{Rule, RuleId, RuleName, RuleState, UpdateRuleRequest, validate_description},
        validator::{canonical_actions, canonical_conditions},
    },
    user::UserQuery,
};

/// A route handler for partially updating a rule.
///
/// Only the fields present in the request body are changed. Conditions and
/// actions are validated again whenever they are part of the request.
pub async fn update_rule_endpoint(
    Path(rule_id): Path<RuleId>,
    State(state): State<RuleState>,
    Query(user): Query<UserQuery>,
    Json(request): Json<UpdateRuleRequest>,
) -> Result<Json<Rule>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let previous = get_rule(rule_id, user.user_id, &connection).inspect_err(|error| match error {
        Error::NotFound => {}
        error => {
            tracing::error!("An unexpected error occurred when fetching rule #{rule_id}: {error}");
        }
    })?;

    let mut rule = previous.clone();

    if let Some(name) = &request.name {
        rule.name = RuleName::new(name)?;
    }

    if request.description.is_some() {
        rule.description = validate_description(request.description.as_deref())?;
    }

    if let Some(conditions) = &request.conditions {
        rule.conditions = canonical_conditions(conditions)?;
    }

    if let Some(actions) = &request.actions {
        let (actions, raw_actions) = canonical_actions(actions)?;
        ensure_category_belongs_to_user(actions.target_category_id, user.user_id, &connection)?;
        rule.actions = raw_actions;
    }

    if let Some(priority) = request.priority {
        rule.priority = priority;
    }

    if let Some(enabled) = request.enabled {
        rule.enabled = enabled;
    }

    update_rule(&rule, &connection).inspect_err(|error| {
        tracing::error!("An unexpected error occurred while updating rule #{rule_id}: {error}")
    })?;

    tracing::info!("Updated rule #{rule_id} of user #{}", user.user_id);
    tracing::debug!("Rule #{rule_id} changed from {previous:?} to {rule:?}");

    Ok(Json(rule))
}
