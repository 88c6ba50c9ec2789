use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    Error,
    category::{CategoryId, category_belongs_to_user},
    database_id::UserId,
    rule::{
        db::create_rule,
        models::{CreateRuleRequest, NewRule, RuleName, RuleState, validate_description},
        validator::{canonical_actions, canonical_conditions},
    },
    user::UserQuery,
};

/// A route handler for creating a new rule.
///
/// The rule's conditions and actions are validated before anything is stored.
/// Responds with `201 Created` and the stored rule.
pub async fn create_rule_endpoint(
    State(state): State<RuleState>,
    Query(user): Query<UserQuery>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<Response, Error> {
    let name = RuleName::new(&request.name)?;
    let description = validate_description(request.description.as_deref())?;
    let conditions = canonical_conditions(&request.conditions)?;
    let (actions, raw_actions) = canonical_actions(&request.actions)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    ensure_category_belongs_to_user(actions.target_category_id, user.user_id, &connection)?;

    let rule = create_rule(
        NewRule {
            user_id: user.user_id,
            name,
            description,
            conditions,
            actions: raw_actions,
            priority: request.priority.unwrap_or_default(),
            enabled: request.enabled.unwrap_or(true),
        },
        &connection,
    )
    .inspect_err(|error| {
        tracing::error!("An unexpected error occurred while creating a rule: {error}")
    })?;

    tracing::info!("Created rule #{} \"{}\" for user #{}", rule.id, rule.name, rule.user_id);

    Ok((StatusCode::CREATED, Json(rule)).into_response())
}

/// Check that a rule's target category is one of the user's categories.
///
/// # Errors
/// Returns [Error::InvalidCategory] if the category does not belong to the user.
pub(super) fn ensure_category_belongs_to_user(
    category_id: CategoryId,
    user_id: UserId,
    connection: &Connection,
) -> Result<(), Error> {
    if category_belongs_to_user(category_id, user_id, connection)? {
        Ok(())
    } else {
        Err(Error::InvalidCategory(Some(category_id)))
    }
}
