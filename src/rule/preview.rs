use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    category::CategoryId,
    rule::{
        MatchResult, RuleEngine, SqliteRuleStore,
        models::{RuleId, RuleState},
    },
    user::UserQuery,
};

/// The transaction text to run the user's rules against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    /// The merchant name to match against.
    #[serde(default)]
    pub merchant: Option<String>,
    /// The description to match against.
    #[serde(default)]
    pub description: Option<String>,
}

/// Explains which rule, if any, would categorize a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    /// Whether any rule matched.
    pub matched: bool,
    /// The ID of the rule that matched.
    pub rule_id: Option<RuleId>,
    /// The name of the rule that matched.
    pub rule_name: Option<String>,
    /// The category the rule would assign.
    pub target_category_id: Option<CategoryId>,
}

impl From<MatchResult> for MatchResponse {
    fn from(result: MatchResult) -> Self {
        match result {
            MatchResult::Matched {
                rule_id,
                rule_name,
                target_category_id,
            } => Self {
                matched: true,
                rule_id: Some(rule_id),
                rule_name: Some(rule_name),
                target_category_id: Some(target_category_id),
            },
            MatchResult::NoMatch => Self {
                matched: false,
                rule_id: None,
                rule_name: None,
                target_category_id: None,
            },
        }
    }
}

/// A route handler that runs the rule engine without creating a transaction.
pub async fn match_rules_endpoint(
    State(state): State<RuleState>,
    Query(user): Query<UserQuery>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let engine = RuleEngine::new(SqliteRuleStore::new(&connection));
    let result = engine.match_transaction(
        user.user_id,
        request.merchant.as_deref(),
        request.description.as_deref(),
    );

    Ok(Json(result.into()))
}
