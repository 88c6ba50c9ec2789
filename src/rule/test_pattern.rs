use axum::Json;
use serde::{Deserialize, Serialize};

use crate::{Error, rule::pattern::find_match};

/// Request body for trying out a pattern before saving it in a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPatternRequest {
    /// The regular expression to try.
    pub pattern: String,
    /// The sample text to search.
    pub test_text: String,
}

/// Whether the pattern matched and, if so, the text it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPatternResponse {
    /// Whether the pattern was found in the text.
    pub matches: bool,
    /// The first part of the text the pattern matched.
    pub matched_text: Option<String>,
}

/// A route handler that matches a pattern against sample text the same way
/// rules are matched against transactions.
pub async fn test_pattern_endpoint(
    Json(request): Json<TestPatternRequest>,
) -> Result<Json<TestPatternResponse>, Error> {
    let matched_text = find_match(&request.test_text, &request.pattern).map_err(|error| {
        Error::InvalidRuleDefinition(format!("pattern is not a valid regular expression: {error}"))
    })?;

    Ok(Json(TestPatternResponse {
        matches: matched_text.is_some(),
        matched_text: matched_text.map(str::to_owned),
    }))
}
