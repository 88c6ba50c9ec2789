use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    database_id::{DatabaseId, UserId},
};

pub type RuleId = DatabaseId;

/// The maximum number of characters in a rule name.
pub const MAX_RULE_NAME_LENGTH: usize = 100;
/// The maximum number of characters in a rule description.
pub const MAX_RULE_DESCRIPTION_LENGTH: usize = 500;

/// A rule that assigns a category to transactions whose merchant and/or
/// description match a regular expression.
///
/// `conditions` and `actions` hold the canonical JSON text of
/// [ParsedConditions](crate::rule::ParsedConditions) and
/// [ParsedActions](crate::rule::ParsedActions). They are parsed again every
/// time the rule is matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// The ID of the rule.
    pub id: RuleId,

    /// The user that owns the rule.
    pub user_id: UserId,

    /// A short name shown when the rule is listed.
    pub name: RuleName,

    /// Optional notes about what the rule is for.
    pub description: Option<String>,

    /// The predicate, e.g. `{"merchantPattern":"starbucks","logic":"OR"}`.
    pub conditions: String,

    /// The effect, e.g. `{"targetCategoryId":3}`.
    pub actions: String,

    /// Rules with lower values are evaluated first.
    pub priority: i64,

    /// Disabled rules are never matched.
    pub enabled: bool,
}

/// A rule that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRule {
    pub user_id: UserId,
    pub name: RuleName,
    pub description: Option<String>,
    pub conditions: String,
    pub actions: String,
    pub priority: i64,
    pub enabled: bool,
}

/// A validated rule name between 1 and [MAX_RULE_NAME_LENGTH] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct RuleName(String);

impl RuleName {
    /// Create a rule name, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [Error::EmptyRuleName] if `name` is blank, or
    /// [Error::FieldTooLong] if it is longer than [MAX_RULE_NAME_LENGTH] characters.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            return Err(Error::EmptyRuleName);
        }

        if name.chars().count() > MAX_RULE_NAME_LENGTH {
            return Err(Error::FieldTooLong {
                field: "name",
                max: MAX_RULE_NAME_LENGTH,
            });
        }

        Ok(Self(name.to_owned()))
    }

    /// Create a rule name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for RuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trim a rule description, mapping blank descriptions to `None`.
///
/// # Errors
///
/// Returns [Error::FieldTooLong] if the description is longer than
/// [MAX_RULE_DESCRIPTION_LENGTH] characters.
pub fn validate_description(description: Option<&str>) -> Result<Option<String>, Error> {
    let Some(description) = description.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };

    if description.chars().count() > MAX_RULE_DESCRIPTION_LENGTH {
        return Err(Error::FieldTooLong {
            field: "description",
            max: MAX_RULE_DESCRIPTION_LENGTH,
        });
    }

    Ok(Some(description.to_owned()))
}

/// Unified state for all rule-related operations.
#[derive(Debug, Clone)]
pub struct RuleState {
    /// The database connection for managing rules.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RuleState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Request body for creating a rule.
///
/// `conditions` and `actions` may be JSON objects or JSON-encoded strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    /// The rule name, at most 100 characters.
    pub name: String,
    /// Optional notes, at most 500 characters.
    #[serde(default)]
    pub description: Option<String>,
    /// The rule's conditions.
    pub conditions: serde_json::Value,
    /// The rule's actions.
    pub actions: serde_json::Value,
    /// Defaults to 0.
    #[serde(default)]
    pub priority: Option<i64>,
    /// Defaults to `true`.
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Request body for a partial rule update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleRequest {
    /// The new rule name.
    #[serde(default)]
    pub name: Option<String>,
    /// The new description. A blank description clears it.
    #[serde(default)]
    pub description: Option<String>,
    /// The new conditions, validated before saving.
    #[serde(default)]
    pub conditions: Option<serde_json::Value>,
    /// The new actions, validated before saving.
    #[serde(default)]
    pub actions: Option<serde_json::Value>,
    /// The new priority.
    #[serde(default)]
    pub priority: Option<i64>,
    /// Whether the rule should be matched.
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod rule_name_tests {
    use crate::{
        Error,
        rule::models::{MAX_RULE_DESCRIPTION_LENGTH, RuleName, validate_description},
    };

    #[test]
    fn new_fails_on_blank_name() {
        assert_eq!(RuleName::new(" \t"), Err(Error::EmptyRuleName));
    }

    #[test]
    fn new_accepts_exactly_one_hundred_chars() {
        let name = "é".repeat(100);

        assert_eq!(RuleName::new(&name).map(|name| name.to_string()), Ok(name));
    }

    #[test]
    fn new_fails_on_long_name() {
        let name = "a".repeat(101);

        assert_eq!(
            RuleName::new(&name),
            Err(Error::FieldTooLong {
                field: "name",
                max: 100
            })
        );
    }

    #[test]
    fn blank_description_is_none() {
        assert_eq!(validate_description(Some("   ")), Ok(None));
        assert_eq!(validate_description(None), Ok(None));
    }

    #[test]
    fn long_description_is_rejected() {
        let description = "a".repeat(MAX_RULE_DESCRIPTION_LENGTH + 1);

        assert!(matches!(
            validate_description(Some(&description)),
            Err(Error::FieldTooLong {
                field: "description",
                ..
            })
        ));
    }
}
