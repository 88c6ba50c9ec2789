//! The predicate half of a rule and how it is evaluated.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::rule::pattern::pattern_matches;

/// How the merchant and description predicates are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Logic {
    /// Both predicates must match.
    And,
    /// Either predicate may match.
    #[default]
    Or,
}

// Anything other than the exact string "AND" falls back to OR, including
// null, numbers and lowercase "and".
impl<'de> Deserialize<'de> for Logic {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        Ok(match value.as_str() {
            Some("AND") => Logic::And,
            _ => Logic::Or,
        })
    }
}

impl Serialize for Logic {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        })
    }
}

/// The structured form of a rule's `conditions`.
///
/// An absent pattern contributes `false`, not "don't care", so a rule without
/// any pattern never matches. An empty pattern is present and matches any
/// text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedConditions {
    /// The pattern searched for in the merchant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_pattern: Option<String>,

    /// The pattern searched for in the description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_pattern: Option<String>,

    /// How the two patterns are combined.
    #[serde(default)]
    pub logic: Logic,
}

impl ParsedConditions {
    /// Evaluate the conditions against a transaction's merchant and description.
    pub fn evaluate(&self, merchant: Option<&str>, description: Option<&str>) -> bool {
        let merchant_match = pattern_matches(merchant, self.merchant_pattern.as_deref());
        let description_match =
            pattern_matches(description, self.description_pattern.as_deref());

        match self.logic {
            Logic::And => merchant_match && description_match,
            Logic::Or => merchant_match || description_match,
        }
    }
}
