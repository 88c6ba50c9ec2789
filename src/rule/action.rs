//! The effect half of a rule.

use serde::{Deserialize, Serialize};

use crate::category::CategoryId;

/// The structured form of a rule's `actions`.
///
/// Assigning a category is the only action a rule can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedActions {
    /// The category assigned to transactions matched by the rule.
    pub target_category_id: CategoryId,
}
