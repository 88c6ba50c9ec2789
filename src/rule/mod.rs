//! Rules that automatically categorize transactions.
//!
//! A rule pairs a merchant and/or description pattern with the category to
//! assign when the pattern matches. The [RuleEngine] evaluates a user's
//! enabled rules in priority order and the first match wins.

mod action;
mod apply;
mod condition;
mod create;
mod db;
mod delete;
mod edit;
mod engine;
mod list;
mod models;
mod pattern;
mod preview;
mod reorder;
mod test_pattern;
mod validator;

pub use action::ParsedActions;
pub use apply::{CategorizationSummary, apply_rules_endpoint, apply_rules_to_uncategorized};
pub use condition::{Logic, ParsedConditions};
pub use create::create_rule_endpoint;
pub use db::{
    SqliteRuleStore, create_rule, create_rule_table, get_enabled_rules_by_user, get_rules_by_user,
};
pub use delete::delete_rule_endpoint;
pub use edit::update_rule_endpoint;
pub use engine::{MatchResult, RuleEngine, RuleStore, first_matching_rule};
pub use list::{get_rule_endpoint, get_rules_endpoint};
pub use models::{NewRule, Rule, RuleId, RuleName};
pub use pattern::pattern_matches;
pub use preview::match_rules_endpoint;
pub use reorder::reorder_rules_endpoint;
pub use test_pattern::test_pattern_endpoint;
pub use validator::{validate_actions, validate_conditions};
