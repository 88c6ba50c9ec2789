//! Decides which category, if any, a transaction should be assigned.

use crate::{
    Error,
    category::CategoryId,
    database_id::UserId,
    rule::{ParsedActions, ParsedConditions, Rule, RuleId},
};

/// Read-only access to the rules the engine matches against.
pub trait RuleStore {
    /// Retrieve the user's enabled rules ordered by ascending priority.
    ///
    /// Rules with the same priority must be returned in the order they were
    /// stored.
    fn list_enabled_rules_by_user(&self, user_id: UserId) -> Result<Vec<Rule>, Error>;
}

impl<S: RuleStore + ?Sized> RuleStore for &S {
    fn list_enabled_rules_by_user(&self, user_id: UserId) -> Result<Vec<Rule>, Error> {
        (**self).list_enabled_rules_by_user(user_id)
    }
}

/// The outcome of matching a transaction against a user's rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// The first rule, in priority order, whose conditions were satisfied.
    Matched {
        /// The ID of the matching rule.
        rule_id: RuleId,
        /// The name of the matching rule.
        rule_name: String,
        /// The category the rule assigns.
        target_category_id: CategoryId,
    },
    /// No enabled rule matched.
    NoMatch,
}

/// Matches transactions against the rules held in a [RuleStore].
///
/// The engine keeps no state of its own: rules are fetched from the store and
/// parsed again on every call, so edits to rules apply immediately.
#[derive(Debug, Clone)]
pub struct RuleEngine<S> {
    store: S,
}

impl<S: RuleStore> RuleEngine<S> {
    /// Create an engine that reads rules from `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Find the highest priority rule of `user_id` that matches the
    /// transaction's merchant and description.
    ///
    /// This never fails. If the rules cannot be fetched, the error is logged
    /// and [MatchResult::NoMatch] is returned so that the transaction can
    /// still be created.
    pub fn match_transaction(
        &self,
        user_id: UserId,
        merchant: Option<&str>,
        description: Option<&str>,
    ) -> MatchResult {
        let rules = match self.store.list_enabled_rules_by_user(user_id) {
            Ok(rules) => rules,
            Err(error) => {
                tracing::error!(
                    "Could not fetch rules for user #{user_id}, skipping rule matching: {error}"
                );
                return MatchResult::NoMatch;
            }
        };

        let result = first_matching_rule(&rules, merchant, description);

        if let MatchResult::Matched { rule_id, .. } = &result {
            tracing::debug!("Rule #{rule_id} matched transaction for user #{user_id}");
        }

        result
    }
}

/// Return the first rule in `rules` whose conditions match.
///
/// `rules` must already be in priority order. Disabled rules, and rules whose
/// stored definition cannot be parsed, are skipped.
pub fn first_matching_rule(
    rules: &[Rule],
    merchant: Option<&str>,
    description: Option<&str>,
) -> MatchResult {
    for rule in rules.iter().filter(|rule| rule.enabled) {
        let Some((conditions, actions)) = parse_stored_rule(rule) else {
            continue;
        };

        if conditions.evaluate(merchant, description) {
            return MatchResult::Matched {
                rule_id: rule.id,
                rule_name: rule.name.to_string(),
                target_category_id: actions.target_category_id,
            };
        }
    }

    MatchResult::NoMatch
}

fn parse_stored_rule(rule: &Rule) -> Option<(ParsedConditions, ParsedActions)> {
    let parsed = serde_json::from_str::<ParsedConditions>(&rule.conditions).and_then(
        |conditions| {
            serde_json::from_str::<ParsedActions>(&rule.actions)
                .map(|actions| (conditions, actions))
        },
    );

    match parsed {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            tracing::warn!(
                rule_id = rule.id,
                "RuleParseFailure: skipping rule #{} with an unreadable definition: {error}",
                rule.id
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::{
        Error,
        database_id::UserId,
        rule::{Rule, RuleName},
    };

    use super::{MatchResult, RuleEngine, RuleStore, first_matching_rule};

    /// Holds rules in memory and filters/sorts them like the database does.
    struct InMemoryRuleStore {
        rules: Vec<Rule>,
        calls: Cell<usize>,
    }

    impl InMemoryRuleStore {
        fn new(rules: Vec<Rule>) -> Self {
            Self {
                rules,
                calls: Cell::new(0),
            }
        }
    }

    impl RuleStore for InMemoryRuleStore {
        fn list_enabled_rules_by_user(&self, user_id: UserId) -> Result<Vec<Rule>, Error> {
            self.calls.set(self.calls.get() + 1);

            let mut rules: Vec<Rule> = self
                .rules
                .iter()
                .filter(|rule| rule.user_id == user_id && rule.enabled)
                .cloned()
                .collect();
            rules.sort_by_key(|rule| rule.priority);

            Ok(rules)
        }
    }

    struct FailingRuleStore;

    impl RuleStore for FailingRuleStore {
        fn list_enabled_rules_by_user(&self, _user_id: UserId) -> Result<Vec<Rule>, Error> {
            Err(Error::DatabaseLockError)
        }
    }

    fn rule(id: i64, priority: i64, conditions: &str, target_category_id: i64) -> Rule {
        Rule {
            id,
            user_id: 1,
            name: RuleName::new_unchecked(&format!("Rule {id}")),
            description: None,
            conditions: conditions.to_owned(),
            actions: format!(r#"{{"targetCategoryId":{target_category_id}}}"#),
            priority,
            enabled: true,
        }
    }

    #[track_caller]
    fn assert_matched(result: &MatchResult, want_rule_id: i64, want_category_id: i64) {
        match result {
            MatchResult::Matched {
                rule_id,
                target_category_id,
                ..
            } => {
                assert_eq!(*rule_id, want_rule_id, "wrong rule matched");
                assert_eq!(*target_category_id, want_category_id, "wrong category");
            }
            MatchResult::NoMatch => panic!("expected rule #{want_rule_id} to match"),
        }
    }

    #[test]
    fn lowest_priority_value_wins() {
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![
            rule(1, 10, r#"{"merchantPattern":".*coffee.*"}"#, 100),
            rule(2, 1, r#"{"merchantPattern":".*starbucks.*"}"#, 200),
        ]));

        let result = engine.match_transaction(1, Some("Starbucks Coffee"), None);

        assert_matched(&result, 2, 200);
    }

    #[test]
    fn ties_are_broken_by_storage_order() {
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![
            rule(1, 5, r#"{"merchantPattern":"coffee"}"#, 100),
            rule(2, 5, r#"{"merchantPattern":"coffee"}"#, 200),
        ]));

        let result = engine.match_transaction(1, Some("Coffee"), None);

        assert_matched(&result, 1, 100);
    }

    #[test]
    fn disabled_rules_never_match() {
        let mut disabled = rule(1, 1, r#"{"descriptionPattern":".*pizza.*"}"#, 100);
        disabled.enabled = false;
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![disabled]));

        let result = engine.match_transaction(1, Some("Starbucks"), Some("coffee"));

        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn disabled_rules_returned_by_store_are_skipped() {
        let mut disabled = rule(1, 1, r#"{"merchantPattern":"coffee"}"#, 100);
        disabled.enabled = false;
        let enabled = rule(2, 2, r#"{"merchantPattern":"coffee"}"#, 200);

        let result = first_matching_rule(&[disabled, enabled], Some("coffee"), None);

        assert_matched(&result, 2, 200);
    }

    #[test]
    fn and_rule_needs_both_fields() {
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![rule(
            1,
            1,
            r#"{"merchantPattern":".*starbucks.*","descriptionPattern":".*coffee.*","logic":"AND"}"#,
            300,
        )]));

        assert_eq!(
            engine.match_transaction(1, Some("Starbucks"), Some("sandwich")),
            MatchResult::NoMatch
        );
        assert_matched(
            &engine.match_transaction(1, Some("Starbucks"), Some("morning coffee")),
            1,
            300,
        );
    }

    #[test]
    fn and_rule_with_one_pattern_never_matches() {
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![rule(
            1,
            1,
            r#"{"merchantPattern":".*","logic":"AND"}"#,
            100,
        )]));

        assert_eq!(
            engine.match_transaction(1, Some("anything"), Some("anything")),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn rule_without_patterns_never_matches() {
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![
            rule(1, 1, r#"{"logic":"AND"}"#, 100),
            rule(2, 2, r#"{}"#, 200),
        ]));

        assert_eq!(
            engine.match_transaction(1, Some("anything"), Some("anything")),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn matching_ignores_case() {
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![rule(
            1,
            1,
            r#"{"merchantPattern":".*starbucks.*"}"#,
            100,
        )]));

        assert_matched(
            &engine.match_transaction(1, Some("STARBUCKS #123"), None),
            1,
            100,
        );
    }

    #[test]
    fn empty_merchant_pattern_matches_any_merchant() {
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![rule(
            1,
            0,
            r#"{"merchantPattern":"","descriptionPattern":"coffee","logic":"AND"}"#,
            100,
        )]));

        let matched = engine.match_transaction(1, Some("Starbucks"), Some("Morning coffee"));
        let unmatched = engine.match_transaction(1, Some("Starbucks"), Some("Sandwich"));
        let no_merchant = engine.match_transaction(1, None, Some("Morning coffee"));

        assert_matched(&matched, 1, 100);
        assert_eq!(unmatched, MatchResult::NoMatch);
        assert_eq!(no_merchant, MatchResult::NoMatch);
    }

    #[test]
    fn empty_rule_set_is_no_match() {
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![]));

        assert_eq!(
            engine.match_transaction(1, Some("Starbucks"), Some("coffee")),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn other_users_rules_are_not_used() {
        let mut other_user_rule = rule(1, 1, r#"{"merchantPattern":"coffee"}"#, 100);
        other_user_rule.user_id = 2;
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![other_user_rule]));

        assert_eq!(
            engine.match_transaction(1, Some("coffee"), None),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn corrupt_rules_are_skipped() {
        let mut bad_actions = rule(2, 2, r#"{"merchantPattern":"coffee"}"#, 200);
        bad_actions.actions = "targetCategoryId:5".to_owned();
        let engine = RuleEngine::new(InMemoryRuleStore::new(vec![
            rule(1, 1, "merchantPattern:coffee", 100),
            bad_actions,
            rule(3, 3, r#"{"merchantPattern":"(unclosed"}"#, 300),
            rule(4, 4, r#"{"merchantPattern":"coffee"}"#, 400),
        ]));

        let result = engine.match_transaction(1, Some("coffee"), None);

        assert_matched(&result, 4, 400);
    }

    #[test]
    fn store_errors_result_in_no_match() {
        let engine = RuleEngine::new(FailingRuleStore);

        assert_eq!(
            engine.match_transaction(1, Some("coffee"), None),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn matching_is_idempotent() {
        let store = InMemoryRuleStore::new(vec![
            rule(1, 3, r#"{"merchantPattern":"coffee"}"#, 100),
            rule(2, 2, r#"{"descriptionPattern":"latte"}"#, 200),
        ]);
        let engine = RuleEngine::new(&store);

        let first = engine.match_transaction(1, Some("Coffee Co"), Some("Latte"));
        let second = engine.match_transaction(1, Some("Coffee Co"), Some("Latte"));

        assert_eq!(first, second);
        assert_matched(&first, 2, 200);
        assert_eq!(store.calls.get(), 2);
    }

    #[test]
    fn matching_does_not_modify_rules() {
        let rules = vec![rule(1, 1, r#"{"merchantPattern":"coffee"}"#, 100)];
        let store = InMemoryRuleStore::new(rules.clone());
        let engine = RuleEngine::new(&store);

        engine.match_transaction(1, Some("coffee"), None);

        assert_eq!(store.rules, rules);
    }

    #[test]
    fn smallest_priority_among_satisfied_rules_wins() {
        let priorities = [7, -3, 12, 0, -3, 5];
        let rules: Vec<Rule> = priorities
            .iter()
            .enumerate()
            .map(|(index, priority)| {
                let id = index as i64 + 1;
                rule(id, *priority, r#"{"merchantPattern":"shop"}"#, id * 10)
            })
            .collect();
        let engine = RuleEngine::new(InMemoryRuleStore::new(rules));

        let result = engine.match_transaction(1, Some("Corner Shop"), None);

        // Rule #2 is the first stored rule with the smallest priority (-3).
        assert_matched(&result, 2, 20);
    }
}
