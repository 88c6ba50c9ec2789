use std::collections::HashSet;

use rusqlite::{Connection, Row};

use crate::{
    Error,
    database_id::UserId,
    rule::{
        RuleStore,
        models::{NewRule, Rule, RuleId, RuleName},
    },
};

const RULE_COLUMNS: &str = "id, user_id, name, description, conditions, actions, priority, enabled";

/// Create a rule in the database.
///
/// The caller is responsible for validating the rule's conditions and actions.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_rule(new_rule: NewRule, connection: &Connection) -> Result<Rule, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO rule (user_id, name, description, conditions, actions, priority, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {RULE_COLUMNS};"
        ))?
        .query_row(
            (
                new_rule.user_id,
                new_rule.name.as_ref(),
                new_rule.description,
                new_rule.conditions,
                new_rule.actions,
                new_rule.priority,
                new_rule.enabled,
            ),
            map_rule_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve one of the user's rules by `rule_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the rule does not exist or belongs to another user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_rule(rule_id: RuleId, user_id: UserId, connection: &Connection) -> Result<Rule, Error> {
    connection
        .prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM rule WHERE id = :id AND user_id = :user_id;"
        ))?
        .query_row(
            &[(":id", &rule_id), (":user_id", &user_id)],
            map_rule_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve all of the user's rules, enabled or not, in evaluation order.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_rules_by_user(user_id: UserId, connection: &Connection) -> Result<Vec<Rule>, Error> {
    connection
        .prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM rule WHERE user_id = :user_id ORDER BY priority ASC, id ASC;"
        ))?
        .query_map(&[(":user_id", &user_id)], map_rule_row)?
        .map(|maybe_rule| maybe_rule.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the user's enabled rules in evaluation order.
///
/// Rules are sorted by ascending priority. Rules with the same priority are
/// sorted by ID, i.e. the order they were created in.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_enabled_rules_by_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Rule>, Error> {
    connection
        .prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM rule
             WHERE user_id = :user_id AND enabled = 1
             ORDER BY priority ASC, id ASC;"
        ))?
        .query_map(&[(":user_id", &user_id)], map_rule_row)?
        .map(|maybe_rule| maybe_rule.map_err(|error| error.into()))
        .collect()
}

/// Overwrite a stored rule with `rule`.
///
/// # Errors
/// This function will return an [Error::UpdateMissingRule] if the rule does not
/// exist for `rule.user_id`, or an [Error::SqlError] if there is an SQL error.
pub fn update_rule(rule: &Rule, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE rule
         SET name = ?1, description = ?2, conditions = ?3, actions = ?4, priority = ?5, enabled = ?6
         WHERE id = ?7 AND user_id = ?8",
        (
            rule.name.as_ref(),
            &rule.description,
            &rule.conditions,
            &rule.actions,
            rule.priority,
            rule.enabled,
            rule.id,
            rule.user_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingRule);
    }

    Ok(())
}

/// Delete one of the user's rules.
///
/// # Errors
/// This function will return an [Error::DeleteMissingRule] if the rule does not
/// exist for `user_id`, or an [Error::SqlError] if there is an SQL error.
pub fn delete_rule(rule_id: RuleId, user_id: UserId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM rule WHERE id = ?1 AND user_id = ?2",
        (rule_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingRule);
    }

    Ok(())
}

/// Set the priority of each rule in `rule_ids` to its position in the slice.
///
/// All updates happen in one SQL transaction, so either every rule is
/// reordered or none are.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidRuleOrder] if `rule_ids` contains duplicates or IDs that are
///   not rules of `user_id`,
/// - or [Error::SqlError] if there is an SQL error.
pub fn reorder_rules(
    user_id: UserId,
    rule_ids: &[RuleId],
    connection: &Connection,
) -> Result<(), Error> {
    let mut seen = HashSet::with_capacity(rule_ids.len());
    if let Some(duplicate) = rule_ids.iter().find(|rule_id| !seen.insert(**rule_id)) {
        return Err(Error::InvalidRuleOrder(format!(
            "rule #{duplicate} is listed more than once"
        )));
    }

    let transaction = connection.unchecked_transaction()?;

    {
        let mut statement =
            transaction.prepare("UPDATE rule SET priority = ?1 WHERE id = ?2 AND user_id = ?3")?;

        for (priority, rule_id) in rule_ids.iter().enumerate() {
            let rows_affected = statement.execute((priority as i64, rule_id, user_id))?;

            if rows_affected == 0 {
                return Err(Error::InvalidRuleOrder(format!(
                    "rule #{rule_id} does not exist"
                )));
            }
        }
    }

    transaction.commit()?;

    Ok(())
}

/// Create the rule table and its indexes.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_rule_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS rule (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                conditions TEXT NOT NULL,
                actions TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                enabled INTEGER NOT NULL DEFAULT 1
            );",
        (),
    )?;

    // Matching reads a user's enabled rules in priority order.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_rule_user_enabled_priority
         ON rule(user_id, enabled, priority, id)",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('rule', 0)",
        (),
    )?;

    Ok(())
}

fn map_rule_row(row: &Row) -> Result<Rule, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let raw_name: String = row.get(2)?;
    let description = row.get(3)?;
    let conditions = row.get(4)?;
    let actions = row.get(5)?;
    let priority = row.get(6)?;
    let enabled = row.get(7)?;

    Ok(Rule {
        id,
        user_id,
        name: RuleName::new_unchecked(&raw_name),
        description,
        conditions,
        actions,
        priority,
        enabled,
    })
}

/// A [RuleStore] that reads rules from SQLite.
///
/// Every call reads the rules committed at that moment; nothing is cached.
#[derive(Debug, Clone, Copy)]
pub struct SqliteRuleStore<'a> {
    connection: &'a Connection,
}

impl<'a> SqliteRuleStore<'a> {
    /// Create a store that queries `connection`.
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }
}

impl RuleStore for SqliteRuleStore<'_> {
    fn list_enabled_rules_by_user(&self, user_id: UserId) -> Result<Vec<Rule>, Error> {
        get_enabled_rules_by_user(user_id, self.connection)
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        database_id::UserId,
        rule::{
            MatchResult, RuleEngine, RuleStore, SqliteRuleStore, create_rule, create_rule_table,
            models::{NewRule, Rule, RuleName},
        },
    };

    use super::{
        delete_rule, get_enabled_rules_by_user, get_rule, get_rules_by_user, reorder_rules,
        update_rule,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_rule_table(&connection).expect("Could not create rule table");
        connection
    }

    fn new_rule(user_id: UserId, name: &str, priority: i64) -> NewRule {
        NewRule {
            user_id,
            name: RuleName::new_unchecked(name),
            description: None,
            conditions: format!(r#"{{"merchantPattern":"{name}","logic":"OR"}}"#),
            actions: r#"{"targetCategoryId":1}"#.to_owned(),
            priority,
            enabled: true,
        }
    }

    fn ids(rules: &[Rule]) -> Vec<i64> {
        rules.iter().map(|rule| rule.id).collect()
    }

    #[test]
    fn create_rule_succeeds() {
        let connection = get_test_db_connection();
        let mut want = new_rule(1, "coffee", 3);
        want.description = Some("Morning coffee".to_owned());

        let rule = create_rule(want.clone(), &connection).expect("Could not create rule");

        assert!(rule.id > 0);
        assert_eq!(rule.user_id, want.user_id);
        assert_eq!(rule.name, want.name);
        assert_eq!(rule.description, want.description);
        assert_eq!(rule.conditions, want.conditions);
        assert_eq!(rule.actions, want.actions);
        assert_eq!(rule.priority, 3);
        assert!(rule.enabled);
    }

    #[test]
    fn get_rule_succeeds() {
        let connection = get_test_db_connection();
        let inserted_rule = create_rule(new_rule(1, "bus", 0), &connection).unwrap();

        let selected_rule = get_rule(inserted_rule.id, 1, &connection);

        assert_eq!(Ok(inserted_rule), selected_rule);
    }

    #[test]
    fn get_rule_of_other_user_returns_not_found() {
        let connection = get_test_db_connection();
        let inserted_rule = create_rule(new_rule(1, "bus", 0), &connection).unwrap();

        let selected_rule = get_rule(inserted_rule.id, 2, &connection);

        assert_eq!(selected_rule, Err(Error::NotFound));
    }

    #[test]
    fn get_rule_with_invalid_id_returns_not_found() {
        let connection = get_test_db_connection();
        let inserted_rule = create_rule(new_rule(1, "bus", 0), &connection).unwrap();

        let selected_rule = get_rule(inserted_rule.id + 123, 1, &connection);

        assert_eq!(selected_rule, Err(Error::NotFound));
    }

    #[test]
    fn rules_are_sorted_by_priority_then_id() {
        let connection = get_test_db_connection();
        let low = create_rule(new_rule(1, "low", 10), &connection).unwrap();
        let first_tie = create_rule(new_rule(1, "tie1", 1), &connection).unwrap();
        let second_tie = create_rule(new_rule(1, "tie2", 1), &connection).unwrap();
        let negative = create_rule(new_rule(1, "negative", -5), &connection).unwrap();
        create_rule(new_rule(2, "other user", 0), &connection).unwrap();

        let rules = get_rules_by_user(1, &connection).unwrap();

        assert_eq!(
            ids(&rules),
            vec![negative.id, first_tie.id, second_tie.id, low.id]
        );
    }

    #[test]
    fn enabled_rules_exclude_disabled_rules() {
        let connection = get_test_db_connection();
        let enabled = create_rule(new_rule(1, "enabled", 1), &connection).unwrap();
        let mut disabled = new_rule(1, "disabled", 0);
        disabled.enabled = false;
        create_rule(disabled, &connection).unwrap();

        let rules = get_enabled_rules_by_user(1, &connection).unwrap();

        assert_eq!(rules, vec![enabled]);
    }

    #[test]
    fn update_rule_succeeds() {
        let connection = get_test_db_connection();
        let mut rule = create_rule(new_rule(1, "bus", 0), &connection).unwrap();
        rule.name = RuleName::new_unchecked("train");
        rule.priority = 4;
        rule.enabled = false;

        update_rule(&rule, &connection).unwrap();

        assert_eq!(get_rule(rule.id, 1, &connection), Ok(rule));
    }

    #[test]
    fn update_rule_of_other_user_fails() {
        let connection = get_test_db_connection();
        let mut rule = create_rule(new_rule(1, "bus", 0), &connection).unwrap();
        rule.user_id = 2;

        let result = update_rule(&rule, &connection);

        assert_eq!(result, Err(Error::UpdateMissingRule));
    }

    #[test]
    fn delete_rule_succeeds() {
        let connection = get_test_db_connection();
        let rule = create_rule(new_rule(1, "bus", 0), &connection).unwrap();

        delete_rule(rule.id, 1, &connection).unwrap();

        assert_eq!(get_rule(rule.id, 1, &connection), Err(Error::NotFound));
    }

    #[test]
    fn delete_missing_rule_fails() {
        let connection = get_test_db_connection();
        let rule = create_rule(new_rule(1, "bus", 0), &connection).unwrap();

        assert_eq!(
            delete_rule(rule.id, 2, &connection),
            Err(Error::DeleteMissingRule)
        );
        assert_eq!(
            delete_rule(rule.id + 1, 1, &connection),
            Err(Error::DeleteMissingRule)
        );
    }

    #[test]
    fn reorder_assigns_positions_as_priorities() {
        let connection = get_test_db_connection();
        let a = create_rule(new_rule(1, "a", 0), &connection).unwrap();
        let b = create_rule(new_rule(1, "b", 1), &connection).unwrap();
        let c = create_rule(new_rule(1, "c", 2), &connection).unwrap();

        reorder_rules(1, &[c.id, a.id, b.id], &connection).unwrap();

        let rules = get_rules_by_user(1, &connection).unwrap();
        assert_eq!(ids(&rules), vec![c.id, a.id, b.id]);
        assert_eq!(
            rules.iter().map(|rule| rule.priority).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn reorder_rejects_duplicates() {
        let connection = get_test_db_connection();
        let a = create_rule(new_rule(1, "a", 0), &connection).unwrap();

        let result = reorder_rules(1, &[a.id, a.id], &connection);

        assert!(matches!(result, Err(Error::InvalidRuleOrder(_))));
    }

    #[test]
    fn reorder_rejects_other_users_rules_without_partial_changes() {
        let connection = get_test_db_connection();
        let a = create_rule(new_rule(1, "a", 5), &connection).unwrap();
        let other = create_rule(new_rule(2, "other", 5), &connection).unwrap();

        let result = reorder_rules(1, &[a.id, other.id], &connection);

        assert!(matches!(result, Err(Error::InvalidRuleOrder(_))));
        assert_eq!(get_rule(a.id, 1, &connection).unwrap().priority, 5);
    }

    #[test]
    fn sqlite_store_lists_enabled_rules_in_order() {
        let connection = get_test_db_connection();
        let second = create_rule(new_rule(1, "second", 2), &connection).unwrap();
        let first = create_rule(new_rule(1, "first", 1), &connection).unwrap();
        let store = SqliteRuleStore::new(&connection);

        let rules = store.list_enabled_rules_by_user(1).unwrap();

        assert_eq!(ids(&rules), vec![first.id, second.id]);
    }

    #[test]
    fn engine_sees_rule_changes_immediately() {
        let connection = get_test_db_connection();
        let mut rule = create_rule(new_rule(1, "coffee", 0), &connection).unwrap();
        let engine = RuleEngine::new(SqliteRuleStore::new(&connection));
        assert!(matches!(
            engine.match_transaction(1, Some("Coffee"), None),
            MatchResult::Matched { .. }
        ));

        rule.enabled = false;
        update_rule(&rule, &connection).unwrap();

        assert_eq!(
            engine.match_transaction(1, Some("Coffee"), None),
            MatchResult::NoMatch
        );
    }
}
