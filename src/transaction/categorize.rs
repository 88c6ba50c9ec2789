//! Assigns categories to new transactions using the user's rules.

use rusqlite::Connection;

use crate::{
    Error,
    category::category_belongs_to_user,
    rule::{MatchResult, RuleEngine, RuleId, RuleStore, SqliteRuleStore},
    transaction::{Transaction, TransactionBuilder, create_transaction},
};

/// How a transaction ended up with its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Categorization {
    /// The category was given when the transaction was created.
    Explicit,
    /// A rule chose the category.
    Rule(RuleId),
    /// Neither the caller nor a rule chose a category.
    Uncategorized,
}

/// Run the user's rules on a transaction that has no category yet.
///
/// A builder that already has a category is returned untouched and the engine
/// is never called. When a rule matches, its category is only assigned if it
/// still belongs to the user; otherwise a warning is logged and the
/// transaction stays uncategorized. This never fails, so rule problems cannot
/// stop a transaction from being created.
pub fn apply_rules<S: RuleStore>(
    builder: TransactionBuilder,
    engine: &RuleEngine<S>,
    connection: &Connection,
) -> (TransactionBuilder, Categorization) {
    if builder.category_id.is_some() {
        return (builder, Categorization::Explicit);
    }

    let result = engine.match_transaction(
        builder.user_id,
        builder.merchant.as_deref(),
        builder.description.as_deref(),
    );

    let MatchResult::Matched {
        rule_id,
        rule_name,
        target_category_id,
    } = result
    else {
        return (builder, Categorization::Uncategorized);
    };

    match category_belongs_to_user(target_category_id, builder.user_id, connection) {
        Ok(true) => {
            tracing::debug!(
                "Rule #{rule_id} \"{rule_name}\" assigned category #{target_category_id}"
            );
            (
                builder.category_id(Some(target_category_id)),
                Categorization::Rule(rule_id),
            )
        }
        Ok(false) => {
            tracing::warn!(
                "Rule #{rule_id} \"{rule_name}\" targets category #{target_category_id} which does not belong to user #{}, leaving transaction uncategorized",
                builder.user_id
            );
            (builder, Categorization::Uncategorized)
        }
        Err(error) => {
            tracing::error!(
                "Could not check category #{target_category_id} of rule #{rule_id}, leaving transaction uncategorized: {error}"
            );
            (builder, Categorization::Uncategorized)
        }
    }
}

/// Store a new transaction, categorizing it with the user's rules if no
/// category was given.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the given category is not one of the user's categories,
/// - [Error::DuplicateImportId] if the transaction has already been ingested,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn record_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<(Transaction, Categorization), Error> {
    if let Some(category_id) = builder.category_id
        && !category_belongs_to_user(category_id, builder.user_id, connection)?
    {
        return Err(Error::InvalidCategory(Some(category_id)));
    }

    let engine = RuleEngine::new(SqliteRuleStore::new(connection));
    let (builder, categorization) = apply_rules(builder, &engine, connection);
    let transaction = create_transaction(builder, connection)?;

    Ok((transaction, categorization))
}
