use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Query, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    category::{CategoryId, category_belongs_to_user},
    database_id::{TransactionId, UserId},
    rule::{
        MatchResult, db::get_enabled_rules_by_user, engine::first_matching_rule,
        models::RuleState,
    },
    transaction::{get_uncategorized_transactions, set_transaction_categories},
    user::UserQuery,
};

/// Result of running the rules over existing transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationSummary {
    /// Number of transactions that were given a category.
    pub transactions_categorized: usize,
    /// Number of distinct categories that were assigned.
    pub categories_applied: usize,
}

/// A route handler that runs the user's rules over their uncategorized transactions.
pub async fn apply_rules_endpoint(
    State(state): State<RuleState>,
    Query(user): Query<UserQuery>,
) -> Result<Json<CategorizationSummary>, Error> {
    let start_time = std::time::Instant::now();

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let tx = connection
        .unchecked_transaction()
        .inspect_err(|error| tracing::error!("could not start transaction: {error}"))?;

    let summary = apply_rules_to_uncategorized(user.user_id, &tx).inspect_err(|error| {
        tracing::error!(
            "Failed to apply rules after {}ms: {error}",
            start_time.elapsed().as_millis()
        )
    })?;

    tx.commit()
        .inspect_err(|error| tracing::error!("could not commit transaction: {error}"))?;

    tracing::info!(
        "Applying rules for user #{} completed in {}ms: {} transactions categorized, {} categories applied",
        user.user_id,
        start_time.elapsed().as_millis(),
        summary.transactions_categorized,
        summary.categories_applied
    );

    Ok(Json(summary))
}

/// Categorize every uncategorized transaction of `user_id` that a rule matches.
///
/// Rules are read once and evaluated with the same first-match semantics as
/// [crate::rule::RuleEngine]. Matches whose category does not belong to the
/// user are skipped.
///
/// **Note**: If you want transactional integrity (all or nothing), pass in a
/// transaction for `connection`.
///
/// # Errors
/// Returns an error if there are database errors during the operation.
pub fn apply_rules_to_uncategorized(
    user_id: UserId,
    connection: &Connection,
) -> Result<CategorizationSummary, Error> {
    let rules = get_enabled_rules_by_user(user_id, connection)?;
    if rules.is_empty() {
        return Ok(CategorizationSummary::default());
    }

    let transactions = get_uncategorized_transactions(user_id, connection)?;
    if transactions.is_empty() {
        return Ok(CategorizationSummary::default());
    }

    let mut owned_categories: HashMap<CategoryId, bool> = HashMap::new();
    let mut updates: Vec<(TransactionId, CategoryId)> = Vec::new();
    let mut applied_categories = HashSet::new();

    for transaction in &transactions {
        let result = first_matching_rule(
            &rules,
            transaction.merchant.as_deref(),
            transaction.description.as_deref(),
        );

        let MatchResult::Matched {
            rule_id,
            target_category_id,
            ..
        } = result
        else {
            continue;
        };

        let is_owned = match owned_categories.get(&target_category_id) {
            Some(is_owned) => *is_owned,
            None => {
                let is_owned = category_belongs_to_user(target_category_id, user_id, connection)?;
                owned_categories.insert(target_category_id, is_owned);
                is_owned
            }
        };

        if !is_owned {
            tracing::warn!(
                "Rule #{rule_id} targets category #{target_category_id} which does not belong to user #{user_id}"
            );
            continue;
        }

        updates.push((transaction.id, target_category_id));
        applied_categories.insert(target_category_id);
    }

    set_transaction_categories(&updates, connection)?;

    Ok(CategorizationSummary {
        transactions_categorized: updates.len(),
        categories_applied: applied_categories.len(),
    })
}
