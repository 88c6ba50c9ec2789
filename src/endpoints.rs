//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/rules/{rule_id}', use [format_endpoint].

/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to list and create rules.
pub const RULES: &str = "/api/rules";
/// The route to get, update and delete a single rule.
pub const RULE: &str = "/api/rules/{rule_id}";
/// The route to set the priority order of the rules.
pub const REORDER_RULES: &str = "/api/rules/reorder";
/// The route to try a pattern against some text.
pub const TEST_PATTERN: &str = "/api/rules/test";
/// The route to see which rule, if any, matches a transaction.
pub const MATCH_RULES: &str = "/api/rules/match";
/// The route to run the rules over uncategorized transactions.
pub const APPLY_RULES: &str = "/api/rules/apply";
/// The route to create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to upload CSV files for importing transactions.
pub const IMPORT_TRANSACTIONS: &str = "/api/transactions/import";
/// The route bank data providers push new transactions to.
pub const TRANSACTIONS_WEBHOOK: &str = "/api/webhooks/transactions";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/rules/{rule_id}', '{rule_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
