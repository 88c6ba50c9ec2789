//! Application router configuration.

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::{
    AppState, Error,
    category::{create_category_endpoint, get_categories_endpoint},
    endpoints,
    rule::{
        apply_rules_endpoint, create_rule_endpoint, delete_rule_endpoint, get_rule_endpoint,
        get_rules_endpoint, match_rules_endpoint, reorder_rules_endpoint, test_pattern_endpoint,
        update_rule_endpoint,
    },
    transaction::{
        create_transaction_endpoint, get_transaction_endpoint, import_transactions_endpoint,
        transactions_webhook_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::RULES,
            get(get_rules_endpoint).post(create_rule_endpoint),
        )
        .route(
            endpoints::RULE,
            get(get_rule_endpoint)
                .patch(update_rule_endpoint)
                .delete(delete_rule_endpoint),
        )
        .route(endpoints::REORDER_RULES, put(reorder_rules_endpoint))
        .route(endpoints::TEST_PATTERN, post(test_pattern_endpoint))
        .route(endpoints::MATCH_RULES, post(match_rules_endpoint))
        .route(endpoints::APPLY_RULES, post(apply_rules_endpoint))
        .route(endpoints::TRANSACTIONS, post(create_transaction_endpoint))
        .route(endpoints::TRANSACTION, get(get_transaction_endpoint))
        .route(
            endpoints::IMPORT_TRANSACTIONS,
            post(import_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_WEBHOOK,
            post(transactions_webhook_endpoint),
        )
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
