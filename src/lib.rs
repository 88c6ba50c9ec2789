//! Fintrack is a backend for tracking personal finances.
//!
//! Transactions that arrive without a category are categorized automatically
//! by a prioritized set of user-defined rules. Each rule pairs a merchant
//! and/or description pattern with the category to assign on a match.
//!
//! This library provides a JSON REST API for managing categories, rules and
//! transactions, and for ingesting transactions from CSV files and webhooks.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use tokio::signal;

mod app_state;
mod category;
mod database_id;
mod db;
mod endpoints;
mod logging;
mod routing;
mod rule;
mod transaction;
mod user;

pub use app_state::AppState;
pub use database_id::{DatabaseId, UserId};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use rule::{MatchResult, RuleEngine, RuleStore, SqliteRuleStore};

use crate::category::CategoryId;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A rule's conditions or actions could not be parsed or validated.
    ///
    /// The string describes what is wrong with the definition so that it can
    /// be shown to the client.
    #[error("invalid rule definition: {0}")]
    InvalidRuleDefinition(String),

    /// An empty string was used as a rule name.
    #[error("rule name cannot be empty")]
    EmptyRuleName,

    /// A text field was longer than allowed.
    #[error("{field} must be at most {max} characters")]
    FieldTooLong {
        /// The name of the offending field as seen by the client.
        field: &'static str,
        /// The maximum number of characters allowed.
        max: usize,
    },

    /// The rule IDs given for reordering did not match the user's rules.
    #[error("invalid rule order: {0}")]
    InvalidRuleOrder(String),

    /// An empty string was used to create a category name.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// The category name is already used by another of the user's categories.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategoryName(String),

    /// The category ID did not refer to one of the user's categories.
    #[error("the category ID does not refer to a valid category")]
    InvalidCategory(Option<CategoryId>),

    /// The specified import ID already exists in the database.
    ///
    /// When ingesting transactions from CSV files or webhooks, an import ID is
    /// used to uniquely identify each transaction so the same transaction is
    /// never stored twice.
    #[error("the import ID already exists in the database")]
    DuplicateImportId,

    /// The multipart form could not be parsed as a list of CSV files.
    #[error("could not parse multipart form: {0}")]
    MultipartError(String),

    /// The multipart form did not contain a CSV file.
    #[error("file is not a CSV")]
    NotCSV,

    /// The CSV had issues that prevented it from being parsed.
    #[error("could not parse the CSV file: {0}")]
    InvalidCSV(String),

    /// The webhook event type is not one that this server handles.
    #[error("unsupported webhook event type \"{0}\"")]
    UnsupportedWebhookEvent(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Tried to update a rule that does not exist
    #[error("tried to update a rule that is not in the database")]
    UpdateMissingRule,

    /// Tried to delete a rule that does not exist
    #[error("tried to delete a rule that is not in the database")]
    DeleteMissingRule,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("transaction.import_id") =>
            {
                Error::DuplicateImportId
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The stable, machine readable name of the error sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidRuleDefinition(_) => "InvalidRuleDefinition",
            Error::EmptyRuleName => "EmptyRuleName",
            Error::FieldTooLong { .. } => "FieldTooLong",
            Error::InvalidRuleOrder(_) => "InvalidRuleOrder",
            Error::EmptyCategoryName => "EmptyCategoryName",
            Error::DuplicateCategoryName(_) => "DuplicateCategoryName",
            Error::InvalidCategory(_) => "InvalidCategory",
            Error::DuplicateImportId => "DuplicateImportId",
            Error::MultipartError(_) => "MultipartError",
            Error::NotCSV => "NotCSV",
            Error::InvalidCSV(_) => "InvalidCSV",
            Error::UnsupportedWebhookEvent(_) => "UnsupportedWebhookEvent",
            Error::NotFound | Error::UpdateMissingRule | Error::DeleteMissingRule => "NotFound",
            Error::SqlError(_) | Error::DatabaseLockError => "InternalServerError",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRuleDefinition(_)
            | Error::EmptyRuleName
            | Error::FieldTooLong { .. }
            | Error::InvalidRuleOrder(_)
            | Error::EmptyCategoryName
            | Error::InvalidCategory(_)
            | Error::MultipartError(_)
            | Error::NotCSV
            | Error::InvalidCSV(_)
            | Error::UnsupportedWebhookEvent(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateCategoryName(_) | Error::DuplicateImportId => StatusCode::CONFLICT,
            Error::NotFound | Error::UpdateMissingRule | Error::DeleteMissingRule => {
                StatusCode::NOT_FOUND
            }
            Error::SqlError(_) | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The JSON body sent to the client when a request fails.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details are logged, not shown to the client.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                error: self.kind(),
                message,
            }),
        )
            .into_response()
    }
}
