//! Bulk import of transactions from CSV files.

use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::Field},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    transaction::{
        Categorization, create_endpoint::TransactionState,
        csv::{CsvRow, parse_transactions_csv},
        record_transaction,
    },
    user::UserQuery,
};

/// Summary of a CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// Number of data rows found across all files.
    pub total_rows: usize,
    /// Number of transactions created.
    pub successful_imports: usize,
    /// Number of rows that were malformed, duplicates or otherwise rejected.
    pub failed_imports: usize,
    /// Number of created transactions that a rule categorized.
    pub categorized: usize,
    /// One message per failed row, e.g. `"Line 3: Duplicate transaction found"`.
    pub errors: Vec<String>,
}

/// Route handler for importing transactions from CSV files.
///
/// Every row goes through the same workflow as a manually created
/// transaction, so uncategorized rows are categorized by the user's rules.
/// Problems with individual rows are reported in the response without
/// stopping the import.
pub async fn import_transactions_endpoint(
    State(state): State<TransactionState>,
    Query(user): Query<UserQuery>,
    mut multipart: Multipart,
) -> Result<Response, Error> {
    let start_time = std::time::Instant::now();
    let mut rows = Vec::new();
    let mut file_count = 0;

    while let Some(field) = multipart.next_field().await.map_err(|error| {
        tracing::error!("Could not read multipart form: {error}");
        Error::MultipartError(error.body_text())
    })? {
        let csv_data = parse_multipart_field(field).await?;

        let file_rows = parse_transactions_csv(&csv_data, user.user_id)
            .inspect_err(|error| tracing::debug!("Failed to parse CSV: {error}"))?;

        rows.extend(file_rows);
        file_count += 1;
    }

    if file_count == 0 {
        return Err(Error::MultipartError("no CSV files were uploaded".to_owned()));
    }

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let tx = connection
        .unchecked_transaction()
        .inspect_err(|error| tracing::error!("could not start transaction: {error}"))?;

    let result = import_rows(rows, &tx)?;

    tx.commit()
        .inspect_err(|error| tracing::error!("could not commit transaction: {error}"))?;

    tracing::info!(
        "Imported {} of {} rows for user #{} in {:.1}ms, {} categorized by rules",
        result.successful_imports,
        result.total_rows,
        user.user_id,
        start_time.elapsed().as_secs_f64() * 1000.0,
        result.categorized
    );

    Ok((StatusCode::CREATED, Json(result)).into_response())
}

async fn parse_multipart_field(field: Field<'_>) -> Result<String, Error> {
    if field.content_type() != Some("text/csv") {
        return Err(Error::NotCSV);
    }

    let file_name = field.file_name().unwrap_or("<unnamed>").to_owned();

    let data = field.text().await.map_err(|error| {
        tracing::error!("Could not read data from multipart form field: {error}");
        Error::MultipartError("Could not read data from multipart form field.".to_owned())
    })?;

    tracing::debug!("Received file '{}' that is {} bytes", file_name, data.len());

    Ok(data)
}

/// Create a transaction for every readable row.
///
/// **Note**: If you want transactional integrity (all or nothing), pass in a
/// transaction for `connection`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error. Errors
/// caused by the content of a row are recorded in the result instead.
fn import_rows(rows: Vec<CsvRow>, connection: &Connection) -> Result<ImportResult, Error> {
    let mut result = ImportResult {
        total_rows: rows.len(),
        ..Default::default()
    };

    for CsvRow { line, transaction } in rows {
        let builder = match transaction {
            Ok(builder) => builder,
            Err(message) => {
                result.failed_imports += 1;
                result.errors.push(format!("Line {line}: {message}"));
                continue;
            }
        };

        match record_transaction(builder, connection) {
            Ok((_, categorization)) => {
                result.successful_imports += 1;
                if matches!(categorization, Categorization::Rule(_)) {
                    result.categorized += 1;
                }
            }
            Err(Error::DuplicateImportId) => {
                result.failed_imports += 1;
                result
                    .errors
                    .push(format!("Line {line}: Duplicate transaction found"));
            }
            Err(error @ (Error::SqlError(_) | Error::DatabaseLockError)) => return Err(error),
            Err(error) => {
                result.failed_imports += 1;
                result.errors.push(format!("Line {line}: {error}"));
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod import_rows_tests {
    use rusqlite::Connection;

    use crate::{
        category::{CategoryName, create_category},
        db::initialize,
        rule::{NewRule, RuleName, create_rule},
        transaction::{csv::parse_transactions_csv, get_uncategorized_transactions},
    };

    use super::import_rows;

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn imports_rows_and_applies_rules() {
        let connection = get_test_connection();
        let category =
            create_category(CategoryName::new_unchecked("Coffee"), 1, &connection).unwrap();
        create_rule(
            NewRule {
                user_id: 1,
                name: RuleName::new_unchecked("Coffee"),
                description: None,
                conditions: r#"{"merchantPattern":"starbucks","logic":"OR"}"#.to_owned(),
                actions: format!(r#"{{"targetCategoryId":{}}}"#, category.id),
                priority: 0,
                enabled: true,
            },
            &connection,
        )
        .unwrap();
        let rows = parse_transactions_csv(
            "date,amount,merchant,description\n\
             2025-01-15,-4.50,STARBUCKS #12,Latte\n\
             2025-01-16,-80.00,Countdown,Groceries\n\
             not a date,-1,Starbucks,\n",
            1,
        )
        .unwrap();

        let result = import_rows(rows, &connection).unwrap();

        assert_eq!(result.total_rows, 3);
        assert_eq!(result.successful_imports, 2);
        assert_eq!(result.failed_imports, 1);
        assert_eq!(result.categorized, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Line 4:"), "{:?}", result.errors);
        let uncategorized = get_uncategorized_transactions(1, &connection).unwrap();
        assert_eq!(uncategorized.len(), 1);
        assert_eq!(uncategorized[0].merchant.as_deref(), Some("Countdown"));
    }

    #[test]
    fn reimporting_reports_duplicates() {
        let connection = get_test_connection();
        let text = "date,amount,merchant\n2025-01-15,-4.50,Starbucks\n";

        import_rows(parse_transactions_csv(text, 1).unwrap(), &connection).unwrap();
        let result = import_rows(parse_transactions_csv(text, 1).unwrap(), &connection).unwrap();

        assert_eq!(result.successful_imports, 0);
        assert_eq!(result.failed_imports, 1);
        assert_eq!(result.errors, vec!["Line 2: Duplicate transaction found"]);
    }
}
