//! Parses transactions from CSV files.
//!
//! Files must start with a header row naming the columns. The `date` and
//! `amount` columns are required, `merchant` and `description` are optional,
//! and column order does not matter:
//!
//! ```text
//! date,amount,merchant,description
//! 2025-01-15,-4.50,Starbucks,Flat white
//! ```

use csv::{ReaderBuilder, StringRecord, Trim};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    database_id::UserId,
    transaction::{Transaction, TransactionBuilder},
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// One data row of a CSV file.
#[derive(Debug, PartialEq)]
pub struct CsvRow {
    /// The line number in the file, starting at 1 for the header.
    pub line: u64,
    /// The transaction described by the row, or why it could not be read.
    pub transaction: Result<TransactionBuilder, String>,
}

struct Columns {
    date: usize,
    amount: usize,
    merchant: Option<usize>,
    description: Option<usize>,
}

impl Columns {
    fn from_header(header: &StringRecord) -> Result<Self, Error> {
        let find = |name: &str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(name))
        };

        let date = find("date")
            .ok_or_else(|| Error::InvalidCSV("missing a 'date' column".to_owned()))?;
        let amount = find("amount")
            .ok_or_else(|| Error::InvalidCSV("missing an 'amount' column".to_owned()))?;

        Ok(Self {
            date,
            amount,
            merchant: find("merchant"),
            description: find("description"),
        })
    }
}

/// Parse the rows of a transaction CSV file for `user_id`.
///
/// Rows that cannot be read do not stop parsing; their error is returned in
/// place of the transaction. Each transaction gets an import ID derived from
/// the user and the row's content so the same row is never imported twice.
///
/// # Errors
/// Returns [Error::InvalidCSV] if the header is missing or lacks the `date` or
/// `amount` column.
pub fn parse_transactions_csv(text: &str, user_id: UserId) -> Result<Vec<CsvRow>, Error> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let header = reader
        .headers()
        .map_err(|error| Error::InvalidCSV(format!("could not read header: {error}")))?
        .clone();

    if header.iter().all(str::is_empty) {
        return Err(Error::InvalidCSV("the file is empty".to_owned()));
    }

    let columns = Columns::from_header(&header)?;

    let rows = reader
        .records()
        .enumerate()
        .map(|(index, record)| match record {
            Ok(record) => CsvRow {
                line: record
                    .position()
                    .map_or(index as u64 + 2, |position| position.line()),
                transaction: parse_record(&record, &columns, user_id),
            },
            Err(error) => CsvRow {
                line: error
                    .position()
                    .map_or(index as u64 + 2, |position| position.line()),
                transaction: Err(error.to_string()),
            },
        })
        .collect();

    Ok(rows)
}

fn parse_record(
    record: &StringRecord,
    columns: &Columns,
    user_id: UserId,
) -> Result<TransactionBuilder, String> {
    let field = |index: usize| record.get(index).unwrap_or_default();
    let optional_field = |index: Option<usize>| index.map(field).filter(|text| !text.is_empty());

    let raw_date = field(columns.date);
    let posted_at = Date::parse(raw_date, DATE_FORMAT)
        .map_err(|_| format!("invalid date \"{raw_date}\", expected YYYY-MM-DD"))?;

    let raw_amount = field(columns.amount);
    let amount = parse_amount(raw_amount).ok_or_else(|| format!("invalid amount \"{raw_amount}\""))?;

    let merchant = optional_field(columns.merchant);
    let description = optional_field(columns.description);

    let import_id = create_import_id(&format!(
        "{user_id}:{posted_at},{amount},{},{}",
        merchant.unwrap_or_default(),
        description.unwrap_or_default()
    ));

    Ok(Transaction::build(user_id, amount, posted_at)
        .merchant(merchant)
        .description(description)
        .import_id(Some(import_id)))
}

/// Parse an amount such as `-4.50`, `$1,200.00` or `-$3`.
fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|char| !matches!(char, '$' | ',' | ' '))
        .collect();

    cleaned.parse::<f64>().ok().filter(|amount| amount.is_finite())
}

/// Hash the identifying content of an ingested transaction into an import ID.
pub fn create_import_id(content: &str) -> i64 {
    let hash_128 = md5::compute(content);
    let mut hash_64 = [0; 8];
    hash_64.copy_from_slice(&hash_128[0..8]);
    i64::from_le_bytes(hash_64)
}
