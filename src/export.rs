//! Renders a set of expenses as CSV text.
//!
//! Only the text payload is produced here; the route handler attaches the
//! attachment headers.

use time::Date;

use crate::{Error, expense::ExpenseWithOwner};

/// Render `rows` as CSV with a header row.
///
/// The columns are Title, Amount, Category and Date, plus the owner's
/// username in a final User column when `include_owner` is true (the column
/// is only offered to admins). Rows are written in the order given, which
/// the store queries guarantee to be insertion order.
///
/// # Errors
///
/// Returns an [Error::CsvError] if a record could not be written.
pub fn generate_csv(rows: &[ExpenseWithOwner], include_owner: bool) -> Result<String, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Title", "Amount", "Category", "Date"];
    if include_owner {
        header.push("User");
    }
    writer
        .write_record(&header)
        .map_err(|error| Error::CsvError(error.to_string()))?;

    for row in rows {
        let expense = &row.expense;
        let mut record = vec![
            expense.title.clone(),
            expense.amount.to_string(),
            expense.category.clone(),
            expense.date.to_string(),
        ];
        if include_owner {
            record.push(row.username.clone());
        }
        writer
            .write_record(&record)
            .map_err(|error| Error::CsvError(error.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::CsvError(error.to_string()))?;

    String::from_utf8(bytes).map_err(|error| Error::CsvError(error.to_string()))
}

/// The attachment filename for an export covering `[start_date, end_date]`.
pub fn export_filename(start_date: Date, end_date: Date) -> String {
    format!("expenses_{start_date}_to_{end_date}.csv")
}
