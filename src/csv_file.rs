//! Reading and writing expense records as CSV.
//!
//! Exports carry the record ID so they can be matched up with the store.
//! Imports never do: every imported row becomes a new record.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::{Amount, Error, ExpenseRecord, RecordDraft};

/// The header written by [export_records].
pub const EXPORT_HEADER: [&str; 5] = ["id", "name", "date", "item", "amount"];

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: &'a str,
    name: &'a str,
    date: &'a str,
    item: &'a str,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct ImportRow {
    name: String,
    date: String,
    item: String,
    #[serde(default)]
    amount: String,
}

/// Write `records` as CSV with the columns in [EXPORT_HEADER].
///
/// Missing amounts are written as empty fields and text amounts are written
/// verbatim.
///
/// # Errors
/// Returns [Error::InvalidCSV] if writing to `writer` fails.
pub fn export_records(records: &[ExpenseRecord], writer: impl Write) -> Result<(), Error> {
    let mut writer = csv::Writer::from_writer(writer);

    if records.is_empty() {
        // serialize only writes the header along with the first row
        writer.write_record(EXPORT_HEADER).map_err(csv_error)?;
    }

    for record in records {
        writer
            .serialize(ExportRow {
                id: record.id.as_str(),
                name: &record.name,
                date: record.date.as_str(),
                item: &record.item,
                amount: record.amount.to_string(),
            })
            .map_err(csv_error)?;
    }

    writer.flush().map_err(|error| Error::InvalidCSV(error.to_string()))?;

    Ok(())
}

/// Parse CSV with a `name,date,item,amount` header into record drafts.
///
/// Any other columns, such as the `id` column of an export, are ignored so
/// an export can be imported again. Amounts that look like numbers become
/// [Amount::Number], anything else is kept as text and left to
/// [RecordDraft::validate] to reject.
///
/// # Errors
/// Returns [Error::InvalidCSV] naming the line of the first row that is
/// missing a column or cannot be read.
pub fn parse_drafts(reader: impl Read) -> Result<Vec<RecordDraft>, Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers().map_err(csv_error)?.clone();
    let mut drafts = Vec::new();

    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        let line = record.position().map_or(0, |position| position.line());

        let row: ImportRow = record
            .deserialize(Some(&headers))
            .map_err(|error| Error::InvalidCSV(format!("line {line}: {error}")))?;

        drafts.push(ExpenseRecord::build(
            &row.name,
            &row.date,
            &row.item,
            Amount::from_input(&row.amount),
        ));
    }

    tracing::debug!("Parsed {} drafts from CSV", drafts.len());

    Ok(drafts)
}

fn csv_error(error: csv::Error) -> Error {
    match error.position() {
        Some(position) => Error::InvalidCSV(format!("line {}: {error}", position.line())),
        None => Error::InvalidCSV(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Amount, Error, ExpenseRecord, RecordId};

    use super::{export_records, parse_drafts};

    fn create_test_record(id: &str, amount: impl Into<Amount>) -> ExpenseRecord {
        ExpenseRecord::from_draft(
            RecordId::new(id),
            ExpenseRecord::build("ママ", "2024-01-05", "食費", amount),
        )
    }

    fn export_to_string(records: &[ExpenseRecord]) -> String {
        let mut buffer = Vec::new();
        export_records(records, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn export_writes_header_and_rows() {
        let text = export_to_string(&[
            create_test_record("2", 1000.0),
            create_test_record("1", "300"),
        ]);

        assert_eq!(
            text,
            "id,name,date,item,amount\n2,ママ,2024-01-05,食費,1000\n1,ママ,2024-01-05,食費,300\n"
        );
    }

    #[test]
    fn export_of_no_records_still_has_header() {
        assert_eq!(export_to_string(&[]), "id,name,date,item,amount\n");
    }

    #[test]
    fn export_writes_missing_amount_as_empty_field() {
        let text = export_to_string(&[create_test_record("1", Amount::Missing)]);

        assert!(text.ends_with("1,ママ,2024-01-05,食費,\n"), "got {text}");
    }

    #[test]
    fn parses_drafts() {
        let text = "name,date,item,amount\nママ,2024-01-05,食費,1000\nパパ,2024-01-20,交通費, 500 \n";

        let drafts = parse_drafts(text.as_bytes()).unwrap();

        assert_eq!(
            drafts,
            vec![
                ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000),
                ExpenseRecord::build("パパ", "2024-01-20", "交通費", 500),
            ]
        );
    }

    #[test]
    fn parses_amounts_with_separators() {
        let text = "name,date,item,amount\nママ,2024-01-05,家賃,\"80,000\"\n";

        let drafts = parse_drafts(text.as_bytes()).unwrap();

        assert_eq!(drafts[0].amount, Amount::Number(80000.0));
    }

    #[test]
    fn keeps_non_numeric_amounts_as_text() {
        let text = "name,date,item,amount\nママ,2024-01-05,食費,たくさん\nパパ,2024-01-06,食費,\n";

        let drafts = parse_drafts(text.as_bytes()).unwrap();

        assert_eq!(drafts[0].amount, Amount::Text("たくさん".to_owned()));
        assert_eq!(drafts[1].amount, Amount::Missing);
    }

    #[test]
    fn reimports_an_export() {
        let records = vec![create_test_record("7", 1000.0)];
        let text = export_to_string(&records);

        let drafts = parse_drafts(text.as_bytes()).unwrap();

        assert_eq!(drafts, vec![records[0].to_draft().id(None)]);
    }

    #[test]
    fn short_row_reports_its_line() {
        let text = "name,date,item,amount\nママ,2024-01-05,食費,1000\nパパ,2024-01-20\n";

        let result = parse_drafts(text.as_bytes());

        match result {
            Err(Error::InvalidCSV(message)) => assert!(message.contains("line 3"), "{message}"),
            other => panic!("expected InvalidCSV, got {other:?}"),
        }
    }
}
