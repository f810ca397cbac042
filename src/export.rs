// Expense Export - spreadsheet download of a user's expenses
// The workbook is the primary format; CSV is kept for scripting.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use crate::models::Expense;

pub const EXPORT_FILENAME: &str = "expense_details.xlsx";
pub const CSV_EXPORT_FILENAME: &str = "expense_details.csv";
pub const EXPORT_SHEET: &str = "Expense";
pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const HEADERS: [&str; 3] = ["Category", "Amount", "Date"];

fn export_date(expense: &Expense) -> String {
    expense.date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// WORKBOOK
// ============================================================================

/// Single-sheet workbook: bold header row, then one row per expense in the
/// order given. Amounts are numeric cells.
pub fn build_workbook(expenses: &[Expense]) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(EXPORT_SHEET)?;

    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (index, expense) in expenses.iter().enumerate() {
        let row = index as u32 + 1;
        let amount = expense
            .amount
            .to_f64()
            .with_context(|| format!("Amount {} has no spreadsheet representation", expense.amount))?;

        sheet.write_string(row, 0, &expense.category)?;
        sheet.write_number(row, 1, amount)?;
        sheet.write_string(row, 2, export_date(expense))?;
    }

    Ok(workbook)
}

pub fn to_xlsx_bytes(expenses: &[Expense]) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(expenses)?;
    workbook
        .save_to_buffer()
        .context("Failed to write expense workbook")
}

// ============================================================================
// CSV
// ============================================================================

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Date")]
    date: String,
}

/// Write `Category,Amount,Date` rows in the order given
pub fn write_csv<W: Write>(writer: W, expenses: &[Expense]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    for expense in expenses {
        wtr.serialize(ExportRow {
            category: &expense.category,
            amount: expense.amount.to_string(),
            date: export_date(expense),
        })?;
    }

    // An empty export still carries the header row
    if expenses.is_empty() {
        wtr.write_record(HEADERS)?;
    }

    wtr.flush().context("Failed to flush CSV export")?;
    Ok(())
}

pub fn to_csv_bytes(expenses: &[Expense]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, expenses)?;
    Ok(buffer)
}

/// Write a workbook, or CSV when `path` ends in `.csv`
pub fn export_to_file(path: &Path, expenses: &[Expense]) -> Result<()> {
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        return write_csv(file, expenses);
    }

    let mut workbook = build_workbook(expenses)?;
    workbook
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewExpense;
    use chrono::FixedOffset;
    use rust_decimal_macros::dec;

    fn expense(category: &str, amount: rust_decimal::Decimal, date: &str) -> Expense {
        NewExpense {
            icon: Some("ignored".into()),
            category: Some(category.into()),
            amount: Some(amount),
            date: Some(date.into()),
        }
        .into_expense("alice", &FixedOffset::east_opt(0).unwrap())
        .unwrap()
    }

    #[test]
    fn test_csv_columns_and_order() {
        let bytes = to_csv_bytes(&[
            expense("Food", dec!(12.50), "2024-03-02"),
            expense("Rent", dec!(900), "2024-03-01"),
        ])
        .unwrap();

        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "Category,Amount,Date\n\
             Food,12.50,2024-03-02T00:00:00.000Z\n\
             Rent,900,2024-03-01T00:00:00.000Z\n"
        );
    }

    #[test]
    fn test_empty_export_has_header() {
        let text = String::from_utf8(to_csv_bytes(&[]).unwrap()).unwrap();
        assert_eq!(text, "Category,Amount,Date\n");
    }

    #[test]
    fn test_workbook_is_zip_container() {
        let bytes = to_xlsx_bytes(&[
            expense("Food", dec!(12.50), "2024-03-02"),
            expense("Rent", dec!(900), "2024-03-01"),
        ])
        .unwrap();

        assert!(bytes.starts_with(b"PK"));
        assert!(to_xlsx_bytes(&[]).unwrap().starts_with(b"PK"));
    }

    #[test]
    fn test_workbook_sheet_name() {
        let mut workbook = build_workbook(&[expense("Food", dec!(1), "2024-03-02")]).unwrap();
        assert_eq!(workbook.worksheet_from_index(0).unwrap().name(), EXPORT_SHEET);
    }

    #[test]
    fn test_export_to_file_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let xlsx = dir.path().join(EXPORT_FILENAME);
        export_to_file(&xlsx, &[expense("Food", dec!(1), "2024-03-02")]).unwrap();
        assert!(std::fs::read(&xlsx).unwrap().starts_with(b"PK"));

        let path = dir.path().join(CSV_EXPORT_FILENAME);
        export_to_file(&path, &[expense("Food", dec!(1), "2024-03-02")]).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "Food");
    }
}
