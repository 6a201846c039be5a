//! Google Sheets adapter: OAuth tokens plus range reads and writes against
//! one spreadsheet.

pub mod auth;
pub mod client;
#[cfg(test)]
pub mod memory;

pub use client::{AppendResult, HttpSheets, SheetsApi};

use crate::error::{AppError, Result};
use crate::settings::GoogleSettings;

/// Open an authorized client for the configured spreadsheet, refreshing the
/// stored access token when needed.
pub fn connect(google: &GoogleSettings) -> Result<HttpSheets> {
    if !google.is_configured() {
        return Err(AppError::Settings(
            "Google client id or spreadsheet id missing. Run `sheetledger init`.".into(),
        ));
    }
    let store = auth::default_store()?;
    let http = client::http_client()?;
    let token = auth::ensure_access_token(google, store.as_ref(), &http)?;
    HttpSheets::new(token, google.spreadsheet_id.clone())
}

/// A parsed A1 range such as `Transactions!A2:I` or `'My Sheet'!E5:G5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: String,
    /// 0-based column indexes.
    pub start_col: usize,
    pub end_col: usize,
    /// 1-based row numbers; `None` means open-ended.
    pub start_row: Option<u32>,
    pub end_row: Option<u32>,
}

impl A1Range {
    pub fn parse(range: &str) -> Result<Self> {
        let err = || AppError::parse("A1 range", range);
        let (sheet, cells) = range.rsplit_once('!').ok_or_else(err)?;
        let sheet = sheet
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .map(|s| s.replace("''", "'"))
            .unwrap_or_else(|| sheet.to_string());
        let (start, end) = cells.split_once(':').unwrap_or((cells, cells));
        let (start_col, start_row) = split_cell(start).ok_or_else(err)?;
        let (end_col, end_row) = split_cell(end).ok_or_else(err)?;
        Ok(Self {
            sheet,
            start_col,
            end_col,
            start_row,
            end_row,
        })
    }
}

fn split_cell(cell: &str) -> Option<(usize, Option<u32>)> {
    let letters: String = cell.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    let digits = &cell[letters.len()..];
    let row = if digits.is_empty() {
        None
    } else {
        Some(digits.parse().ok()?)
    };
    Some((column_index(&letters), row))
}

/// `A` → 0, `I` → 8, `AA` → 26.
pub fn column_index(letters: &str) -> usize {
    letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1))
        - 1
}

pub fn column_letter(mut index: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    out.iter().rev().collect()
}

fn quote_sheet(sheet: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

/// Range covering a single row, e.g. `Transactions!A5:I5`.
pub fn row_range(sheet: &str, row: u32, first_col: usize, last_col: usize) -> String {
    format!(
        "{}!{}{row}:{}{row}",
        quote_sheet(sheet),
        column_letter(first_col),
        column_letter(last_col)
    )
}

/// First row number of an `updatedRange` returned by an append.
pub fn parse_first_row(updated_range: &str) -> Option<u32> {
    A1Range::parse(updated_range).ok()?.start_row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_index("A"), 0);
        assert_eq!(column_index("I"), 8);
        assert_eq!(column_index("AA"), 26);
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(8), "I");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
    }

    #[test]
    fn test_parse_ranges() {
        let r = A1Range::parse("Transactions!A2:I").unwrap();
        assert_eq!(r.sheet, "Transactions");
        assert_eq!((r.start_col, r.end_col), (0, 8));
        assert_eq!((r.start_row, r.end_row), (Some(2), None));

        let r = A1Range::parse("'Bob''s Sheet'!E:G").unwrap();
        assert_eq!(r.sheet, "Bob's Sheet");
        assert_eq!((r.start_col, r.end_col), (4, 6));
        assert_eq!(r.start_row, None);

        assert!(A1Range::parse("no-bang").is_err());
    }

    #[test]
    fn test_row_range() {
        assert_eq!(row_range("Transactions", 5, 0, 8), "Transactions!A5:I5");
        assert_eq!(row_range("My Sheet", 3, 0, 2), "'My Sheet'!A3:C3");
    }

    #[test]
    fn test_parse_first_row() {
        assert_eq!(parse_first_row("Transactions!A12:I12"), Some(12));
        assert_eq!(parse_first_row("'Data 2025'!A40:I41"), Some(40));
        assert_eq!(parse_first_row("garbage"), None);
    }
}
