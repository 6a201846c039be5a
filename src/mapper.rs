//! Conversion between spreadsheet rows and records.
//!
//! Transaction rows use columns A–I:
//! `ID | Date | Description | Category | Amount | Account | Tag | Type | Created`.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate};
use regex::Regex;

use crate::amount::{parse_amount, AmountFormat};
use crate::category::resolve_type;
use crate::error::{AppError, Result};
use crate::models::{AccountBalance, Category, Source, Transaction};

pub const TRANSACTION_COLUMNS: usize = 9;

const COL_ID: usize = 0;
const COL_DATE: usize = 1;
const COL_DESCRIPTION: usize = 2;
const COL_CATEGORY: usize = 3;
const COL_AMOUNT: usize = 4;
const COL_ACCOUNT: usize = 5;
const COL_TAG: usize = 6;
const COL_TYPE: usize = 7;
const COL_CREATED: usize = 8;

const ACCOUNT_HEADERS: &[&str] = &["account", "accounts", "akun", "name"];
const CATEGORY_HEADERS: &[&str] = &["category", "categories", "kategori", "main"];

fn cell(cells: &[String], idx: usize) -> &str {
    cells.get(idx).map(|s| s.trim()).unwrap_or("")
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Map one transaction row. `row_number` is the 1-based spreadsheet row.
/// Returns `None` for rows that carry neither a date nor an amount.
pub fn transaction_from_row(
    row_number: u32,
    cells: &[String],
    format: &AmountFormat,
) -> Option<Transaction> {
    let date_text = cell(cells, COL_DATE);
    let amount_text = cell(cells, COL_AMOUNT);
    if date_text.is_empty() && amount_text.is_empty() {
        return None;
    }

    let date = match normalize_date(date_text) {
        Ok(d) => d,
        Err(_) => {
            log::warn!("row {row_number}: skipping unreadable date {date_text:?}");
            return None;
        }
    };

    let amount = if amount_text.is_empty() {
        0.0
    } else {
        parse_amount(amount_text, format).unwrap_or_else(|_| {
            log::warn!("row {row_number}: unreadable amount {amount_text:?}, using 0");
            0.0
        })
    };

    let category = cell(cells, COL_CATEGORY).to_string();
    let kind = resolve_type(Some(cell(cells, COL_TYPE)), &category);
    let id = non_empty(cell(cells, COL_ID)).unwrap_or_else(|| row_id(row_number));

    Some(Transaction {
        id,
        date,
        amount,
        kind,
        description: cell(cells, COL_DESCRIPTION).to_string(),
        account: cell(cells, COL_ACCOUNT).to_string(),
        tag: non_empty(cell(cells, COL_TAG)),
        category,
        synced: true,
        source: Source::Sheets,
        sheet_row: Some(row_number),
        created_at: non_empty(cell(cells, COL_CREATED)),
    })
}

/// Id given to a sheet row whose ID cell is empty. It follows the row, so
/// it changes whenever rows above are deleted.
pub fn row_id(row_number: u32) -> String {
    format!("row-{row_number}")
}

pub fn is_row_id(id: &str) -> bool {
    id.strip_prefix("row-").is_some_and(|n| n.parse::<u32>().is_ok())
}

/// Map every row of a transactions range whose first row is `first_row`.
pub fn transactions_from_rows(
    first_row: u32,
    rows: &[Vec<String>],
    format: &AmountFormat,
) -> Vec<Transaction> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, cells)| transaction_from_row(first_row + i as u32, cells, format))
        .collect()
}

pub fn transaction_to_row(txn: &Transaction) -> Vec<String> {
    let mut row = vec![String::new(); TRANSACTION_COLUMNS];
    row[COL_ID] = txn.id.clone();
    row[COL_DATE] = txn.date.format("%Y-%m-%d").to_string();
    row[COL_DESCRIPTION] = txn.description.clone();
    row[COL_CATEGORY] = txn.category.clone();
    row[COL_AMOUNT] = plain_number(txn.amount);
    row[COL_ACCOUNT] = txn.account.clone();
    row[COL_TAG] = txn.tag.clone().unwrap_or_default();
    row[COL_TYPE] = txn.kind.as_str().to_string();
    row[COL_CREATED] = txn.created_at.clone().unwrap_or_default();
    row
}

fn plain_number(val: f64) -> String {
    let rounded = (val * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

/// Spreadsheet serial days accepted as dates: 1910-01-01 up to 9999-12-31.
/// Smaller numbers are more likely a bare year than a date.
const SERIAL_MIN: f64 = 3653.0;
const SERIAL_MAX: f64 = 2_958_466.0;

struct DatePatterns {
    year_first: Regex,
    day_first: Regex,
    serial: Regex,
}

fn patterns() -> &'static DatePatterns {
    static PATTERNS: OnceLock<DatePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| DatePatterns {
        year_first: Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})$").unwrap(),
        day_first: Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{2}|\d{4})$").unwrap(),
        serial: Regex::new(r"^\d{4,7}(\.\d+)?$").unwrap(),
    })
}

/// Normalize the date formats a spreadsheet can hand back.
pub fn normalize_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    let err = || AppError::parse("date", text);
    let p = patterns();

    if let Some(c) = p.year_first.captures(text) {
        return ymd(&c[1], &c[2], &c[3]).ok_or_else(err);
    }
    if let Some(c) = p.day_first.captures(text) {
        let year = if c[3].len() == 2 {
            format!("20{}", &c[3])
        } else {
            c[3].to_string()
        };
        // Day-first unless the second field cannot be a month.
        let (day, month) = if c[2].parse::<u32>().unwrap_or(0) > 12 {
            (&c[2], &c[1])
        } else {
            (&c[1], &c[2])
        };
        return ymd(&year, month, day).ok_or_else(err);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.date_naive());
    }
    if text.len() > 10 && text.is_char_boundary(10) {
        if let Some(c) = p.year_first.captures(&text[..10]) {
            return ymd(&c[1], &c[2], &c[3]).ok_or_else(err);
        }
    }
    if p.serial.is_match(text) {
        let days: f64 = text.parse().map_err(|_| err())?;
        if (SERIAL_MIN..SERIAL_MAX).contains(&days) {
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).ok_or_else(err)?;
            return Ok(epoch + Duration::days(days.trunc() as i64));
        }
    }
    Err(err())
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Scan the accounts block (E–G): name in the first column, balance in the
/// last. Header and blank rows are skipped.
pub fn balances_from_rows(rows: &[Vec<String>], format: &AmountFormat) -> Vec<AccountBalance> {
    let mut out: Vec<AccountBalance> = Vec::new();
    for (i, cells) in rows.iter().enumerate() {
        let name = cell(cells, 0);
        let balance_text = cell(cells, 2);
        if name.is_empty() || balance_text.is_empty() {
            continue;
        }
        if ACCOUNT_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
            continue;
        }
        match parse_amount(balance_text, format) {
            Ok(balance) => {
                if !out.iter().any(|a| a.name == name) {
                    out.push(AccountBalance {
                        name: name.to_string(),
                        balance,
                    });
                }
            }
            Err(_) => log::debug!("accounts row {}: no numeric balance in {balance_text:?}", i + 1),
        }
    }
    out
}

/// Read the category block (A–C): main, sub, display.
pub fn categories_from_rows(rows: &[Vec<String>]) -> Vec<Category> {
    let mut out: Vec<Category> = Vec::new();
    for cells in rows {
        let main = cell(cells, 0);
        if main.is_empty() || CATEGORY_HEADERS.iter().any(|h| main.eq_ignore_ascii_case(h)) {
            continue;
        }
        let mut category = Category::from_parts(main, non_empty(cell(cells, 1)).as_deref());
        let display = cell(cells, 2);
        if !display.is_empty() {
            category.display = display.to_string();
        }
        if !out.iter().any(|c| c.display == category.display) {
            out.push(category);
        }
    }
    out
}
