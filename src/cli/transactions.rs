use std::io::Write;

use chrono::Local;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::amount::parse_amount;
use crate::error::{AppError, Result};
use crate::fmt::money;
use crate::mapper::normalize_date;
use crate::models::{Transaction, TransactionDraft, TxnType};
use crate::store::{Outcome, TransactionFilter};

use super::{as_api, open_state, try_connect};

pub struct AddArgs {
    pub amount: String,
    pub category: String,
    pub description: String,
    pub account: Option<String>,
    pub date: Option<String>,
    pub tag: Option<String>,
    pub kind: Option<String>,
}

#[derive(Default)]
pub struct EditArgs {
    pub amount: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub account: Option<String>,
    pub date: Option<String>,
    pub tag: Option<String>,
    pub kind: Option<String>,
}

pub struct ListArgs {
    pub month: Option<String>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub kind: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub limit: usize,
}

fn parse_kind(kind: Option<&str>) -> Result<Option<TxnType>> {
    kind.map(str::parse).transpose()
}

fn report(verb: &str, outcome: &Outcome) {
    if outcome.synced {
        println!("{verb} {} {}", outcome.id, "(synced)".green());
    } else {
        println!("{verb} {} {}", outcome.id, "(saved locally, not synced)".yellow());
    }
    if let Some(w) = &outcome.warning {
        eprintln!("{} {w}", "Warning:".yellow().bold());
    }
}

pub fn add(args: AddArgs) -> Result<()> {
    let (conn, mut state, settings) = open_state()?;
    let account = match args.account {
        Some(a) => a,
        None => state
            .master
            .accounts
            .first()
            .cloned()
            .ok_or_else(|| AppError::Invalid("no accounts known; pass --account".into()))?,
    };
    let date = match args.date.as_deref() {
        Some(d) => normalize_date(d)?,
        None => Local::now().date_naive(),
    };
    let draft = TransactionDraft {
        date,
        amount: parse_amount(&args.amount, &settings.amount_format)?,
        category: args.category,
        description: args.description,
        account,
        tag: args.tag,
        kind: parse_kind(args.kind.as_deref())?,
    };
    let mut api = try_connect(&settings);
    let outcome = state.add_transaction(&conn, as_api(&mut api), draft)?;
    report("Added", &outcome);
    Ok(())
}

/// Overlay the given fields on an existing record.
fn merge_edit(txn: &Transaction, args: EditArgs, settings: &crate::settings::Settings) -> Result<TransactionDraft> {
    let category = args.category.unwrap_or_else(|| txn.category.clone());
    // An explicit type survives unless the category changes or a new one is given.
    let kind = match args.kind.as_deref() {
        Some(k) => Some(k.parse()?),
        None if category == txn.category => Some(txn.kind),
        None => None,
    };
    Ok(TransactionDraft {
        date: match args.date.as_deref() {
            Some(d) => normalize_date(d)?,
            None => txn.date,
        },
        amount: match args.amount.as_deref() {
            Some(a) => parse_amount(a, &settings.amount_format)?,
            None => txn.amount,
        },
        description: args.description.unwrap_or_else(|| txn.description.clone()),
        account: args.account.unwrap_or_else(|| txn.account.clone()),
        tag: match args.tag {
            Some(t) if t.trim().is_empty() => None,
            Some(t) => Some(t),
            None => txn.tag.clone(),
        },
        category,
        kind,
    })
}

pub fn edit(id: &str, args: EditArgs) -> Result<()> {
    let (conn, mut state, settings) = open_state()?;
    let txn = state
        .find(id)
        .ok_or_else(|| AppError::UnknownTransaction(id.to_string()))?;
    let draft = merge_edit(txn, args, &settings)?;
    let mut api = try_connect(&settings);
    let outcome = state.update_transaction(&conn, as_api(&mut api), id, draft)?;
    report("Updated", &outcome);
    Ok(())
}

pub fn delete(id: &str, yes: bool) -> Result<()> {
    let (conn, mut state, settings) = open_state()?;
    let txn = state
        .find(id)
        .ok_or_else(|| AppError::UnknownTransaction(id.to_string()))?;
    if !yes {
        print!(
            "Delete {} {} {}? [y/N] ",
            txn.date,
            txn.description,
            money(txn.amount.abs())
        );
        std::io::stdout().flush()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Kept {id}.");
            return Ok(());
        }
    }
    let mut api = if txn.sheet_row.is_some() {
        try_connect(&settings)
    } else {
        None
    };
    state.delete_transaction(&conn, as_api(&mut api), id)?;
    println!("Deleted {id}");
    Ok(())
}

pub fn list(args: ListArgs) -> Result<()> {
    let (_conn, mut state, _settings) = open_state()?;
    state.filter = TransactionFilter {
        search: args.search.unwrap_or_default(),
        kind: parse_kind(args.kind.as_deref())?,
        account: args.account,
        category: args.category,
        month: args.month.as_deref().map(str::parse).transpose()?,
        tag: args.tag,
    };
    let rows = state.filtered();
    println!("{}", format_list(&rows, args.limit, &state.filter.describe()));
    Ok(())
}

pub fn format_list(rows: &[&Transaction], limit: usize, filter_desc: &str) -> String {
    if rows.is_empty() {
        return "No transactions found.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec![
        "", "ID", "Date", "Description", "Category", "Account", "Amount", "Type",
    ]);
    for t in rows.iter().take(limit) {
        let amt = match t.kind {
            TxnType::Income => money(t.amount.abs()).green().to_string(),
            TxnType::Expense => money(t.amount.abs()).red().to_string(),
            TxnType::Transfer => money(t.amount.abs()).blue().to_string(),
        };
        table.add_row(vec![
            Cell::new(if t.synced { "" } else { "*" }),
            Cell::new(&t.id),
            Cell::new(t.date.format("%Y-%m-%d")),
            Cell::new(&t.description),
            Cell::new(&t.category),
            Cell::new(&t.account),
            Cell::new(amt).set_alignment(CellAlignment::Right),
            Cell::new(t.kind.as_str()),
        ]);
    }
    let shown = rows.len().min(limit);
    let mut out = format!("Transactions ({filter_desc}): {shown} of {}\n{table}", rows.len());
    if rows.iter().any(|t| !t.synced) {
        out.push_str("\n* not yet written to the spreadsheet");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::settings::Settings;
    use chrono::NaiveDate;

    fn txn() -> Transaction {
        Transaction {
            id: "t1".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            amount: 82.5,
            category: "Food > Groceries".into(),
            description: "Groceries".into(),
            account: "Checking".into(),
            tag: Some("weekly".into()),
            kind: TxnType::Expense,
            synced: false,
            source: Source::Sheets,
            sheet_row: Some(3),
            created_at: None,
        }
    }

    #[test]
    fn test_merge_edit_keeps_untouched_fields() {
        let args = EditArgs {
            amount: Some("90".into()),
            ..Default::default()
        };
        let draft = merge_edit(&txn(), args, &Settings::default()).unwrap();
        assert_eq!(draft.amount, 90.0);
        assert_eq!(draft.description, "Groceries");
        assert_eq!(draft.tag.as_deref(), Some("weekly"));
        assert_eq!(draft.kind, Some(TxnType::Expense));
    }

    #[test]
    fn test_merge_edit_new_category_reinfers() {
        let args = EditArgs {
            category: Some("Income > Refund".into()),
            tag: Some("".into()),
            ..Default::default()
        };
        let draft = merge_edit(&txn(), args, &Settings::default()).unwrap();
        assert_eq!(draft.kind, None);
        assert_eq!(draft.tag, None);
    }

    #[test]
    fn test_merge_edit_rejects_bad_date() {
        let args = EditArgs {
            date: Some("tomorrow-ish".into()),
            ..Default::default()
        };
        assert!(merge_edit(&txn(), args, &Settings::default()).is_err());
    }

    #[test]
    fn test_format_list_marks_unsynced() {
        colored::control::set_override(false);
        let t = txn();
        let out = format_list(&[&t], 10, "all");
        assert!(out.contains("Transactions (all): 1 of 1"));
        assert!(out.contains("Groceries"));
        assert!(out.contains("$82.50"));
        assert!(out.contains("not yet written"));
        assert_eq!(format_list(&[], 10, "all"), "No transactions found.");
    }
}
