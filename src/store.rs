//! Application state: the working set of transactions, balances and master
//! data, plus the operations that keep it in step with the spreadsheet and
//! the local cache.

use chrono::Local;
use rand::RngCore;
use rusqlite::Connection;

use crate::amount::AmountFormat;
use crate::category::infer_type;
use crate::db;
use crate::error::{AppError, Result};
use crate::form::TransactionForm;
use crate::mapper;
use crate::metrics::{self, DashboardMetrics, YearMonth};
use crate::models::{AccountBalance, MasterData, Source, Transaction, TransactionDraft, TxnType};
use crate::settings::SheetLayout;
use crate::sheets::{self, SheetsApi};

pub const LAST_SYNC_KEY: &str = "last_sync";

/// Criteria for the transaction list. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub search: String,
    pub kind: Option<TxnType>,
    pub account: Option<String>,
    /// Matches the main category, or the full compound string.
    pub category: Option<String>,
    pub month: Option<YearMonth>,
    pub tag: Option<String>,
}

impl TransactionFilter {
    pub fn matches(&self, txn: &Transaction) -> bool {
        if let Some(kind) = self.kind {
            if txn.kind != kind {
                return false;
            }
        }
        if let Some(account) = &self.account {
            if !txn.account.eq_ignore_ascii_case(account) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !txn.main_category().eq_ignore_ascii_case(category)
                && !txn.category.eq_ignore_ascii_case(category)
            {
                return false;
            }
        }
        if let Some(month) = self.month {
            if !month.contains(txn.date) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !txn.tag.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty() {
            let hay = [
                txn.description.as_str(),
                txn.category.as_str(),
                txn.account.as_str(),
                txn.tag.as_deref().unwrap_or(""),
            ];
            if !hay.iter().any(|h| h.to_lowercase().contains(&needle)) {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// One-line summary for status bars, e.g. `"rent" · Expense · Checking`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.search.trim().is_empty() {
            parts.push(format!("\"{}\"", self.search.trim()));
        }
        if let Some(kind) = self.kind {
            parts.push(kind.to_string());
        }
        if let Some(account) = &self.account {
            parts.push(account.clone());
        }
        if let Some(category) = &self.category {
            parts.push(category.clone());
        }
        if let Some(month) = self.month {
            parts.push(month.to_string());
        }
        if let Some(tag) = &self.tag {
            parts.push(format!("#{tag}"));
        }
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join(" · ")
        }
    }
}

/// Result of a mutation that may or may not have reached the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub id: String,
    pub synced: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub remote: usize,
    pub kept_local: usize,
    pub accounts: usize,
    pub categories: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: Vec<(String, String)>,
}

pub struct AppState {
    pub transactions: Vec<Transaction>,
    pub balances: Vec<AccountBalance>,
    pub master: MasterData,
    pub filter: TransactionFilter,
    pub form: Option<TransactionForm>,
    pub connected: bool,
    layout: SheetLayout,
    format: AmountFormat,
    revision: u64,
    metrics_cache: Option<(u64, YearMonth, DashboardMetrics)>,
}

impl AppState {
    pub fn new(layout: SheetLayout, format: AmountFormat) -> Self {
        Self {
            transactions: Vec::new(),
            balances: Vec::new(),
            master: MasterData::default(),
            filter: TransactionFilter::default(),
            form: None,
            connected: false,
            layout,
            format,
            revision: 0,
            metrics_cache: None,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Read everything from the local cache.
    pub fn load(&mut self, conn: &Connection) -> Result<()> {
        self.transactions = db::load_transactions(conn)?;
        self.balances = db::load_balances(conn)?;
        self.master = MasterData {
            accounts: self.balances.iter().map(|b| b.name.clone()).collect(),
            categories: db::load_categories(conn)?,
        };
        self.touch();
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| AppError::UnknownTransaction(id.to_string()))
    }

    pub fn unsynced_count(&self) -> usize {
        self.transactions.iter().filter(|t| !t.synced).count()
    }

    pub fn last_sync(conn: &Connection) -> Option<String> {
        db::get_metadata(conn, LAST_SYNC_KEY)
    }

    /// Transactions matching the current filter, newest first.
    pub fn filtered(&self) -> Vec<&Transaction> {
        let mut out: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|t| self.filter.matches(t))
            .collect();
        out.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.sheet_row.cmp(&a.sheet_row))
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        out
    }

    /// Dashboard numbers for `month`, recomputed only after a mutation.
    pub fn metrics(&mut self, month: YearMonth) -> &DashboardMetrics {
        let fresh = matches!(&self.metrics_cache, Some((rev, m, _)) if *rev == self.revision && *m == month);
        if !fresh {
            self.metrics_cache = None;
        }
        let revision = self.revision;
        let txns = &self.transactions;
        &self
            .metrics_cache
            .get_or_insert_with(|| (revision, month, metrics::compute_dashboard(txns, month)))
            .2
    }

    /// Sheet balances adjusted for transactions not yet written back.
    pub fn projected_balances(&self) -> Vec<AccountBalance> {
        metrics::projected_balances(&self.balances, &self.transactions)
    }

    /// Replace sheet-backed records with a fresh read; local unsynced records
    /// survive, and their pending edits win over the remote copy.
    pub fn refresh_from_sheets(
        &mut self,
        conn: &Connection,
        api: &mut dyn SheetsApi,
    ) -> Result<RefreshReport> {
        let rows = api.get_range(&self.layout.transactions_range())?;
        let mut remote = mapper::transactions_from_rows(self.layout.first_data_row, &rows, &self.format);
        let balances = mapper::balances_from_rows(&api.get_range(&self.layout.accounts_range())?, &self.format);
        let categories = mapper::categories_from_rows(&api.get_range(&self.layout.categories_range())?);

        let mut pending: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| !t.synced)
            .cloned()
            .collect();
        for local in pending.iter_mut() {
            let matched = remote.iter().position(|r| r.id == local.id).or_else(|| {
                // A row without an ID cell is only known by its position.
                if local.source != Source::Sheets || !mapper::is_row_id(&local.id) {
                    return None;
                }
                local.sheet_row.and_then(|row| {
                    remote
                        .iter()
                        .position(|r| r.sheet_row == Some(row) && mapper::is_row_id(&r.id))
                })
            });
            match matched {
                Some(idx) => {
                    let fresh = remote.remove(idx);
                    if fresh.id != local.id {
                        log::debug!("{} is now {}", local.id, fresh.id);
                        local.id = fresh.id;
                    }
                    local.sheet_row = fresh.sheet_row;
                    local.source = Source::Sheets;
                }
                None if local.source == Source::Sheets => {
                    log::warn!("{} no longer in the sheet; keeping it as a new local record", local.id);
                    local.sheet_row = None;
                    local.source = Source::Local;
                }
                None => {}
            }
        }

        let report = RefreshReport {
            remote: remote.len(),
            kept_local: pending.len(),
            accounts: balances.len(),
            categories: categories.len(),
        };

        remote.extend(pending);
        self.transactions = remote;
        db::replace_transactions(conn, &self.transactions)?;
        if !balances.is_empty() {
            db::replace_balances(conn, &balances)?;
            self.master.accounts = balances.iter().map(|b| b.name.clone()).collect();
            self.balances = balances;
        }
        if !categories.is_empty() {
            db::replace_categories(conn, &categories)?;
            self.master.categories = categories;
        }
        db::set_metadata(conn, LAST_SYNC_KEY, &Local::now().to_rfc3339())?;
        self.touch();
        log::info!(
            "refreshed {} sheet rows, kept {} local",
            report.remote,
            report.kept_local
        );
        Ok(report)
    }

    /// Insert a new record locally, then try to append it to the sheet.
    pub fn add_transaction(
        &mut self,
        conn: &Connection,
        api: Option<&mut dyn SheetsApi>,
        draft: TransactionDraft,
    ) -> Result<Outcome> {
        draft.validate()?;
        let kind = draft.kind.unwrap_or_else(|| infer_type(&draft.category));
        let txn = Transaction {
            id: new_id(),
            date: draft.date,
            amount: draft.amount,
            category: draft.category.trim().to_string(),
            description: draft.description.trim().to_string(),
            account: draft.account.trim().to_string(),
            tag: draft.tag.filter(|t| !t.trim().is_empty()),
            kind,
            synced: false,
            source: Source::Local,
            sheet_row: None,
            created_at: Some(Local::now().to_rfc3339()),
        };
        let id = txn.id.clone();
        db::upsert_transaction(conn, &txn)?;
        self.transactions.push(txn);
        self.touch();
        self.try_push(conn, api, id)
    }

    /// Replace a record's fields. Id, sheet row and origin stay as they were.
    pub fn update_transaction(
        &mut self,
        conn: &Connection,
        api: Option<&mut dyn SheetsApi>,
        id: &str,
        draft: TransactionDraft,
    ) -> Result<Outcome> {
        draft.validate()?;
        let idx = self.position(id)?;
        let txn = &mut self.transactions[idx];
        txn.kind = draft.kind.unwrap_or_else(|| infer_type(&draft.category));
        txn.date = draft.date;
        txn.amount = draft.amount;
        txn.category = draft.category.trim().to_string();
        txn.description = draft.description.trim().to_string();
        txn.account = draft.account.trim().to_string();
        txn.tag = draft.tag.filter(|t| !t.trim().is_empty());
        txn.synced = false;
        db::upsert_transaction(conn, txn)?;
        self.touch();
        self.try_push(conn, api, id.to_string())
    }

    /// Remove a record. A sheet-backed record needs a connection, since the
    /// next refresh would otherwise bring it back.
    pub fn delete_transaction(
        &mut self,
        conn: &Connection,
        api: Option<&mut dyn SheetsApi>,
        id: &str,
    ) -> Result<()> {
        let idx = self.position(id)?;
        if let Some(row) = self.transactions[idx].sheet_row {
            let api = api.ok_or_else(|| {
                AppError::Other(format!(
                    "{id} lives in the spreadsheet; connect to Google Sheets to delete it"
                ))
            })?;
            api.delete_row(&self.layout.transactions_sheet, row)?;
            for t in self.transactions.iter_mut() {
                if let Some(r) = t.sheet_row.as_mut() {
                    if *r > row {
                        *r -= 1;
                    }
                }
            }
            db::shift_sheet_rows(conn, row)?;
        }
        self.transactions.remove(idx);
        db::delete_transaction(conn, id)?;
        self.touch();
        Ok(())
    }

    /// Write every unsynced record, oldest first. An expired sign-in stops
    /// the run; other failures are collected and the rest continue.
    pub fn push_pending(&mut self, conn: &Connection, api: &mut dyn SheetsApi) -> Result<PushReport> {
        let mut ids: Vec<(chrono::NaiveDate, String)> = self
            .transactions
            .iter()
            .filter(|t| !t.synced)
            .map(|t| (t.date, t.id.clone()))
            .collect();
        ids.sort();

        let mut report = PushReport::default();
        for (_, id) in ids {
            match self.push_one(conn, api, &id) {
                Ok(()) => report.pushed += 1,
                Err(AppError::AuthRequired) => return Err(AppError::AuthRequired),
                Err(e) => {
                    log::warn!("push {id} failed: {e}");
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        if report.pushed > 0 {
            self.touch();
        }
        Ok(report)
    }

    fn try_push(
        &mut self,
        conn: &Connection,
        api: Option<&mut dyn SheetsApi>,
        id: String,
    ) -> Result<Outcome> {
        let Some(api) = api else {
            return Ok(Outcome {
                id,
                synced: false,
                warning: None,
            });
        };
        match self.push_one(conn, api, &id) {
            Ok(()) => {
                self.touch();
                Ok(Outcome {
                    id,
                    synced: true,
                    warning: None,
                })
            }
            Err(e) => {
                log::warn!("saved {id} locally, sheet write failed: {e}");
                Ok(Outcome {
                    id,
                    synced: false,
                    warning: Some(format!("Saved locally; sheet update failed: {e}")),
                })
            }
        }
    }

    /// Overwrite the record's row, or append it when it has none yet.
    fn push_one(&mut self, conn: &Connection, api: &mut dyn SheetsApi, id: &str) -> Result<()> {
        let idx = self.position(id)?;
        let row = mapper::transaction_to_row(&self.transactions[idx]);
        let sheet_row = match self.transactions[idx].sheet_row {
            Some(r) => {
                let range = sheets::row_range(
                    &self.layout.transactions_sheet,
                    r,
                    0,
                    mapper::TRANSACTION_COLUMNS - 1,
                );
                api.update_range(&range, &[row])?;
                r
            }
            None => {
                let result = api.append_rows(&self.layout.transactions_append_range(), &[row])?;
                result.first_row.ok_or_else(|| {
                    AppError::Other(format!(
                        "append returned no row number ({:?})",
                        result.updated_range
                    ))
                })?
            }
        };
        let txn = &mut self.transactions[idx];
        txn.sheet_row = Some(sheet_row);
        txn.synced = true;
        txn.source = Source::Sheets;
        db::upsert_transaction(conn, txn)?;
        Ok(())
    }
}

fn new_id() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("txn-{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::memory::MemorySheets;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const HEADER: &[&str] = &[
        "ID", "Date", "Description", "Category", "Amount", "Account", "Tag", "Type", "Created",
    ];

    fn setup() -> (TempDir, Connection, AppState) {
        let dir = TempDir::new().unwrap();
        let conn = db::get_connection(&dir.path().join("test.db")).unwrap();
        db::init_db(&conn).unwrap();
        let mut state = AppState::new(SheetLayout::default(), AmountFormat::default());
        state.load(&conn).unwrap();
        (dir, conn, state)
    }

    fn remote() -> MemorySheets {
        MemorySheets::default()
            .with_sheet(
                "Transactions",
                vec![
                    HEADER.to_vec(),
                    vec!["t1", "2025-03-01", "Paycheck", "Income > Salary", "4,000.00", "Checking", "", "Income", ""],
                    vec!["t2", "2025-03-02", "Groceries", "Food > Groceries", "-82.50", "Checking", "", "Expense", ""],
                    vec!["t3", "2025-03-05", "Rent", "Housing > Rent", "1500", "Checking", "home", "", ""],
                ],
            )
            .with_sheet(
                "Master",
                vec![
                    vec!["Category", "Sub", "Display", "", "Account", "", "Balance"],
                    vec!["Food", "Groceries", "Food > Groceries", "", "Checking", "", "2,417.50"],
                    vec!["Housing", "Rent", "Housing > Rent", "", "Cash", "", "40"],
                ],
            )
    }

    fn draft(desc: &str, amount: f64, category: &str) -> TransactionDraft {
        TransactionDraft {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            amount,
            category: category.to_string(),
            description: desc.to_string(),
            account: "Checking".to_string(),
            tag: None,
            kind: None,
        }
    }

    #[test]
    fn test_refresh_replaces_cache() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        let report = state.refresh_from_sheets(&conn, &mut api).unwrap();
        assert_eq!(report.remote, 3);
        assert_eq!(report.accounts, 2);
        assert_eq!(state.find("t3").unwrap().sheet_row, Some(4));
        assert_eq!(state.find("t3").unwrap().kind, TxnType::Expense);
        assert_eq!(state.master.accounts, vec!["Checking", "Cash"]);
        assert_eq!(db::load_transactions(&conn).unwrap().len(), 3);
        assert!(AppState::last_sync(&conn).is_some());
    }

    #[test]
    fn test_add_offline_stays_local() {
        let (_dir, conn, mut state) = setup();
        let out = state
            .add_transaction(&conn, None, draft("Coffee", 4.5, "Food > Coffee"))
            .unwrap();
        assert!(!out.synced);
        assert!(out.id.starts_with("txn-"));
        let txn = state.find(&out.id).unwrap();
        assert_eq!(txn.kind, TxnType::Expense);
        assert_eq!(txn.source, Source::Local);
        assert_eq!(state.unsynced_count(), 1);
        assert_eq!(db::load_transactions(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_add_online_appends_and_records_row() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        let out = state
            .add_transaction(&conn, Some(&mut api), draft("Bonus", 250.0, "Income > Bonus"))
            .unwrap();
        assert!(out.synced);
        let txn = state.find(&out.id).unwrap();
        assert_eq!(txn.sheet_row, Some(5));
        assert_eq!(txn.kind, TxnType::Income);
        let row = api.row("Transactions", 5);
        assert_eq!(row[0], out.id);
        assert_eq!(row[4], "250");
    }

    #[test]
    fn test_add_write_failure_returns_warning() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        api.fail_writes = true;
        let out = state
            .add_transaction(&conn, Some(&mut api), draft("Lunch", 12.0, "Food"))
            .unwrap();
        assert!(!out.synced);
        assert!(out.warning.unwrap().contains("Saved locally"));
        assert!(!state.find(&out.id).unwrap().synced);
    }

    #[test]
    fn test_add_rejects_invalid_draft() {
        let (_dir, conn, mut state) = setup();
        let err = state
            .add_transaction(&conn, None, draft("  ", 1.0, "Food"))
            .unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
        assert!(state.transactions.is_empty());
    }

    #[test]
    fn test_update_overwrites_same_row() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        let mut d = draft("Groceries (market)", 90.0, "Food > Groceries");
        d.date = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let out = state.update_transaction(&conn, Some(&mut api), "t2", d).unwrap();
        assert!(out.synced);
        assert!(api.calls.contains(&"update Transactions!A3:I3".to_string()));
        let txn = state.find("t2").unwrap();
        assert_eq!(txn.sheet_row, Some(3));
        assert_eq!(txn.source, Source::Sheets);
        assert_eq!(api.row("Transactions", 3)[2], "Groceries (market)");
    }

    #[test]
    fn test_update_reinfers_type() {
        let (_dir, conn, mut state) = setup();
        let out = state
            .add_transaction(&conn, None, draft("Move", 100.0, "Food"))
            .unwrap();
        state
            .update_transaction(&conn, None, &out.id, draft("Move", 100.0, "Transfer > Savings"))
            .unwrap();
        assert_eq!(state.find(&out.id).unwrap().kind, TxnType::Transfer);
    }

    #[test]
    fn test_update_unknown_id() {
        let (_dir, conn, mut state) = setup();
        let err = state
            .update_transaction(&conn, None, "nope", draft("x", 1.0, "Food"))
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownTransaction(_)));
    }

    #[test]
    fn test_delete_shifts_rows_below() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        state.delete_transaction(&conn, Some(&mut api), "t2").unwrap();
        assert!(state.find("t2").is_none());
        assert_eq!(state.find("t1").unwrap().sheet_row, Some(2));
        assert_eq!(state.find("t3").unwrap().sheet_row, Some(3));
        assert_eq!(api.row("Transactions", 3)[0], "t3");
        let cached = db::load_transactions(&conn).unwrap();
        assert_eq!(cached.iter().find(|t| t.id == "t3").unwrap().sheet_row, Some(3));

        // A later edit lands on the shifted row.
        state
            .update_transaction(&conn, Some(&mut api), "t3", draft("Rent", 1600.0, "Housing > Rent"))
            .unwrap();
        assert_eq!(api.row("Transactions", 3)[4], "1600");
    }

    #[test]
    fn test_delete_sheet_record_needs_connection() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        assert!(state.delete_transaction(&conn, None, "t1").is_err());
        assert!(state.find("t1").is_some());
    }

    #[test]
    fn test_delete_local_only() {
        let (_dir, conn, mut state) = setup();
        let out = state.add_transaction(&conn, None, draft("Tea", 3.0, "Food")).unwrap();
        state.delete_transaction(&conn, None, &out.id).unwrap();
        assert!(state.transactions.is_empty());
        assert!(db::load_transactions(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_push_pending_then_refresh_keeps_nothing_twice() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        state.add_transaction(&conn, None, draft("A", 1.0, "Food")).unwrap();
        state.add_transaction(&conn, None, draft("B", 2.0, "Food")).unwrap();
        let report = state.push_pending(&conn, &mut api).unwrap();
        assert_eq!(report.pushed, 2);
        assert!(report.failed.is_empty());
        assert_eq!(state.unsynced_count(), 0);

        state.refresh_from_sheets(&conn, &mut api).unwrap();
        assert_eq!(state.transactions.len(), 5);
    }

    #[test]
    fn test_refresh_keeps_pending_edits() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        state
            .update_transaction(&conn, None, "t1", draft("Paycheck (March)", 4000.0, "Income > Salary"))
            .unwrap();
        let report = state.refresh_from_sheets(&conn, &mut api).unwrap();
        assert_eq!(report.kept_local, 1);
        assert_eq!(state.transactions.len(), 3);
        let t1 = state.find("t1").unwrap();
        assert_eq!(t1.description, "Paycheck (March)");
        assert!(!t1.synced);
        assert_eq!(t1.sheet_row, Some(2));
    }

    #[test]
    fn test_refresh_follows_shifted_row_without_id() {
        let (_dir, conn, mut state) = setup();
        let mut api = MemorySheets::default().with_sheet(
            "Transactions",
            vec![
                HEADER.to_vec(),
                vec!["t1", "2025-03-01", "Paycheck", "Income > Salary", "4000", "Checking", "", "Income", ""],
                vec!["", "2025-03-02", "Coffee", "Food > Coffee", "4.50", "Checking", "", "Expense", ""],
            ],
        );
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        assert_eq!(state.find("row-3").unwrap().sheet_row, Some(3));

        state.delete_transaction(&conn, Some(&mut api), "t1").unwrap();
        let mut d = draft("Coffee beans", 4.5, "Food > Coffee");
        d.date = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        state.update_transaction(&conn, None, "row-3", d).unwrap();

        let report = state.refresh_from_sheets(&conn, &mut api).unwrap();
        assert_eq!(report.remote, 0);
        assert_eq!(state.transactions.len(), 1);
        let coffee = &state.transactions[0];
        assert_eq!(coffee.id, "row-2");
        assert_eq!(coffee.sheet_row, Some(2));
        assert_eq!(coffee.description, "Coffee beans");
        assert!(!coffee.synced);

        state.push_pending(&conn, &mut api).unwrap();
        assert_eq!(api.row("Transactions", 2)[2], "Coffee beans");
        assert!(api.row("Transactions", 3).iter().all(|c| c.is_empty()));
        assert_eq!(db::load_transactions(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_offline_description_edit_keeps_projected_balance() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        let before = state.projected_balances()[0].balance;
        assert_eq!(before, 2417.5);
        let mut d = draft("Groceries (market)", 82.5, "Food > Groceries");
        d.date = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        state.update_transaction(&conn, None, "t2", d).unwrap();
        assert_eq!(state.projected_balances()[0].balance, before);
    }

    #[test]
    fn test_filtered_newest_first() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        let ids: Vec<&str> = state.filtered().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t2", "t1"]);

        state.filter.kind = Some(TxnType::Expense);
        state.filter.search = "rent".into();
        let ids: Vec<&str> = state.filtered().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t3"]);
        assert_eq!(state.filter.describe(), "\"rent\" · Expense");

        state.filter = TransactionFilter {
            tag: Some("HOME".into()),
            ..Default::default()
        };
        assert_eq!(state.filtered().len(), 1);
        state.filter = TransactionFilter {
            category: Some("food".into()),
            ..Default::default()
        };
        assert_eq!(state.filtered()[0].id, "t2");
    }

    #[test]
    fn test_metrics_recomputed_after_mutation() {
        let (_dir, conn, mut state) = setup();
        let mut api = remote();
        state.refresh_from_sheets(&conn, &mut api).unwrap();
        let march: YearMonth = "2025-03".parse().unwrap();
        assert_eq!(state.metrics(march).expense, 1582.5);
        state.add_transaction(&conn, None, draft("Snack", 17.5, "Food")).unwrap();
        assert_eq!(state.metrics(march).expense, 1600.0);
        assert_eq!(state.metrics(march).unsynced_count, 1);
    }
}
