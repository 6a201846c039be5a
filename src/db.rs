use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{AccountBalance, Category, Source, Transaction, TxnType};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    amount REAL NOT NULL,
    category TEXT NOT NULL,
    description TEXT NOT NULL,
    account TEXT NOT NULL,
    tag TEXT,
    kind TEXT NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0,
    source TEXT NOT NULL DEFAULT 'local',
    sheet_row INTEGER,
    created_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

CREATE TABLE IF NOT EXISTS accounts (
    name TEXT PRIMARY KEY,
    balance REAL NOT NULL DEFAULT 0,
    position INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS categories (
    display TEXT PRIMARY KEY,
    main TEXT NOT NULL,
    sub TEXT,
    position INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

// (main, sub)
const DEFAULT_CATEGORIES: &[(&str, Option<&str>)] = &[
    ("Income", Some("Salary")),
    ("Income", Some("Bonus")),
    ("Income", Some("Interest")),
    ("Food", Some("Groceries")),
    ("Food", Some("Dining Out")),
    ("Transport", Some("Fuel")),
    ("Transport", Some("Public Transit")),
    ("Housing", Some("Rent")),
    ("Housing", Some("Utilities")),
    ("Health", Some("Medical")),
    ("Entertainment", Some("Subscriptions")),
    ("Shopping", Some("Clothing")),
    ("Shopping", Some("Household")),
    ("Education", None),
    ("Gifts & Donations", None),
    ("Transfer", Some("Between Accounts")),
    ("Other", None),
];

const DEFAULT_ACCOUNTS: &[&str] = &["Cash", "Checking"];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        let categories: Vec<Category> = DEFAULT_CATEGORIES
            .iter()
            .map(|(main, sub)| Category::from_parts(main, *sub))
            .collect();
        replace_categories(conn, &categories)?;
    }
    let count: i64 = conn.query_row("SELECT count(*) FROM accounts", [], |row| row.get(0))?;
    if count == 0 {
        let accounts: Vec<AccountBalance> = DEFAULT_ACCOUNTS
            .iter()
            .map(|name| AccountBalance {
                name: name.to_string(),
                balance: 0.0,
            })
            .collect();
        replace_balances(conn, &accounts)?;
    }
    Ok(())
}

pub fn get_metadata(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row("SELECT value FROM metadata WHERE key = ?1", [key], |r| r.get(0))
        .optional()
        .ok()
        .flatten()
}

pub fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn transaction_from_sql(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let date: String = row.get(1)?;
    let kind: String = row.get(7)?;
    let source: String = row.get(9)?;
    let sheet_row: Option<i64> = row.get(10)?;
    Ok(Transaction {
        id: row.get(0)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| conversion_error(1, e))?,
        amount: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        account: row.get(5)?,
        tag: row.get(6)?,
        kind: kind.parse::<TxnType>().map_err(|e| conversion_error(7, e))?,
        synced: row.get::<_, i64>(8)? != 0,
        source: source.parse::<Source>().map_err(|e| conversion_error(9, e))?,
        sheet_row: sheet_row.map(|r| r as u32),
        created_at: row.get(11)?,
    })
}

pub fn load_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, amount, category, description, account, tag, kind, synced, source, \
         sheet_row, created_at FROM transactions ORDER BY date DESC, sheet_row DESC",
    )?;
    let rows = stmt
        .query_map([], transaction_from_sql)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn upsert_transaction(conn: &Connection, txn: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (id, date, amount, category, description, account, tag, kind, \
         synced, source, sheet_row, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
         ON CONFLICT(id) DO UPDATE SET date = excluded.date, amount = excluded.amount, \
         category = excluded.category, description = excluded.description, \
         account = excluded.account, tag = excluded.tag, kind = excluded.kind, \
         synced = excluded.synced, source = excluded.source, sheet_row = excluded.sheet_row, \
         created_at = excluded.created_at",
        params![
            txn.id,
            txn.date.format("%Y-%m-%d").to_string(),
            txn.amount,
            txn.category,
            txn.description,
            txn.account,
            txn.tag,
            txn.kind.as_str(),
            txn.synced as i64,
            txn.source.as_str(),
            txn.sheet_row.map(i64::from),
            txn.created_at,
        ],
    )?;
    Ok(())
}

pub fn delete_transaction(conn: &Connection, id: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
    Ok(n > 0)
}

/// Move every stored row below `deleted_row` up by one.
pub fn shift_sheet_rows(conn: &Connection, deleted_row: u32) -> Result<usize> {
    let n = conn.execute(
        "UPDATE transactions SET sheet_row = sheet_row - 1 WHERE sheet_row > ?1",
        [deleted_row],
    )?;
    Ok(n)
}

/// Replace the whole transaction cache in one SQL transaction.
pub fn replace_transactions(conn: &Connection, txns: &[Transaction]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM transactions", [])?;
    for txn in txns {
        upsert_transaction(&tx, txn)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn load_balances(conn: &Connection) -> Result<Vec<AccountBalance>> {
    let mut stmt = conn.prepare("SELECT name, balance FROM accounts ORDER BY position, name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AccountBalance {
                name: row.get(0)?,
                balance: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn replace_balances(conn: &Connection, balances: &[AccountBalance]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM accounts", [])?;
    for (i, b) in balances.iter().enumerate() {
        tx.execute(
            "INSERT OR REPLACE INTO accounts (name, balance, position) VALUES (?1, ?2, ?3)",
            params![b.name, b.balance, i as i64],
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn load_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt =
        conn.prepare("SELECT main, sub, display FROM categories ORDER BY position, display")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Category {
                main: row.get(0)?,
                sub: row.get(1)?,
                display: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn replace_categories(conn: &Connection, categories: &[Category]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM categories", [])?;
    for (i, c) in categories.iter().enumerate() {
        tx.execute(
            "INSERT OR REPLACE INTO categories (display, main, sub, position) VALUES (?1, ?2, ?3, ?4)",
            params![c.display, c.main, c.sub, i as i64],
        )?;
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn txn(id: &str, row: Option<u32>) -> Transaction {
        Transaction {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            amount: 18.5,
            category: "Food > Dining Out".into(),
            description: "Lunch".into(),
            account: "Cash".into(),
            tag: Some("work".into()),
            kind: TxnType::Expense,
            synced: row.is_some(),
            source: if row.is_some() { Source::Sheets } else { Source::Local },
            sheet_row: row,
            created_at: None,
        }
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["transactions", "accounts", "categories", "metadata"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent_and_seeds() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
        let cats = load_categories(&conn).unwrap();
        assert_eq!(cats.len(), DEFAULT_CATEGORIES.len());
        assert_eq!(cats[0].display, "Income > Salary");
        let accounts = load_balances(&conn).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].name, "Cash");
    }

    #[test]
    fn test_transaction_roundtrip_preserves_sync_fields() {
        let (_dir, conn) = test_db();
        upsert_transaction(&conn, &txn("a", Some(14))).unwrap();
        upsert_transaction(&conn, &txn("b", None)).unwrap();
        let loaded = load_transactions(&conn).unwrap();
        assert_eq!(loaded.len(), 2);
        let a = loaded.iter().find(|t| t.id == "a").unwrap();
        assert_eq!(a, &txn("a", Some(14)));
        let b = loaded.iter().find(|t| t.id == "b").unwrap();
        assert_eq!(b.source, Source::Local);
        assert!(!b.synced);
    }

    #[test]
    fn test_shift_sheet_rows() {
        let (_dir, conn) = test_db();
        upsert_transaction(&conn, &txn("a", Some(3))).unwrap();
        upsert_transaction(&conn, &txn("b", Some(5))).unwrap();
        upsert_transaction(&conn, &txn("c", None)).unwrap();
        assert_eq!(shift_sheet_rows(&conn, 4).unwrap(), 1);
        let loaded = load_transactions(&conn).unwrap();
        let row_of = |id: &str| loaded.iter().find(|t| t.id == id).unwrap().sheet_row;
        assert_eq!(row_of("a"), Some(3));
        assert_eq!(row_of("b"), Some(4));
        assert_eq!(row_of("c"), None);
    }

    #[test]
    fn test_metadata() {
        let (_dir, conn) = test_db();
        assert!(get_metadata(&conn, "last_sync").is_none());
        set_metadata(&conn, "last_sync", "2025-01-01T00:00:00Z").unwrap();
        set_metadata(&conn, "last_sync", "2025-02-01T00:00:00Z").unwrap();
        assert_eq!(get_metadata(&conn, "last_sync").as_deref(), Some("2025-02-01T00:00:00Z"));
    }

    #[test]
    fn test_replace_balances_keeps_order() {
        let (_dir, conn) = test_db();
        let balances = vec![
            AccountBalance { name: "Savings".into(), balance: 10.0 },
            AccountBalance { name: "Amex".into(), balance: -5.0 },
        ];
        replace_balances(&conn, &balances).unwrap();
        assert_eq!(load_balances(&conn).unwrap(), balances);
    }
}
