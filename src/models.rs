use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnType {
    Income,
    Expense,
    Transfer,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Income => "Income",
            TxnType::Expense => "Expense",
            TxnType::Transfer => "Transfer",
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxnType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" | "pemasukan" => Ok(TxnType::Income),
            "expense" | "pengeluaran" => Ok(TxnType::Expense),
            "transfer" => Ok(TxnType::Transfer),
            _ => Err(AppError::parse("transaction type", s)),
        }
    }
}

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Local,
    Sheets,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Local => "local",
            Source::Sheets => "sheets",
        }
    }
}

impl FromStr for Source {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Source::Local),
            "sheets" => Ok(Source::Sheets),
            _ => Err(AppError::parse("source", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    /// Compound "main > sub" category string.
    pub category: String,
    pub description: String,
    pub account: String,
    pub tag: Option<String>,
    pub kind: TxnType,
    pub synced: bool,
    pub source: Source,
    /// 1-based spreadsheet row backing this record.
    pub sheet_row: Option<u32>,
    pub created_at: Option<String>,
}

impl Transaction {
    pub fn main_category(&self) -> &str {
        crate::category::split_category(&self.category).0
    }
}

/// User-supplied transaction fields, before an id, type and sync state exist.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub date: NaiveDate,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub account: String,
    pub tag: Option<String>,
    /// Explicit type; inferred from the category when `None`.
    pub kind: Option<TxnType>,
}

impl TransactionDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.description.trim().is_empty() {
            return Err(AppError::Invalid("description is required".into()));
        }
        if self.category.trim().is_empty() {
            return Err(AppError::Invalid("category is required".into()));
        }
        if self.account.trim().is_empty() {
            return Err(AppError::Invalid("account is required".into()));
        }
        if !self.amount.is_finite() {
            return Err(AppError::Invalid("amount must be a number".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountBalance {
    pub name: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub main: String,
    pub sub: Option<String>,
    pub display: String,
}

/// Reference lists used to populate form pickers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterData {
    pub accounts: Vec<String>,
    pub categories: Vec<Category>,
}
