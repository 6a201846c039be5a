//! Derived numbers for the dashboard and analytics views.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};

use crate::error::AppError;
use crate::models::{AccountBalance, Transaction, TxnType};

const MONTH_ABBR: &[&str] = &[
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn current() -> Self {
        Self::of(Local::now().date_naive())
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn short_label(&self) -> &'static str {
        MONTH_ABBR[(self.month - 1) as usize]
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.short_label(), self.year)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AppError::parse("month (YYYY-MM)", s);
        let (y, m) = s.trim().split_once('-').ok_or_else(err)?;
        let year = y.parse().map_err(|_| err())?;
        let month = m.parse().map_err(|_| err())?;
        Self::new(year, month).ok_or_else(err)
    }
}

/// Effect of a transaction on an account: income adds, expense subtracts,
/// transfers are neutral. The sign of the stored amount is ignored.
pub fn signed_effect(txn: &Transaction) -> f64 {
    match txn.kind {
        TxnType::Income => txn.amount.abs(),
        TxnType::Expense => -txn.amount.abs(),
        TxnType::Transfer => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthTotals {
    pub month: YearMonth,
    pub income: f64,
    /// Positive magnitude.
    pub expense: f64,
}

impl MonthTotals {
    pub fn net(&self) -> f64 {
        self.income - self.expense
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryShare {
    pub name: String,
    pub total: f64,
    pub count: usize,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardMetrics {
    pub month: YearMonth,
    pub income: f64,
    pub expense: f64,
    pub net: f64,
    pub savings_rate: f64,
    pub top_categories: Vec<CategoryShare>,
    pub txn_count: usize,
    pub unsynced_count: usize,
}

pub const TOP_CATEGORY_COUNT: usize = 5;

pub fn month_totals(txns: &[Transaction], month: YearMonth) -> MonthTotals {
    let mut totals = MonthTotals {
        month,
        income: 0.0,
        expense: 0.0,
    };
    for t in txns.iter().filter(|t| month.contains(t.date)) {
        match t.kind {
            TxnType::Income => totals.income += t.amount.abs(),
            TxnType::Expense => totals.expense += t.amount.abs(),
            TxnType::Transfer => {}
        }
    }
    totals
}

pub fn savings_rate(income: f64, expense: f64) -> f64 {
    if income <= 0.0 {
        0.0
    } else {
        (income - expense) / income * 100.0
    }
}

/// Totals per main category for one month and type, largest first.
pub fn category_breakdown(
    txns: &[Transaction],
    month: YearMonth,
    kind: TxnType,
) -> Vec<CategoryShare> {
    let mut groups: HashMap<&str, (f64, usize)> = HashMap::new();
    for t in txns
        .iter()
        .filter(|t| t.kind == kind && month.contains(t.date))
    {
        let name = match t.main_category() {
            "" => "Uncategorized",
            main => main,
        };
        let entry = groups.entry(name).or_insert((0.0, 0));
        entry.0 += t.amount.abs();
        entry.1 += 1;
    }

    let total: f64 = groups.values().map(|(sum, _)| sum).sum();
    let mut shares: Vec<CategoryShare> = groups
        .into_iter()
        .map(|(name, (sum, count))| CategoryShare {
            name: name.to_string(),
            total: sum,
            count,
            pct: if total > 0.0 { sum / total * 100.0 } else { 0.0 },
        })
        .collect();
    shares.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    shares
}

pub fn compute_dashboard(txns: &[Transaction], month: YearMonth) -> DashboardMetrics {
    let totals = month_totals(txns, month);
    let mut top_categories = category_breakdown(txns, month, TxnType::Expense);
    top_categories.truncate(TOP_CATEGORY_COUNT);
    DashboardMetrics {
        month,
        income: totals.income,
        expense: totals.expense,
        net: totals.net(),
        savings_rate: savings_rate(totals.income, totals.expense),
        top_categories,
        txn_count: txns.iter().filter(|t| month.contains(t.date)).count(),
        unsynced_count: txns.iter().filter(|t| !t.synced).count(),
    }
}

/// Income/expense for the `count` months ending with `last`, oldest first.
pub fn monthly_series(txns: &[Transaction], last: YearMonth, count: usize) -> Vec<MonthTotals> {
    let mut months = Vec::with_capacity(count);
    let mut m = last;
    for _ in 0..count {
        months.push(m);
        m = m.prev();
    }
    months.reverse();
    months.into_iter().map(|m| month_totals(txns, m)).collect()
}

/// Last known balances adjusted by records the sheet has never seen. A
/// pending edit to a row already in the sheet is counted in its balance.
pub fn projected_balances(
    balances: &[AccountBalance],
    txns: &[Transaction],
) -> Vec<AccountBalance> {
    let mut out: Vec<AccountBalance> = balances.to_vec();
    for t in txns.iter().filter(|t| !t.synced && t.sheet_row.is_none()) {
        let effect = signed_effect(t);
        match out.iter_mut().find(|b| b.name == t.account) {
            Some(b) => b.balance += effect,
            None => out.push(AccountBalance {
                name: t.account.clone(),
                balance: effect,
            }),
        }
    }
    out
}

pub fn total_balance(balances: &[AccountBalance]) -> f64 {
    balances.iter().map(|b| b.balance).sum()
}
