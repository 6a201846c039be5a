use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::error::Result;
use crate::fmt::{money, percent};
use crate::metrics::{monthly_series, DashboardMetrics, MonthTotals, YearMonth};

use super::open_state;

pub fn run(month: Option<String>) -> Result<()> {
    let month = match month {
        Some(m) => m.parse()?,
        None => YearMonth::current(),
    };
    let (_conn, mut state, _settings) = open_state()?;
    let series = monthly_series(&state.transactions, month, 6);
    let metrics = state.metrics(month).clone();
    println!("{}", format_summary(&metrics));
    println!();
    println!("{}", format_series(&series));
    Ok(())
}

fn signed(val: f64) -> String {
    if val >= 0.0 {
        money(val).green().to_string()
    } else {
        money(val).red().to_string()
    }
}

pub fn format_summary(m: &DashboardMetrics) -> String {
    let mut totals = Table::new();
    totals.set_header(vec!["", m.month.label().as_str()]);
    totals.add_row(vec![
        Cell::new("Income"),
        Cell::new(money(m.income).green()).set_alignment(CellAlignment::Right),
    ]);
    totals.add_row(vec![
        Cell::new("Expenses"),
        Cell::new(money(m.expense).red()).set_alignment(CellAlignment::Right),
    ]);
    totals.add_row(vec![
        Cell::new("Net".bold()),
        Cell::new(signed(m.net)).set_alignment(CellAlignment::Right),
    ]);
    totals.add_row(vec![
        Cell::new("Savings rate"),
        Cell::new(percent(m.savings_rate)).set_alignment(CellAlignment::Right),
    ]);
    totals.add_row(vec![
        Cell::new("Transactions"),
        Cell::new(m.txn_count).set_alignment(CellAlignment::Right),
    ]);

    let mut out = format!("Summary for {}\n{totals}", m.month.label());
    if !m.top_categories.is_empty() {
        let mut top = Table::new();
        top.set_header(vec!["Top spending", "Total", "Share", "#"]);
        for c in &m.top_categories {
            top.add_row(vec![
                Cell::new(&c.name),
                Cell::new(money(c.total)).set_alignment(CellAlignment::Right),
                Cell::new(percent(c.pct)).set_alignment(CellAlignment::Right),
                Cell::new(c.count).set_alignment(CellAlignment::Right),
            ]);
        }
        out.push_str(&format!("\n{top}"));
    }
    if m.unsynced_count > 0 {
        out.push_str(&format!("\n{} transaction(s) not yet synced.", m.unsynced_count));
    }
    out
}

pub fn format_series(series: &[MonthTotals]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Month", "Income", "Expenses", "Net"]);
    for m in series {
        table.add_row(vec![
            Cell::new(m.month.to_string()),
            Cell::new(money(m.income)).set_alignment(CellAlignment::Right),
            Cell::new(money(m.expense)).set_alignment(CellAlignment::Right),
            Cell::new(signed(m.net())).set_alignment(CellAlignment::Right),
        ]);
    }
    format!("Monthly trend\n{table}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CategoryShare;

    #[test]
    fn test_format_summary() {
        colored::control::set_override(false);
        let m = DashboardMetrics {
            month: "2025-03".parse().unwrap(),
            income: 4000.0,
            expense: 1000.0,
            net: 3000.0,
            savings_rate: 75.0,
            top_categories: vec![CategoryShare {
                name: "Housing".into(),
                total: 1000.0,
                count: 1,
                pct: 100.0,
            }],
            txn_count: 2,
            unsynced_count: 1,
        };
        let out = format_summary(&m);
        assert!(out.starts_with("Summary for Mar 2025"));
        assert!(out.contains("$4,000.00"));
        assert!(out.contains("75.0%"));
        assert!(out.contains("Housing"));
        assert!(out.contains("1 transaction(s) not yet synced"));
    }
}
