use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::error::Result;
use crate::fmt::money;
use crate::metrics::total_balance;
use crate::models::AccountBalance;

use super::open_state;

/// Print balances as last read from the sheet, plus any unsynced effect.
pub fn balances() -> Result<()> {
    let (_conn, state, _settings) = open_state()?;
    let projected = state.projected_balances();
    println!("{}", format_balances(&state.balances, &projected));
    if state.unsynced_count() > 0 {
        println!(
            "\n{} unsynced transaction(s) included in \"Projected\". Run `sheetledger sync` to push them.",
            state.unsynced_count()
        );
    }
    Ok(())
}

fn colored_money(val: f64) -> String {
    if val >= 0.0 {
        money(val).green().to_string()
    } else {
        money(val).red().to_string()
    }
}

pub fn format_balances(sheet: &[AccountBalance], projected: &[AccountBalance]) -> String {
    if projected.is_empty() {
        return "No accounts found. Run `sheetledger sync` to read them from the sheet.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["Account", "Balance", "Projected"]);
    for p in projected {
        let known = sheet.iter().find(|b| b.name == p.name).map(|b| b.balance);
        table.add_row(vec![
            Cell::new(&p.name),
            Cell::new(known.map(money).unwrap_or_default()).set_alignment(CellAlignment::Right),
            Cell::new(colored_money(p.balance)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(total_balance(sheet))).set_alignment(CellAlignment::Right),
        Cell::new(money(total_balance(projected))).set_alignment(CellAlignment::Right),
    ]);
    format!("Account Balances\n{table}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_balances() {
        colored::control::set_override(false);
        let sheet = vec![AccountBalance { name: "Checking".into(), balance: 1200.0 }];
        let projected = vec![
            AccountBalance { name: "Checking".into(), balance: 1150.0 },
            AccountBalance { name: "Cash".into(), balance: -20.0 },
        ];
        let out = format_balances(&sheet, &projected);
        assert!(out.contains("$1,200.00"));
        assert!(out.contains("$1,150.00"));
        assert!(out.contains("-$20.00"));
        assert!(out.contains("$1,130.00"));
        assert!(format_balances(&[], &[]).contains("No accounts"));
    }
}
