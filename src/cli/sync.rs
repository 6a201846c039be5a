use colored::Colorize;
use rusqlite::Connection;

use crate::error::Result;
use crate::sheets::{self, SheetsApi};
use crate::store::AppState;

use super::open_state;

/// Push pending local records, then pull the sheet. Returns a one-line summary.
pub fn sync_state(conn: &Connection, state: &mut AppState, api: &mut dyn SheetsApi) -> Result<String> {
    let pushed = state.push_pending(conn, api)?;
    let refreshed = state.refresh_from_sheets(conn, api)?;
    let mut msg = format!(
        "Synced: {} pushed, {} rows read, {} accounts, {} categories",
        pushed.pushed, refreshed.remote, refreshed.accounts, refreshed.categories
    );
    if !pushed.failed.is_empty() {
        msg.push_str(&format!(", {} failed", pushed.failed.len()));
    }
    Ok(msg)
}

pub fn run() -> Result<()> {
    let (conn, mut state, settings) = open_state()?;
    let mut api = sheets::connect(&settings.google)?;
    let pending = state.unsynced_count();
    if pending > 0 {
        println!("Pushing {pending} unsynced transaction(s)...");
    }
    let summary = sync_state(&conn, &mut state, &mut api)?;
    println!("{summary}");

    let still_pending: Vec<&str> = state
        .transactions
        .iter()
        .filter(|t| !t.synced)
        .map(|t| t.id.as_str())
        .collect();
    if !still_pending.is_empty() {
        eprintln!(
            "{} still unsynced: {}",
            "Warning:".yellow().bold(),
            still_pending.join(", ")
        );
    }
    Ok(())
}
