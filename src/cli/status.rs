use chrono::Utc;

use crate::db::{get_connection, load_transactions};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::{load_settings, DB_FILE};
use crate::sheets::auth;
use crate::store::AppState;

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("User:         {}", or_unset(&settings.user_name));
    println!("Data dir:     {}", data_dir.display());
    println!("Database:     {}", db_path.display());
    println!("Spreadsheet:  {}", or_unset(&settings.google.spreadsheet_id));

    let signed_in = match auth::default_store()?.load() {
        Ok(Some(token)) => {
            token.is_valid_at(Utc::now().timestamp()) || token.refresh_token.is_some()
        }
        Ok(None) => false,
        Err(e) => {
            log::warn!("could not read stored token: {e}");
            false
        }
    };
    let google = if !settings.google.is_configured() {
        "not configured"
    } else if signed_in {
        "signed in"
    } else {
        "signed out"
    };
    println!("Google:       {google}");

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:      {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        let txns = load_transactions(&conn)?;
        let unsynced = txns.iter().filter(|t| !t.synced).count();
        let last_sync = AppState::last_sync(&conn);

        println!();
        println!("Transactions: {}", txns.len());
        println!("Unsynced:     {unsynced}");
        println!("Last sync:    {}", last_sync.as_deref().unwrap_or("never"));
    } else {
        println!();
        println!("Database not found. Run `sheetledger init` to set up.");
    }

    Ok(())
}
