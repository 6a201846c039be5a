pub mod accounts;
pub mod analytics;
pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod export;
pub mod init;
pub mod status;
pub mod summary;
pub mod sync;
pub mod transactions;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, Settings};
use crate::sheets::{self, HttpSheets, SheetsApi};
use crate::store::AppState;

/// Open the local cache and load it into a fresh [`AppState`].
pub(crate) fn open_state() -> Result<(Connection, AppState, Settings)> {
    let settings = load_settings();
    let data_dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    let conn = get_connection(&data_dir.join(crate::settings::DB_FILE))?;
    init_db(&conn)?;
    let mut state = AppState::new(settings.sheet.clone(), settings.amount_format.clone());
    state.load(&conn)?;
    Ok((conn, state, settings))
}

/// Connect when configured and signed in. Any failure means working offline.
pub(crate) fn try_connect(settings: &Settings) -> Option<HttpSheets> {
    if !settings.google.is_configured() {
        return None;
    }
    match sheets::connect(&settings.google) {
        Ok(api) => Some(api),
        Err(e) => {
            log::info!("working offline: {e}");
            None
        }
    }
}

pub(crate) fn as_api(api: &mut Option<HttpSheets>) -> Option<&mut dyn SheetsApi> {
    api.as_mut().map(|a| a as &mut dyn SheetsApi)
}

#[derive(Parser)]
#[command(
    name = "sheetledger",
    version,
    about = "Personal finance tracker backed by a Google Sheets spreadsheet."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up sheetledger: data directory, Google client and spreadsheet.
    Init {
        /// Path for local data (default: ~/Documents/sheetledger)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Spreadsheet id (the long token in the sheet URL)
        #[arg(long = "spreadsheet-id")]
        spreadsheet_id: Option<String>,
        /// OAuth client id of a Google "Desktop app" client
        #[arg(long = "client-id")]
        client_id: Option<String>,
    },
    /// Sign in to Google, sign out, or show sign-in state.
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Record a transaction.
    Add {
        /// Amount, e.g. 12.50, -12.50 or "Rp 15.000"
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        /// Category as "Main > Sub"
        #[arg(long)]
        category: String,
        #[arg(long)]
        description: String,
        /// Account name (default: first account)
        #[arg(long)]
        account: Option<String>,
        /// Date (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// income, expense or transfer (default: inferred from category)
        #[arg(long = "type")]
        kind: Option<String>,
    },
    /// List transactions, newest first.
    List {
        /// Month: YYYY-MM
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        account: Option<String>,
        /// Main category
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Text to look for in description, category, account or tag
        #[arg(long)]
        search: Option<String>,
        /// Show at most this many rows
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Change fields of a transaction.
    Edit {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        date: Option<String>,
        /// New tag; pass an empty string to clear
        #[arg(long)]
        tag: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
    },
    /// Delete a transaction (and its sheet row).
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Show account balances.
    Balances,
    /// Show the category list.
    Categories,
    /// Push unsynced transactions, then refresh from the sheet.
    Sync,
    /// Print a month's income, expenses and top categories.
    Summary {
        /// Month: YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
    },
    /// Interactive month-by-month analytics.
    Analytics {
        /// Month: YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
    },
    /// Export transactions to CSV.
    Export {
        /// Output path (default: <data_dir>/exports/transactions-YYYY-MM-DD.csv)
        #[arg(long)]
        output: Option<String>,
        /// Only this month: YYYY-MM
        #[arg(long)]
        month: Option<String>,
    },
    /// Show configuration, sign-in and cache statistics.
    Status,
    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in through the browser.
    Login,
    /// Forget the stored token.
    Logout,
    /// Show whether a usable token is stored.
    Status,
}
