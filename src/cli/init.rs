use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path, DB_FILE};

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Accept either a bare spreadsheet id or a full sheet URL.
pub fn spreadsheet_id_from(input: &str) -> String {
    let input = input.trim();
    match input.split_once("/spreadsheets/d/") {
        Some((_, rest)) => rest.split(['/', '?', '#']).next().unwrap_or("").to_string(),
        None => input.to_string(),
    }
}

pub fn run(
    data_dir: Option<String>,
    spreadsheet_id: Option<String>,
    client_id: Option<String>,
) -> Result<()> {
    let mut settings = load_settings();
    let interactive = std::io::stdin().is_terminal();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if interactive {
        let chosen = prompt(&format!("Data directory [{}]: ", settings.data_dir))?;
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(&chosen);
        }
    }

    if interactive && settings.user_name.is_empty() {
        settings.user_name = prompt("Your name (optional): ")?;
    }

    if let Some(id) = spreadsheet_id {
        settings.google.spreadsheet_id = spreadsheet_id_from(&id);
    } else if interactive && settings.google.spreadsheet_id.is_empty() {
        let input = prompt("Spreadsheet id or URL (blank to skip): ")?;
        settings.google.spreadsheet_id = spreadsheet_id_from(&input);
    }

    if let Some(id) = client_id {
        settings.google.client_id = id.trim().to_string();
    } else if interactive && settings.google.client_id.is_empty() {
        settings.google.client_id = prompt("Google OAuth client id (blank to skip): ")?;
    }

    if interactive && !settings.google.client_id.is_empty() && settings.google.client_secret.is_empty() {
        let secret = rpassword::prompt_password("Google OAuth client secret (blank if none): ")?;
        settings.google.client_secret = secret.trim().to_string();
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(resolved.join("exports"))?;

    let conn = get_connection(&resolved.join(DB_FILE))?;
    init_db(&conn)?;

    println!("Initialized sheetledger at {}", resolved.display());
    if settings.google.is_configured() {
        println!("Next: run `sheetledger auth login` to connect your spreadsheet.");
    } else {
        println!("Google Sheets is not configured yet; transactions will be kept locally.");
    }
    Ok(())
}
