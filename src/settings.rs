use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::amount::AmountFormat;
use crate::error::{AppError, Result};

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "SHEETLEDGER_CONFIG_DIR";

pub const DB_FILE: &str = "sheetledger.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub google: GoogleSettings,
    #[serde(default)]
    pub sheet: SheetLayout,
    #[serde(default)]
    pub amount_format: AmountFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleSettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub spreadsheet_id: String,
}

impl GoogleSettings {
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.spreadsheet_id.trim().is_empty()
    }
}

/// Where each record type lives inside the spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetLayout {
    #[serde(default = "default_transactions_sheet")]
    pub transactions_sheet: String,
    #[serde(default = "default_master_sheet")]
    pub master_sheet: String,
    /// Rows above this one are headers on the transactions sheet.
    #[serde(default = "default_first_data_row")]
    pub first_data_row: u32,
}

fn default_transactions_sheet() -> String {
    "Transactions".to_string()
}

fn default_master_sheet() -> String {
    "Master".to_string()
}

fn default_first_data_row() -> u32 {
    2
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            transactions_sheet: default_transactions_sheet(),
            master_sheet: default_master_sheet(),
            first_data_row: default_first_data_row(),
        }
    }
}

impl SheetLayout {
    pub fn transactions_range(&self) -> String {
        format!("{}!A{}:I", self.transactions_sheet, self.first_data_row)
    }

    pub fn transactions_append_range(&self) -> String {
        format!("{}!A:I", self.transactions_sheet)
    }

    pub fn accounts_range(&self) -> String {
        format!("{}!E:G", self.master_sheet)
    }

    pub fn categories_range(&self) -> String {
        format!("{}!A:C", self.master_sheet)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            user_name: String::new(),
            google: GoogleSettings::default(),
            sheet: SheetLayout::default(),
            amount_format: AmountFormat::default(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("sheetledger")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn token_path() -> PathBuf {
    config_dir().join("token.json")
}

fn default_data_dir() -> PathBuf {
    if std::env::var_os(CONFIG_DIR_ENV).is_some() {
        return config_dir().join("data");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("sheetledger")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring unreadable settings file {}: {e}", path.display());
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| AppError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings {
            data_dir: "/tmp/test".to_string(),
            user_name: "Alice".to_string(),
            ..Settings::default()
        };
        settings.google.spreadsheet_id = "abc123".to_string();
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.user_name, "Alice");
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.google.spreadsheet_id, "abc123");
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "user_name": "Bob"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.user_name, "Bob");
        assert_eq!(s.sheet.transactions_sheet, "Transactions");
        assert_eq!(s.sheet.first_data_row, 2);
        assert_eq!(s.amount_format.decimal_sep, '.');
        assert!(!s.google.is_configured());
    }

    #[test]
    fn test_default_ranges() {
        let layout = SheetLayout::default();
        assert_eq!(layout.transactions_range(), "Transactions!A2:I");
        assert_eq!(layout.accounts_range(), "Master!E:G");
        assert_eq!(layout.categories_range(), "Master!A:C");
    }

    #[test]
    fn test_google_configured_requires_client_and_sheet() {
        let mut g = GoogleSettings::default();
        g.client_id = "id.apps.googleusercontent.com".to_string();
        assert!(!g.is_configured());
        g.spreadsheet_id = "sheet".to_string();
        assert!(g.is_configured());
    }
}
