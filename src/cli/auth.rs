use chrono::Utc;
use colored::Colorize;

use crate::error::Result;
use crate::settings::load_settings;
use crate::sheets::{auth, client};

pub fn login() -> Result<()> {
    let settings = load_settings();
    let session = auth::start_login(&settings.google)?;
    println!("Open this URL in your browser to grant access to your spreadsheet:\n");
    println!("  {}\n", session.auth_url);
    println!(
        "Waiting for the redirect (until {})...",
        session.expires_at.format("%H:%M")
    );
    let store = auth::default_store()?;
    let http = client::http_client()?;
    auth::complete_login(session, &settings.google, store.as_ref(), &http)?;
    println!("{}", "Signed in to Google Sheets.".green());
    Ok(())
}

pub fn logout() -> Result<()> {
    auth::default_store()?.clear()?;
    println!("Signed out. Stored token removed.");
    Ok(())
}

pub fn status() -> Result<()> {
    let settings = load_settings();
    let store = auth::default_store()?;
    println!("{}", describe(store.load()?.as_ref(), Utc::now().timestamp()));
    if !settings.google.is_configured() {
        println!("Spreadsheet or client id not configured. Run `sheetledger init`.");
    }
    Ok(())
}

fn describe(token: Option<&auth::StoredToken>, now: i64) -> String {
    let Some(token) = token else {
        return "Not signed in.".to_string();
    };
    let expiry = token
        .expires_at_local()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".into());
    if token.is_valid_at(now) {
        format!("Signed in. Access token valid until {expiry}.")
    } else if token.refresh_token.is_some() {
        format!("Signed in. Access token expired at {expiry}; it will be refreshed on next use.")
    } else {
        "Session expired. Run `sheetledger auth login`.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::StoredToken;

    #[test]
    fn test_describe_token_states() {
        assert_eq!(describe(None, 0), "Not signed in.");
        let valid = StoredToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: 10_000,
        };
        assert!(describe(Some(&valid), 0).starts_with("Signed in. Access token valid"));
        let refreshable = StoredToken {
            access_token: "a".into(),
            refresh_token: Some("r".into()),
            expires_at: 10_000,
        };
        assert!(describe(Some(&refreshable), 20_000).contains("refreshed on next use"));
        assert!(describe(Some(&valid), 20_000).starts_with("Session expired"));
    }
}
