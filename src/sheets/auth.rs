//! OAuth2 for installed apps: loopback redirect with PKCE, plus token storage
//! keyed on a plain expiry timestamp.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Local, Utc};
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{AppError, Result};
use crate::settings::GoogleSettings;

const OAUTH_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Seconds of remaining lifetime below which a token counts as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;
const LOGIN_TIMEOUT_MINUTES: i64 = 10;

#[derive(Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds).
    pub expires_at: i64,
}

impl StoredToken {
    pub fn is_valid_at(&self, now: i64) -> bool {
        !self.access_token.is_empty() && self.expires_at > now + EXPIRY_MARGIN_SECS
    }

    pub fn expires_at_local(&self) -> Option<DateTime<Local>> {
        DateTime::<Utc>::from_timestamp(self.expires_at, 0).map(|t| t.with_timezone(&Local))
    }
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Drop for StoredToken {
    fn drop(&mut self) {
        self.access_token.zeroize();
        if let Some(refresh) = self.refresh_token.as_mut() {
            refresh.zeroize();
        }
    }
}

/// Persistence for the OAuth token.
pub trait TokenStore {
    fn load(&self) -> Result<Option<StoredToken>>;
    fn save(&self, token: &StoredToken) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Token kept as JSON next to the settings file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut content = std::fs::read_to_string(&self.path)?;
        let token = serde_json::from_str(&content);
        content.zeroize();
        Ok(Some(token?))
    }

    fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(token)?;
        std::fs::write(&self.path, &json)?;
        json.zeroize();
        restrict_permissions(&self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

/// Token kept in the OS credential store.
#[cfg(feature = "keyring")]
pub struct KeyringTokenStore {
    entry: keyring::Entry,
}

#[cfg(feature = "keyring")]
impl KeyringTokenStore {
    pub fn new(account: &str) -> Result<Self> {
        let entry = keyring::Entry::new("sheetledger", account)
            .map_err(|e| AppError::Auth(e.to_string()))?;
        Ok(Self { entry })
    }
}

#[cfg(feature = "keyring")]
impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<StoredToken>> {
        match self.entry.get_password() {
            Ok(mut json) => {
                let token = serde_json::from_str(&json);
                json.zeroize();
                Ok(Some(token?))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::Auth(e.to_string())),
        }
    }

    fn save(&self, token: &StoredToken) -> Result<()> {
        let mut json = serde_json::to_string(token)?;
        let result = self.entry.set_password(&json);
        json.zeroize();
        result.map_err(|e| AppError::Auth(e.to_string()))
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::Auth(e.to_string())),
        }
    }
}

/// The store selected by build features.
pub fn default_store() -> Result<Box<dyn TokenStore>> {
    #[cfg(feature = "keyring")]
    {
        return Ok(Box::new(KeyringTokenStore::new("google-oauth")?));
    }
    #[cfg(not(feature = "keyring"))]
    {
        Ok(Box::new(FileTokenStore::new(crate::settings::token_path())))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Return a usable access token, refreshing once if the stored one expired.
///
/// The refresh token from the original sign-in is kept as-is.
pub fn ensure_access_token(
    google: &GoogleSettings,
    store: &dyn TokenStore,
    client: &Client,
) -> Result<String> {
    let stored = store.load()?.ok_or(AppError::AuthRequired)?;
    if stored.is_valid_at(Utc::now().timestamp()) {
        return Ok(stored.access_token.clone());
    }
    let refresh_token = match stored.refresh_token.as_deref() {
        Some(r) if !r.is_empty() => r,
        _ => return Err(AppError::AuthRequired),
    };
    log::info!("access token expired, refreshing");
    match refresh_access_token(google, client, refresh_token) {
        Ok(updated) => {
            store.save(&updated)?;
            Ok(updated.access_token.clone())
        }
        Err(e) => {
            log::warn!("token refresh failed: {e}");
            Err(AppError::AuthRequired)
        }
    }
}

fn refresh_access_token(
    google: &GoogleSettings,
    client: &Client,
    refresh_token: &str,
) -> Result<StoredToken> {
    let resp = client
        .post(OAUTH_TOKEN_URL)
        .form(&[
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()?;
    let token = read_token_response(resp)?;
    Ok(refreshed_token(&token, refresh_token, Utc::now().timestamp()))
}

/// Build the stored token after a refresh. The refresh token from the
/// original sign-in is kept even when the response carries a new one.
fn refreshed_token(token: &TokenResponse, refresh_token: &str, now: i64) -> StoredToken {
    if token.refresh_token.is_some() {
        log::debug!("ignoring rotated refresh token");
    }
    StoredToken {
        access_token: token.access_token.clone(),
        refresh_token: Some(refresh_token.to_string()),
        expires_at: now + token.expires_in,
    }
}

fn read_token_response(resp: reqwest::blocking::Response) -> Result<TokenResponse> {
    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        return Err(AppError::Auth(token_error_message(status.as_u16(), &body)));
    }
    Ok(serde_json::from_str(&body)?)
}

fn token_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(desc) => format!("{} ({desc})", err.error),
            None => err.error,
        },
        Err(_) => format!("token endpoint returned HTTP {status}"),
    }
}

fn expiry_from_now(expires_in: i64) -> i64 {
    (Utc::now() + Duration::seconds(expires_in)).timestamp()
}

/// An in-progress browser sign-in.
pub struct LoginSession {
    pub auth_url: String,
    pub expires_at: DateTime<Local>,
    listener: TcpListener,
    state: String,
    verifier: String,
    redirect_uri: String,
}

impl Drop for LoginSession {
    fn drop(&mut self) {
        self.verifier.zeroize();
    }
}

pub fn start_login(google: &GoogleSettings) -> Result<LoginSession> {
    if google.client_id.trim().is_empty() {
        return Err(AppError::Settings(
            "Google client_id is not set. Run `sheetledger init` first.".into(),
        ));
    }
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let redirect_uri = format!("http://{}", listener.local_addr()?);
    let state = random_state();
    let verifier = pkce_verifier();
    let auth_url = authorization_url(
        &google.client_id,
        &redirect_uri,
        &state,
        &pkce_challenge(&verifier),
    )?;
    Ok(LoginSession {
        auth_url,
        expires_at: Local::now() + Duration::minutes(LOGIN_TIMEOUT_MINUTES),
        listener,
        state,
        verifier,
        redirect_uri,
    })
}

fn authorization_url(
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    challenge: &str,
) -> Result<String> {
    let url = Url::parse_with_params(
        OAUTH_AUTH_URL,
        [
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", SHEETS_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|e| AppError::Auth(e.to_string()))?;
    Ok(url.to_string())
}

/// Block until the browser redirects back (or the session expires), then
/// exchange the code and store the token.
pub fn complete_login(
    session: LoginSession,
    google: &GoogleSettings,
    store: &dyn TokenStore,
    client: &Client,
) -> Result<()> {
    session.listener.set_nonblocking(true)?;
    loop {
        if Local::now() >= session.expires_at {
            return Err(AppError::Auth("sign-in timed out, please retry".into()));
        }
        match session.listener.accept() {
            Ok((mut stream, _)) => {
                let outcome = handle_redirect(&session, &mut stream, google, store, client);
                let page = match &outcome {
                    Ok(()) => "Signed in. You can close this tab and return to the terminal.",
                    Err(_) => "Sign-in failed. Check the terminal for details.",
                };
                respond(&mut stream, page);
                // Browsers sometimes probe /favicon.ico first; keep waiting.
                match outcome {
                    Err(AppError::Auth(msg)) if msg == "no code in request" => continue,
                    other => return other,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(StdDuration::from_millis(200));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn handle_redirect(
    session: &LoginSession,
    stream: &mut TcpStream,
    google: &GoogleSettings,
    store: &dyn TokenStore,
    client: &Client,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(StdDuration::from_secs(2)))?;
    let mut buf = [0u8; 8192];
    let n = stream.read(&mut buf)?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let params = parse_redirect(&request)?;

    if let Some(error) = params.error {
        return Err(AppError::Auth(format!("Google returned {error}")));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::Auth("no code in request".into()))?;
    if params.state.as_deref() != Some(session.state.as_str()) {
        return Err(AppError::Auth("state mismatch in redirect".into()));
    }

    let resp = client
        .post(OAUTH_TOKEN_URL)
        .form(&[
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
            ("code", code.as_str()),
            ("code_verifier", session.verifier.as_str()),
            ("redirect_uri", session.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()?;
    let token = read_token_response(resp)?;
    store.save(&StoredToken {
        access_token: token.access_token.clone(),
        refresh_token: token.refresh_token.clone(),
        expires_at: expiry_from_now(token.expires_in),
    })?;
    log::info!("stored new Google token");
    Ok(())
}

fn respond(stream: &mut TcpStream, message: &str) {
    let body = format!("<html><body><p>{message}</p></body></html>");
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

#[derive(Debug, Default, PartialEq)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn parse_redirect(request: &str) -> Result<RedirectParams> {
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| AppError::Auth("malformed redirect request".into()))?;
    let url = Url::parse(&format!("http://localhost{path}"))
        .map_err(|e| AppError::Auth(e.to_string()))?;
    let mut params = RedirectParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(params)
}

fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn pkce_verifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
