use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Google sign-in required. Run `sheetledger auth login`.")]
    AuthRequired,

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Sheets API error ({status}): {message}")]
    Sheets { status: u16, message: String },

    #[error("Could not parse {what}: {input:?}")]
    Parse { what: &'static str, input: String },

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Invalid transaction: {0}")]
    Invalid(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn parse(what: &'static str, input: impl Into<String>) -> Self {
        AppError::Parse {
            what,
            input: input.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
