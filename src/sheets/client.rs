use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw range operations against one spreadsheet.
pub trait SheetsApi {
    /// Read a range as rows of display strings. Trailing empty cells and rows
    /// are omitted by the API, so rows can be ragged.
    fn get_range(&mut self, range: &str) -> Result<Vec<Vec<String>>>;

    /// Append rows after the last row of the table found in `range`.
    fn append_rows(&mut self, range: &str, rows: &[Vec<String>]) -> Result<AppendResult>;

    /// Overwrite `range` with `rows`.
    fn update_range(&mut self, range: &str, rows: &[Vec<String>]) -> Result<()>;

    /// Remove one 1-based row; rows below it move up.
    fn delete_row(&mut self, sheet: &str, row: u32) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResult {
    pub updated_range: String,
    pub first_row: Option<u32>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_range: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

/// [`SheetsApi`] over the Sheets v4 REST API.
pub struct HttpSheets {
    client: Client,
    access_token: String,
    spreadsheet_id: String,
    sheet_ids: HashMap<String, i64>,
}

impl HttpSheets {
    pub fn new(access_token: String, spreadsheet_id: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            access_token,
            spreadsheet_id,
            sheet_ids: HashMap::new(),
        })
    }

    /// `.../spreadsheets/{id}/values/{range}{suffix}` with the range escaped.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = self.base_url()?;
        url.path_segments_mut()
            .map_err(|_| AppError::Other("invalid Sheets API url".into()))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    fn spreadsheet_url(&self, suffix: &str) -> Result<Url> {
        let mut url = self.base_url()?;
        url.path_segments_mut()
            .map_err(|_| AppError::Other("invalid Sheets API url".into()))?
            .push(&format!("{}{suffix}", self.spreadsheet_id));
        Ok(url)
    }

    fn base_url(&self) -> Result<Url> {
        Url::parse(SHEETS_API).map_err(|e| AppError::Other(e.to_string()))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let resp = request.bearer_auth(&self.access_token).send()?;
        check_status(resp)
    }

    fn sheet_id(&mut self, title: &str) -> Result<i64> {
        if let Some(id) = self.sheet_ids.get(title) {
            return Ok(*id);
        }
        let mut url = self.spreadsheet_url("")?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let meta: SpreadsheetMeta = self.send(self.client.get(url))?.json()?;
        for sheet in meta.sheets {
            self.sheet_ids
                .insert(sheet.properties.title, sheet.properties.sheet_id);
        }
        self.sheet_ids
            .get(title)
            .copied()
            .ok_or_else(|| AppError::Other(format!("No sheet named {title:?} in spreadsheet")))
    }
}

impl SheetsApi for HttpSheets {
    fn get_range(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        log::debug!("GET {range}");
        let body: ValueRange = self.send(self.client.get(url))?.json()?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(value_to_string).collect())
            .collect())
    }

    fn append_rows(&mut self, range: &str, rows: &[Vec<String>]) -> Result<AppendResult> {
        let mut url = self.values_url(range, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = ValueRangeBody {
            range,
            major_dimension: "ROWS",
            values: rows,
        };
        log::debug!("APPEND {} row(s) to {range}", rows.len());
        let resp: AppendResponse = self.send(self.client.post(url).json(&body))?.json()?;
        let updated_range = resp.updates.updated_range;
        Ok(AppendResult {
            first_row: super::parse_first_row(&updated_range),
            updated_range,
        })
    }

    fn update_range(&mut self, range: &str, rows: &[Vec<String>]) -> Result<()> {
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        let body = ValueRangeBody {
            range,
            major_dimension: "ROWS",
            values: rows,
        };
        log::debug!("PUT {range}");
        self.send(self.client.put(url).json(&body))?;
        Ok(())
    }

    fn delete_row(&mut self, sheet: &str, row: u32) -> Result<()> {
        if row == 0 {
            return Err(AppError::Other("sheet rows are 1-based".into()));
        }
        let sheet_id = self.sheet_id(sheet)?;
        let url = self.spreadsheet_url(":batchUpdate")?;
        let body = serde_json::json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": row - 1,
                        "endIndex": row,
                    }
                }
            }]
        });
        log::debug!("DELETE {sheet} row {row}");
        self.send(self.client.post(url).json(&body))?;
        Ok(())
    }
}

pub(crate) fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("sheetledger/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(AppError::AuthRequired);
    }
    let text = resp.text().unwrap_or_default();
    Err(AppError::Sheets {
        status: status.as_u16(),
        message: google_error_message(&text),
    })
}

fn google_error_message(body: &str) -> String {
    match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ if body.trim().is_empty() => "empty response".to_string(),
        _ => body.trim().chars().take(200).collect(),
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheets() -> HttpSheets {
        HttpSheets::new("token".into(), "sheet123".into()).unwrap()
    }

    #[test]
    fn test_values_url_escapes_range() {
        let url = sheets().values_url("'My Sheet'!A1:I", "").unwrap();
        assert!(url.as_str().starts_with(
            "https://sheets.googleapis.com/v4/spreadsheets/sheet123/values/"
        ));
        assert!(url.as_str().contains("My%20Sheet"));
    }

    #[test]
    fn test_append_url_suffix() {
        let url = sheets().values_url("Transactions!A:I", ":append").unwrap();
        assert!(url.path().ends_with("Transactions!A:I:append"));
    }

    #[test]
    fn test_batch_update_url() {
        let url = sheets().spreadsheet_url(":batchUpdate").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet123:batchUpdate"
        );
    }

    #[test]
    fn test_google_error_message() {
        let body = r#"{"error":{"code":400,"message":"Unable to parse range","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(google_error_message(body), "Unable to parse range");
        assert_eq!(google_error_message(""), "empty response");
        assert_eq!(google_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_value_range_parses_mixed_cells() {
        let body: ValueRange =
            serde_json::from_str(r#"{"range":"A1:B2","values":[["a",1.5],[null,true]]}"#).unwrap();
        let rows: Vec<Vec<String>> = body
            .values
            .into_iter()
            .map(|r| r.into_iter().map(value_to_string).collect())
            .collect();
        assert_eq!(rows, vec![vec!["a", "1.5"], vec!["", "true"]]);
    }

    #[test]
    fn test_empty_value_range() {
        let body: ValueRange = serde_json::from_str(r#"{"range":"A1:B2"}"#).unwrap();
        assert!(body.values.is_empty());
    }
}
