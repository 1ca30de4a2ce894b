//! Spreadsheet export: call summaries appended to a configured range.
//!
//! The spreadsheet API is an external collaborator; a failed append logs a
//! warning and the summary is simply lost, never surfaced to the caller.

use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use crate::error::ExternalError;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Append-only client for one spreadsheet range.
pub struct SheetsClient {
    spreadsheet_id: String,
    range: String,
    api_token: String,
    client: reqwest::Client,
}

impl SheetsClient {
    /// Build from `SHEETS_SPREADSHEET_ID` / `SHEETS_API_TOKEN` /
    /// `SHEETS_RANGE`. Returns `None` when id or token is unset.
    pub fn from_env() -> Option<Self> {
        let spreadsheet_id = non_empty_env("SHEETS_SPREADSHEET_ID")?;
        let api_token = non_empty_env("SHEETS_API_TOKEN")?;
        let range = non_empty_env("SHEETS_RANGE").unwrap_or_else(|| "Calls!A:E".to_string());
        Some(Self::new(spreadsheet_id, range, api_token))
    }

    pub fn new(spreadsheet_id: String, range: String, api_token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            spreadsheet_id,
            range,
            api_token,
            client,
        }
    }

    /// Appends one row: timestamp, call id, phone number, duration, summary.
    pub async fn append_call_summary(
        &self,
        call_sid: &str,
        phone_number: &str,
        duration: &str,
        summary: &str,
    ) -> Result<(), ExternalError> {
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=RAW",
            API_BASE, self.spreadsheet_id, self.range
        );
        let body = json!({
            "values": [[
                Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                call_sid,
                phone_number,
                duration,
                summary,
            ]]
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(ExternalError::from_reqwest)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ExternalError::Service(format!(
                "sheet append failed {status}: {text}"
            )));
        }
        tracing::info!("call summary for {call_sid} appended to sheet");
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
