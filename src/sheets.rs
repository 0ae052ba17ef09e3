//! Google Sheets values API client.
//!
//! One GET per run against the tabular-values endpoint. A non-success status
//! is a hard fetch error carrying the response body as detail.

use crate::error::FetchError;
use crate::model::SheetRow;
use async_trait::async_trait;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// Source of sheet rows. The HTTP client implements this; tests substitute
/// static data.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// All rows in the range, header included.
    async fn fetch_rows(
        &self,
        api_key: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<SheetRow>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for SheetsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetsClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url, spreadsheet_id, range
        )
    }
}

#[async_trait]
impl RowSource for SheetsClient {
    async fn fetch_rows(
        &self,
        api_key: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<SheetRow>, FetchError> {
        let url = self.values_url(spreadsheet_id, range);
        tracing::debug!(%spreadsheet_id, %range, "fetching sheet values");

        let response = self
            .http
            .get(&url)
            .query(&[("key", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body: ValuesResponse = response.json().await?;
        Ok(body.values.into_iter().map(SheetRow::new).collect())
    }
}

/// Body of a values GET. `values` is absent entirely when the range is empty.
#[derive(Debug, serde::Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_url_follows_the_v4_shape() {
        let client = SheetsClient::new();
        assert_eq!(
            client.values_url("sheet-123", "Sheet1!A:R"),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values/Sheet1!A:R"
        );
    }

    #[test]
    fn values_body_parses_rows_of_strings() {
        let body: ValuesResponse = serde_json::from_str(
            r#"{"range": "Sheet1!A1:R3", "majorDimension": "ROWS",
                "values": [["Account", "Trigger"], ["Acme", "Welcome", "", "x"]]}"#,
        )
        .unwrap();
        assert_eq!(body.values.len(), 2);
        assert_eq!(body.values[1][0], "Acme");
    }

    #[test]
    fn missing_values_field_means_no_rows() {
        let body: ValuesResponse = serde_json::from_str(r#"{"range": "Sheet1!A:R"}"#).unwrap();
        assert!(body.values.is_empty());
    }
}
