//! Backend API client.
//!
//! Every mirrored table is exposed as `/rest/v1/{table}`. Requests carry the
//! project API key both as `apikey` and as a bearer token.

use std::time::Duration;

use adjunct_core::sync::{key_to_string, MirroredTable, Record, RemoteBackendTrait};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{BackendError, Result};

/// Default timeout for API requests.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: Option<String>,
    message: String,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(BackendError::invalid_request("Backend URL is empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            headers: Self::headers(&config.api_key)?,
        })
    }

    fn headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key_value = HeaderValue::from_str(api_key)
            .map_err(|_| BackendError::InvalidApiKey)?;
        headers.insert("apikey", key_value);

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| BackendError::InvalidApiKey)?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, urlencoding::encode(table))
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[Backend] response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[Backend] response error ({}): {}", status, preview);
    }

    /// Reads the body and maps non-success statuses to [`BackendError::Rejected`].
    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(error) => BackendError::rejected(status.as_u16(), error.code, error.message),
                Err(_) => BackendError::rejected(status.as_u16(), None, body),
            });
        }
        Ok(body)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let body = Self::read_body(response).await?;
        serde_json::from_str(&body).map_err(|e| {
            error!("[Backend] Failed to deserialize response: {}", e);
            BackendError::from(e)
        })
    }

    /// Every row of a table.
    ///
    /// GET /rest/v1/{table}?select=*
    pub async fn select_rows(&self, table: &str) -> Result<Vec<Record>> {
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.headers.clone())
            .query(&[("select", "*")])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Insert-or-update a batch keyed by `conflict_key`. PostgREST applies the
    /// batch in one statement, so it lands entirely or not at all.
    ///
    /// POST /rest/v1/{table}?on_conflict={conflict_key}
    pub async fn upsert_rows(
        &self,
        table: &str,
        rows: &[Record],
        conflict_key: &str,
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        debug!("[Backend] upsert {} row(s) into {}", rows.len(), table);

        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers.clone())
            .header("Prefer", UPSERT_PREFER)
            .query(&[("on_conflict", conflict_key)])
            .json(rows)
            .send()
            .await?;

        Self::read_body(response).await.map(|_| ())
    }

    /// Deletes rows where `column` equals `value`.
    ///
    /// DELETE /rest/v1/{table}?{column}=eq.{value}
    pub async fn delete_rows(&self, table: &str, column: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            return Err(BackendError::invalid_request(format!(
                "Refusing to delete from '{}' by a null '{}'",
                table, column
            )));
        }
        let filter = format!("eq.{}", key_to_string(value));

        let response = self
            .client
            .delete(self.table_url(table))
            .headers(self.headers.clone())
            .query(&[(column, filter.as_str())])
            .send()
            .await?;

        Self::read_body(response).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteBackendTrait for BackendClient {
    async fn select_all(&self, table: MirroredTable) -> adjunct_core::Result<Vec<Record>> {
        Ok(self.select_rows(table.table_name()).await?)
    }

    async fn upsert(
        &self,
        table: MirroredTable,
        rows: Vec<Record>,
        conflict_key: &str,
    ) -> adjunct_core::Result<()> {
        Ok(self.upsert_rows(table.table_name(), &rows, conflict_key).await?)
    }

    async fn delete(
        &self,
        table: MirroredTable,
        key_column: &str,
        key: &Value,
    ) -> adjunct_core::Result<()> {
        Ok(self.delete_rows(table.table_name(), key_column, key).await?)
    }
}
