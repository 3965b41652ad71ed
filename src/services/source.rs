// src/services/source.rs

//! Grid sources.
//!
//! Supplies the raw cell grid the decoder works on:
//! - `SheetsSource`: a worksheet read through the Sheets v4 REST API
//! - `FileSource`: a JSON file holding a two-dimensional array (local runs)

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Grid, SourceConfig, SourceKind};
use crate::utils::http;

/// Default Sheets API root.
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Trait for raw grid backends.
#[async_trait]
pub trait GridSource: Send + Sync {
    /// Fetch the full sheet as rows of text cells.
    async fn fetch_grid(&self) -> Result<Grid>;

    /// Human-readable label for logs.
    fn describe(&self) -> String;
}

/// Build the configured source.
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn GridSource>> {
    match config.kind {
        SourceKind::Sheets => Ok(Box::new(SheetsSource::from_config(config)?)),
        SourceKind::File => {
            let path = config
                .grid_path
                .as_ref()
                .ok_or_else(|| AppError::config("source.grid_path is required"))?;
            Ok(Box::new(FileSource::new(path)))
        }
    }
}

/// Render any JSON cell value as the text the sheet would show.
fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn into_grid(rows: Vec<Vec<Value>>) -> Grid {
    rows.into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect()
}

/// OAuth scopes requested for service-account tokens.
pub const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// Fields inspected to tell credential files apart.
#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    client_email: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Access credentials for the Sheets API.
///
/// The file is either a Google service-account key (`"type": "service_account"`),
/// or a JSON object holding an `api_key` or a fixed `access_token`.
#[derive(Clone)]
pub enum SheetsCredentials {
    /// Service-account key; access tokens are minted and refreshed from it
    ServiceAccount { client_email: String, key_json: String },
    ApiKey(String),
    AccessToken(String),
}

impl fmt::Debug for SheetsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccount { client_email, .. } => {
                write!(f, "ServiceAccount({client_email})")
            }
            Self::ApiKey(_) => f.write_str("ApiKey(..)"),
            Self::AccessToken(_) => f.write_str("AccessToken(..)"),
        }
    }
}

impl SheetsCredentials {
    /// Load credentials from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Cannot read credentials {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| AppError::config(format!("Invalid credentials {}: {}", path.display(), e)))
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        let file: CredentialsFile = serde_json::from_str(content).map_err(|e| e.to_string())?;

        if file.kind.as_deref() == Some("service_account") {
            let client_email = file
                .client_email
                .ok_or("service account key has no client_email")?;
            return Ok(Self::ServiceAccount {
                client_email,
                key_json: content.to_string(),
            });
        }
        if let Some(key) = file.api_key {
            return Ok(Self::ApiKey(key));
        }
        if let Some(token) = file.access_token {
            return Ok(Self::AccessToken(token));
        }
        Err("expected a service account key, api_key, or access_token".to_string())
    }

    /// Turn credentials into request authorization.
    pub fn into_auth(self) -> Result<SheetsAuth> {
        match self {
            Self::ServiceAccount {
                client_email,
                key_json,
            } => {
                let account = CustomServiceAccount::from_json(&key_json).map_err(|e| {
                    AppError::config(format!("Invalid service account key for {client_email}: {e}"))
                })?;
                log::info!("Using service account {}", client_email);
                Ok(SheetsAuth::Bearer(Arc::new(ServiceAccountTokens {
                    account,
                    client_email,
                })))
            }
            Self::ApiKey(key) => Ok(SheetsAuth::ApiKey(key)),
            Self::AccessToken(token) => Ok(SheetsAuth::Bearer(Arc::new(StaticToken(token)))),
        }
    }
}

/// Supplier of bearer tokens, asked once per request.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Tokens minted from a service-account key. Cached until close to expiry.
struct ServiceAccountTokens {
    account: CustomServiceAccount,
    client_email: String,
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String> {
        let token = self
            .account
            .token(SHEETS_SCOPES)
            .await
            .map_err(|e| AppError::fetch(format!("token for {}", self.client_email), e))?;
        Ok(token.as_str().to_string())
    }
}

/// A fixed token that is never refreshed.
struct StaticToken(String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// How requests to the Sheets API are authorized.
#[derive(Clone)]
pub enum SheetsAuth {
    /// Sent as the `key` query parameter (public sheets only)
    ApiKey(String),
    /// Sent as `Authorization: Bearer`
    Bearer(Arc<dyn TokenSource>),
}

/// `values.get` response body.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Worksheet read through the Sheets REST API.
pub struct SheetsSource {
    client: Client,
    api_base: Url,
    document_id: String,
    worksheet: String,
    auth: SheetsAuth,
}

impl SheetsSource {
    pub fn new(
        client: Client,
        document_id: impl Into<String>,
        worksheet: impl Into<String>,
        auth: SheetsAuth,
    ) -> Result<Self> {
        Ok(Self {
            client,
            api_base: Url::parse(SHEETS_API_BASE)?,
            document_id: document_id.into(),
            worksheet: worksheet.into(),
            auth,
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let auth = SheetsCredentials::load(&config.credentials_path)?.into_auth()?;
        let client = http::create_async_client(std::time::Duration::from_secs(config.timeout_secs))?;
        Self::new(client, &config.document_id, &config.worksheet, auth)
    }

    /// Point the source at another API root (must end with `/`).
    pub fn with_api_base(mut self, api_base: Url) -> Self {
        self.api_base = api_base;
        self
    }

    /// A1 range covering the whole worksheet.
    fn range(&self) -> String {
        format!("'{}'", self.worksheet.replace('\'', "''"))
    }

    fn values_url(&self) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::config(format!("Invalid Sheets API base: {}", self.api_base)))?
            .pop_if_empty()
            .extend([self.document_id.as_str(), "values", self.range().as_str()]);
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");
        if let SheetsAuth::ApiKey(key) = &self.auth {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }
}

#[async_trait]
impl GridSource for SheetsSource {
    async fn fetch_grid(&self) -> Result<Grid> {
        let mut request = self.client.get(self.values_url()?);
        if let SheetsAuth::Bearer(tokens) = &self.auth {
            request = request.bearer_auth(tokens.access_token().await?);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::fetch(self.describe(), e))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(AppError::fetch(
                    self.describe(),
                    "document not found; check the id and sharing permissions",
                ));
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::fetch(
                    self.describe(),
                    format!("HTTP {}: {}", status.as_u16(), body.trim()),
                ));
            }
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| AppError::fetch(self.describe(), e))?;
        let grid = into_grid(range.values);
        log::info!("Fetched {} rows from {}", grid.len(), self.describe());
        Ok(grid)
    }

    fn describe(&self) -> String {
        format!("sheet {}/{}", self.document_id, self.worksheet)
    }
}

/// Grid stored as a JSON array of rows on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read a grid file synchronously.
    pub fn read(path: impl AsRef<Path>) -> Result<Grid> {
        let bytes = std::fs::read(path)?;
        let rows: Vec<Vec<Value>> = serde_json::from_slice(&bytes)?;
        Ok(into_grid(rows))
    }
}

#[async_trait]
impl GridSource for FileSource {
    async fn fetch_grid(&self) -> Result<Grid> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| AppError::fetch(self.describe(), e))?;
        let rows: Vec<Vec<Value>> = serde_json::from_slice(&bytes)?;
        let grid = into_grid(rows);
        log::info!("Read {} rows from {}", grid.len(), self.describe());
        Ok(grid)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
