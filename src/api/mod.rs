pub mod chat;
pub mod documents;
pub mod workspaces;

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Available,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub id: String,
    pub filename: String,
    pub status: DocumentStatus,
    pub page_count: u32,
    pub upload_timestamp: String,
}

impl DocumentMetadata {
    pub fn is_available(&self) -> bool {
        self.status == DocumentStatus::Available
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub document_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub document_ids: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Citation {
    pub doc_name: String,
    pub page_number: u32,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        reason: String,
        message: String,
    },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// Backend-provided error text, if the body carried one.
    pub fn detail(&self) -> Option<String> {
        match self {
            ApiError::Api { message, .. } => error_detail(message),
            _ => None,
        }
    }
}

/// Pulls `detail` (FastAPI) or `message` out of a JSON error body.
pub fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "message"]
        .iter()
        .find_map(|key| value.get(*key)?.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Shared HTTP client for the compliance backend. Cloning shares the
/// underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// JSON request carrying the credential header.
    pub(crate) fn json_request(
        &self,
        method: reqwest::Method,
        path: &str,
        credential: &str,
    ) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("Content-Type", "application/json")
            .header(API_KEY_HEADER, credential)
    }

    /// Multipart request: the transport sets its own content type.
    pub(crate) fn multipart_request(&self, path: &str, credential: &str) -> RequestBuilder {
        self.http
            .post(self.url(path))
            .header(API_KEY_HEADER, credential)
    }
}

/// Turns a non-2xx response into `ApiError::Api`, keeping the raw body.
pub(crate) async fn check_status(resp: Response) -> Result<Response, ApiError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
    let message = resp.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "backend returned error");
    Err(ApiError::Api {
        status: status.as_u16(),
        reason,
        message,
    })
}

pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
    resp: Response,
) -> Result<T, ApiError> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))
}
