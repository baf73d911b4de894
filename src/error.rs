use crate::api::ApiError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFailureKind {
    Unauthorized,
    BadInput,
    RateLimited,
    ServerError,
}

impl RequestFailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => RequestFailureKind::Unauthorized,
            400 | 422 => RequestFailureKind::BadInput,
            429 => RequestFailureKind::RateLimited,
            _ => RequestFailureKind::ServerError,
        }
    }
}

/// Every failure a controller can surface. All of them are recoverable: the
/// caller shows the message and the user re-triggers the action.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("API key not configured")]
    MissingCredential,
    #[error("Question is empty")]
    EmptyQuestion,
    #[error("Failed to fetch documents: {0}")]
    FetchFailed(String),
    #[error("{0}")]
    UploadFailed(String),
    #[error("{detail}")]
    RequestFailed {
        kind: RequestFailureKind,
        detail: String,
    },
    #[error("Failed to create workspace: {0}")]
    ScopeCreationFailed(String),
    #[error("Unknown document: {0}")]
    UnknownDocument(String),
    #[error("Settings storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Maps a failed `/chat` round trip onto the request taxonomy.
    pub fn from_chat_failure(err: ApiError) -> Self {
        match err {
            ApiError::Api { status, reason, .. } => {
                let kind = RequestFailureKind::from_status(status);
                let detail = match status {
                    401 => "Invalid API Key".to_string(),
                    400 => "Bad Request (Check inputs)".to_string(),
                    422 => "Validation Error (Check inputs)".to_string(),
                    429 => "Rate limit exceeded. Please wait.".to_string(),
                    _ => format!("Server Error: {}", reason),
                };
                AppError::RequestFailed { kind, detail }
            }
            other => AppError::RequestFailed {
                kind: RequestFailureKind::ServerError,
                detail: format!("Server Error: {}", other),
            },
        }
    }

    pub fn request_kind(&self) -> Option<RequestFailureKind> {
        match self {
            AppError::RequestFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
