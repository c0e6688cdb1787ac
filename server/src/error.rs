use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Everything that can go wrong while creating, resolving or reporting on a
/// short link.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed URL, alias or request field.
    #[error("{0}")]
    InvalidInput(String),

    /// A caller-supplied alias is already stored (active or not).
    #[error("custom alias '{0}' already exists")]
    AliasConflict(String),

    /// The store rejected an insert because the code was claimed concurrently.
    #[error("short code '{0}' already exists")]
    DuplicateCode(String),

    /// The generator found no free code within the configured number of draws.
    #[error("could not allocate a free short code after {0} attempts")]
    AllocationExhausted(u32),

    /// Unknown code, or an inactive one where only active links qualify.
    #[error("URL not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::AliasConflict(_) | Error::DuplicateCode(_) => StatusCode::CONFLICT,
            Error::AllocationExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Error::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                "Internal server error".to_owned()
            }
            Error::AllocationExhausted(_) => {
                tracing::warn!("{}", self);
                self.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Unreadable request bodies are a caller mistake like any other bad field.
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidInput(rejection.body_text())
    }
}

/// `true` when a sqlx error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}
