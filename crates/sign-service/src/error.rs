use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum SignServiceError {
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
    #[error("{0}")]
    MissingInput(String),
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),
    #[error("Credential or password error: {0}")]
    Credential(String),
    #[error("Error signing PDF: {0}")]
    StructuralSigning(String),
    #[error("Error signing PDF: {0}")]
    OtherSigning(String),
    #[error("Failed to stage request files: {0}")]
    Staging(std::io::Error),
}

impl SignServiceError {
    pub fn missing_files() -> Self {
        Self::MissingInput("Missing files".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SignServiceError::MissingInput(_) | SignServiceError::MalformedUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Trait implementation to convert this error into a JSON http response
impl IntoResponse for SignServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            SignServiceError::Unexpected(_) => "Something wrong happened.".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}
