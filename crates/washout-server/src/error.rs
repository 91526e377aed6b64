//! Request-level error taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use washout_llm::ExtractionError;

pub const NO_IMAGE_MESSAGE: &str = "画像がアップロードされていません";
pub const EMPTY_RECHECK_MESSAGE: &str = "テキストが空です";
pub const BUSY_MESSAGE: &str = "現在混雑中です。しばらくお待ちください。";
pub const OCR_FAILED_MESSAGE: &str = "OCR failed";
pub const PARSE_FAILED_MESSAGE: &str = "OCR結果のJSON解析に失敗しました";

/// Everything a check request can fail with.
#[derive(Error, Debug)]
pub enum CheckError {
    /// The request itself is unusable
    #[error("{0}")]
    Input(String),

    /// Admission ceiling reached
    #[error("{0}")]
    Capacity(String),

    /// Vision collaborator failed or timed out
    #[error("{message}: {detail}")]
    ExternalService { message: String, detail: String },

    /// Collaborator answered, but not with a JSON array of names
    #[error("{message}")]
    Parse { message: String, raw: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CheckResult<T> = Result<T, CheckError>;

impl CheckError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Input(_) | Self::Parse { .. } => StatusCode::BAD_REQUEST,
            Self::Capacity(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ExternalService { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ExtractionError> for CheckError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Busy { .. } => Self::Capacity(BUSY_MESSAGE.into()),
            ExtractionError::Timeout(after) => Self::ExternalService {
                message: OCR_FAILED_MESSAGE.into(),
                detail: format!("extraction timed out after {}ms", after.as_millis()),
            },
            ExtractionError::Failed(detail) => Self::ExternalService {
                message: OCR_FAILED_MESSAGE.into(),
                detail,
            },
            ExtractionError::MalformedOutput { raw, .. } => Self::Parse {
                message: PARSE_FAILED_MESSAGE.into(),
                raw,
            },
        }
    }
}

impl IntoResponse for CheckError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            Self::Input(message) | Self::Capacity(message) => json!({ "error": message }),
            Self::ExternalService { message, detail } => {
                json!({ "error": message, "detail": detail })
            }
            Self::Parse { message, raw } => json!({ "error": message, "raw": raw }),
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error while handling request");
                json!({ "error": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
