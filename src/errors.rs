use crate::{
    models::response::FieldErrors,
    services::{StoreError, survey_service::SurveyError},
};
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Per-field messages for validation failures.
    pub errors: Option<FieldErrors>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            errors: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// 422 carrying one message per offending field.
    pub fn validation(errors: FieldErrors) -> Self {
        let message = errors
            .values()
            .next()
            .cloned()
            .unwrap_or_else(|| "validation failed".into());
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message,
            errors: Some(errors),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "status": self.status.as_u16()
        });
        if let Some(errors) = self.errors {
            body["errors"] = json!(errors);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DesignNotFound(_) | StoreError::BlobNotFound(_) => {
                AppError::not_found(err.to_string())
            }
            StoreError::InvalidBlobKey => AppError::bad_request(err.to_string()),
            StoreError::Corrupt { .. } | StoreError::Sqlx(_) | StoreError::Io(_) => {
                tracing::error!("store failure: {}", err);
                AppError::internal(err.to_string())
            }
        }
    }
}

impl From<SurveyError> for AppError {
    fn from(err: SurveyError) -> Self {
        match err {
            SurveyError::Validation(errors) => AppError::validation(errors),
            SurveyError::InvalidPassword | SurveyError::InvalidResetPassword => {
                AppError::new(StatusCode::UNAUTHORIZED, err.to_string())
            }
            SurveyError::ConfirmationRequired => AppError::bad_request(err.to_string()),
            SurveyError::Busy(_) => AppError::new(StatusCode::CONFLICT, err.to_string()),
            SurveyError::Timeout { .. } | SurveyError::StillRunning { .. } => {
                AppError::new(StatusCode::GATEWAY_TIMEOUT, err.to_string())
            }
            SurveyError::Task(..) => {
                tracing::error!("{}", err);
                AppError::internal(err.to_string())
            }
            SurveyError::Store(store) => store.into(),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::new(err.status(), err.body_text())
    }
}
