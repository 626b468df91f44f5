use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;
use tracing::error;

use super::models::ErrorResponse;
use crate::files::FileError;
use crate::tasks::TaskError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("X-User-Id header is required")]
    MissingUser,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingUser => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::MissingUser => "MISSING_USER",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unprocessable(_) => "UNPROCESSABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        let message = err.to_string();
        match err {
            TaskError::DuplicateName(_) => ApiError::Conflict(message),
            TaskError::NotFound { .. } => ApiError::NotFound(message),
            TaskError::InvalidRequest(_) | TaskError::InvalidSchedule(_) => {
                ApiError::InvalidPayload(message)
            }
            TaskError::UnusableFile { .. } => ApiError::Unprocessable(message),
            TaskError::Mapping(_) | TaskError::Ledger(_) | TaskError::Messaging(_) => {
                error!(error = %message, "Task operation failed");
                ApiError::Internal(message)
            }
        }
    }
}

impl From<FileError> for ApiError {
    fn from(err: FileError) -> Self {
        let message = err.to_string();
        match err {
            FileError::NotFound(_) => ApiError::NotFound(message),
            FileError::StateChanging(_) => ApiError::Conflict(message),
            FileError::EmptyRequest => ApiError::InvalidPayload(message),
            FileError::Ledger(_) | FileError::Messaging(_) => {
                error!(error = %message, "File operation failed");
                ApiError::Internal(message)
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::InvalidPayload(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        ApiError::InvalidPayload(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileId;

    #[test]
    fn test_domain_errors_map_to_client_statuses() {
        let cases = [
            (ApiError::from(TaskError::DuplicateName("x".into())), StatusCode::CONFLICT),
            (ApiError::from(TaskError::not_found("task", "t1")), StatusCode::NOT_FOUND),
            (
                ApiError::from(TaskError::InvalidSchedule("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(TaskError::UnusableFile {
                    file_id: "f1".into(),
                    reason: "no sensor".into(),
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::from(FileError::StateChanging(FileId::from("f1"))),
                StatusCode::CONFLICT,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }
}
