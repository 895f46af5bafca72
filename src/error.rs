use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Domain errors surfaced by the user and avatar workflows.
///
/// Every handler maps its failures into one of these variants; nothing
/// else is allowed to escape past the workflow boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Email is already in use")]
    EmailInUse,
    #[error("User not found")]
    NotFound,
    #[error("Email or password is wrong")]
    InvalidCredentials,
    #[error("Email is not verified")]
    NotVerified,
    #[error("Verification has already been passed")]
    AlreadyVerified,
    #[error("{0}")]
    InvalidToken(&'static str),
    #[error("{0}")]
    InvalidUpload(String),
    /// The account was persisted but the verification email could not be
    /// sent. The client recovers via POST /users/verify.
    #[error("Failed to send verification email")]
    Dispatch(#[source] anyhow::Error),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::EmailInUse => "email_in_use",
            ApiError::NotFound => "not_found",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::NotVerified => "not_verified",
            ApiError::AlreadyVerified => "already_verified",
            ApiError::InvalidToken(_) => "invalid_token",
            ApiError::InvalidUpload(_) => "invalid_upload",
            ApiError::Dispatch(_) => "dispatch_failure",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::AlreadyVerified
            | ApiError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::NotVerified
            | ApiError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::EmailInUse => StatusCode::CONFLICT,
            ApiError::Dispatch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(source) => error!(error = %source, "internal error"),
            ApiError::Dispatch(source) => error!(error = %source, "email dispatch failed"),
            _ => {}
        }
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
