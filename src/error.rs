use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;

/// Application-level errors for HTTP handlers
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Internal error: {0}")]
    InternalError(#[source] anyhow::Error),
}

/// Full error chain attached to error responses. The developer error stage
/// copies it into the body when running in development.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Auth(err) => err.status_code(),
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to any caller.
    fn public_message(&self) -> String {
        match self {
            AppError::BadRequest(msg) | AppError::NotFound(msg) | AppError::Forbidden(msg) => {
                msg.clone()
            }
            AppError::Auth(err) => err.to_string(),
            AppError::InternalError(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Auth(err) = self {
            return err.into_response();
        }
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Handler error: {:?}", self);
        } else {
            tracing::debug!("Handler rejected request: {}", self);
        }

        let body = json!({
            "code": 1,
            "msg": self.public_message(),
        });

        let mut response = (status, Json(body)).into_response();
        let detail = match &self {
            AppError::InternalError(err) => format!("{err:?}"),
            other => other.to_string(),
        };
        response.extensions_mut().insert(ErrorDetail(detail));
        response
    }
}

// Implement From for common error types to allow automatic conversion
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalError(err)
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
