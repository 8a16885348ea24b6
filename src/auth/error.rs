use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Authentication and authorization failures.
///
/// Cloned into request extensions by the authentication stage so the
/// authorization stage can report why a token was refused.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingToken,
    #[error("Invalid authorization header, expected: Bearer <token>")]
    InvalidAuthHeader,
    #[error("Token is malformed")]
    MalformedToken,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token is not yet valid")]
    TokenNotYetValid,
    #[error("Token issuer is invalid")]
    InvalidIssuer,
    #[error("Token audience is invalid")]
    InvalidAudience,
    #[error("No matching key found in the authority key set")]
    NoMatchingKey,
    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(String),
    #[error("Failed to fetch user info: {0}")]
    UserInfo(String),
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::NoMatchingKey => "no_matching_key",
            AuthError::KeyFetch(_) => "key_fetch_error",
            AuthError::UserInfo(_) => "user_info_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::KeyFetch(_) | AuthError::UserInfo(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// `WWW-Authenticate` value for a bearer challenge.
    fn challenge(&self) -> String {
        match self {
            AuthError::MissingToken => "Bearer".to_string(),
            other => format!(
                "Bearer error=\"invalid_token\", error_description=\"{other}\""
            ),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                AuthError::InvalidSignature
            }
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            _ => AuthError::MalformedToken,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Authentication failed: {}", self);
        }

        let body = Json(json!({
            "code": 1,
            "msg": self.to_string(),
            "error_code": self.error_code(),
        }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(challenge) = HeaderValue::from_str(&self.challenge()) {
                response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
            }
        }
        response
    }
}
