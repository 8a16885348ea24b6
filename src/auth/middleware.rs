use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::{AuthError, Identity};
use crate::state::AppState;

/// Bearer token from the `Authorization` header. Other schemes and an absent
/// header mean "no token", an unreadable header is an error.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
    let Some((scheme, token)) = value.split_once(' ') else {
        return Ok(None);
    };
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Ok(None);
    }
    Ok(Some(token.to_string()))
}

/// Authentication stage.
///
/// Never rejects on its own: a valid token puts an [`Identity`] in the
/// request extensions, a refused one puts the [`AuthError`] there for
/// [`RequireAuth`] to report.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match bearer_token(request.headers()) {
        Ok(None) => {}
        Ok(Some(token)) => match state.identity.authenticate(&token).await {
            Ok(identity) => {
                debug!(subject = %identity.subject, "bearer token accepted");
                request.extensions_mut().insert(identity);
            }
            Err(err) => {
                debug!(error = %err, "bearer token refused");
                request.extensions_mut().insert(err);
            }
        },
        Err(err) => {
            request.extensions_mut().insert(err);
        }
    }
    next.run(request).await
}

/// Authorization requirement for an action: resolves to the caller's
/// [`Identity`] or rejects with a bearer challenge.
///
/// ```rust,ignore
/// async fn create_car(RequireAuth(identity): RequireAuth, ...) { ... }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(RequireAuth(identity.clone()));
        }
        Err(parts
            .extensions
            .get::<AuthError>()
            .cloned()
            .unwrap_or(AuthError::MissingToken))
    }
}
