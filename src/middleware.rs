//! The request pipeline, outermost stage first:
//!
//! 1. development only: detailed errors, API docs, the CORS policy
//! 2. HTTPS redirection
//! 3. default and static files
//! 4. routing, then authentication, authorization (per action) and the
//!    handler itself, see [`crate::routes::api_router`]

use std::{any::Any, time::Duration};

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_LENGTH, HOST, LOCATION},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::ServeDir,
    timeout::RequestBodyTimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::openapi::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::{AppSettings, CorsConfig},
    error::ErrorDetail,
};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

pub fn compose_pipeline(api: Router, openapi: OpenApi, settings: &AppSettings) -> Router {
    let development = settings.environment.is_development();

    let static_files = ServeDir::new(&settings.server.static_dir)
        .append_index_html_on_directories(true)
        .call_fallback_on_method_not_allowed(true)
        .fallback(api);
    let mut pipeline = Router::new().fallback_service(static_files);

    match settings.server.https_port {
        Some(port) => {
            let redirect = HttpsRedirect {
                port,
                trust_forwarded_proto: settings.server.trust_forwarded_proto,
            };
            pipeline = pipeline.layer(middleware::from_fn_with_state(redirect, https_redirect));
        }
        None => warn!("Failed to determine the https port for redirect, serving plain HTTP"),
    }

    if development {
        info!(policy = %settings.cors.policy_name, "development pipeline enabled");
        pipeline = Router::new()
            .merge(SwaggerUi::new("/swagger").url("/swagger/v1/swagger.json", openapi))
            .fallback_service(pipeline)
            .layer(cors_policy(&settings.cors))
            .layer(middleware::from_fn(developer_error_details));
    }

    apply_axum_middleware(pipeline, development)
}

pub fn apply_axum_middleware(router: Router, development: bool) -> Router {
    router
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            panic_response(panic, development)
        }))
        .layer(RequestBodyTimeoutLayer::new(Duration::from_secs(10)))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Exact-match origins, any method and header, with credentials.
pub fn cors_policy(config: &CorsConfig) -> CorsLayer {
    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[derive(Debug, Clone, Copy)]
struct HttpsRedirect {
    port: u16,
    trust_forwarded_proto: bool,
}

fn is_secure(request: &Request, trust_forwarded_proto: bool) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }
    trust_forwarded_proto
        && request
            .headers()
            .get(FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// `https://` equivalent of the request URL on `port`.
fn https_location(request: &Request, port: u16) -> Option<String> {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())?;
    let host = match host.strip_prefix('[') {
        // IPv6 literal, keep the brackets
        Some(rest) => &host[..rest.find(']')? + 2],
        None => host.split(':').next().unwrap_or(host),
    };
    if host.is_empty() {
        return None;
    }
    let authority = if port == 443 {
        host.to_string()
    } else {
        format!("{host}:{port}")
    };
    let path = request
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    Some(format!("https://{authority}{path}"))
}

async fn https_redirect(
    State(redirect): State<HttpsRedirect>,
    request: Request,
    next: Next,
) -> Response {
    if is_secure(&request, redirect.trust_forwarded_proto) {
        return next.run(request).await;
    }
    match https_location(&request, redirect.port) {
        Some(location) => (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": 1, "msg": "Missing Host header" })),
        )
            .into_response(),
    }
}

/// Copies the error chain recorded by handlers into the JSON body.
async fn developer_error_details(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("failed to buffer error body: {err}");
            return (parts.status, Json(json!({ "code": 1, "detail": detail }))).into_response();
        }
    };
    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut object)) => {
            object.insert("detail".to_string(), Value::String(detail));
            parts.headers.remove(CONTENT_LENGTH);
            Body::from(Value::Object(object).to_string())
        }
        _ => Body::from(bytes),
    };
    Response::from_parts(parts, body)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, development: bool) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %message, "handler panicked");

    let body = if development {
        json!({ "code": 1, "msg": "Internal server error", "detail": message })
    } else {
        json!({ "code": 1, "msg": "Internal server error" })
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn request(uri: &str, host: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(host) = host {
            builder = builder.header(HOST, host);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn location_drops_the_plain_port() {
        let req = request("/api/cars?page=2", Some("localhost:5000"));
        assert_eq!(
            https_location(&req, 5001).as_deref(),
            Some("https://localhost:5001/api/cars?page=2")
        );
        assert_eq!(
            https_location(&req, 443).as_deref(),
            Some("https://localhost/api/cars?page=2")
        );
    }

    #[test]
    fn location_keeps_ipv6_brackets() {
        let req = request("/", Some("[::1]:5000"));
        assert_eq!(https_location(&req, 5001).as_deref(), Some("https://[::1]:5001/"));
    }

    #[test]
    fn location_needs_a_host() {
        assert_eq!(https_location(&request("/", None), 443), None);
    }

    #[test]
    fn forwarded_proto_marks_request_secure_when_trusted() {
        let mut req = request("/", Some("localhost"));
        assert!(!is_secure(&req, true));
        req.headers_mut()
            .insert(FORWARDED_PROTO, HeaderValue::from_static("https, http"));
        assert!(is_secure(&req, true));
    }

    #[test]
    fn forwarded_proto_is_ignored_from_untrusted_peers() {
        let mut req = request("/", Some("localhost"));
        req.headers_mut()
            .insert(FORWARDED_PROTO, HeaderValue::from_static("https"));
        assert!(!is_secure(&req, false));
    }

    #[tokio::test]
    async fn panic_detail_only_in_development() {
        let body = |response: Response| async move {
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            serde_json::from_slice::<Value>(&bytes).unwrap()
        };

        let production = panic_response(Box::new("boom"), false);
        assert_eq!(production.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(production).await.get("detail").is_none());

        let development = panic_response(Box::new(String::from("boom")), true);
        assert_eq!(body(development).await["detail"], "boom");
    }
}
