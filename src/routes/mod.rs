#![allow(clippy::needless_for_each)]
mod account_handlers;
mod cars_handlers;
mod misc_handlers;
use crate::{
    auth::authenticate, config::AppSettings, middleware::compose_pipeline, state::AppState,
};
use axum::{Router, middleware};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(OpenApi)]
#[openapi(
    info(title = "gregslist", version = "v1"),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "account", description = "The caller's account"),
        (name = "cars", description = "Car listings"),
    ),
    components(
        schemas(
            crate::models::Profile,
            cars_handlers::MessageResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token issued by the identity provider"))
                        .build(),
                ),
            );
        }
    }
}

/// Routed endpoints with the authentication stage in front of every action.
pub fn api_router(state: AppState) -> (Router, utoipa::openapi::OpenApi) {
    let (router, openapi) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(misc_handlers::ping))
        .routes(routes!(misc_handlers::health))
        .routes(routes!(
            account_handlers::get_account,
            account_handlers::edit_account
        ))
        .routes(routes!(cars_handlers::get_cars, cars_handlers::create_car))
        .routes(routes!(
            cars_handlers::get_car,
            cars_handlers::edit_car,
            cars_handlers::delete_car
        ))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .split_for_parts();

    (router.with_state(state), openapi)
}

pub fn build_router(state: AppState, settings: &AppSettings) -> Router {
    let (api, openapi) = api_router(state);
    compose_pipeline(api, openapi, settings)
}
