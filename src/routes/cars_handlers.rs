use axum::{Json, debug_handler, extract::Path};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::RequireAuth,
    error::AppResult,
    models::{Car, CarCreate, CarEdit},
    services::CarsService,
    state::AppState,
};

#[derive(ToSchema, Serialize)]
pub struct MessageResponse {
    pub msg: String,
}

/// All listings, newest first
#[debug_handler(state = AppState)]
#[utoipa::path(
    get,
    tag = "cars",
    path = "/api/cars",
    responses((status = OK, body = Vec<Car>))
)]
pub async fn get_cars(cars: CarsService) -> AppResult<Json<Vec<Car>>> {
    Ok(Json(cars.get_all().await?))
}

/// One listing
#[debug_handler(state = AppState)]
#[utoipa::path(
    get,
    tag = "cars",
    path = "/api/cars/{id}",
    params(("id" = u64, Path, description = "Car id")),
    responses(
        (status = OK, body = Car),
        (status = NOT_FOUND, description = "Invalid car id"),
    )
)]
pub async fn get_car(cars: CarsService, Path(id): Path<u64>) -> AppResult<Json<Car>> {
    Ok(Json(cars.get_by_id(id).await?))
}

/// List a car for sale as the caller
#[debug_handler(state = AppState)]
#[utoipa::path(
    post,
    tag = "cars",
    path = "/api/cars",
    request_body = CarCreate,
    responses(
        (status = OK, body = Car),
        (status = BAD_REQUEST, description = "Invalid listing"),
        (status = UNAUTHORIZED, description = "Missing or invalid bearer token"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_car(
    RequireAuth(identity): RequireAuth,
    cars: CarsService,
    Json(data): Json<CarCreate>,
) -> AppResult<Json<Car>> {
    Ok(Json(cars.create(&identity.subject, data).await?))
}

/// Change a listing the caller created
#[debug_handler(state = AppState)]
#[utoipa::path(
    put,
    tag = "cars",
    path = "/api/cars/{id}",
    params(("id" = u64, Path, description = "Car id")),
    request_body = CarEdit,
    responses(
        (status = OK, body = Car),
        (status = BAD_REQUEST, description = "Invalid listing"),
        (status = UNAUTHORIZED, description = "Missing or invalid bearer token"),
        (status = FORBIDDEN, description = "Caller is not the creator"),
        (status = NOT_FOUND, description = "Invalid car id"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn edit_car(
    RequireAuth(identity): RequireAuth,
    cars: CarsService,
    Path(id): Path<u64>,
    Json(edit): Json<CarEdit>,
) -> AppResult<Json<Car>> {
    Ok(Json(cars.edit(id, &identity.subject, edit).await?))
}

/// Remove a listing the caller created
#[debug_handler(state = AppState)]
#[utoipa::path(
    delete,
    tag = "cars",
    path = "/api/cars/{id}",
    params(("id" = u64, Path, description = "Car id")),
    responses(
        (status = OK, body = MessageResponse),
        (status = UNAUTHORIZED, description = "Missing or invalid bearer token"),
        (status = FORBIDDEN, description = "Caller is not the creator"),
        (status = NOT_FOUND, description = "Invalid car id"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_car(
    RequireAuth(identity): RequireAuth,
    cars: CarsService,
    Path(id): Path<u64>,
) -> AppResult<Json<MessageResponse>> {
    cars.delete(id, &identity.subject).await?;
    Ok(Json(MessageResponse {
        msg: "deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{http::StatusCode, response::IntoResponse};

    use super::*;
    use crate::{
        auth::{Claims, Identity},
        repositories::memory::MemoryCars,
    };

    fn caller(subject: &str) -> RequireAuth {
        RequireAuth(Identity {
            subject: subject.to_string(),
            claims: Claims {
                sub: subject.to_string(),
                iss: "https://tenant.auth0.com/".into(),
                exp: u64::MAX,
                iat: 0,
                scope: None,
                permissions: Vec::new(),
            },
            token: "token".into(),
        })
    }

    fn new_car() -> CarCreate {
        serde_json::from_value(serde_json::json!({
            "make": "Subaru",
            "model": "Outback",
            "year": 2009,
            "price": 6500
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn delete_answers_deleted() {
        let cars = CarsService::new(Arc::new(MemoryCars::default()));
        let Json(car) = create_car(caller("auth0|greg"), cars.clone(), Json(new_car()))
            .await
            .unwrap();

        let Json(reply) = delete_car(caller("auth0|greg"), cars.clone(), Path(car.id))
            .await
            .unwrap();
        assert_eq!(reply.msg, "deleted");
    }

    #[tokio::test]
    async fn foreign_delete_is_forbidden() {
        let cars = CarsService::new(Arc::new(MemoryCars::default()));
        let Json(car) = create_car(caller("auth0|greg"), cars.clone(), Json(new_car()))
            .await
            .unwrap();

        let response = delete_car(caller("auth0|mallory"), cars.clone(), Path(car.id))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(get_car(cars, Path(car.id)).await.is_ok());
    }
}
