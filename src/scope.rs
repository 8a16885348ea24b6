//! Request scope.
//!
//! The first extractor that needs the database opens a [`Scope`] for the
//! request and parks it in the request extensions; later resolutions in the
//! same request reuse its connection. Repositories and services are built
//! fresh on every resolution.

use std::{convert::Infallible, sync::Arc};

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::{
    database::DbConnection,
    repositories::{AccountsRepository, CarsRepository},
    services::{AccountService, CarsService},
    state::AppState,
};

#[derive(Clone)]
pub struct Scope {
    db: Arc<DbConnection>,
}

impl Scope {
    pub fn new(db: DbConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    #[cfg(test)]
    fn db(&self) -> &Arc<DbConnection> {
        &self.db
    }

    pub fn accounts_repository(&self) -> AccountsRepository {
        AccountsRepository::new(self.db.clone())
    }

    pub fn cars_repository(&self) -> CarsRepository {
        CarsRepository::new(self.db.clone())
    }

    pub fn account_service(&self) -> AccountService {
        AccountService::new(Arc::new(self.accounts_repository()))
    }

    pub fn cars_service(&self) -> CarsService {
        CarsService::new(Arc::new(self.cars_repository()))
    }
}

impl FromRequestParts<AppState> for Scope {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(scope) = parts.extensions.get::<Scope>() {
            return Ok(scope.clone());
        }
        let scope = Scope::new(state.connections.create());
        debug!(connection = scope.db.id(), path = %parts.uri.path(), "request scope opened");
        parts.extensions.insert(scope.clone());
        Ok(scope)
    }
}

impl FromRequestParts<AppState> for AccountService {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Scope::from_request_parts(parts, state).await?.account_service())
    }
}

impl FromRequestParts<AppState> for CarsService {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Scope::from_request_parts(parts, state).await?.cars_service())
    }
}
