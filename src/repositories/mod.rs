//! Data access behind the services. The MySQL repositories share the request
//! scope's connection; the traits let services run against other stores.

mod accounts;
mod cars;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;

use crate::{
    auth::UserInfo,
    models::{Account, Car, CarCreate},
};

pub use accounts::AccountsRepository;
pub use cars::CarsRepository;

#[async_trait]
pub trait AccountsStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Account>, sqlx::Error>;

    /// Insert the account for `user` unless one already exists, then return
    /// the stored row. Safe to race with itself.
    async fn create(&self, user: &UserInfo) -> Result<Account, sqlx::Error>;

    async fn update(&self, account: &Account) -> Result<(), sqlx::Error>;
}

#[async_trait]
pub trait CarsStore: Send + Sync {
    /// Newest first.
    async fn get_all(&self) -> Result<Vec<Car>, sqlx::Error>;

    async fn get_by_id(&self, id: u64) -> Result<Option<Car>, sqlx::Error>;

    /// Insert a listing and return its generated id.
    async fn create(&self, data: &CarCreate, creator_id: &str) -> Result<u64, sqlx::Error>;

    async fn update(&self, car: &Car) -> Result<(), sqlx::Error>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: u64) -> Result<bool, sqlx::Error>;
}
