//! In-memory stores for exercising the services without MySQL.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;

use super::{AccountsStore, CarsStore};
use crate::{
    auth::UserInfo,
    models::{Account, Car, CarCreate},
};

#[derive(Default)]
pub struct MemoryAccounts {
    accounts: Mutex<HashMap<String, Account>>,
    /// Reads miss rows written by someone else, as a concurrent first login
    /// would see them.
    stale_reads: AtomicBool,
}

impl MemoryAccounts {
    pub fn with_stale_reads() -> Self {
        Self {
            stale_reads: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn insert(&self, account: Account) {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.id.clone(), account);
    }

    pub fn get(&self, id: &str) -> Option<Account> {
        self.accounts.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }
}

#[async_trait]
impl AccountsStore for MemoryAccounts {
    async fn get_by_id(&self, id: &str) -> Result<Option<Account>, sqlx::Error> {
        if self.stale_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.get(id))
    }

    async fn create(&self, user: &UserInfo) -> Result<Account, sqlx::Error> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.entry(user.sub.clone()).or_insert_with(|| Account {
            id: user.sub.clone(),
            name: user.name.clone().unwrap_or_default(),
            email: user.email.clone().unwrap_or_default(),
            picture: user.picture.clone().unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        Ok(account.clone())
    }

    async fn update(&self, account: &Account) -> Result<(), sqlx::Error> {
        self.insert(account.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCars {
    cars: Mutex<Vec<Car>>,
    last_id: AtomicU64,
}

impl MemoryCars {
    pub fn get(&self, id: u64) -> Option<Car> {
        self.cars.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.cars.lock().unwrap().len()
    }
}

#[async_trait]
impl CarsStore for MemoryCars {
    async fn get_all(&self) -> Result<Vec<Car>, sqlx::Error> {
        Ok(self.cars.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Car>, sqlx::Error> {
        Ok(self.get(id))
    }

    async fn create(&self, data: &CarCreate, creator_id: &str) -> Result<u64, sqlx::Error> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.cars.lock().unwrap().push(Car {
            id,
            make: data.make.clone(),
            model: data.model.clone(),
            year: data.year,
            price: data.price,
            img_url: data.img_url.clone(),
            description: data.description.clone(),
            creator_id: creator_id.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            creator: None,
        });
        Ok(id)
    }

    async fn update(&self, car: &Car) -> Result<(), sqlx::Error> {
        let mut cars = self.cars.lock().unwrap();
        if let Some(stored) = cars.iter_mut().find(|c| c.id == car.id) {
            *stored = car.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: u64) -> Result<bool, sqlx::Error> {
        let mut cars = self.cars.lock().unwrap();
        let before = cars.len();
        cars.retain(|c| c.id != id);
        Ok(cars.len() < before)
    }
}
