use std::sync::Arc;

use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::{Car, CarCreate, CarEdit},
    repositories::CarsStore,
};

#[derive(Clone)]
pub struct CarsService {
    repo: Arc<dyn CarsStore>,
}

impl CarsService {
    pub fn new(repo: Arc<dyn CarsStore>) -> Self {
        Self { repo }
    }

    pub async fn get_all(&self) -> AppResult<Vec<Car>> {
        Ok(self.repo.get_all().await?)
    }

    pub async fn get_by_id(&self, id: u64) -> AppResult<Car> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid car id".to_string()))
    }

    pub async fn create(&self, creator_id: &str, data: CarCreate) -> AppResult<Car> {
        data.validate().map_err(AppError::BadRequest)?;
        let id = self.repo.create(&data, creator_id).await?;
        info!(car = id, creator = %creator_id, "car listed");
        self.get_by_id(id).await
    }

    pub async fn edit(&self, id: u64, user_id: &str, edit: CarEdit) -> AppResult<Car> {
        let mut car = self.owned_by(id, user_id).await?;
        car.apply(edit);
        car.validate().map_err(AppError::BadRequest)?;
        self.repo.update(&car).await?;
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: u64, user_id: &str) -> AppResult<()> {
        self.owned_by(id, user_id).await?;
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound("Invalid car id".to_string()));
        }
        info!(car = id, "car removed");
        Ok(())
    }

    async fn owned_by(&self, id: u64, user_id: &str) -> AppResult<Car> {
        let car = self.get_by_id(id).await?;
        if car.creator_id != user_id {
            return Err(AppError::Forbidden("You are not the creator of this car".to_string()));
        }
        Ok(car)
    }
}
