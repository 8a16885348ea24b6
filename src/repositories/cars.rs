use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::CarsStore;
use crate::{
    database::DbConnection,
    models::{Car, CarCreate, Profile},
};

const SELECT_CARS: &str = "SELECT c.*, a.name AS creator_name, a.picture AS creator_picture \
     FROM cars c LEFT JOIN accounts a ON a.id = c.creator_id";

/// A car joined with its creator's account, if the account exists.
#[derive(FromRow)]
struct CarRow {
    id: u64,
    make: String,
    model: String,
    year: i32,
    price: f64,
    img_url: String,
    description: String,
    creator_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    creator_name: Option<String>,
    creator_picture: Option<String>,
}

impl From<CarRow> for Car {
    fn from(row: CarRow) -> Self {
        let creator = row.creator_name.map(|name| Profile {
            id: row.creator_id.clone(),
            name,
            picture: row.creator_picture.unwrap_or_default(),
        });
        Car {
            id: row.id,
            make: row.make,
            model: row.model,
            year: row.year,
            price: row.price,
            img_url: row.img_url,
            description: row.description,
            creator_id: row.creator_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            creator,
        }
    }
}

#[derive(Clone)]
pub struct CarsRepository {
    db: Arc<DbConnection>,
}

impl CarsRepository {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CarsStore for CarsRepository {
    async fn get_all(&self) -> Result<Vec<Car>, sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        let sql = format!("{SELECT_CARS} ORDER BY c.created_at DESC, c.id DESC");
        let rows = sqlx::query_as::<_, CarRow>(&sql)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(Car::from).collect())
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Car>, sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        let sql = format!("{SELECT_CARS} WHERE c.id = ?");
        let row = sqlx::query_as::<_, CarRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(Car::from))
    }

    async fn create(&self, data: &CarCreate, creator_id: &str) -> Result<u64, sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        let result = sqlx::query(
            "INSERT INTO cars (make, model, year, price, img_url, description, creator_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&data.make)
        .bind(&data.model)
        .bind(data.year)
        .bind(data.price)
        .bind(&data.img_url)
        .bind(&data.description)
        .bind(creator_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_id())
    }

    async fn update(&self, car: &Car) -> Result<(), sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        sqlx::query(
            "UPDATE cars SET make = ?, model = ?, year = ?, price = ?, img_url = ?, description = ? \
             WHERE id = ?",
        )
        .bind(&car.make)
        .bind(&car.model)
        .bind(car.year)
        .bind(car.price)
        .bind(&car.img_url)
        .bind(&car.description)
        .bind(car.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: u64) -> Result<bool, sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        let result = sqlx::query("DELETE FROM cars WHERE id = ? LIMIT 1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
