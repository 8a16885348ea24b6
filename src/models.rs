//! Rows are stored with snake_case columns and exposed as camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Oldest model year accepted for a listing.
pub const MIN_YEAR: i32 = 1886;
pub const MAX_YEAR: i32 = 2100;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Subject at the identity provider
    pub id: String,
    pub name: String,
    pub email: String,
    pub picture: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
        }
    }
}

/// Public part of an account, embedded in listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub picture: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountEdit {
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl Account {
    pub fn apply(&mut self, edit: AccountEdit) {
        if let Some(name) = edit.name {
            self.name = name;
        }
        if let Some(picture) = edit.picture {
            self.picture = picture;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: u64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub img_url: String,
    pub description: String,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<Profile>,
}

impl Car {
    /// Overwrite the fields present in `edit`, keep the rest.
    pub fn apply(&mut self, edit: CarEdit) {
        if let Some(make) = edit.make {
            self.make = make;
        }
        if let Some(model) = edit.model {
            self.model = model;
        }
        if let Some(year) = edit.year {
            self.year = year;
        }
        if let Some(price) = edit.price {
            self.price = price;
        }
        if let Some(img_url) = edit.img_url {
            self.img_url = img_url;
        }
        if let Some(description) = edit.description {
            self.description = description;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_listing(&self.make, &self.model, self.year, self.price)
    }
}

/// Body of a new listing.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CarCreate {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    #[serde(default)]
    pub img_url: String,
    #[serde(default)]
    pub description: String,
}

impl CarCreate {
    pub fn validate(&self) -> Result<(), String> {
        validate_listing(&self.make, &self.model, self.year, self.price)
    }
}

/// Partial update of a listing. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CarEdit {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price: Option<f64>,
    pub img_url: Option<String>,
    pub description: Option<String>,
}

fn validate_listing(make: &str, model: &str, year: i32, price: f64) -> Result<(), String> {
    if make.trim().is_empty() {
        return Err("make is required".to_string());
    }
    if model.trim().is_empty() {
        return Err("model is required".to_string());
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(format!("year must be between {MIN_YEAR} and {MAX_YEAR}"));
    }
    if !price.is_finite() || price < 0.0 {
        return Err("price must be a non-negative number".to_string());
    }
    Ok(())
}
