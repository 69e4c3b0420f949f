//! Persistence layer.
//!
//! A small document-store seam between the HTTP handlers and MongoDB.
//! Every read here excludes soft-deleted records (`active: false`) so
//! handlers never have to remember the tombstone filter themselves.
//! Owner references are deliberately absent from the update types:
//! ownership is set at creation and cannot be rewritten.

pub mod mongo;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Delivery, DeliveryStatus, Product, User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-index violation (username or email already taken).
    #[error("duplicate username or email")]
    Duplicate,
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Already hashed by the caller.
    pub password: String,
    pub name: String,
    pub lastname: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Already hashed by the caller.
    pub password: Option<String>,
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub description: String,
    pub image: String,
    pub category: String,
    pub user: ObjectId,
}

#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Case-insensitive substring match on the product name.
    pub name: Option<String>,
    pub owner: Option<ObjectId>,
}

#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub user: ObjectId,
    pub product: ObjectId,
    pub quantity: i64,
    pub date: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub comments: Option<String>,
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryUpdate {
    pub comments: Option<String>,
    pub score: Option<i32>,
}

/// Inclusive on both ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn update_user(&self, id: ObjectId, update: UserUpdate) -> Result<(), StoreError>;
    async fn deactivate_user(&self, id: ObjectId) -> Result<(), StoreError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError>;
    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>, StoreError>;
    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>, StoreError>;
    /// Distinct category values of one user's active products, sorted.
    async fn product_categories(&self, owner: ObjectId) -> Result<Vec<String>, StoreError>;
    async fn update_product(&self, id: ObjectId, update: ProductUpdate) -> Result<(), StoreError>;
    async fn deactivate_product(&self, id: ObjectId) -> Result<(), StoreError>;

    async fn create_delivery(&self, delivery: NewDelivery) -> Result<Delivery, StoreError>;
    async fn find_delivery(&self, id: ObjectId) -> Result<Option<Delivery>, StoreError>;
    async fn list_deliveries(
        &self,
        owner: ObjectId,
        range: DateRange,
    ) -> Result<Vec<Delivery>, StoreError>;
    async fn update_delivery(&self, id: ObjectId, update: DeliveryUpdate)
        -> Result<(), StoreError>;
}
