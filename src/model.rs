//! Persistent data model: users, products, and deliveries.
//!
//! Documents are stored in MongoDB collections; `_id` is the generated
//! identity. `active` is the soft-delete marker on users and products:
//! records with `active: false` are logically deleted and never surface
//! from normal reads (the store layer filters them centrally).

use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A delivery moves at least one unit.
pub const MIN_QUANTITY: i64 = 1;
/// Review scores are constrained to `MIN_SCORE..=MAX_SCORE`.
pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub email: String,
    /// bcrypt hash, never the plain text.
    pub password: String,
    pub name: String,
    pub lastname: String,
    pub phone: String,
    pub address: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub price: f64,
    pub description: String,
    pub image: String,
    pub category: String,
    /// Owning user, set at creation and immutable afterwards.
    pub user: ObjectId,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Delivered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Owning user, set at creation and immutable afterwards.
    pub user: ObjectId,
    pub product: ObjectId,
    pub quantity: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
}

/// Resources that belong to exactly one user.
pub trait Owned {
    fn owner(&self) -> ObjectId;
}

impl Owned for Product {
    fn owner(&self) -> ObjectId {
        self.user
    }
}

impl Owned for Delivery {
    fn owner(&self) -> ObjectId {
        self.user
    }
}
