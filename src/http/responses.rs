use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Delivery, DeliveryStatus, Product, User};

use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub lastname: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// User payload with the credential hash stripped.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub lastname: String,
    pub phone: String,
    pub address: String,
    pub active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username,
            email: user.email,
            name: user.name,
            lastname: user.lastname,
            phone: user.phone,
            address: user.address,
            active: user.active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: f64,
    pub description: String,
    pub image: String,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub description: String,
    pub image: String,
    pub category: String,
    pub user: String,
    pub active: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_hex(),
            name: product.name,
            price: product.price,
            description: product.description,
            image: product.image,
            category: product.category,
            user: product.user.to_hex(),
            active: product.active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDeliveryRequest {
    pub product: String,
    pub quantity: i64,
    pub date: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub comments: Option<String>,
    pub score: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDeliveryRequest {
    pub comments: Option<String>,
    pub score: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliveryListQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    pub id: String,
    pub user: String,
    pub product: String,
    pub quantity: i64,
    pub date: DateTime<Utc>,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
}

impl From<Delivery> for DeliveryResponse {
    fn from(delivery: Delivery) -> Self {
        Self {
            id: delivery.id.to_hex(),
            user: delivery.user.to_hex(),
            product: delivery.product.to_hex(),
            quantity: delivery.quantity,
            date: delivery.date,
            status: delivery.status,
            comments: delivery.comments,
            score: delivery.score,
        }
    }
}

/// Malformed ids resolve to the entity's not-found error.
pub fn parse_object_id(raw: &str, missing: ApiError) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| missing)
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    raw.parse::<NaiveDate>()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| ApiError::InvalidRequest(format!("invalid date: {raw}")))
}
