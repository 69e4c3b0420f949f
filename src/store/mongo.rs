//! MongoDB-backed store.
//!
//! Queries mirror the collection shapes in `crate::model`; the `active`
//! tombstone filter is appended here for every user/product read. Unique
//! username/email enforcement is delegated to Mongo unique indexes, created
//! once at startup by `ensure_indexes`.

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::info;

use crate::model::{Delivery, Product, User};

use super::{
    DateRange, DeliveryUpdate, NewDelivery, NewProduct, NewUser, ProductFilter, ProductUpdate,
    Store, StoreError, UserUpdate,
};

const USERS: &str = "users";
const PRODUCTS: &str = "products";
const DELIVERIES: &str = "deliveries";

#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self {
            db: client.database(database),
        })
    }

    /// Unique indexes backing the signup constraint on username and email.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        for field in ["username", "email"] {
            let index = IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.users().create_index(index).await?;
        }
        info!(collection = USERS, "unique indexes ensured");
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn products(&self) -> Collection<Product> {
        self.db.collection(PRODUCTS)
    }

    fn deliveries(&self) -> Collection<Delivery> {
        self.db.collection(DELIVERIES)
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = User {
            id: ObjectId::new(),
            username: user.username,
            email: user.email,
            password: user.password,
            name: user.name,
            lastname: user.lastname,
            phone: user.phone,
            address: user.address,
            active: true,
        };
        self.users()
            .insert_one(&user)
            .await
            .map_err(map_write_error)?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one(doc! { "_id": id, "active": true })
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one(doc! { "email": email, "active": true })
            .await?)
    }

    async fn update_user(&self, id: ObjectId, update: UserUpdate) -> Result<(), StoreError> {
        let mut set = Document::new();
        insert_some(&mut set, "username", update.username);
        insert_some(&mut set, "email", update.email);
        insert_some(&mut set, "password", update.password);
        insert_some(&mut set, "name", update.name);
        insert_some(&mut set, "lastname", update.lastname);
        insert_some(&mut set, "phone", update.phone);
        insert_some(&mut set, "address", update.address);
        if set.is_empty() {
            return Ok(());
        }
        self.users()
            .update_one(doc! { "_id": id, "active": true }, doc! { "$set": set })
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    async fn deactivate_user(&self, id: ObjectId) -> Result<(), StoreError> {
        self.users()
            .update_one(
                doc! { "_id": id, "active": true },
                doc! { "$set": { "active": false } },
            )
            .await?;
        Ok(())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let product = Product {
            id: ObjectId::new(),
            name: product.name,
            price: product.price,
            description: product.description,
            image: product.image,
            category: product.category,
            user: product.user,
            active: true,
        };
        self.products().insert_one(&product).await?;
        Ok(product)
    }

    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>, StoreError> {
        Ok(self
            .products()
            .find_one(doc! { "_id": id, "active": true })
            .await?)
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>, StoreError> {
        let mut query = doc! { "active": true };
        if let Some(category) = filter.category {
            query.insert("category", category);
        }
        if let Some(name) = filter.name {
            query.insert(
                "name",
                doc! { "$regex": regex::escape(&name), "$options": "i" },
            );
        }
        if let Some(owner) = filter.owner {
            query.insert("user", owner);
        }

        let products = self.products().find(query).await?.try_collect().await?;
        Ok(products)
    }

    async fn product_categories(&self, owner: ObjectId) -> Result<Vec<String>, StoreError> {
        let values = self
            .products()
            .distinct("category", doc! { "user": owner, "active": true })
            .await?;

        let mut categories = values
            .into_iter()
            .filter_map(|value| match value {
                Bson::String(category) => Some(category),
                _ => None,
            })
            .collect::<Vec<_>>();
        categories.sort();
        Ok(categories)
    }

    async fn update_product(&self, id: ObjectId, update: ProductUpdate) -> Result<(), StoreError> {
        let mut set = Document::new();
        insert_some(&mut set, "name", update.name);
        if let Some(price) = update.price {
            set.insert("price", price);
        }
        insert_some(&mut set, "description", update.description);
        insert_some(&mut set, "image", update.image);
        insert_some(&mut set, "category", update.category);
        if set.is_empty() {
            return Ok(());
        }
        self.products()
            .update_one(doc! { "_id": id, "active": true }, doc! { "$set": set })
            .await?;
        Ok(())
    }

    async fn deactivate_product(&self, id: ObjectId) -> Result<(), StoreError> {
        self.products()
            .update_one(
                doc! { "_id": id, "active": true },
                doc! { "$set": { "active": false } },
            )
            .await?;
        Ok(())
    }

    async fn create_delivery(&self, delivery: NewDelivery) -> Result<Delivery, StoreError> {
        let delivery = Delivery {
            id: ObjectId::new(),
            user: delivery.user,
            product: delivery.product,
            quantity: delivery.quantity,
            date: delivery.date,
            status: delivery.status,
            comments: delivery.comments,
            score: delivery.score,
        };
        self.deliveries().insert_one(&delivery).await?;
        Ok(delivery)
    }

    async fn find_delivery(&self, id: ObjectId) -> Result<Option<Delivery>, StoreError> {
        Ok(self.deliveries().find_one(doc! { "_id": id }).await?)
    }

    async fn list_deliveries(
        &self,
        owner: ObjectId,
        range: DateRange,
    ) -> Result<Vec<Delivery>, StoreError> {
        let mut query = doc! { "user": owner };
        let mut date = Document::new();
        if let Some(start) = range.start {
            date.insert("$gte", bson::DateTime::from_chrono(start));
        }
        if let Some(end) = range.end {
            date.insert("$lte", bson::DateTime::from_chrono(end));
        }
        if !date.is_empty() {
            query.insert("date", date);
        }

        let deliveries = self.deliveries().find(query).await?.try_collect().await?;
        Ok(deliveries)
    }

    async fn update_delivery(
        &self,
        id: ObjectId,
        update: DeliveryUpdate,
    ) -> Result<(), StoreError> {
        let mut set = Document::new();
        insert_some(&mut set, "comments", update.comments);
        if let Some(score) = update.score {
            set.insert("score", score);
        }
        if set.is_empty() {
            return Ok(());
        }
        self.deliveries()
            .update_one(doc! { "_id": id }, doc! { "$set": set })
            .await?;
        Ok(())
    }
}

fn insert_some(set: &mut Document, key: &str, value: Option<String>) {
    if let Some(value) = value {
        set.insert(key, value);
    }
}

/// Duplicate-key violations get their own error so the HTTP layer can
/// report them distinctly from driver failures.
fn map_write_error(error: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&error) {
        StoreError::Duplicate
    } else {
        StoreError::Database(error)
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == 11000
    )
}
