//! In-memory store backing the HTTP tests.
//!
//! Mirrors the MongoDB backend's observable behavior: unique
//! username/email across all user records (deleted ones included, like a
//! unique index), tombstone filtering on every user/product read, and
//! inclusive date-range listing for deliveries.

use async_trait::async_trait;
use bson::oid::ObjectId;
use dashmap::DashMap;

use crate::model::{Delivery, Product, User};

use super::{
    DateRange, DeliveryUpdate, NewDelivery, NewProduct, NewUser, ProductFilter, ProductUpdate,
    Store, StoreError, UserUpdate,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<ObjectId, User>,
    products: DashMap<ObjectId, Product>,
    deliveries: DashMap<ObjectId, Delivery>,
}

impl MemoryStore {
    fn username_or_email_taken(&self, username: &str, email: &str, except: Option<ObjectId>) -> bool {
        self.users.iter().any(|entry| {
            Some(entry.id) != except && (entry.username == username || entry.email == email)
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        if self.username_or_email_taken(&user.username, &user.email, None) {
            return Err(StoreError::Duplicate);
        }
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
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .get(&id)
            .filter(|user| user.active)
            .map(|user| user.value().clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|user| user.active && user.email == email)
            .map(|user| user.value().clone()))
    }

    async fn update_user(&self, id: ObjectId, update: UserUpdate) -> Result<(), StoreError> {
        let Some(current) = self
            .users
            .get(&id)
            .filter(|user| user.active)
            .map(|user| user.value().clone())
        else {
            return Ok(());
        };

        let username = update.username.unwrap_or(current.username);
        let email = update.email.unwrap_or(current.email);
        if self.username_or_email_taken(&username, &email, Some(id)) {
            return Err(StoreError::Duplicate);
        }

        if let Some(mut user) = self.users.get_mut(&id) {
            user.username = username;
            user.email = email;
            if let Some(password) = update.password {
                user.password = password;
            }
            if let Some(name) = update.name {
                user.name = name;
            }
            if let Some(lastname) = update.lastname {
                user.lastname = lastname;
            }
            if let Some(phone) = update.phone {
                user.phone = phone;
            }
            if let Some(address) = update.address {
                user.address = address;
            }
        }
        Ok(())
    }

    async fn deactivate_user(&self, id: ObjectId) -> Result<(), StoreError> {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.active = false;
        }
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
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>, StoreError> {
        Ok(self
            .products
            .get(&id)
            .filter(|product| product.active)
            .map(|product| product.value().clone()))
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>, StoreError> {
        let needle = filter.name.map(|name| name.to_lowercase());
        let mut products = self
            .products
            .iter()
            .filter(|product| product.active)
            .filter(|product| {
                filter
                    .category
                    .as_deref()
                    .map_or(true, |category| product.category == category)
            })
            .filter(|product| {
                needle
                    .as_deref()
                    .map_or(true, |needle| product.name.to_lowercase().contains(needle))
            })
            .filter(|product| filter.owner.map_or(true, |owner| product.user == owner))
            .map(|product| product.value().clone())
            .collect::<Vec<_>>();
        products.sort_by_key(|product| product.id);
        Ok(products)
    }

    async fn product_categories(&self, owner: ObjectId) -> Result<Vec<String>, StoreError> {
        let mut categories = self
            .products
            .iter()
            .filter(|product| product.active && product.user == owner)
            .map(|product| product.category.clone())
            .collect::<Vec<_>>();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn update_product(&self, id: ObjectId, update: ProductUpdate) -> Result<(), StoreError> {
        if let Some(mut product) = self.products.get_mut(&id).filter(|product| product.active) {
            if let Some(name) = update.name {
                product.name = name;
            }
            if let Some(price) = update.price {
                product.price = price;
            }
            if let Some(description) = update.description {
                product.description = description;
            }
            if let Some(image) = update.image {
                product.image = image;
            }
            if let Some(category) = update.category {
                product.category = category;
            }
        }
        Ok(())
    }

    async fn deactivate_product(&self, id: ObjectId) -> Result<(), StoreError> {
        if let Some(mut product) = self.products.get_mut(&id) {
            product.active = false;
        }
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
        self.deliveries.insert(delivery.id, delivery.clone());
        Ok(delivery)
    }

    async fn find_delivery(&self, id: ObjectId) -> Result<Option<Delivery>, StoreError> {
        Ok(self.deliveries.get(&id).map(|delivery| delivery.value().clone()))
    }

    async fn list_deliveries(
        &self,
        owner: ObjectId,
        range: DateRange,
    ) -> Result<Vec<Delivery>, StoreError> {
        let mut deliveries = self
            .deliveries
            .iter()
            .filter(|delivery| delivery.user == owner)
            .filter(|delivery| range.start.map_or(true, |start| delivery.date >= start))
            .filter(|delivery| range.end.map_or(true, |end| delivery.date <= end))
            .map(|delivery| delivery.value().clone())
            .collect::<Vec<_>>();
        deliveries.sort_by_key(|delivery| delivery.id);
        Ok(deliveries)
    }

    async fn update_delivery(
        &self,
        id: ObjectId,
        update: DeliveryUpdate,
    ) -> Result<(), StoreError> {
        if let Some(mut delivery) = self.deliveries.get_mut(&id) {
            if let Some(comments) = update.comments {
                delivery.comments = Some(comments);
            }
            if let Some(score) = update.score {
                delivery.score = Some(score);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use bson::oid::ObjectId;
    use chrono::{TimeZone, Utc};

    use crate::model::DeliveryStatus;
    use crate::store::{
        DateRange, NewDelivery, NewProduct, NewUser, ProductFilter, Store, StoreError,
    };

    use super::MemoryStore;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: String::from(username),
            email: String::from(email),
            password: String::from("$2b$12$hash"),
            name: String::from("Test"),
            lastname: String::from("User"),
            phone: String::from("555-0100"),
            address: String::from("1 Main St"),
        }
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let store = MemoryStore::default();
        store.create_user(new_user("alice", "alice@example.com")).await.unwrap();

        let same_username = store.create_user(new_user("alice", "other@example.com")).await;
        assert!(matches!(same_username, Err(StoreError::Duplicate)));

        let same_email = store.create_user(new_user("bob", "alice@example.com")).await;
        assert!(matches!(same_email, Err(StoreError::Duplicate)));
    }

    #[tokio::test]
    async fn deactivated_user_is_invisible_but_still_reserves_identity() {
        let store = MemoryStore::default();
        let user = store.create_user(new_user("alice", "alice@example.com")).await.unwrap();
        store.deactivate_user(user.id).await.unwrap();

        assert!(store.find_user_by_id(user.id).await.unwrap().is_none());
        assert!(store
            .find_user_by_email("alice@example.com")
            .await
            .unwrap()
            .is_none());

        let reuse = store.create_user(new_user("alice", "alice@example.com")).await;
        assert!(matches!(reuse, Err(StoreError::Duplicate)));
    }

    #[tokio::test]
    async fn product_name_filter_is_case_insensitive_substring() {
        let store = MemoryStore::default();
        let owner = store.create_user(new_user("alice", "alice@example.com")).await.unwrap();
        for name in ["Yerba Mate", "Coffee", "mate cup"] {
            store
                .create_product(NewProduct {
                    name: String::from(name),
                    price: 5.0,
                    description: String::new(),
                    image: String::new(),
                    category: String::from("kitchen"),
                    user: owner.id,
                })
                .await
                .unwrap();
        }

        let matches = store
            .list_products(ProductFilter {
                name: Some(String::from("MATE")),
                ..ProductFilter::default()
            })
            .await
            .unwrap();

        let names = matches.iter().map(|product| product.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Yerba Mate", "mate cup"]);
    }

    #[tokio::test]
    async fn delivery_range_is_inclusive_and_owner_scoped() {
        let store = MemoryStore::default();
        let alice = store.create_user(new_user("alice", "alice@example.com")).await.unwrap();
        let bob = store.create_user(new_user("bob", "bob@example.com")).await.unwrap();
        let product = ObjectId::new();

        let days = [1, 15, 31];
        for day in days {
            store
                .create_delivery(NewDelivery {
                    user: alice.id,
                    product,
                    quantity: 1,
                    date: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
                    status: DeliveryStatus::Pending,
                    comments: None,
                    score: None,
                })
                .await
                .unwrap();
        }
        store
            .create_delivery(NewDelivery {
                user: bob.id,
                product,
                quantity: 1,
                date: Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
                status: DeliveryStatus::Pending,
                comments: None,
                score: None,
            })
            .await
            .unwrap();

        let range = DateRange {
            start: Some(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()),
        };
        let listed = store.list_deliveries(alice.id, range).await.unwrap();

        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|delivery| delivery.user == alice.id));
    }
}
