use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::{NotificationDestination, TrackedProduct};
use crate::store::{PriceStateUpdate, ProductStore};
use crate::{AppError, Result};

/// In-memory store. Used by tests and as the reference semantics for the
/// SQLite implementation. The write lock serializes price-state writes.
#[derive(Default)]
pub struct MemoryStore {
    products: RwLock<HashMap<String, TrackedProduct>>,
    destinations: RwLock<Vec<NotificationDestination>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn load_product(&self, id: &str) -> Result<Option<TrackedProduct>> {
        let products = self.products.read().await;
        Ok(products.get(id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<TrackedProduct>> {
        let products = self.products.read().await;
        let mut all: Vec<_> = products.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn insert_product(&self, product: &TrackedProduct) -> Result<()> {
        let mut products = self.products.write().await;
        products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn save_price_state(&self, id: &str, state: &PriceStateUpdate) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products.get_mut(id).ok_or_else(|| AppError::NotFound {
            resource: format!("product {id}"),
        })?;

        product.base_price = state.base_price;
        product.current_price = state.current_price;
        product.on_sale = state.on_sale;
        product.last_checked = Some(state.last_checked);
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_product(&self, id: &str) -> Result<bool> {
        let mut products = self.products.write().await;
        Ok(products.remove(id).is_some())
    }

    async fn list_destinations(&self) -> Result<Vec<NotificationDestination>> {
        let destinations = self.destinations.read().await;
        Ok(destinations.clone())
    }

    async fn add_destination(&self, destination: &NotificationDestination) -> Result<()> {
        let mut destinations = self.destinations.write().await;
        if !destinations.contains(destination) {
            destinations.push(destination.clone());
        }
        Ok(())
    }

    async fn remove_destination(&self, destination: &NotificationDestination) -> Result<bool> {
        let mut destinations = self.destinations.write().await;
        let before = destinations.len();
        destinations.retain(|d| d != destination);
        Ok(destinations.len() < before)
    }
}
