use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{NotificationDestination, PriceObservation, TrackedProduct};
use crate::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// The price fields written back after a successful refresh. The store is the
/// sole writer of these fields; nothing else mutates them directly.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceStateUpdate {
    pub base_price: Decimal,
    pub current_price: Decimal,
    pub on_sale: bool,
    pub last_checked: DateTime<Utc>,
}

impl PriceStateUpdate {
    pub fn from_observation(observation: &PriceObservation, checked_at: DateTime<Utc>) -> Self {
        Self {
            base_price: observation.base_price,
            current_price: observation.effective_price(),
            on_sale: observation.is_discounted(),
            last_checked: checked_at,
        }
    }
}

/// Data-access collaborator for tracked products and notification
/// destinations.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn load_product(&self, id: &str) -> Result<Option<TrackedProduct>>;
    async fn list_products(&self) -> Result<Vec<TrackedProduct>>;
    async fn insert_product(&self, product: &TrackedProduct) -> Result<()>;
    /// Fails with `AppError::NotFound` when the product no longer exists.
    async fn save_price_state(&self, id: &str, state: &PriceStateUpdate) -> Result<()>;
    async fn delete_product(&self, id: &str) -> Result<bool>;

    async fn list_destinations(&self) -> Result<Vec<NotificationDestination>>;
    async fn add_destination(&self, destination: &NotificationDestination) -> Result<()>;
    async fn remove_destination(&self, destination: &NotificationDestination) -> Result<bool>;
}
