use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{generate_id, PriceObservation};

/// A store page under price tracking.
///
/// Price fields are written only through the store's refresh path; the URL is
/// immutable after creation. `on_sale` implies `current_price <= base_price`,
/// and with no active discount the two are equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedProduct {
    pub id: String,
    pub title: String,
    pub url: String,

    // Price state, reconciled every refresh
    pub base_price: Decimal,
    pub current_price: Decimal,
    pub on_sale: bool,
    pub last_checked: Option<DateTime<Utc>>,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub url: String,
    pub observation: PriceObservation,
}

impl TrackedProduct {
    /// Creation requires a successful extraction; a page we could not price
    /// never becomes a tracked product.
    pub fn new(new_product: NewProduct) -> Self {
        let now = Utc::now();
        let observation = new_product.observation;
        Self {
            id: generate_id(),
            title: new_product.title,
            url: new_product.url,
            base_price: observation.base_price,
            current_price: observation.effective_price(),
            on_sale: observation.is_discounted(),
            last_checked: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn effective_price(&self) -> Decimal {
        self.current_price
    }
}
