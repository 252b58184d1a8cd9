use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

use crate::extractor::PriceExtractor;
use crate::fetch::PageFetcher;
use crate::models::{NewProduct, PriceChangeEvent, PriceObservation, TrackedProduct};
use crate::store::{PriceStateUpdate, ProductStore};
use crate::{AppError, Result};

/// Outcome of one refresh cycle for one product. Fetch and extraction
/// failures are recoverable per-product conditions, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshResult {
    Updated {
        product: TrackedProduct,
        event: Option<PriceChangeEvent>,
    },
    NotFound,
    FetchFailed { error: String },
    ExtractionFailed { error: String },
}

/// Orchestrates fetch, extraction, reconciliation against stored state,
/// persistence, and event emission for tracked products.
pub struct PriceRefreshEngine {
    store: Arc<dyn ProductStore>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: PriceExtractor,
}

impl PriceRefreshEngine {
    pub fn new(store: Arc<dyn ProductStore>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            store,
            fetcher,
            extractor: PriceExtractor::new(),
        }
    }

    /// Start tracking a product page. The first extraction must succeed;
    /// a page we cannot price is never persisted.
    pub async fn track(&self, url: &str) -> Result<TrackedProduct> {
        Url::parse(url).map_err(|e| AppError::Validation(format!("invalid URL {url}: {e}")))?;

        let page = self.fetcher.fetch(url).await?;
        let observation = self.extractor.extract(&page)?;
        let title = self
            .extractor
            .extract_title(&page)
            .unwrap_or_else(|| url.to_string());

        let product = TrackedProduct::new(NewProduct {
            title,
            url: url.to_string(),
            observation,
        });
        self.store.insert_product(&product).await?;

        info!(
            product_id = %product.id,
            title = %product.title,
            price = %product.current_price,
            "tracking new product"
        );
        Ok(product)
    }

    pub async fn untrack(&self, product_id: &str) -> Result<bool> {
        let removed = self.store.delete_product(product_id).await?;
        if removed {
            info!(product_id, "stopped tracking product");
        }
        Ok(removed)
    }

    /// One refresh cycle: fetch, extract, reconcile, persist. Stored state is
    /// only touched on a successful extraction; stale data beats corrupt data.
    pub async fn refresh(&self, product_id: &str) -> Result<RefreshResult> {
        let Some(product) = self.store.load_product(product_id).await? else {
            return Ok(RefreshResult::NotFound);
        };

        let page = match self.fetcher.fetch(&product.url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(product_id, error = %e, "fetch failed, keeping stored price state");
                return Ok(RefreshResult::FetchFailed {
                    error: e.to_string(),
                });
            }
        };

        let observation = match self.extractor.extract(&page) {
            Ok(observation) => observation,
            Err(e) => {
                error!(product_id, error = %e, "extraction failed, keeping stored price state");
                return Ok(RefreshResult::ExtractionFailed {
                    error: e.to_string(),
                });
            }
        };

        let event = reconcile(&product, &observation);
        let state = PriceStateUpdate::from_observation(&observation, Utc::now());
        self.store.save_price_state(product_id, &state).await?;

        if let Some(event) = &event {
            info!(
                product_id,
                old = %event.old_effective_price,
                new = %event.new_effective_price,
                "price drop detected"
            );
        }

        let mut updated = product;
        updated.base_price = state.base_price;
        updated.current_price = state.current_price;
        updated.on_sale = state.on_sale;
        updated.last_checked = Some(state.last_checked);

        Ok(RefreshResult::Updated {
            product: updated,
            event,
        })
    }
}

/// Drop-event policy: fire only for a discounted observation priced strictly
/// below the stored effective price. That is once when a sale starts, and
/// again on each further cut while the sale runs. A sale ending clears the
/// flag silently, and undiscounted catalog price moves never notify.
fn reconcile(product: &TrackedProduct, observation: &PriceObservation) -> Option<PriceChangeEvent> {
    let new_effective = observation.effective_price();
    if observation.is_discounted() && new_effective < product.current_price {
        Some(PriceChangeEvent {
            product_id: product.id.clone(),
            old_effective_price: product.current_price,
            new_effective_price: new_effective,
            new_base_price: observation.base_price,
            produced_at: Utc::now(),
        })
    } else {
        None
    }
}
