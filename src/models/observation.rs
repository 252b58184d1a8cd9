use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One extraction's view of a product page. Not persisted; the store only
/// ever sees it through the refresh path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceObservation {
    /// The page's stated undiscounted catalog price.
    pub base_price: Decimal,
    /// Present iff the page showed an active discount layout.
    pub discount_price: Option<Decimal>,
}

impl PriceObservation {
    /// The price actually payable now.
    pub fn effective_price(&self) -> Decimal {
        self.discount_price.unwrap_or(self.base_price)
    }

    pub fn is_discounted(&self) -> bool {
        self.discount_price.is_some()
    }
}
