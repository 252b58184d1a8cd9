use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Emitted by the refresh engine for at most one notification-worthy price
/// transition per refresh. Ephemeral; handed straight to the fanout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceChangeEvent {
    pub product_id: String,
    pub old_effective_price: Decimal,
    pub new_effective_price: Decimal,
    pub new_base_price: Decimal,
    pub produced_at: DateTime<Utc>,
}

impl PriceChangeEvent {
    pub fn drop_amount(&self) -> Decimal {
        self.old_effective_price - self.new_effective_price
    }

    /// Percentage off the page's stated base price, when the base is non-zero.
    pub fn discount_percent(&self) -> Option<f64> {
        if self.new_base_price.is_zero() {
            return None;
        }
        let off = (self.new_base_price - self.new_effective_price) / self.new_base_price
            * Decimal::from(100);
        off.to_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn event(old: &str, new: &str, base: &str) -> PriceChangeEvent {
        PriceChangeEvent {
            product_id: "p1".to_string(),
            old_effective_price: dec(old),
            new_effective_price: dec(new),
            new_base_price: dec(base),
            produced_at: Utc::now(),
        }
    }

    #[test]
    fn test_drop_amount() {
        assert_eq!(event("100.00", "80.00", "100.00").drop_amount(), dec("20.00"));
    }

    #[test]
    fn test_discount_percent() {
        let percent = event("1999.00", "999.00", "1999.00")
            .discount_percent()
            .unwrap();
        assert!((percent - 50.02).abs() < 0.01);
    }

    #[test]
    fn test_discount_percent_zero_base() {
        assert_eq!(event("1.00", "0.00", "0").discount_percent(), None);
    }
}
