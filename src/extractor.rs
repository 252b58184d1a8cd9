use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;

use crate::models::PriceObservation;
use crate::{AppError, Result};

/// Extracts a canonical price from raw product page markup.
///
/// A page presents its price in one of two mutually exclusive layouts: a
/// discount layout with both the original and the reduced price, or a plain
/// layout with a single price. The discount layout wins when present, and a
/// malformed discount block fails the whole extraction rather than being
/// half-trusted.
pub struct PriceExtractor {
    price_token: Regex,
    discount_original: Selector,
    discount_final: Selector,
    plain_price: Selector,
    app_title: Selector,
    page_title: Selector,
}

impl Default for PriceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceExtractor {
    pub fn new() -> Self {
        PriceExtractor {
            price_token: Regex::new(r"-?\d[\d\u{00a0}\u{202f} .,]*").unwrap(),
            discount_original: Selector::parse(".discount_original_price").unwrap(),
            discount_final: Selector::parse(".discount_final_price").unwrap(),
            plain_price: Selector::parse(".game_purchase_price, .price").unwrap(),
            app_title: Selector::parse(".apphub_AppName").unwrap(),
            page_title: Selector::parse("title").unwrap(),
        }
    }

    pub fn extract(&self, page_content: &str) -> Result<PriceObservation> {
        let document = Html::parse_document(page_content);

        let original = document.select(&self.discount_original).next();
        let reduced = document.select(&self.discount_final).next();

        if original.is_some() || reduced.is_some() {
            // Discount layout: both sub-values must be present and well formed.
            let original = original.ok_or_else(|| {
                AppError::Extraction("discount block is missing the original price".to_string())
            })?;
            let reduced = reduced.ok_or_else(|| {
                AppError::Extraction("discount block is missing the reduced price".to_string())
            })?;

            let base_price = self.parse_price(&element_text(original))?;
            let discount_price = self.parse_price(&element_text(reduced))?;
            if discount_price > base_price {
                return Err(AppError::Extraction(format!(
                    "discount price {discount_price} exceeds original price {base_price}"
                )));
            }

            return Ok(PriceObservation {
                base_price,
                discount_price: Some(discount_price),
            });
        }

        if let Some(element) = document.select(&self.plain_price).next() {
            let base_price = self.parse_price(&element_text(element))?;
            return Ok(PriceObservation {
                base_price,
                discount_price: None,
            });
        }

        Err(AppError::Extraction(
            "no recognizable price markup on page".to_string(),
        ))
    }

    /// Product title for notification messages. Falls back from the store's
    /// app name element to the document title.
    pub fn extract_title(&self, page_content: &str) -> Option<String> {
        let document = Html::parse_document(page_content);
        for selector in [&self.app_title, &self.page_title] {
            if let Some(element) = document.select(selector).next() {
                let title = element_text(element);
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
        None
    }

    /// Parses a localized price string into a non-negative decimal.
    ///
    /// Currency symbols and grouping spaces are stripped; the last `,` or `.`
    /// is the decimal separator, earlier ones are thousands grouping. Both
    /// "1 999,00 ₽" and "$1,299.99" parse this way.
    fn parse_price(&self, text: &str) -> Result<Decimal> {
        let token = self
            .price_token
            .find(text)
            .ok_or_else(|| AppError::Extraction(format!("no numeric price in {text:?}")))?
            .as_str();

        if text.trim_start().starts_with('-') || token.starts_with('-') {
            return Err(AppError::Extraction(format!("negative price in {text:?}")));
        }

        let cleaned: String = token
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
            .collect();
        let cleaned = cleaned.trim_end_matches(['.', ',']);

        let normalized = match cleaned.rfind([',', '.']) {
            Some(index) => {
                let integer: String = cleaned[..index]
                    .chars()
                    .filter(char::is_ascii_digit)
                    .collect();
                format!("{integer}.{}", &cleaned[index + 1..])
            }
            None => cleaned.to_string(),
        };

        let price = Decimal::from_str(&normalized)
            .map_err(|e| AppError::Extraction(format!("unparseable price {text:?}: {e}")))?;
        if price.is_sign_negative() {
            return Err(AppError::Extraction(format!("negative price in {text:?}")));
        }
        Ok(price)
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
