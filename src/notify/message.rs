use crate::models::{PriceChangeEvent, TrackedProduct};

/// Renders the drop notification text. Deterministic for a given product and
/// event: title, new effective price, old price, and the product link.
pub fn render(product: &TrackedProduct, event: &PriceChangeEvent) -> String {
    let mut text = format!(
        "📉 {} is on sale: {} (was {})",
        product.title, event.new_effective_price, event.old_effective_price
    );

    if let Some(percent) = event.discount_percent() {
        if percent >= 1.0 {
            text.push_str(&format!(" — {percent:.0}% off"));
        }
    }

    text.push('\n');
    text.push_str(&product.url);
    text
}
