//! Catalog types: products and their stock rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ProductId, StockId};

/// A catalog entry. Read-only in the order flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product id.
    pub id: ProductId,

    /// Display name.
    pub name: String,

    /// Long description for the product page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Category slug (e.g. "outerwear").
    pub category: String,

    /// Listed price in cents. Stock rows may override per variant.
    pub price_cents: i64,

    /// Image URLs. The storefront resolves these against object storage;
    /// the order flow never touches the bytes.
    #[serde(default)]
    pub images: Vec<String>,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Create a new catalog entry.
    #[must_use]
    pub fn new(name: String, category: String, price_cents: i64) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::generate(),
            name,
            description: None,
            category,
            price_cents,
            images: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Set the image URLs.
    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// A stock row: the purchasable quantity of one product variant.
///
/// Stock rows are the only shared mutable state in the order flow. All
/// quantity changes go through a signed delta applied under a row lock,
/// never a read-then-overwrite of the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    /// Stock row id.
    pub id: StockId,

    /// The product this row belongs to.
    pub product_id: ProductId,

    /// Variant label (e.g. "M", "38", "natural dye").
    pub label: String,

    /// Units on hand. Never negative.
    pub quantity: i64,

    /// Price in cents for this variant.
    pub price_cents: i64,

    /// When the row was created.
    pub created_at: DateTime<Utc>,

    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    /// Create a new stock row.
    #[must_use]
    pub fn new(product_id: ProductId, label: String, quantity: i64, price_cents: i64) -> Self {
        let now = Utc::now();
        Self {
            id: StockId::generate(),
            product_id,
            label,
            quantity,
            price_cents,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the row can satisfy a consumption of `quantity` units.
    #[must_use]
    pub const fn has_available(&self, quantity: i64) -> bool {
        self.quantity >= quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_builder() {
        let product = Product::new("Hemp overshirt".into(), "outerwear".into(), 8900)
            .with_description("Undyed hemp twill".into())
            .with_images(vec!["products/hemp-overshirt/front.webp".into()]);

        assert_eq!(product.price_cents, 8900);
        assert_eq!(product.images.len(), 1);
        assert!(product.description.is_some());
    }

    #[test]
    fn stock_availability() {
        let stock = Stock::new(ProductId::generate(), "M".into(), 3, 8900);
        assert!(stock.has_available(3));
        assert!(!stock.has_available(4));
        assert!(stock.has_available(0));
    }
}
