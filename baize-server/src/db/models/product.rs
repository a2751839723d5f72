//! Product Model

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Product category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCategory {
    Drinks,
    Beers,
    Snacks,
    Meals,
    Other,
}

impl Default for ProductCategory {
    fn default() -> Self {
        Self::Other
    }
}

/// Product entity (consumables sold against a table session)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: ProductCategory,
    pub price: f64,
    pub stock: i64,
    /// Display hint for the UI (emoji or image URL)
    pub image: Option<String>,
    /// Soft-delete flag: inactive products are hidden and unsellable
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create product payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductCreate {
    #[validate(length(min = 1, message = "product name is required"))]
    pub name: String,
    #[serde(default)]
    pub category: ProductCategory,
    #[validate(range(min = 0.0, message = "price cannot be negative"))]
    pub price: f64,
    #[serde(default)]
    #[validate(range(min = 0, message = "stock cannot be negative"))]
    pub stock: i64,
    pub image: Option<String>,
}

/// Update product payload
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProductUpdate {
    #[validate(length(min = 1, message = "product name cannot be empty"))]
    pub name: Option<String>,
    pub category: Option<ProductCategory>,
    #[validate(range(min = 0.0, message = "price cannot be negative"))]
    pub price: Option<f64>,
    #[validate(range(min = 0, message = "stock cannot be negative"))]
    pub stock: Option<i64>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}
