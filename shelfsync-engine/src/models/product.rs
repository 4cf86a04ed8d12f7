//! Normalized catalog product
//!
//! Built by an explicit mapping step from the catalog wire format
//! (see `services::catalog_client`). Only these fields are trusted downstream.

use serde::{Deserialize, Serialize};
use shelfsync_common::models::{ClothingType, ConditionGrade, Gender, ProductStatus};

/// One listed item as the catalog reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// External catalog id (origin product number)
    pub id: String,
    pub channel_product_no: Option<String>,
    pub name: String,
    /// Declared brand, or the brand parsed from the name
    pub brand: Option<String>,
    pub price: i64,
    pub discounted_price: Option<i64>,
    pub stock_quantity: i64,
    pub status: ProductStatus,
    /// Raw registration timestamp; parsed when aging
    pub registered_at: Option<String>,
    pub modified_at: Option<String>,
    pub image_urls: Vec<String>,
    pub category_id: Option<String>,
}

/// Attributes parsed out of the product name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductAttributes {
    pub brand: Option<String>,
    pub gender: Gender,
    pub size: Option<String>,
    pub clothing_type: ClothingType,
    pub clothing_subtype: Option<String>,
    pub grade: Option<ConditionGrade>,
}
