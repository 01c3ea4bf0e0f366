//! DigiKey Product Search v3 wire types (PascalCase JSON).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct KeywordSearchRequest {
    pub keywords: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct KeywordSearchResponse {
    pub products: Vec<Product>,
    pub products_count: u32,
    pub exact_manufacturer_products_count: u32,
}

/// Parameter/value pair used for manufacturer, category, family and parameters
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct PidVid {
    pub parameter_id: i64,
    pub value_id: String,
    pub parameter: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct PriceBreak {
    pub break_quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Product {
    pub digi_key_part_number: String,
    pub quantity_available: i64,
    pub manufacturer: PidVid,
    pub manufacturer_part_number: String,
    pub primary_datasheet: String,
    pub primary_photo: String,
    pub product_description: String,
    pub detailed_description: String,
    pub minimum_order_quantity: i64,
    pub non_stock: bool,
    pub unit_price: f64,
    pub standard_pricing: Vec<PriceBreak>,
    pub product_status: String,
    pub product_url: String,
    pub category: PidVid,
    pub family: PidVid,
    pub parameters: Vec<PidVid>,
}
