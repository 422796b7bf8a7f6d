//! Upstream response payloads
//!
//! Only the fields the harvester reads are modelled; serde ignores the rest.
//! Everything except the identifiers defaults when missing, since the upstream
//! is loose about nulls.

use serde::{Deserialize, Deserializer};

/// Treats an explicit `null` like a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Paginated response envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub last: bool,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub empty: bool,
}

impl<T> Page<T> {
    /// Builds a page from its items and last-page flag
    pub fn new(content: Vec<T>, last: bool) -> Self {
        let empty = content.is_empty();
        Self {
            total_elements: content.len() as u64,
            content,
            total_pages: 0,
            last,
            first: false,
            empty,
        }
    }
}

/// Top-level category with its subcategories
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub code: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name_english: String,
    #[serde(default, deserialize_with = "nullable")]
    pub product_category_responses: Vec<SubcategoryResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryResponse {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub code: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name_english: String,
}

/// District / region
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionResponse {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

/// Retail chain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompanyResponse {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

/// Product as listed under a category
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub product_master_id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub code: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub discount: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub start_price: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub previous_price: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub product_category_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub product_category_name_english: String,
    #[serde(default, deserialize_with = "nullable")]
    pub number_of_chains: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub product_main_photo_url: String,
}

/// Retail branch carrying the price of one product
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetailBranchResponse {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub land_phone: String,
    #[serde(default, deserialize_with = "nullable")]
    pub postal_address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub company_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub branch_latitude: String,
    #[serde(default, deserialize_with = "nullable")]
    pub branch_longitude: String,
    #[serde(default, deserialize_with = "nullable")]
    pub retailer_product_price: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub retailer_initial_product_price: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub is_in_offer_or_discount: bool,
}
