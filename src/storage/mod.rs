//! Storage module for persisting scraped data
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent upserts for categories, products, and stores
//! - Append-only price history
//! - Row counts for the `--stats` report

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{parse_database_url, DatabaseLocation, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use uuid::Uuid;

/// Opens the storage database named by a connection string
///
/// # Arguments
///
/// * `url` - A file path, `sqlite://<path>`, or `:memory:`
pub fn open_storage(url: &str) -> StorageResult<SqliteStorage> {
    SqliteStorage::open(url)
}

/// Category as written by the categories stage
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub external_id: i64,
    pub code: String,
    pub name: String,
    pub name_english: String,
    /// Internal id of the parent; `None` for top-level categories
    pub parent_id: Option<Uuid>,
}

/// Product as written by the products stage
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub external_id: i64,
    pub code: String,
    pub name: String,
    pub name_english: String,
    pub category_id: Uuid,
}

/// Store (retail branch) as written by the prices stage
#[derive(Debug, Clone, PartialEq)]
pub struct NewStore {
    pub external_id: i64,
    pub name: String,
    pub chain: String,
    pub district: Option<String>,
    pub location: String,
}

/// One observed price
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrice {
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub price: f64,
}

/// Represents a category in the database
#[derive(Debug, Clone)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub external_id: i64,
    pub code: String,
    pub name: String,
    pub name_english: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

/// Represents a product in the database
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub id: Uuid,
    pub external_id: i64,
    pub code: String,
    pub name: String,
    pub name_english: Option<String>,
    pub category_id: Uuid,
    pub updated_at: String,
}

/// Represents a store in the database
#[derive(Debug, Clone)]
pub struct StoreRecord {
    pub id: Uuid,
    pub external_id: i64,
    pub name: String,
    pub chain: String,
    pub district: Option<String>,
    pub location: String,
}

/// Represents a price history row
#[derive(Debug, Clone)]
pub struct PriceRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub price: f64,
    pub scraped_at: String,
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub categories: u64,
    pub products: u64,
    pub stores: u64,
    pub prices: u64,
}
