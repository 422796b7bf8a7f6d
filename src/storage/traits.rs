//! Storage traits and error types
//!
//! This module defines the persistence gateway the orchestrator writes
//! through, and the errors it can raise.

use crate::storage::{
    CategoryRecord, NewCategory, NewPrice, NewProduct, NewStore, PriceRecord, ProductRecord,
    RowCounts, StoreRecord,
};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence gateway for scraped data
///
/// Each call is its own statement; nothing spans a stage, so a failed write
/// affects only the record it was writing.
pub trait Storage {
    // ===== Reference entities (idempotent upserts) =====

    /// Inserts or updates a category keyed by external id
    ///
    /// On conflict every mutable field and `updated_at` are overwritten.
    ///
    /// # Returns
    ///
    /// The internal id, stable across repeated upserts of the same external id
    fn upsert_category(&mut self, category: &NewCategory) -> StorageResult<Uuid>;

    /// Inserts or updates a product keyed by external id
    fn upsert_product(&mut self, product: &NewProduct) -> StorageResult<Uuid>;

    /// Inserts or updates a store keyed by external id
    ///
    /// An empty or missing district never replaces a stored one; every
    /// other field is overwritten.
    fn upsert_store(&mut self, store: &NewStore) -> StorageResult<Uuid>;

    // ===== Price history (append-only) =====

    /// Inserts a new price row; never conflicts
    fn insert_price(&mut self, price: &NewPrice) -> StorageResult<Uuid>;

    // ===== Reads =====

    fn get_category(&self, external_id: i64) -> StorageResult<Option<CategoryRecord>>;

    fn get_product(&self, external_id: i64) -> StorageResult<Option<ProductRecord>>;

    fn get_store(&self, external_id: i64) -> StorageResult<Option<StoreRecord>>;

    /// Gets the price history of a product, oldest first
    fn prices_for_product(&self, product_id: Uuid) -> StorageResult<Vec<PriceRecord>>;

    /// Counts rows in each table
    fn count_rows(&self) -> StorageResult<RowCounts>;
}
