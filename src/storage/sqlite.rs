//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Internal ids are UUIDv4 strings minted on insert; every upsert returns the
//! id of the row that ended up stored, so a conflicting upsert hands back the
//! id issued on first insert.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CategoryRecord, NewCategory, NewPrice, NewProduct, NewStore, PriceRecord, ProductRecord,
    RowCounts, StoreRecord,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where a connection string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

/// Parses a database connection string
///
/// Accepts `:memory:`, `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>`,
/// or a bare file path. Any other URL scheme is rejected.
pub fn parse_database_url(url: &str) -> StorageResult<DatabaseLocation> {
    let url = url.trim();
    if url.is_empty() {
        return Err(StorageError::InvalidUrl("empty connection string".to_string()));
    }

    if url == ":memory:" || url == "sqlite::memory:" {
        return Ok(DatabaseLocation::Memory);
    }

    if let Some(path) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    {
        if path.is_empty() {
            return Err(StorageError::InvalidUrl(url.to_string()));
        }
        return Ok(DatabaseLocation::File(PathBuf::from(path)));
    }

    if url.contains("://") {
        return Err(StorageError::InvalidUrl(format!(
            "unsupported scheme in '{}', expected sqlite:// or a file path",
            url
        )));
    }

    Ok(DatabaseLocation::File(PathBuf::from(url)))
}

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database named by a connection string
    ///
    /// # Arguments
    ///
    /// * `url` - Connection string, see [`parse_database_url`]
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(url: &str) -> StorageResult<Self> {
        match parse_database_url(url)? {
            DatabaseLocation::Memory => Self::open_in_memory(),
            DatabaseLocation::File(path) => Self::new(&path),
        }
    }

    /// Opens or creates a database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, table: &str) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }
}

/// Reads a UUID stored as text
fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        Uuid::parse_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Empty strings are stored as NULL for optional text columns
fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

impl Storage for SqliteStorage {
    // ===== Reference entities =====

    fn upsert_category(&mut self, category: &NewCategory) -> StorageResult<Uuid> {
        let now = Utc::now().to_rfc3339();
        let id = self.conn.query_row(
            "INSERT INTO categories
                 (id, external_id, code, name, name_english, parent_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (external_id) DO UPDATE SET
                 code = excluded.code,
                 name = excluded.name,
                 name_english = excluded.name_english,
                 parent_id = excluded.parent_id,
                 updated_at = excluded.updated_at
             RETURNING id",
            params![
                Uuid::new_v4().to_string(),
                category.external_id,
                category.code,
                category.name,
                non_empty(&category.name_english),
                category.parent_id.map(|id| id.to_string()),
                now
            ],
            |row| uuid_at(row, 0),
        )?;
        Ok(id)
    }

    fn upsert_product(&mut self, product: &NewProduct) -> StorageResult<Uuid> {
        let now = Utc::now().to_rfc3339();
        let id = self.conn.query_row(
            "INSERT INTO products
                 (id, external_id, code, name, name_english, category_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (external_id) DO UPDATE SET
                 code = excluded.code,
                 name = excluded.name,
                 name_english = excluded.name_english,
                 category_id = excluded.category_id,
                 updated_at = excluded.updated_at
             RETURNING id",
            params![
                Uuid::new_v4().to_string(),
                product.external_id,
                product.code,
                product.name,
                non_empty(&product.name_english),
                product.category_id.to_string(),
                now
            ],
            |row| uuid_at(row, 0),
        )?;
        Ok(id)
    }

    fn upsert_store(&mut self, store: &NewStore) -> StorageResult<Uuid> {
        let now = Utc::now().to_rfc3339();
        let id = self.conn.query_row(
            "INSERT INTO stores
                 (id, external_id, name, chain, district, location, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (external_id) DO UPDATE SET
                 name = excluded.name,
                 chain = excluded.chain,
                 district = COALESCE(excluded.district, stores.district),
                 location = excluded.location,
                 updated_at = excluded.updated_at
             RETURNING id",
            params![
                Uuid::new_v4().to_string(),
                store.external_id,
                store.name,
                store.chain,
                store.district.as_deref().and_then(non_empty),
                store.location,
                now
            ],
            |row| uuid_at(row, 0),
        )?;
        Ok(id)
    }

    // ===== Price history =====

    fn insert_price(&mut self, price: &NewPrice) -> StorageResult<Uuid> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO prices (id, product_id, store_id, price, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                price.product_id.to_string(),
                price.store_id.to_string(),
                price.price,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(id)
    }

    // ===== Reads =====

    fn get_category(&self, external_id: i64) -> StorageResult<Option<CategoryRecord>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, external_id, code, name, name_english, parent_id, created_at, updated_at
                 FROM categories WHERE external_id = ?1",
                params![external_id],
                |row| {
                    Ok(CategoryRecord {
                        id: uuid_at(row, 0)?,
                        external_id: row.get(1)?,
                        code: row.get(2)?,
                        name: row.get(3)?,
                        name_english: row.get(4)?,
                        parent_id: optional_uuid_at(row, 5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()?;

        Ok(category)
    }

    fn get_product(&self, external_id: i64) -> StorageResult<Option<ProductRecord>> {
        let product = self
            .conn
            .query_row(
                "SELECT id, external_id, code, name, name_english, category_id, updated_at
                 FROM products WHERE external_id = ?1",
                params![external_id],
                |row| {
                    Ok(ProductRecord {
                        id: uuid_at(row, 0)?,
                        external_id: row.get(1)?,
                        code: row.get(2)?,
                        name: row.get(3)?,
                        name_english: row.get(4)?,
                        category_id: uuid_at(row, 5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()?;

        Ok(product)
    }

    fn get_store(&self, external_id: i64) -> StorageResult<Option<StoreRecord>> {
        let store = self
            .conn
            .query_row(
                "SELECT id, external_id, name, chain, district, location
                 FROM stores WHERE external_id = ?1",
                params![external_id],
                |row| {
                    Ok(StoreRecord {
                        id: uuid_at(row, 0)?,
                        external_id: row.get(1)?,
                        name: row.get(2)?,
                        chain: row.get(3)?,
                        district: row.get(4)?,
                        location: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(store)
    }

    fn prices_for_product(&self, product_id: Uuid) -> StorageResult<Vec<PriceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, store_id, price, scraped_at
             FROM prices WHERE product_id = ?1 ORDER BY scraped_at, rowid",
        )?;

        let prices = stmt
            .query_map(params![product_id.to_string()], |row| {
                Ok(PriceRecord {
                    id: uuid_at(row, 0)?,
                    product_id: uuid_at(row, 1)?,
                    store_id: uuid_at(row, 2)?,
                    price: row.get(3)?,
                    scraped_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(prices)
    }

    fn count_rows(&self) -> StorageResult<RowCounts> {
        Ok(RowCounts {
            categories: self.count("categories")?,
            products: self.count("products")?,
            stores: self.count("stores")?,
            prices: self.count("prices")?,
        })
    }
}
