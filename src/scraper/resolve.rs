//! Lookups the stages use to link entities together

use std::collections::HashMap;
use uuid::Uuid;

/// Categories persisted during this run
///
/// Maps upstream category ids to internal ids, and category names to
/// internal ids for resolving the category a product payload names.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    ids: HashMap<i64, Uuid>,
    names: HashMap<String, Uuid>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a persisted category
    ///
    /// A later category with the same name replaces the earlier one in the
    /// name lookup.
    pub fn insert(&mut self, external_id: i64, name: &str, internal_id: Uuid) {
        self.ids.insert(external_id, internal_id);
        let name = name.trim();
        if !name.is_empty() {
            self.names.insert(name.to_string(), internal_id);
        }
    }

    /// Internal id for an upstream category id
    pub fn get(&self, external_id: i64) -> Option<Uuid> {
        self.ids.get(&external_id).copied()
    }

    /// Internal id for a category name
    pub fn by_name(&self, name: &str) -> Option<Uuid> {
        self.names.get(name.trim()).copied()
    }

    /// Category a product belongs to
    ///
    /// The category named in the product payload takes precedence over the
    /// one it was queried under; an unknown or empty name falls back to the
    /// queried category.
    pub fn resolve_category(&self, product_category_name: &str, queried: Uuid) -> Uuid {
        self.by_name(product_category_name).unwrap_or(queried)
    }

    /// External/internal id pairs, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (i64, Uuid)> + '_ {
        self.ids.iter().map(|(ext, id)| (*ext, *id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Builds a store's location label
///
/// Coordinates are appended only when both are present.
pub fn format_location(address: &str, latitude: &str, longitude: &str) -> String {
    let latitude = latitude.trim();
    let longitude = longitude.trim();
    if latitude.is_empty() || longitude.is_empty() {
        return address.to_string();
    }
    format!("{} ({}, {})", address, latitude, longitude)
}
