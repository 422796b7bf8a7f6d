//! Endpoint paths and typed query parameters
//!
//! Each request type knows which of its parameters go on the wire. Defaults
//! (zero, empty) are omitted except where the upstream insists otherwise:
//! `page` is always sent for paginated list endpoints, and the branch list
//! wants `regionIds`/`companyIds` present even when empty.

use crate::ApiResult;
use url::Url;

/// Upstream endpoints, relative to the API root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Categories,
    Products,
    Product,
    Regions,
    Companies,
    RetailBranches,
}

impl Endpoint {
    /// Path of this endpoint under the API root
    pub fn path(&self) -> &'static str {
        match self {
            Self::Categories => "fetch-product-categories",
            Self::Products => "fetch-product-list",
            Self::Product => "fetch-product",
            Self::Regions => "fetch-regions",
            Self::Companies => "fetch-companies",
            Self::RetailBranches => "retail/fetch-retail-branch-list",
        }
    }
}

/// Query parameter list as sent on the wire, in insertion order
pub type QueryPairs = Vec<(&'static str, String)>;

/// Anything that can describe its own query string
pub trait QueryParams: Send + Sync {
    fn query_pairs(&self) -> QueryPairs;
}

/// Parameters for the category tree endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryRequest {
    pub page: u32,
    pub size: u32,
    pub sort: String,
}

impl QueryParams for CategoryRequest {
    fn query_pairs(&self) -> QueryPairs {
        let mut pairs = QueryPairs::new();
        if self.page > 0 {
            pairs.push(("page", self.page.to_string()));
        }
        push_size_and_sort(&mut pairs, self.size, &self.sort);
        pairs
    }
}

/// Parameters for the product list endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductRequest {
    pub id: i64,
    pub category_ids: Vec<i64>,
    pub page: u32,
    pub size: u32,
    pub sort: String,
}

impl QueryParams for ProductRequest {
    fn query_pairs(&self) -> QueryPairs {
        let mut pairs = QueryPairs::new();
        if self.id > 0 {
            pairs.push(("id", self.id.to_string()));
        }
        for category_id in &self.category_ids {
            pairs.push(("categoryIds", category_id.to_string()));
        }
        // 0-indexed, always present
        pairs.push(("page", self.page.to_string()));
        push_size_and_sort(&mut pairs, self.size, &self.sort);
        pairs
    }
}

/// Parameters for the single-product endpoint, which only takes an id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductLookup {
    pub id: i64,
}

impl QueryParams for ProductLookup {
    fn query_pairs(&self) -> QueryPairs {
        if self.id > 0 {
            vec![("id", self.id.to_string())]
        } else {
            QueryPairs::new()
        }
    }
}

/// Parameters for the retail branch list (branches carrying a product price)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetailBranchRequest {
    pub page: u32,
    pub size: u32,
    pub sort: String,
    pub product_id: i64,
    pub region_ids: Vec<i64>,
    pub company_ids: Vec<i64>,
}

impl QueryParams for RetailBranchRequest {
    fn query_pairs(&self) -> QueryPairs {
        let mut pairs = QueryPairs::new();
        pairs.push(("page", self.page.to_string()));
        push_size_and_sort(&mut pairs, self.size, &self.sort);
        if self.product_id > 0 {
            pairs.push(("productId", self.product_id.to_string()));
        }
        push_repeated_or_empty(&mut pairs, "regionIds", &self.region_ids);
        push_repeated_or_empty(&mut pairs, "companyIds", &self.company_ids);
        pairs
    }
}

/// Regions and companies take no parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoParams;

impl QueryParams for NoParams {
    fn query_pairs(&self) -> QueryPairs {
        QueryPairs::new()
    }
}

fn push_size_and_sort(pairs: &mut QueryPairs, size: u32, sort: &str) {
    if size > 0 {
        pairs.push(("size", size.to_string()));
    }
    if !sort.is_empty() {
        pairs.push(("sort", sort.to_string()));
    }
}

fn push_repeated_or_empty(pairs: &mut QueryPairs, key: &'static str, ids: &[i64]) {
    if ids.is_empty() {
        pairs.push((key, String::new()));
    } else {
        pairs.extend(ids.iter().map(|id| (key, id.to_string())));
    }
}

/// Builds the full URL for an endpoint call
///
/// # Arguments
///
/// * `base` - API root; must end with `/` so endpoint paths join beneath it
/// * `endpoint` - The endpoint to call
/// * `params` - Typed query parameters
pub fn build_url(base: &Url, endpoint: Endpoint, params: &dyn QueryParams) -> ApiResult<Url> {
    let mut url = base.join(endpoint.path())?;
    let pairs = params.query_pairs();
    if !pairs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}
