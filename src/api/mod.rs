//! Upstream API access
//!
//! This module contains everything that talks to the price-comparison API:
//! - Endpoint paths and typed query parameters (the request builder)
//! - Response payloads, including the paginated envelope
//! - The HTTP client that applies the required headers and maps errors

mod client;
mod endpoints;
mod types;

pub use client::{build_http_client, ApiClient};
pub use endpoints::{
    build_url, CategoryRequest, Endpoint, NoParams, ProductLookup, ProductRequest, QueryPairs,
    QueryParams, RetailBranchRequest,
};
pub use types::{
    CategoryResponse, CompanyResponse, Page, ProductResponse, RegionResponse,
    RetailBranchResponse, SubcategoryResponse,
};
