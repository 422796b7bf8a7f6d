//! HTTP client for the price-comparison API
//!
//! Wraps a reqwest client with the headers the upstream expects and maps
//! every failure (transport, status, decode) into [`ApiError`].

use crate::api::endpoints::{
    build_url, CategoryRequest, Endpoint, NoParams, ProductLookup, ProductRequest, QueryParams,
    RetailBranchRequest,
};
use crate::api::types::{
    CategoryResponse, CompanyResponse, Page, ProductResponse, RegionResponse, RetailBranchResponse,
};
use crate::config::ApiConfig;
use crate::{ApiError, ApiResult};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client carrying the upstream's required headers
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(ApiError)` - Failed to build client or a header value was invalid
pub fn build_http_client(config: &ApiConfig) -> ApiResult<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("el"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let referer = HeaderValue::from_str(&config.referer).map_err(|_| ApiError::InvalidHeader {
        name: "Referer",
        value: config.referer.clone(),
    })?;
    headers.insert(REFERER, referer);

    let client = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Typed access to the upstream endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Creates a client from configuration
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let client = build_http_client(config)?;
        Self::with_client(client, &config.base_url)
    }

    /// Creates a client around an existing reqwest client
    ///
    /// A trailing `/` is added to `base_url` if missing so endpoint paths
    /// join beneath it instead of replacing its last segment.
    pub fn with_client(client: Client, base_url: &str) -> ApiResult<Self> {
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };
        Ok(Self { client, base_url })
    }

    /// Returns the API root all endpoints are joined onto
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches all regions (districts). Not paginated.
    pub async fn fetch_regions(&self) -> ApiResult<Vec<RegionResponse>> {
        self.get_json(Endpoint::Regions, &NoParams).await
    }

    /// Fetches the full category tree. Not paginated.
    pub async fn fetch_categories(&self) -> ApiResult<Vec<CategoryResponse>> {
        self.get_json(Endpoint::Categories, &CategoryRequest::default()).await
    }

    /// Fetches all retail chains. Not paginated.
    pub async fn fetch_companies(&self) -> ApiResult<Vec<CompanyResponse>> {
        self.get_json(Endpoint::Companies, &NoParams).await
    }

    /// Fetches a single product by its upstream id
    pub async fn fetch_product(&self, product_id: i64) -> ApiResult<ProductResponse> {
        self.get_json(Endpoint::Product, &ProductLookup { id: product_id }).await
    }

    /// Fetches one page of products filtered by category
    pub async fn fetch_products_page(
        &self,
        category_id: i64,
        page: u32,
        size: u32,
    ) -> ApiResult<Page<ProductResponse>> {
        let params = ProductRequest {
            category_ids: vec![category_id],
            page,
            size,
            ..Default::default()
        };
        self.get_json(Endpoint::Products, &params).await
    }

    /// Fetches one page of retail branches pricing a product within a region
    pub async fn fetch_retail_branches_page(
        &self,
        product_id: i64,
        region_id: i64,
        page: u32,
        size: u32,
    ) -> ApiResult<Page<RetailBranchResponse>> {
        let params = RetailBranchRequest {
            page,
            size,
            product_id,
            region_ids: vec![region_id],
            ..Default::default()
        };
        self.get_json(Endpoint::RetailBranches, &params).await
    }

    /// Issues a GET and decodes a JSON body
    ///
    /// The body is read in full before decoding so a decode failure can
    /// report how much was received.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        params: &dyn QueryParams,
    ) -> ApiResult<T> {
        let url = build_url(&self.base_url, endpoint, params)?;
        tracing::trace!(url = %url, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            body_len: body.len(),
            source,
        })
    }
}
