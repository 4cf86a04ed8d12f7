//! External catalog API client
//!
//! The catalog is paged: `POST {base_url}/v1/products/search` with a 1-based
//! page index, a page size and a status filter. Each record nests its
//! channel-level details in `channelProducts`; only the first entry is used.
//!
//! Token acquisition belongs to whoever configures the client; this module
//! only attaches the bearer token it was given.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Deserializer, Serialize};
use shelfsync_common::models::ProductStatus;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use crate::models::Product;

const SEARCH_PATH: &str = "/v1/products/search";

/// Catalog client errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Catalog API returned status {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Catalog client not configured: {0}")]
    NotConfigured(String),
}

impl CatalogError {
    /// Worth retrying: transport trouble, timeouts, 429 and 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::Network(_) | CatalogError::Timeout(_) => true,
            CatalogError::Status(code, _) => *code == 429 || *code >= 500,
            CatalogError::Parse(_) | CatalogError::NotConfigured(_) => false,
        }
    }
}

/// `[catalog]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub bearer_token: Option<String>,
    pub page_size: u32,
    /// Attempts per page, including the first
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub initial_backoff_ms: u64,
    pub page_timeout_secs: u64,
    /// Pages in flight at once after page 1
    pub fan_out: usize,
    pub requests_per_second: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            bearer_token: None,
            page_size: 100,
            max_attempts: 3,
            initial_backoff_ms: 500,
            page_timeout_secs: 20,
            fan_out: 4,
            requests_per_second: 2,
        }
    }
}

/// Wire record: one origin product with its channel listings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    #[serde(default)]
    pub origin_product_no: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channel_products: Vec<RawChannelProduct>,
}

/// Wire channel listing
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawChannelProduct {
    pub channel_product_no: Option<serde_json::Value>,
    pub category_id: Option<String>,
    pub name: Option<String>,
    pub status_type: Option<String>,
    pub sale_price: Option<i64>,
    pub discounted_price: Option<i64>,
    pub stock_quantity: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub images: Vec<RawImage>,
    pub reg_date: Option<String>,
    pub mod_date: Option<String>,
    pub brand_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawImage {
    pub url: Option<String>,
}

/// One page of search results
///
/// Records that do not decode are counted in `malformed` and skipped, so one
/// bad record never fails its page.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(from = "WirePage")]
pub struct CatalogPage {
    pub contents: Vec<RawProduct>,
    pub total_elements: u64,
    pub total_pages: Option<u64>,
    #[serde(skip_serializing)]
    pub malformed: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePage {
    #[serde(default, deserialize_with = "null_as_default")]
    contents: Vec<serde_json::Value>,
    #[serde(default)]
    total_elements: u64,
    #[serde(default)]
    total_pages: Option<u64>,
}

impl From<WirePage> for CatalogPage {
    fn from(wire: WirePage) -> Self {
        let mut contents = Vec::with_capacity(wire.contents.len());
        let mut malformed = 0;
        for value in wire.contents {
            let product_id = value.get("originProductNo").cloned().unwrap_or_default();
            match serde_json::from_value::<RawProduct>(value) {
                Ok(raw) => contents.push(raw),
                Err(e) => {
                    malformed += 1;
                    tracing::warn!(product_id = %product_id, error = %e, "Dropping undecodable catalog record");
                }
            }
        }

        Self {
            contents,
            total_elements: wire.total_elements,
            total_pages: wire.total_pages,
            malformed,
        }
    }
}

/// `null` decodes like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    page: u32,
    size: u32,
    product_status_types: Vec<&'a str>,
}

/// Why a wire record did not become a [`Product`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MissingId,
    NoChannelProduct,
    UnknownStatus(String),
}

/// Paged catalog search, the seam for tests
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn search(&self, page: u32, page_size: u32, statuses: &[ProductStatus]) -> Result<CatalogPage, CatalogError>;
}

/// Map a wire record to a product
///
/// `brand` is the declared brand name when non-empty; the caller may fill it
/// from the parsed name afterwards.
pub fn map_raw_product(raw: &RawProduct) -> Result<Product, DropReason> {
    let id = json_id(&raw.origin_product_no).ok_or(DropReason::MissingId)?;
    let channel = raw.channel_products.first().ok_or(DropReason::NoChannelProduct)?;

    let status_code = channel.status_type.clone().unwrap_or_default();
    let status = ProductStatus::from_wire(&status_code).ok_or(DropReason::UnknownStatus(status_code))?;

    Ok(Product {
        id,
        channel_product_no: channel.channel_product_no.as_ref().and_then(json_id),
        name: channel.name.clone().unwrap_or_default(),
        brand: channel
            .brand_name
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string),
        price: channel.sale_price.unwrap_or(0),
        discounted_price: channel.discounted_price,
        stock_quantity: channel.stock_quantity.unwrap_or(0),
        status,
        registered_at: channel.reg_date.clone().filter(|d| !d.is_empty()),
        modified_at: channel.mod_date.clone().filter(|d| !d.is_empty()),
        image_urls: channel
            .images
            .iter()
            .filter_map(|i| i.url.clone())
            .filter(|u| !u.is_empty())
            .collect(),
        category_id: channel.category_id.clone().filter(|c| !c.is_empty()),
    })
}

/// Numeric or string id rendered as a string
fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Stand-in used when no catalog endpoint is configured
///
/// Every search fails, so read paths answer 503 until the config is fixed.
pub struct UnconfiguredCatalog;

#[async_trait]
impl CatalogApi for UnconfiguredCatalog {
    async fn search(&self, _page: u32, _page_size: u32, _statuses: &[ProductStatus]) -> Result<CatalogPage, CatalogError> {
        Err(CatalogError::NotConfigured("catalog.base_url is not set".to_string()))
    }
}

/// reqwest-backed catalog client with a request-rate ceiling
pub struct HttpCatalogClient {
    client: reqwest::Client,
    search_url: String,
    bearer_token: Option<String>,
    timeout: Duration,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpCatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CatalogError::NotConfigured("catalog.base_url is not set".to_string()))?;

        let timeout = Duration::from_secs(config.page_timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            search_url: format!("{}{}", base_url.trim_end_matches('/'), SEARCH_PATH),
            bearer_token: config.bearer_token.clone().filter(|t| !t.trim().is_empty()),
            timeout,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    async fn search(&self, page: u32, page_size: u32, statuses: &[ProductStatus]) -> Result<CatalogPage, CatalogError> {
        self.rate_limiter.until_ready().await;

        let body = SearchRequest {
            page,
            size: page_size,
            product_status_types: statuses.iter().map(|s| s.wire_code()).collect(),
        };

        tracing::debug!(page, page_size, "Requesting catalog page");

        let mut request = self.client.post(&self.search_url).json(&body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout(self.timeout)
            } else {
                CatalogError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status(status.as_u16(), text.chars().take(200).collect()));
        }

        response
            .json::<CatalogPage>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawProduct {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_maps_first_channel_product() {
        let product = map_raw_product(&raw(json!({
            "originProductNo": 10012345,
            "channelProducts": [{
                "channelProductNo": 5550001,
                "name": "Barbour 바버 비데일 왁스 자켓 MAN - 100",
                "statusType": "SALE",
                "salePrice": 189000,
                "discountedPrice": 169000,
                "stockQuantity": 1,
                "brandName": "Barbour",
                "regDate": "2025-01-03T10:00:00.000+09:00",
                "images": [{"url": "https://img.example/1.jpg"}]
            }, {
                "name": "ignored",
                "statusType": "SUSPENSION"
            }]
        })))
        .unwrap();

        assert_eq!(product.id, "10012345");
        assert_eq!(product.channel_product_no.as_deref(), Some("5550001"));
        assert_eq!(product.status, ProductStatus::OnSale);
        assert_eq!(product.brand.as_deref(), Some("Barbour"));
        assert_eq!(product.price, 189000);
        assert_eq!(product.image_urls.len(), 1);
    }

    #[test]
    fn test_drops_records_without_channel_details() {
        let result = map_raw_product(&raw(json!({"originProductNo": 7, "channelProducts": []})));
        assert_eq!(result, Err(DropReason::NoChannelProduct));

        let result = map_raw_product(&raw(json!({"originProductNo": 7})));
        assert_eq!(result, Err(DropReason::NoChannelProduct));
    }

    #[test]
    fn test_drops_unknown_status() {
        let result = map_raw_product(&raw(json!({
            "originProductNo": "77",
            "channelProducts": [{"name": "x", "statusType": "WAIT"}]
        })));
        assert_eq!(result, Err(DropReason::UnknownStatus("WAIT".to_string())));
    }

    #[test]
    fn test_blank_brand_is_none() {
        let product = map_raw_product(&raw(json!({
            "originProductNo": 1,
            "channelProducts": [{"name": "tee", "statusType": "OUTOFSTOCK", "brandName": "  "}]
        })))
        .unwrap();
        assert!(product.brand.is_none());
        assert_eq!(product.status, ProductStatus::OutOfStock);
    }

    #[test]
    fn test_client_requires_base_url() {
        assert!(matches!(
            HttpCatalogClient::new(&CatalogConfig::default()),
            Err(CatalogError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(CatalogError::Status(503, String::new()).is_transient());
        assert!(CatalogError::Status(429, String::new()).is_transient());
        assert!(!CatalogError::Status(401, String::new()).is_transient());
        assert!(!CatalogError::Parse("eof".to_string()).is_transient());
    }

    #[test]
    fn test_page_defaults() {
        let page: CatalogPage = serde_json::from_value(json!({"contents": []})).unwrap();
        assert_eq!(page.total_elements, 0);
        assert!(page.total_pages.is_none());
    }

    #[test]
    fn test_undecodable_record_does_not_fail_its_page() {
        let page: CatalogPage = serde_json::from_value(json!({
            "contents": [
                {"originProductNo": 1, "channelProducts": [{"name": "Kept", "statusType": "SALE"}]},
                {"originProductNo": 2, "channelProducts": "not a list"},
                {"originProductNo": 3, "channelProducts": null}
            ],
            "totalElements": 3
        }))
        .unwrap();

        assert_eq!(page.contents.len(), 2);
        assert_eq!(page.malformed, 1);
        assert_eq!(page.total_elements, 3);
        // null listings decode as empty and are dropped at mapping time
        assert_eq!(map_raw_product(&page.contents[1]), Err(DropReason::NoChannelProduct));
    }

    #[test]
    fn test_null_images_and_missing_urls_are_tolerated() {
        let product = map_raw_product(&raw(json!({
            "originProductNo": 4,
            "channelProducts": [{
                "name": "Chore coat",
                "statusType": "SALE",
                "images": [{"url": "https://img.example/4.jpg"}, {"alt": "no url"}]
            }]
        })))
        .unwrap();
        assert_eq!(product.image_urls, vec!["https://img.example/4.jpg".to_string()]);

        let product = map_raw_product(&raw(json!({
            "originProductNo": 5,
            "channelProducts": [{"name": "Chore coat", "statusType": "SALE", "images": null}]
        })))
        .unwrap();
        assert!(product.image_urls.is_empty());
    }
}
