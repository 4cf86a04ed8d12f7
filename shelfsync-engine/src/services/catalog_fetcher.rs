//! Catalog fetcher
//!
//! Retrieves the full catalog for a status filter. Page 1 comes first to learn
//! the total; the remaining pages are issued with a bounded fan-out and
//! collected in index order. Nothing is merged or classified until every page
//! is in.

use futures::stream::{self, StreamExt};
use shelfsync_common::models::ProductStatus;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::catalog_client::{map_raw_product, CatalogApi, CatalogConfig, CatalogError, CatalogPage, DropReason};
use super::name_parser::parse_product_name;
use crate::models::{FetchStats, Product};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Page {page} failed after {attempts} attempts: {source}")]
    Page {
        page: u32,
        attempts: u32,
        #[source]
        source: CatalogError,
    },

    #[error("Catalog reported {total_count} records, {pages:?} pages at page size {page_size}")]
    InvalidTotal {
        total_count: u64,
        pages: Option<u64>,
        page_size: u32,
    },

    #[error("Fetch cancelled")]
    Cancelled,
}

/// Tuning for one fetcher
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub page_size: u32,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub page_timeout: Duration,
    pub fan_out: usize,
}

impl From<&CatalogConfig> for FetchOptions {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            page_timeout: Duration::from_secs(config.page_timeout_secs.max(1)),
            fan_out: config.fan_out.max(1),
        }
    }
}

/// Deduplicated products plus counters
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub products: Vec<Product>,
    pub total_count: u64,
    pub stats: FetchStats,
}

pub struct CatalogFetcher {
    api: Arc<dyn CatalogApi>,
    options: FetchOptions,
}

impl CatalogFetcher {
    pub fn new(api: Arc<dyn CatalogApi>, options: FetchOptions) -> Self {
        Self { api, options }
    }

    /// Fetch every page for `statuses`
    ///
    /// A page that keeps failing after `max_attempts` fails the whole fetch;
    /// the caller keeps whatever view it already had.
    pub async fn fetch_all(
        &self,
        statuses: &[ProductStatus],
        cancel: &CancellationToken,
    ) -> Result<FetchResult, FetchError> {
        let first = self.fetch_page(1, statuses, cancel).await?;
        let total_count = first.total_elements;
        let last_page = page_count(total_count, first.total_pages, self.options.page_size)?;

        tracing::info!(total_count, last_page, "Fetching catalog");

        let mut pages = vec![first];

        let rest = stream::iter(2..=last_page)
            .map(|page| self.fetch_page(page, statuses, cancel))
            .buffered(self.options.fan_out);
        tokio::pin!(rest);

        while let Some(page) = rest.next().await {
            pages.push(page?);
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
        }

        let (products, stats) = collect_products(pages, total_count);
        tracing::info!(
            products = products.len(),
            dropped = stats.dropped,
            duplicates = stats.duplicates,
            "Catalog fetch complete"
        );

        Ok(FetchResult {
            products,
            total_count,
            stats,
        })
    }

    async fn fetch_page(
        &self,
        page: u32,
        statuses: &[ProductStatus],
        cancel: &CancellationToken,
    ) -> Result<CatalogPage, FetchError> {
        let mut backoff = self.options.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let call = tokio::time::timeout(
                self.options.page_timeout,
                self.api.search(page, self.options.page_size, statuses),
            );
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                result = call => match result {
                    Ok(result) => result,
                    Err(_) => Err(CatalogError::Timeout(self.options.page_timeout)),
                },
            };

            let error = match result {
                Ok(fetched) => return Ok(fetched),
                Err(e) => e,
            };

            if attempt >= self.options.max_attempts || !error.is_transient() {
                tracing::error!(page, attempt, error = %error, "Catalog page failed, giving up");
                return Err(FetchError::Page {
                    page,
                    attempts: attempt,
                    source: error,
                });
            }

            tracing::warn!(
                page,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Catalog page failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = backoff.saturating_mul(2);
        }
    }
}

/// Pages needed for `total_count` records
///
/// Fails when the count does not fit a page index or disagrees with the
/// page total the catalog reported alongside it.
fn page_count(total_count: u64, total_pages: Option<u64>, page_size: u32) -> Result<u32, FetchError> {
    let invalid = || FetchError::InvalidTotal {
        total_count,
        pages: total_pages,
        page_size,
    };

    let computed = total_count.div_ceil(u64::from(page_size.max(1))).max(1);
    if let Some(reported) = total_pages {
        if reported.max(1) != computed {
            return Err(invalid());
        }
    }
    u32::try_from(computed).map_err(|_| invalid())
}

/// Map, drop and dedup in page order; a repeated id replaces the earlier record
fn collect_products(pages: Vec<CatalogPage>, total_count: u64) -> (Vec<Product>, FetchStats) {
    let mut products: Vec<Product> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut stats = FetchStats {
        total_count,
        dropped: pages.iter().map(|p| p.malformed).sum(),
        ..Default::default()
    };

    for raw in pages.iter().flat_map(|p| p.contents.iter()) {
        let mut product = match map_raw_product(raw) {
            Ok(product) => product,
            Err(reason) => {
                stats.dropped += 1;
                match reason {
                    DropReason::UnknownStatus(code) => {
                        tracing::warn!(product_id = %raw.origin_product_no, status = %code, "Dropping record with unknown status")
                    }
                    other => {
                        tracing::warn!(product_id = %raw.origin_product_no, reason = ?other, "Dropping incomplete catalog record")
                    }
                }
                continue;
            }
        };

        if product.brand.is_none() {
            product.brand = parse_product_name(&product.name).brand;
        }

        match index.get(&product.id) {
            Some(&i) => {
                stats.duplicates += 1;
                products[i] = product;
            }
            None => {
                index.insert(product.id.clone(), products.len());
                products.push(product);
            }
        }
    }

    (products, stats)
}
