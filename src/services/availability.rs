//! Availability cache: book detail snapshots, category listing pages and the
//! category and publisher lists, on top of the shared cache store
//!
//! Reads never fail: an unreachable or corrupt cache is reported as a miss.
//! Writes and invalidations return their error so callers can log it, but
//! callers never fail an operation because of it.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use super::cache::{keys, CacheStore};
use crate::{
    config::CacheConfig,
    error::{AppError, AppResult},
    models::{BookPage, BookSnapshot, Category, PageRequest, Publisher},
};

#[derive(Clone)]
pub struct AvailabilityCache {
    store: Arc<dyn CacheStore>,
    detail_ttl: Duration,
    listing_ttl: Duration,
}

impl AvailabilityCache {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            detail_ttl: config.detail_ttl(),
            listing_ttl: config.listing_ttl(),
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Cache read of {} failed, treating as miss: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Dropping undecodable cache entry {}: {}", key, e);
                let _ = self.store.delete(&[key.to_string()]).await;
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> AppResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Cache(format!("Failed to encode {}: {}", key, e)))?;
        self.store.set(key, &raw, ttl).await
    }

    pub async fn get_detail(&self, book_id: i64) -> Option<BookSnapshot> {
        self.read(&keys::book_detail(book_id)).await
    }

    pub async fn put_detail(&self, snapshot: &BookSnapshot) -> AppResult<()> {
        self.write(&keys::book_detail(snapshot.book.id), snapshot, Some(self.detail_ttl))
            .await
    }

    pub async fn has_detail(&self, book_id: i64) -> bool {
        self.store
            .exists(&keys::book_detail(book_id))
            .await
            .unwrap_or(false)
    }

    pub async fn invalidate_detail(&self, book_id: i64) -> AppResult<()> {
        self.store.delete(&[keys::book_detail(book_id)]).await
    }

    /// Cached page for this exact query shape, together with the total it was built against
    pub async fn get_listing(&self, category_id: i64, page: &PageRequest) -> Option<BookPage> {
        let shape = keys::listing_shape(category_id, page.page, page.size, &page.sort.to_string());
        let candidates = match self.store.scan_prefix(&shape).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Cache scan of {} failed, treating as miss: {}", shape, e);
                return None;
            }
        };

        for key in candidates {
            // The suffix after the shape must be nothing but the total count
            let Some(total) = key
                .strip_prefix(shape.as_str())
                .and_then(|rest| rest.parse::<i64>().ok())
            else {
                continue;
            };
            if let Some(items) = self.read(&key).await {
                return Some(BookPage {
                    items,
                    total,
                    page: page.page,
                    size: page.size,
                });
            }
        }
        None
    }

    /// Store a listing page; empty pages are not cached
    pub async fn put_listing(&self, category_id: i64, page: &BookPage, request: &PageRequest) -> AppResult<()> {
        if page.items.is_empty() {
            return Ok(());
        }
        let key = keys::listing(
            category_id,
            request.page,
            request.size,
            &request.sort.to_string(),
            page.total,
        );
        self.write(&key, &page.items, Some(self.listing_ttl)).await
    }

    /// Remove every listing page of the category, whatever its page, size, sort or total
    pub async fn invalidate_category(&self, category_id: i64) -> AppResult<()> {
        let keys = self
            .store
            .scan_prefix(&keys::category_listings(category_id))
            .await?;
        if !keys.is_empty() {
            tracing::debug!("Evicting {} listing pages of category {}", keys.len(), category_id);
        }
        self.store.delete(&keys).await
    }

    pub async fn get_categories(&self) -> Option<Vec<Category>> {
        self.read(keys::CATEGORIES).await
    }

    pub async fn put_categories(&self, categories: &[Category]) -> AppResult<()> {
        self.write(keys::CATEGORIES, &categories, None).await
    }

    pub async fn invalidate_categories(&self) -> AppResult<()> {
        self.store.delete(&[keys::CATEGORIES.to_string()]).await
    }

    pub async fn get_publishers(&self) -> Option<Vec<Publisher>> {
        self.read(keys::PUBLISHERS).await
    }

    /// An empty list is not cached
    pub async fn put_publishers(&self, publishers: &[Publisher]) -> AppResult<()> {
        if publishers.is_empty() {
            return Ok(());
        }
        self.write(keys::PUBLISHERS, &publishers, None).await
    }

    pub async fn invalidate_publishers(&self) -> AppResult<()> {
        self.store.delete(&[keys::PUBLISHERS.to_string()]).await
    }

    /// Cache status for readiness reporting
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
