//! Cache store interface shared by the availability cache, the wait-list
//! queues and the checkout reminder records
//!
//! The cache is never the source of truth: every caller treats a failed
//! cache call as a miss and carries on against the relational store.

mod memory;
mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    config::{CacheBackend, AppConfig},
    error::AppResult,
};

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// Key-value store with TTLs, lists, sets and prefix enumeration
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    /// Store a value, replacing any previous one; `None` keeps it until deleted
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;
    async fn exists(&self, key: &str) -> AppResult<bool>;
    async fn delete(&self, keys: &[String]) -> AppResult<()>;
    /// Every live key starting with `prefix`
    async fn scan_prefix(&self, prefix: &str) -> AppResult<Vec<String>>;

    async fn list_push(&self, key: &str, value: &str) -> AppResult<()>;
    async fn list_range(&self, key: &str) -> AppResult<Vec<String>>;
    /// Drop the first `count` entries of a list
    async fn list_drop_front(&self, key: &str, count: usize) -> AppResult<()>;

    /// Add a set member; true if it was not already present
    async fn set_add(&self, key: &str, member: &str) -> AppResult<bool>;
    async fn set_remove(&self, key: &str, members: &[String]) -> AppResult<()>;

    async fn ping(&self) -> AppResult<()>;
}

/// Key layout of everything the server keeps in the cache
pub mod keys {
    pub const CATEGORIES: &str = "Category";
    pub const PUBLISHERS: &str = "Publisher";
    pub const WAIT_LIST_PREFIX: &str = "WaitList:";
    pub const CHECKOUT_PREFIX: &str = "CheckOut:";
    const LISTING_PREFIX: &str = "BookAll:";

    pub fn book_detail(book_id: i64) -> String {
        format!("BookDetail:{}", book_id)
    }

    /// Every listing page of a category shares this prefix
    pub fn category_listings(category_id: i64) -> String {
        format!("{}{}:", LISTING_PREFIX, category_id)
    }

    /// All listing keys for one query shape, whatever total they were built with
    pub fn listing_shape(category_id: i64, page: i64, size: i64, sort: &str) -> String {
        format!("{}{}:{}:{}:", category_listings(category_id), page, size, sort)
    }

    pub fn listing(category_id: i64, page: i64, size: i64, sort: &str, total: i64) -> String {
        format!("{}{}", listing_shape(category_id, page, size, sort), total)
    }

    pub fn wait_list(book_id: i64) -> String {
        format!("{}{}", WAIT_LIST_PREFIX, book_id)
    }

    pub fn wait_list_members(book_id: i64) -> String {
        format!("{}set:{}", WAIT_LIST_PREFIX, book_id)
    }

    pub fn checkout_record(card_number: &str, checkout_id: i64) -> String {
        format!("{}{}:{}", CHECKOUT_PREFIX, card_number, checkout_id)
    }
}

/// Connect the configured cache backend
pub async fn connect(config: &AppConfig) -> AppResult<Arc<dyn CacheStore>> {
    match config.cache.backend {
        CacheBackend::Redis => {
            let cache = RedisCache::connect(&config.redis.url).await?;
            tracing::info!("Connected to Redis cache at {}", config.redis.url);
            Ok(Arc::new(cache))
        }
        CacheBackend::Memory => {
            tracing::info!("Using in-process memory cache");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::keys;

    #[test]
    fn test_listing_keys_share_category_prefix() {
        let key = keys::listing(4, 0, 20, "title,asc", 57);
        assert_eq!(key, "BookAll:4:0:20:title,asc:57");
        assert!(key.starts_with(&keys::category_listings(4)));
        assert!(key.starts_with(&keys::listing_shape(4, 0, 20, "title,asc")));
        assert!(!key.starts_with(&keys::category_listings(41)));
    }

    #[test]
    fn test_queue_keys_live_under_wait_list_prefix() {
        assert!(keys::wait_list(9).starts_with(keys::WAIT_LIST_PREFIX));
        assert!(keys::wait_list_members(9).starts_with(keys::WAIT_LIST_PREFIX));
        assert_ne!(keys::wait_list(9), keys::wait_list_members(9));
    }
}
