//! Redis cache backend

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use super::CacheStore;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

fn cache_err(action: &str, e: redis::RedisError) -> AppError {
    AppError::Cache(format!("Failed to {}: {}", action, e))
}

/// Escape glob metacharacters so a key prefix matches literally in SCAN
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

impl RedisCache {
    /// Open a managed connection and check it answers
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        let cache = Self { conn };
        cache.ping().await?;
        Ok(cache)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| cache_err("read cache entry", e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|e| cache_err("write cache entry", e)),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| cache_err("write cache entry", e)),
        }
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(|e| cache_err("check cache entry", e))
    }

    async fn delete(&self, keys: &[String]) -> AppResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys).await.map_err(|e| cache_err("delete cache entries", e))
    }

    async fn scan_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut iter = conn
            .scan_match::<_, String>(escape_glob(prefix))
            .await
            .map_err(|e| cache_err("scan cache keys", e))?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn list_push(&self, key: &str, value: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(key, value)
            .await
            .map_err(|e| cache_err("append to list", e))
    }

    async fn list_range(&self, key: &str) -> AppResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.lrange(key, 0, -1).await.map_err(|e| cache_err("read list", e))
    }

    async fn list_drop_front(&self, key: &str, count: usize) -> AppResult<()> {
        if count == 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.ltrim::<_, ()>(key, count as isize, -1)
            .await
            .map_err(|e| cache_err("trim list", e))
    }

    async fn set_add(&self, key: &str, member: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let added: usize = conn
            .sadd(key, member)
            .await
            .map_err(|e| cache_err("add set member", e))?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> AppResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, members)
            .await
            .map_err(|e| cache_err("remove set members", e))
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| cache_err("ping Redis", e))?;
        Ok(())
    }
}
