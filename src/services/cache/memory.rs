//! In-process cache backend, for single-node deployments and tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::CacheStore;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(VecDeque<String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

fn wrong_type(key: &str) -> AppError {
    AppError::Cache(format!("Key {} holds a value of another type", key))
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the map, dropping expired entries first
    fn lock(&self) -> AppResult<MutexGuard<'_, HashMap<String, Entry>>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Cache("Memory cache lock poisoned".to_string()))?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(entries)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        match self.lock()?.get(key) {
            None => Ok(None),
            Some(Entry { value: Value::Text(text), .. }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    async fn delete(&self, keys: &[String]) -> AppResult<()> {
        let mut entries = self.lock()?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn list_push(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self.lock()?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::List(list) => {
                list.push_back(value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn list_range(&self, key: &str) -> AppResult<Vec<String>> {
        match self.lock()?.get(key) {
            None => Ok(Vec::new()),
            Some(Entry { value: Value::List(list), .. }) => Ok(list.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_drop_front(&self, key: &str, count: usize) -> AppResult<()> {
        let mut entries = self.lock()?;
        let emptied = match entries.get_mut(key) {
            None => return Ok(()),
            Some(Entry { value: Value::List(list), .. }) => {
                let n = count.min(list.len());
                list.drain(..n);
                list.is_empty()
            }
            Some(_) => return Err(wrong_type(key)),
        };
        // Empty lists disappear, as in Redis
        if emptied {
            entries.remove(key);
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> AppResult<bool> {
        let mut entries = self.lock()?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type(key)),
        }
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> AppResult<()> {
        let mut entries = self.lock()?;
        let emptied = match entries.get_mut(key) {
            None => return Ok(()),
            Some(Entry { value: Value::Set(set), .. }) => {
                for member in members {
                    set.remove(member);
                }
                set.is_empty()
            }
            Some(_) => return Err(wrong_type(key)),
        };
        if emptied {
            entries.remove(key);
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.lock().map(|_| ())
    }
}
