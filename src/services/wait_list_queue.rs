//! Per-book notification queues with duplicate suppression
//!
//! Each book has an ordered list of JSON payloads (`WaitList:{book}`) and a
//! set of the same payloads (`WaitList:set:{book}`) used for dedup. A payload
//! enters the list only when its set insertion reports it as new.

use std::sync::Arc;

use super::cache::{keys, CacheStore};
use crate::{
    error::{AppError, AppResult},
    models::NotificationPayload,
};

/// Snapshot of a book's queue taken by [`WaitListQueue::drain_all`]
#[derive(Debug, Clone, Default)]
pub struct DrainedQueue {
    pub book_id: i64,
    /// Decodable payloads in FIFO order
    pub payloads: Vec<NotificationPayload>,
    /// Raw list entries covered by the snapshot
    members: Vec<String>,
}

impl DrainedQueue {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }
}

#[derive(Clone)]
pub struct WaitListQueue {
    store: Arc<dyn CacheStore>,
}

impl WaitListQueue {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    fn encode(payload: &NotificationPayload) -> AppResult<String> {
        serde_json::to_string(payload)
            .map_err(|e| AppError::Cache(format!("Failed to encode wait-list payload: {}", e)))
    }

    /// Queue a payload for the book; false if an identical one is already waiting
    pub async fn add(&self, book_id: i64, payload: &NotificationPayload) -> AppResult<bool> {
        let member = Self::encode(payload)?;
        if !self.store.set_add(&keys::wait_list_members(book_id), &member).await? {
            tracing::debug!("{} already waits for book {}", payload.username, book_id);
            return Ok(false);
        }
        if let Err(e) = self.store.list_push(&keys::wait_list(book_id), &member).await {
            // Without the list entry the set member would block every later add
            if let Err(undo) = self
                .store
                .set_remove(&keys::wait_list_members(book_id), &[member])
                .await
            {
                tracing::error!("Failed to roll back wait-list member for book {}: {}", book_id, undo);
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Every queued payload in insertion order, without removing anything
    pub async fn drain_all(&self, book_id: i64) -> AppResult<DrainedQueue> {
        let members = self.store.list_range(&keys::wait_list(book_id)).await?;
        let payloads = members
            .iter()
            .filter_map(|raw| match serde_json::from_str::<NotificationPayload>(raw) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    tracing::warn!("Skipping undecodable wait-list entry for book {}: {}", book_id, e);
                    None
                }
            })
            .collect();

        Ok(DrainedQueue {
            book_id,
            payloads,
            members,
        })
    }

    /// Remove exactly the entries of a snapshot; anything queued since stays
    pub async fn clear_drained(&self, drained: &DrainedQueue) -> AppResult<()> {
        if drained.is_empty() {
            return Ok(());
        }
        self.store
            .set_remove(&keys::wait_list_members(drained.book_id), &drained.members)
            .await?;
        self.store
            .list_drop_front(&keys::wait_list(drained.book_id), drained.len())
            .await
    }

    /// Drop the book's queue and dedup set entirely
    pub async fn clear(&self, book_id: i64) -> AppResult<()> {
        self.store
            .delete(&[keys::wait_list(book_id), keys::wait_list_members(book_id)])
            .await
    }

    /// Drop every queue of every book
    pub async fn clear_all(&self) -> AppResult<()> {
        let keys = self.store.scan_prefix(keys::WAIT_LIST_PREFIX).await?;
        self.store.delete(&keys).await
    }
}
