//! Due-time reminders for confirmed checkouts
//!
//! Each confirmed checkout gets a one-shot timer firing `lead_hours` before
//! its due time. At fire time the checkout is re-read: the reminder goes out
//! only if it is still confirmed and the store accepts marking it as sent.
//! A cache side record (`CheckOut:{card}:{id}`) mirrors the active checkout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;

use super::{
    cache::{keys, CacheStore},
    email::EmailService,
};
use crate::{
    error::{AppError, AppResult},
    models::{Checkout, CheckoutState, NotificationPayload},
    repository::Repository,
};

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    repository: Repository,
    cache: Arc<dyn CacheStore>,
    email: EmailService,
    lead: Duration,
    timers: Mutex<HashMap<i64, Timer>>,
    generations: AtomicU64,
}

#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<Inner>,
}

impl ReminderScheduler {
    pub fn new(
        repository: Repository,
        cache: Arc<dyn CacheStore>,
        email: EmailService,
        lead_hours: i64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                repository,
                cache,
                email,
                lead: Duration::hours(lead_hours),
                timers: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Write the side record of a confirmed checkout, expiring at its due time
    pub async fn record(&self, checkout: &Checkout) -> AppResult<()> {
        let raw = serde_json::to_string(checkout)
            .map_err(|e| AppError::Cache(format!("Failed to encode checkout {}: {}", checkout.id, e)))?;
        let ttl = (checkout.end_time - Utc::now()).to_std().ok();
        self.inner
            .cache
            .set(
                &keys::checkout_record(checkout.card_number.as_str(), checkout.id),
                &raw,
                ttl,
            )
            .await
    }

    pub async fn discard_record(&self, checkout: &Checkout) -> AppResult<()> {
        self.inner
            .cache
            .delete(&[keys::checkout_record(checkout.card_number.as_str(), checkout.id)])
            .await
    }

    /// Arm (or re-arm) the reminder timer of a checkout
    pub fn schedule(&self, checkout: &Checkout) {
        let fire_at = checkout.end_time - self.inner.lead;
        let delay = (fire_at - Utc::now()).to_std().unwrap_or_default();
        let checkout_id = checkout.id;
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);

        // Hold the lock across the spawn so the task cannot forget itself
        // before it is registered
        let Ok(mut timers) = self.inner.timers.lock() else {
            tracing::error!("Reminder timers unavailable, checkout {} not scheduled", checkout_id);
            return;
        };
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = scheduler.fire(checkout_id).await {
                tracing::warn!("Reminder for checkout {} failed: {}", checkout_id, e);
            }
            scheduler.forget(checkout_id, generation);
        });
        if let Some(previous) = timers.insert(checkout_id, Timer { generation, handle }) {
            previous.handle.abort();
        }
        drop(timers);
        tracing::debug!("Reminder for checkout {} due at {}", checkout_id, fire_at);
    }

    /// Disarm the timer of a checkout; no-op if none is armed
    pub fn cancel(&self, checkout_id: i64) {
        let timer = self
            .inner
            .timers
            .lock()
            .ok()
            .and_then(|mut timers| timers.remove(&checkout_id));
        if let Some(timer) = timer {
            timer.handle.abort();
            tracing::debug!("Reminder for checkout {} cancelled", checkout_id);
        }
    }

    fn forget(&self, checkout_id: i64, generation: u64) {
        if let Ok(mut timers) = self.inner.timers.lock() {
            if timers.get(&checkout_id).map(|t| t.generation) == Some(generation) {
                timers.remove(&checkout_id);
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.timers.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Re-arm reminders of every confirmed checkout still awaiting one
    pub async fn restore(&self) -> AppResult<usize> {
        let checkouts = self.inner.repository.checkouts.list_awaiting_reminder().await?;
        for checkout in &checkouts {
            self.schedule(checkout);
        }
        Ok(checkouts.len())
    }

    /// Send the reminder of a checkout if it is still due one; true when sent
    pub(crate) async fn fire(&self, checkout_id: i64) -> AppResult<bool> {
        let repository = &self.inner.repository;
        let checkout = match repository.checkouts.get_by_id(checkout_id).await {
            Ok(checkout) => checkout,
            Err(AppError::NotFound(_)) => {
                tracing::debug!("Checkout {} is gone, dropping its reminder", checkout_id);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if checkout.status != CheckoutState::Confirmed || checkout.reminder_sent_at.is_some() {
            tracing::debug!("Checkout {} is {}, no reminder", checkout_id, checkout.status);
            return Ok(false);
        }
        if !repository.checkouts.mark_reminder_sent(checkout_id, Utc::now()).await? {
            return Ok(false);
        }

        let copy = repository.copies.get_by_id(checkout.book_copy_id).await?;
        let book = repository.books.get_by_id(copy.book_id).await?;
        let patron = repository.patrons.get_by_card_number(&checkout.card_number).await?;
        let payload = NotificationPayload::new(&patron, &book.title);

        tracing::info!("Sending return reminder for checkout {} to {}", checkout_id, patron.login);
        if let Err(e) = self.inner.email.send_return_reminder(&payload).await {
            tracing::warn!("Return reminder for checkout {} failed: {}", checkout_id, e);
        }
        if let Err(e) = self.discard_record(&checkout).await {
            tracing::warn!("Failed to drop reminder record of checkout {}: {}", checkout_id, e);
        }
        Ok(true)
    }
}
