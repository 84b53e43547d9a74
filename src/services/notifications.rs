//! Notification dispatcher: tells a book's waiting patrons it is available

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::{email::EmailService, wait_list_queue::WaitListQueue};
use crate::error::AppResult;

#[derive(Clone)]
pub struct NotificationDispatcher {
    queue: WaitListQueue,
    email: EmailService,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

/// Marks a book as being dispatched until dropped
struct DispatchGuard {
    book_id: i64,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        if let Ok(mut books) = self.in_flight.lock() {
            books.remove(&self.book_id);
        }
    }
}

impl NotificationDispatcher {
    pub fn new(queue: WaitListQueue, email: EmailService) -> Self {
        Self {
            queue,
            email,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn claim(&self, book_id: i64) -> Option<DispatchGuard> {
        let mut books = self.in_flight.lock().ok()?;
        if !books.insert(book_id) {
            return None;
        }
        Some(DispatchGuard {
            book_id,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Notify every patron queued for the book, then remove exactly those entries.
    ///
    /// Returns how many hand-offs the mailer accepted. A failed hand-off is
    /// logged and the patron is not re-queued. Patrons that register while a
    /// dispatch runs are kept for the next one. An unreachable queue reads as
    /// empty; if it goes away between the sends and the clear, the notified
    /// entries stay queued.
    pub async fn dispatch(&self, book_id: i64) -> AppResult<usize> {
        let Some(_guard) = self.claim(book_id) else {
            tracing::debug!("Dispatch for book {} already running, skipping", book_id);
            return Ok(0);
        };

        let drained = match self.queue.drain_all(book_id).await {
            Ok(drained) => drained,
            Err(e) => {
                tracing::warn!("Wait-list queue of book {} unreachable, nobody notified: {}", book_id, e);
                return Ok(0);
            }
        };
        if drained.is_empty() {
            return Ok(0);
        }
        tracing::info!("Book {} is available, notifying {} waiting patrons", book_id, drained.len());

        let mut sent = 0;
        for payload in &drained.payloads {
            match self.email.send_book_available(payload).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!(
                    "Availability mail to {} for book {} failed: {}",
                    payload.username,
                    book_id,
                    e
                ),
            }
        }

        if let Err(e) = self.queue.clear_drained(&drained).await {
            tracing::warn!("Failed to clear notified entries of book {}: {}", book_id, e);
        }
        Ok(sent)
    }

    /// Dispatch, logging instead of returning a failure
    pub async fn dispatch_quietly(&self, book_id: i64) {
        if let Err(e) = self.dispatch(book_id).await {
            tracing::warn!("Notification dispatch for book {} failed: {}", book_id, e);
        }
    }
}
