//! Wait-list records and the per-book notification queue behind them

use chrono::Utc;

use super::{
    notifications::NotificationDispatcher,
    search::{SearchKind, SearchService},
    wait_list_queue::WaitListQueue,
};
use crate::{
    error::{AppResult, Operation},
    models::{wait_list::CreateWaitList, Actor, NotificationPayload, WaitList},
    repository::Repository,
};

const WAIT_LIST: &str = "wait list";

#[derive(Clone)]
pub struct WaitListsService {
    repository: Repository,
    queue: WaitListQueue,
    notifications: NotificationDispatcher,
    search: SearchService,
}

impl WaitListsService {
    pub fn new(
        repository: Repository,
        queue: WaitListQueue,
        notifications: NotificationDispatcher,
        search: SearchService,
    ) -> Self {
        Self {
            repository,
            queue,
            notifications,
            search,
        }
    }

    pub async fn get(&self, id: i64) -> AppResult<WaitList> {
        tracing::debug!("Request to get wait list : {}", id);
        self.repository.wait_lists.get_by_id(id).await
    }

    pub async fn list(&self) -> AppResult<Vec<WaitList>> {
        tracing::debug!("Request to list wait lists");
        self.repository.wait_lists.list().await
    }

    /// Register a patron for a book: durable row, then the deduplicated queue.
    ///
    /// The row is kept even when the queue write fails.
    pub async fn create(&self, request: CreateWaitList, actor: &Actor) -> AppResult<WaitList> {
        tracing::debug!(
            "Request to create wait list for book {} and patron {}",
            request.book_id,
            request.card_number
        );
        actor.require_card(&request.card_number)?;
        let book = self.repository.books.get_by_id(request.book_id).await?;
        let patron = self
            .repository
            .patrons
            .get_by_card_number(&request.card_number)
            .await?;

        let created = self
            .repository
            .wait_lists
            .create(book.id, &patron.card_number, Utc::now())
            .await
            .map_err(|e| e.into_operation_failure(Operation::Create, WAIT_LIST))?;

        let payload = NotificationPayload::new(&patron, &book.title);
        match self.queue.add(book.id, &payload).await {
            Ok(true) => tracing::info!("Patron {} queued for book {}", patron.login, book.id),
            Ok(false) => tracing::debug!("Patron {} already queued for book {}", patron.login, book.id),
            Err(e) => tracing::warn!("Failed to queue patron {} for book {}: {}", patron.login, book.id, e),
        }

        self.search.index(SearchKind::WaitList, created.id, &created);
        Ok(created)
    }

    /// Remove one durable record; the queued payload stays until dispatched
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        tracing::debug!("Request to delete wait list : {}", id);
        self.repository.wait_lists.get_by_id(id).await?;
        self.repository
            .wait_lists
            .delete(id)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Delete, WAIT_LIST))?;
        self.search.remove(SearchKind::WaitList, id);
        Ok(())
    }

    /// Maintenance: drop every durable record and every book's queue
    ///
    /// Only the record removal decides success; queues left behind by an
    /// unreachable cache are logged.
    pub async fn delete_all(&self) -> AppResult<()> {
        tracing::debug!("Request to delete all wait lists");
        let existing = self.repository.wait_lists.list().await?;
        self.repository
            .wait_lists
            .delete_all()
            .await
            .map_err(|e| e.into_operation_failure(Operation::Delete, WAIT_LIST))?;
        if let Err(e) = self.queue.clear_all().await {
            tracing::warn!("Wait-list records removed but queues were not cleared: {}", e);
        }

        for record in &existing {
            self.search.remove(SearchKind::WaitList, record.id);
        }
        tracing::info!("Removed {} wait list records and all queues", existing.len());
        Ok(())
    }

    /// Payloads currently queued for a book, in notification order
    pub async fn queued(&self, book_id: i64) -> AppResult<Vec<NotificationPayload>> {
        tracing::debug!("Request to inspect wait list queue of book : {}", book_id);
        self.repository.books.get_by_id(book_id).await?;
        Ok(self.queue.drain_all(book_id).await?.payloads)
    }

    /// Notify the book's queue now, whatever its availability
    pub async fn notify(&self, book_id: i64) -> AppResult<usize> {
        tracing::debug!("Request to notify wait list of book : {}", book_id);
        self.repository.books.get_by_id(book_id).await?;
        self.notifications.dispatch(book_id).await
    }
}
