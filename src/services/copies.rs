//! Copy administration: inventory edits outside the checkout lifecycle

use validator::Validate;

use super::{
    availability::AvailabilityCache,
    notifications::NotificationDispatcher,
    search::{SearchKind, SearchService},
};
use crate::{
    error::{AppError, AppResult, Operation},
    models::{
        book_copy::{PatchBookCopy, SaveBookCopy},
        BookCopy,
    },
    repository::Repository,
};

const BOOK_COPY: &str = "book copy";

#[derive(Clone)]
pub struct CopiesService {
    repository: Repository,
    availability: AvailabilityCache,
    notifications: NotificationDispatcher,
    search: SearchService,
}

impl CopiesService {
    pub fn new(
        repository: Repository,
        availability: AvailabilityCache,
        notifications: NotificationDispatcher,
        search: SearchService,
    ) -> Self {
        Self {
            repository,
            availability,
            notifications,
            search,
        }
    }

    async fn evict_detail(&self, book_id: i64) {
        if let Err(e) = self.availability.invalidate_detail(book_id).await {
            tracing::warn!("Failed to evict book {}: {}", book_id, e);
        }
    }

    /// Reject a (publisher, book, year) already held by a copy other than `own_id`
    async fn ensure_unique_year(&self, copy: &SaveBookCopy, own_id: Option<i64>) -> AppResult<()> {
        let existing = self
            .repository
            .copies
            .find_by_publish_year(copy.publisher_id, copy.book_id, copy.year_published)
            .await?;
        match existing {
            Some(existing) if Some(existing.id) != own_id => {
                Err(AppError::Validation("Publish year existed!".to_string()))
            }
            _ => Ok(()),
        }
    }

    pub async fn get(&self, id: i64) -> AppResult<BookCopy> {
        tracing::debug!("Request to get book copy : {}", id);
        self.repository.copies.get_by_id(id).await
    }

    /// Add a copy; the book's waiting patrons are told if it was unavailable
    pub async fn create(&self, copy: SaveBookCopy) -> AppResult<BookCopy> {
        tracing::debug!("Request to create book copy of book : {}", copy.book_id);
        copy.validate()?;
        self.repository.books.get_by_id(copy.book_id).await?;
        self.repository.publishers.get_by_id(copy.publisher_id).await?;
        self.ensure_unique_year(&copy, None).await?;

        let was_available = !self
            .repository
            .copies
            .find_available(copy.book_id)
            .await?
            .is_empty();

        let created = self
            .repository
            .copies
            .create(&copy)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Create, BOOK_COPY))?;

        self.evict_detail(created.book_id).await;
        self.search.index(SearchKind::BookCopy, created.id, &created);
        if !was_available && created.is_available() {
            self.notifications.dispatch_quietly(created.book_id).await;
        }
        Ok(created)
    }

    pub async fn update(&self, id: i64, copy: SaveBookCopy) -> AppResult<BookCopy> {
        tracing::debug!("Request to update book copy : {}", id);
        self.save(id, copy, Operation::Update).await
    }

    /// Merge the given fields onto the stored copy and save it like a full update
    pub async fn patch(&self, id: i64, patch: PatchBookCopy) -> AppResult<BookCopy> {
        tracing::debug!("Request to partially update book copy : {}", id);
        let existing = self.repository.copies.get_by_id(id).await?;
        self.save(id, patch.apply_to(&existing), Operation::PartialUpdate)
            .await
    }

    async fn save(&self, id: i64, copy: SaveBookCopy, operation: Operation) -> AppResult<BookCopy> {
        copy.validate()?;
        let existing = self.repository.copies.get_by_id(id).await?;
        if copy.book_id != existing.book_id {
            self.repository.books.get_by_id(copy.book_id).await?;
        }
        if copy.publisher_id != existing.publisher_id {
            self.repository.publishers.get_by_id(copy.publisher_id).await?;
        }
        self.ensure_unique_year(&copy, Some(id)).await?;

        let others_available = self
            .repository
            .copies
            .find_available(copy.book_id)
            .await?
            .iter()
            .any(|c| c.id != id);

        let updated = self
            .repository
            .copies
            .update(id, &copy)
            .await
            .map_err(|e| e.into_operation_failure(operation, BOOK_COPY))?;

        self.evict_detail(existing.book_id).await;
        if updated.book_id != existing.book_id {
            self.evict_detail(updated.book_id).await;
        }
        self.search.index(SearchKind::BookCopy, updated.id, &updated);

        let restocked = !existing.is_available() || updated.book_id != existing.book_id;
        if restocked && updated.is_available() && !others_available {
            self.notifications.dispatch_quietly(updated.book_id).await;
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        tracing::debug!("Request to delete book copy : {}", id);
        let existing = self.repository.copies.get_by_id(id).await?;
        self.repository
            .copies
            .delete(id)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Delete, BOOK_COPY))?;

        self.evict_detail(existing.book_id).await;
        self.search.remove(SearchKind::BookCopy, id);
        Ok(())
    }
}
