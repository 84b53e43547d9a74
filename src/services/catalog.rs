//! Catalog service: books and categories, with their cache maintenance

use validator::Validate;

use super::{
    availability::AvailabilityCache,
    search::{SearchKind, SearchService},
    wait_list_queue::WaitListQueue,
};
use crate::{
    error::{AppError, AppResult, Operation},
    models::{
        book::{BookListQuery, CreateBook, UpdateBook},
        category::SaveCategory,
        Book, BookCopy, BookPage, BookSnapshot, Category,
    },
    repository::Repository,
};

/// Listing filter value meaning "every category"
pub const ALL_CATEGORIES: i64 = -1;

const BOOK: &str = "book";
const CATEGORY: &str = "category";

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    availability: AvailabilityCache,
    queue: WaitListQueue,
    search: SearchService,
}

impl CatalogService {
    pub fn new(
        repository: Repository,
        availability: AvailabilityCache,
        queue: WaitListQueue,
        search: SearchService,
    ) -> Self {
        Self {
            repository,
            availability,
            queue,
            search,
        }
    }

    /// Assemble the detail snapshot of a book from the store
    async fn snapshot(&self, book: Book) -> AppResult<BookSnapshot> {
        let category = match book.category_id {
            Some(category_id) => match self.repository.categories.get_by_id(category_id).await {
                Ok(category) => Some(category),
                Err(AppError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        let copies = self.repository.copies.list_by_book(book.id).await?;
        Ok(BookSnapshot::new(book, category, copies))
    }

    async fn cache_snapshot(&self, snapshot: &BookSnapshot) {
        if let Err(e) = self.availability.put_detail(snapshot).await {
            tracing::warn!("Failed to cache book {}: {}", snapshot.book.id, e);
        }
    }

    /// Rebuild the detail entry of a book only if one is currently cached
    async fn refresh_cached_detail(&self, book: Book) {
        if !self.availability.has_detail(book.id).await {
            return;
        }
        match self.snapshot(book).await {
            Ok(snapshot) => self.cache_snapshot(&snapshot).await,
            Err(e) => tracing::warn!("Failed to refresh cached book detail: {}", e),
        }
    }

    async fn evict_category(&self, category_id: Option<i64>) {
        if let Some(category_id) = category_id {
            if let Err(e) = self.availability.invalidate_category(category_id).await {
                tracing::warn!("Failed to evict listings of category {}: {}", category_id, e);
            }
        }
    }

    async fn evict_detail(&self, book_id: i64) {
        if let Err(e) = self.availability.invalidate_detail(book_id).await {
            tracing::warn!("Failed to evict book {}: {}", book_id, e);
        }
    }

    async fn evict_category_list(&self) {
        if let Err(e) = self.availability.invalidate_categories().await {
            tracing::warn!("Failed to evict category list: {}", e);
        }
    }

    /// Book detail, read through the detail cache
    pub async fn get_book(&self, id: i64) -> AppResult<BookSnapshot> {
        tracing::debug!("Request to get book : {}", id);
        if let Some(snapshot) = self.availability.get_detail(id).await {
            return Ok(snapshot);
        }
        let book = self.repository.books.get_by_id(id).await?;
        let snapshot = self.snapshot(book).await?;
        self.cache_snapshot(&snapshot).await;
        Ok(snapshot)
    }

    /// One page of books, optionally restricted to a category
    pub async fn list_books(&self, query: &BookListQuery) -> AppResult<BookPage> {
        let request = query.page_request()?;
        let category_id = query.category_id.unwrap_or(ALL_CATEGORIES);
        tracing::debug!("Request to list books of category : {}", category_id);

        if category_id == ALL_CATEGORIES {
            let (items, total) = self.repository.books.list(&request).await?;
            return Ok(BookPage {
                items,
                total,
                page: request.page,
                size: request.size,
            });
        }

        if let Some(page) = self.availability.get_listing(category_id, &request).await {
            return Ok(page);
        }
        let (items, total) = self
            .repository
            .books
            .list_by_category(category_id, &request)
            .await?;
        let page = BookPage {
            items,
            total,
            page: request.page,
            size: request.size,
        };
        if let Err(e) = self.availability.put_listing(category_id, &page, &request).await {
            tracing::warn!("Failed to cache listing of category {}: {}", category_id, e);
        }
        Ok(page)
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        tracing::debug!("Request to create book : {}", book.title);
        book.validate()?;
        self.ensure_category(book.category_id).await?;

        let created = self
            .repository
            .books
            .create(&book)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Create, BOOK))?;

        self.evict_category(created.category_id).await;
        self.search.index(SearchKind::Book, created.id, &created);
        Ok(created)
    }

    pub async fn update_book(&self, id: i64, book: UpdateBook) -> AppResult<Book> {
        tracing::debug!("Request to update book : {}", id);
        book.validate()?;
        self.ensure_category(book.category_id).await?;

        let existing = self.repository.books.get_by_id(id).await?;
        let updated = self
            .repository
            .books
            .update(id, &book)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Update, BOOK))?;

        self.evict_category(existing.category_id).await;
        if updated.category_id != existing.category_id {
            self.evict_category(updated.category_id).await;
        }
        self.refresh_cached_detail(updated.clone()).await;
        self.search.index(SearchKind::Book, updated.id, &updated);
        Ok(updated)
    }

    /// Delete a book together with its copies, wait-list records and queue
    pub async fn delete_book(&self, id: i64) -> AppResult<()> {
        tracing::debug!("Request to delete book : {}", id);
        let book = self.repository.books.get_by_id(id).await?;

        async {
            self.repository.copies.delete_by_book(id).await?;
            self.repository.wait_lists.delete_by_book(id).await?;
            self.repository.books.delete(id).await
        }
        .await
        .map_err(|e: AppError| e.into_operation_failure(Operation::Delete, BOOK))?;

        if let Err(e) = self.queue.clear(id).await {
            tracing::warn!("Failed to clear wait-list queue of book {}: {}", id, e);
        }
        self.evict_detail(id).await;
        self.evict_category(book.category_id).await;
        self.search.remove(SearchKind::Book, id);
        Ok(())
    }

    /// Copies of a book, straight from the store
    pub async fn book_copies(&self, book_id: i64) -> AppResult<Vec<BookCopy>> {
        self.repository.books.get_by_id(book_id).await?;
        self.repository.copies.list_by_book(book_id).await
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> AppResult<()> {
        if let Some(category_id) = category_id {
            self.repository.categories.get_by_id(category_id).await?;
        }
        Ok(())
    }

    /// Every category, read through the cached category list
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        tracing::debug!("Request to list categories");
        if let Some(categories) = self.availability.get_categories().await {
            return Ok(categories);
        }
        let categories = self.repository.categories.list().await?;
        if let Err(e) = self.availability.put_categories(&categories).await {
            tracing::warn!("Failed to cache category list: {}", e);
        }
        Ok(categories)
    }

    pub async fn get_category(&self, id: i64) -> AppResult<Category> {
        tracing::debug!("Request to get category : {}", id);
        self.repository.categories.get_by_id(id).await
    }

    pub async fn create_category(&self, category: SaveCategory) -> AppResult<Category> {
        tracing::debug!("Request to create category : {}", category.name);
        category.validate()?;
        let created = self
            .repository
            .categories
            .create(&category)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Create, CATEGORY))?;

        self.evict_category_list().await;
        self.search.index(SearchKind::Category, created.id, &created);
        Ok(created)
    }

    /// Rename or describe a category; cached details of its books are refreshed
    pub async fn update_category(&self, id: i64, category: SaveCategory) -> AppResult<Category> {
        tracing::debug!("Request to update category : {}", id);
        category.validate()?;
        let updated = self
            .repository
            .categories
            .update(id, &category)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Update, CATEGORY))?;

        self.evict_category_list().await;
        self.evict_category(Some(id)).await;
        match self.repository.books.find_all_by_category(id).await {
            Ok(books) => {
                for book in books {
                    self.refresh_cached_detail(book).await;
                }
            }
            Err(e) => tracing::warn!("Failed to refresh books of category {}: {}", id, e),
        }
        self.search.index(SearchKind::Category, updated.id, &updated);
        Ok(updated)
    }

    /// Delete a category; its books become uncategorized
    pub async fn delete_category(&self, id: i64) -> AppResult<()> {
        tracing::debug!("Request to delete category : {}", id);
        let books = self.repository.books.find_all_by_category(id).await?;
        self.repository
            .categories
            .delete(id)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Delete, CATEGORY))?;

        self.evict_category_list().await;
        self.evict_category(Some(id)).await;
        for book in books {
            self.evict_detail(book.id).await;
        }
        self.search.remove(SearchKind::Category, id);
        Ok(())
    }
}
