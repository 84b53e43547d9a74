//! Repository layer: store interfaces and their PostgreSQL implementations
//!
//! Services only see the traits, so tests can swap in in-memory stores.
//! None of the stores provide row locking to their callers. The
//! concurrency-sensitive writes are conditional updates instead: taking a
//! copy only while its amount is positive, and saving or deleting a checkout
//! only while it still has the status the caller read.

pub mod authors;
pub mod book_copies;
pub mod books;
pub mod categories;
pub mod checkouts;
pub mod patrons;
pub mod publishers;
pub mod wait_lists;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        author::SaveAuthor,
        book::{CreateBook, UpdateBook},
        book_copy::SaveBookCopy,
        category::SaveCategory,
        checkout::NewCheckout,
        patron::NewPatronAccount,
        publisher::SavePublisher,
        Author, Book, BookCopy, CardNumber, Category, Checkout, CheckoutState, PageRequest,
        PatronAccount, Publisher, WaitList,
    },
};

#[async_trait]
pub trait BookStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<Book>;
    async fn list(&self, page: &PageRequest) -> AppResult<(Vec<Book>, i64)>;
    async fn list_by_category(&self, category_id: i64, page: &PageRequest) -> AppResult<(Vec<Book>, i64)>;
    async fn find_all_by_category(&self, category_id: i64) -> AppResult<Vec<Book>>;
    async fn create(&self, book: &CreateBook) -> AppResult<Book>;
    async fn update(&self, id: i64, book: &UpdateBook) -> AppResult<Book>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<Category>;
    async fn list(&self) -> AppResult<Vec<Category>>;
    async fn create(&self, category: &SaveCategory) -> AppResult<Category>;
    async fn update(&self, id: i64, category: &SaveCategory) -> AppResult<Category>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[async_trait]
pub trait PublisherStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<Publisher>;
    async fn list(&self) -> AppResult<Vec<Publisher>>;
    async fn create(&self, publisher: &SavePublisher) -> AppResult<Publisher>;
    async fn update(&self, id: i64, publisher: &SavePublisher) -> AppResult<Publisher>;
    /// Fails while any copy still references the publisher
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<Author>;
    async fn list(&self, page: i64, size: i64) -> AppResult<(Vec<Author>, i64)>;
    async fn create(&self, author: &SaveAuthor) -> AppResult<Author>;
    async fn update(&self, id: i64, author: &SaveAuthor) -> AppResult<Author>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

/// Inventory store: the source of truth for copy amounts
#[async_trait]
pub trait CopyStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<BookCopy>;
    async fn list_by_book(&self, book_id: i64) -> AppResult<Vec<BookCopy>>;
    /// Copies of the book with amount > 0
    async fn find_available(&self, book_id: i64) -> AppResult<Vec<BookCopy>>;
    /// The copy holding (publisher, book, year), if any
    async fn find_by_publish_year(
        &self,
        publisher_id: i64,
        book_id: i64,
        year_published: i32,
    ) -> AppResult<Option<BookCopy>>;
    async fn create(&self, copy: &SaveBookCopy) -> AppResult<BookCopy>;
    async fn update(&self, id: i64, copy: &SaveBookCopy) -> AppResult<BookCopy>;
    async fn delete(&self, id: i64) -> AppResult<()>;
    async fn delete_by_book(&self, book_id: i64) -> AppResult<u64>;
    /// Decrement the amount only if it is still positive; `None` when it was not
    async fn take_one(&self, id: i64) -> AppResult<Option<BookCopy>>;
    async fn release_one(&self, id: i64) -> AppResult<BookCopy>;
}

#[async_trait]
pub trait CheckoutStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<Checkout>;
    async fn create(&self, checkout: &NewCheckout) -> AppResult<Checkout>;
    /// Write a checkout only if its stored status is still `expected`;
    /// `None` when it moved on or is gone
    async fn save(&self, checkout: &Checkout, expected: CheckoutState) -> AppResult<Option<Checkout>>;
    /// Delete a checkout only if its stored status is still `expected`
    async fn delete(&self, id: i64, expected: CheckoutState) -> AppResult<bool>;
    async fn list_by_status(&self, status: CheckoutState) -> AppResult<Vec<Checkout>>;
    /// Newest due date first
    async fn list_by_patron(&self, card_number: &CardNumber) -> AppResult<Vec<Checkout>>;
    async fn list_all(&self) -> AppResult<Vec<Checkout>>;
    /// Confirmed checkouts whose reminder has not gone out yet
    async fn list_awaiting_reminder(&self) -> AppResult<Vec<Checkout>>;
    /// Record the reminder as sent; false if another caller already did
    async fn mark_reminder_sent(&self, id: i64, at: DateTime<Utc>) -> AppResult<bool>;
}

#[async_trait]
pub trait PatronStore: Send + Sync {
    async fn get_by_card_number(&self, card_number: &CardNumber) -> AppResult<PatronAccount>;
    async fn exists(&self, card_number: &CardNumber) -> AppResult<bool>;
    async fn find_by_login(&self, login: &str) -> AppResult<Option<PatronAccount>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<PatronAccount>>;
    async fn insert(&self, patron: &NewPatronAccount) -> AppResult<PatronAccount>;
    async fn update(&self, patron: &PatronAccount) -> AppResult<PatronAccount>;
    async fn list(&self, page: i64, size: i64) -> AppResult<(Vec<PatronAccount>, i64)>;
    async fn delete(&self, card_number: &CardNumber) -> AppResult<()>;
}

#[async_trait]
pub trait WaitListStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<WaitList>;
    async fn list(&self) -> AppResult<Vec<WaitList>>;
    async fn create(
        &self,
        book_id: i64,
        card_number: &CardNumber,
        created_at: DateTime<Utc>,
    ) -> AppResult<WaitList>;
    async fn delete(&self, id: i64) -> AppResult<()>;
    async fn delete_by_book(&self, book_id: i64) -> AppResult<u64>;
    async fn delete_all(&self) -> AppResult<()>;
}

/// Main repository struct holding every store
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub categories: Arc<dyn CategoryStore>,
    pub publishers: Arc<dyn PublisherStore>,
    pub authors: Arc<dyn AuthorStore>,
    pub copies: Arc<dyn CopyStore>,
    pub checkouts: Arc<dyn CheckoutStore>,
    pub patrons: Arc<dyn PatronStore>,
    pub wait_lists: Arc<dyn WaitListStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            categories: Arc::new(categories::CategoriesRepository::new(pool.clone())),
            publishers: Arc::new(publishers::PublishersRepository::new(pool.clone())),
            authors: Arc::new(authors::AuthorsRepository::new(pool.clone())),
            copies: Arc::new(book_copies::BookCopiesRepository::new(pool.clone())),
            checkouts: Arc::new(checkouts::CheckoutsRepository::new(pool.clone())),
            patrons: Arc::new(patrons::PatronsRepository::new(pool.clone())),
            wait_lists: Arc::new(wait_lists::WaitListsRepository::new(pool)),
        }
    }
}
