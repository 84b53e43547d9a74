//! In-memory stores, a recording mailer and a seeded fixture for unit tests

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{
        author::SaveAuthor,
        book::{CreateBook, UpdateBook},
        book_copy::SaveBookCopy,
        category::SaveCategory,
        checkout::NewCheckout,
        patron::NewPatronAccount,
        publisher::SavePublisher,
        Actor, Author, Book, BookCopy, CardNumber, Category, Checkout, CheckoutState, PageRequest,
        PatronAccount, Publisher, WaitList,
    },
    repository::{
        AuthorStore, BookStore, CategoryStore, CheckoutStore, CopyStore, PatronStore,
        PublisherStore, Repository, WaitListStore,
    },
    services::{
        cache::{CacheStore, MemoryCache},
        email::Mailer,
        search::{NoopIndex, SearchService},
        Services,
    },
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    books: BTreeMap<i64, Book>,
    categories: BTreeMap<i64, Category>,
    publishers: BTreeMap<i64, Publisher>,
    authors: BTreeMap<i64, Author>,
    copies: BTreeMap<i64, BookCopy>,
    checkouts: BTreeMap<i64, Checkout>,
    patrons: BTreeMap<String, PatronAccount>,
    wait_lists: BTreeMap<i64, WaitList>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Every store backed by maps behind one lock
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
    fail_checkout_writes: AtomicBool,
}

fn injected() -> AppError {
    AppError::Database(sqlx::Error::Protocol("injected failure".to_string()))
}

fn missing(what: &str, id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("{} with id {} not found", what, id))
}

fn page_of(mut books: Vec<Book>, page: &PageRequest) -> (Vec<Book>, i64) {
    use crate::models::book::BookSortField;
    books.sort_by(|a, b| {
        let order = match page.sort.field {
            BookSortField::Id => a.id.cmp(&b.id),
            BookSortField::Title => a.title.cmp(&b.title).then(a.id.cmp(&b.id)),
        };
        if page.sort.ascending {
            order
        } else {
            order.reverse()
        }
    });
    let total = books.len() as i64;
    let items = books
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.size as usize)
        .collect();
    (items, total)
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    /// Make every checkout insert, save and delete fail
    pub fn fail_checkout_writes(&self, fail: bool) {
        self.fail_checkout_writes.store(fail, Ordering::SeqCst);
    }

    fn checkout_writes_fail(&self) -> bool {
        self.fail_checkout_writes.load(Ordering::SeqCst)
    }

    pub fn repository(self: &Arc<Self>) -> Repository {
        Repository {
            books: self.clone(),
            categories: self.clone(),
            publishers: self.clone(),
            authors: self.clone(),
            copies: self.clone(),
            checkouts: self.clone(),
            patrons: self.clone(),
            wait_lists: self.clone(),
        }
    }
}

#[async_trait]
impl BookStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        self.tables().books.get(&id).cloned().ok_or_else(|| missing("Book", id))
    }

    async fn list(&self, page: &PageRequest) -> AppResult<(Vec<Book>, i64)> {
        Ok(page_of(self.tables().books.values().cloned().collect(), page))
    }

    async fn list_by_category(&self, category_id: i64, page: &PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let books = self.find_all_by_category(category_id).await?;
        Ok(page_of(books, page))
    }

    async fn find_all_by_category(&self, category_id: i64) -> AppResult<Vec<Book>> {
        Ok(self
            .tables()
            .books
            .values()
            .filter(|b| b.category_id == Some(category_id))
            .cloned()
            .collect())
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let mut tables = self.tables();
        let id = tables.next_id();
        let created = Book {
            id,
            title: book.title.clone(),
            image: book.image.clone(),
            description: book.description.clone(),
            category_id: book.category_id,
        };
        tables.books.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, book: &UpdateBook) -> AppResult<Book> {
        let mut tables = self.tables();
        let stored = tables.books.get_mut(&id).ok_or_else(|| missing("Book", id))?;
        stored.title = book.title.clone();
        stored.image = book.image.clone();
        stored.description = book.description.clone();
        stored.category_id = book.category_id;
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tables = self.tables();
        tables.books.remove(&id).ok_or_else(|| missing("Book", id))?;
        tables.copies.retain(|_, c| c.book_id != id);
        tables.wait_lists.retain(|_, w| w.book_id != id);
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> AppResult<Category> {
        self.tables()
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("Category", id))
    }

    async fn list(&self) -> AppResult<Vec<Category>> {
        Ok(self.tables().categories.values().cloned().collect())
    }

    async fn create(&self, category: &SaveCategory) -> AppResult<Category> {
        let mut tables = self.tables();
        let id = tables.next_id();
        let created = Category {
            id,
            name: category.name.clone(),
            description: category.description.clone(),
        };
        tables.categories.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, category: &SaveCategory) -> AppResult<Category> {
        let mut tables = self.tables();
        let stored = tables.categories.get_mut(&id).ok_or_else(|| missing("Category", id))?;
        stored.name = category.name.clone();
        stored.description = category.description.clone();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tables = self.tables();
        tables.categories.remove(&id).ok_or_else(|| missing("Category", id))?;
        for book in tables.books.values_mut() {
            if book.category_id == Some(id) {
                book.category_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PublisherStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> AppResult<Publisher> {
        self.tables()
            .publishers
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("Publisher", id))
    }

    async fn list(&self) -> AppResult<Vec<Publisher>> {
        let mut publishers: Vec<_> = self.tables().publishers.values().cloned().collect();
        publishers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(publishers)
    }

    async fn create(&self, publisher: &SavePublisher) -> AppResult<Publisher> {
        let mut tables = self.tables();
        let id = tables.next_id();
        let created = Publisher {
            id,
            name: publisher.name.clone(),
        };
        tables.publishers.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, publisher: &SavePublisher) -> AppResult<Publisher> {
        let mut tables = self.tables();
        let stored = tables.publishers.get_mut(&id).ok_or_else(|| missing("Publisher", id))?;
        stored.name = publisher.name.clone();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tables = self.tables();
        if !tables.publishers.contains_key(&id) {
            return Err(missing("Publisher", id));
        }
        if tables.copies.values().any(|c| c.publisher_id == id) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "foreign key violation on book_copy.publisher_id".to_string(),
            )));
        }
        tables.publishers.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl AuthorStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> AppResult<Author> {
        self.tables()
            .authors
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("Author", id))
    }

    async fn list(&self, page: i64, size: i64) -> AppResult<(Vec<Author>, i64)> {
        let mut authors: Vec<_> = self.tables().authors.values().cloned().collect();
        authors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        let total = authors.len() as i64;
        let items = authors
            .into_iter()
            .skip((page * size) as usize)
            .take(size as usize)
            .collect();
        Ok((items, total))
    }

    async fn create(&self, author: &SaveAuthor) -> AppResult<Author> {
        let mut tables = self.tables();
        let id = tables.next_id();
        let created = Author {
            id,
            name: author.name.clone(),
        };
        tables.authors.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, author: &SaveAuthor) -> AppResult<Author> {
        let mut tables = self.tables();
        let stored = tables.authors.get_mut(&id).ok_or_else(|| missing("Author", id))?;
        stored.name = author.name.clone();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        self.tables()
            .authors
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("Author", id))
    }
}

#[async_trait]
impl CopyStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> AppResult<BookCopy> {
        self.tables().copies.get(&id).cloned().ok_or_else(|| missing("Book copy", id))
    }

    async fn list_by_book(&self, book_id: i64) -> AppResult<Vec<BookCopy>> {
        Ok(self
            .tables()
            .copies
            .values()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn find_available(&self, book_id: i64) -> AppResult<Vec<BookCopy>> {
        Ok(self
            .list_by_book(book_id)
            .await?
            .into_iter()
            .filter(BookCopy::is_available)
            .collect())
    }

    async fn find_by_publish_year(
        &self,
        publisher_id: i64,
        book_id: i64,
        year_published: i32,
    ) -> AppResult<Option<BookCopy>> {
        Ok(self
            .tables()
            .copies
            .values()
            .find(|c| {
                c.publisher_id == publisher_id
                    && c.book_id == book_id
                    && c.year_published == year_published
            })
            .cloned())
    }

    async fn create(&self, copy: &SaveBookCopy) -> AppResult<BookCopy> {
        let mut tables = self.tables();
        let duplicate = tables.copies.values().any(|c| {
            c.publisher_id == copy.publisher_id
                && c.book_id == copy.book_id
                && c.year_published == copy.year_published
        });
        if duplicate {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "unique violation on book_copy".to_string(),
            )));
        }
        let id = tables.next_id();
        let created = BookCopy {
            id,
            book_id: copy.book_id,
            publisher_id: copy.publisher_id,
            year_published: copy.year_published,
            amount: copy.amount,
            image: copy.image.clone(),
            description: copy.description.clone(),
        };
        tables.copies.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, copy: &SaveBookCopy) -> AppResult<BookCopy> {
        let mut tables = self.tables();
        let stored = tables.copies.get_mut(&id).ok_or_else(|| missing("Book copy", id))?;
        stored.book_id = copy.book_id;
        stored.publisher_id = copy.publisher_id;
        stored.year_published = copy.year_published;
        stored.amount = copy.amount;
        stored.image = copy.image.clone();
        stored.description = copy.description.clone();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        self.tables()
            .copies
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("Book copy", id))
    }

    async fn delete_by_book(&self, book_id: i64) -> AppResult<u64> {
        let mut tables = self.tables();
        let before = tables.copies.len();
        tables.copies.retain(|_, c| c.book_id != book_id);
        Ok((before - tables.copies.len()) as u64)
    }

    async fn take_one(&self, id: i64) -> AppResult<Option<BookCopy>> {
        let mut tables = self.tables();
        let stored = tables.copies.get_mut(&id).ok_or_else(|| missing("Book copy", id))?;
        if stored.amount <= 0 {
            return Ok(None);
        }
        stored.amount -= 1;
        Ok(Some(stored.clone()))
    }

    async fn release_one(&self, id: i64) -> AppResult<BookCopy> {
        let mut tables = self.tables();
        let stored = tables.copies.get_mut(&id).ok_or_else(|| missing("Book copy", id))?;
        stored.amount += 1;
        Ok(stored.clone())
    }
}

#[async_trait]
impl CheckoutStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> AppResult<Checkout> {
        self.tables()
            .checkouts
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("Checkout", id))
    }

    async fn create(&self, checkout: &NewCheckout) -> AppResult<Checkout> {
        if self.checkout_writes_fail() {
            return Err(injected());
        }
        let mut tables = self.tables();
        let id = tables.next_id();
        let created = Checkout {
            id,
            book_copy_id: checkout.book_copy_id,
            card_number: checkout.card_number.clone(),
            start_time: checkout.start_time,
            end_time: checkout.end_time,
            status: checkout.status,
            reminder_sent_at: None,
        };
        tables.checkouts.insert(id, created.clone());
        Ok(created)
    }

    async fn save(&self, checkout: &Checkout, expected: CheckoutState) -> AppResult<Option<Checkout>> {
        if self.checkout_writes_fail() {
            return Err(injected());
        }
        let mut tables = self.tables();
        let Some(stored) = tables.checkouts.get_mut(&checkout.id) else {
            return Ok(None);
        };
        if stored.status != expected {
            return Ok(None);
        }
        stored.end_time = checkout.end_time;
        stored.status = checkout.status;
        stored.reminder_sent_at = checkout.reminder_sent_at;
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, id: i64, expected: CheckoutState) -> AppResult<bool> {
        if self.checkout_writes_fail() {
            return Err(injected());
        }
        let mut tables = self.tables();
        if tables.checkouts.get(&id).map(|c| c.status) != Some(expected) {
            return Ok(false);
        }
        tables.checkouts.remove(&id);
        Ok(true)
    }

    async fn list_by_status(&self, status: CheckoutState) -> AppResult<Vec<Checkout>> {
        let mut checkouts = self.list_all().await?;
        checkouts.retain(|c| c.status == status);
        Ok(checkouts)
    }

    async fn list_by_patron(&self, card_number: &CardNumber) -> AppResult<Vec<Checkout>> {
        let mut checkouts = self.list_all().await?;
        checkouts.retain(|c| &c.card_number == card_number);
        Ok(checkouts)
    }

    async fn list_all(&self) -> AppResult<Vec<Checkout>> {
        let mut checkouts: Vec<_> = self.tables().checkouts.values().cloned().collect();
        checkouts.sort_by(|a, b| b.end_time.cmp(&a.end_time).then(b.id.cmp(&a.id)));
        Ok(checkouts)
    }

    async fn list_awaiting_reminder(&self) -> AppResult<Vec<Checkout>> {
        let mut checkouts = self.list_by_status(CheckoutState::Confirmed).await?;
        checkouts.retain(|c| c.reminder_sent_at.is_none());
        Ok(checkouts)
    }

    async fn mark_reminder_sent(&self, id: i64, at: DateTime<Utc>) -> AppResult<bool> {
        let mut tables = self.tables();
        match tables.checkouts.get_mut(&id) {
            Some(stored) if stored.reminder_sent_at.is_none() => {
                stored.reminder_sent_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PatronStore for MemoryDb {
    async fn get_by_card_number(&self, card_number: &CardNumber) -> AppResult<PatronAccount> {
        self.tables()
            .patrons
            .get(card_number.as_str())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Patron account {} not found", card_number)))
    }

    async fn exists(&self, card_number: &CardNumber) -> AppResult<bool> {
        Ok(self.tables().patrons.contains_key(card_number.as_str()))
    }

    async fn find_by_login(&self, login: &str) -> AppResult<Option<PatronAccount>> {
        Ok(self
            .tables()
            .patrons
            .values()
            .find(|p| p.login.eq_ignore_ascii_case(login))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<PatronAccount>> {
        Ok(self
            .tables()
            .patrons
            .values()
            .find(|p| p.email.as_deref().map_or(false, |e| e.eq_ignore_ascii_case(email)))
            .cloned())
    }

    async fn insert(&self, patron: &NewPatronAccount) -> AppResult<PatronAccount> {
        let mut tables = self.tables();
        if tables.patrons.contains_key(patron.card_number.as_str()) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "duplicate card number".to_string(),
            )));
        }
        let created = PatronAccount {
            card_number: patron.card_number.clone(),
            login: patron.login.clone(),
            email: patron.email.clone(),
            first_name: patron.first_name.clone(),
            last_name: patron.last_name.clone(),
            activated: true,
            created_at: patron.created_at,
        };
        tables
            .patrons
            .insert(patron.card_number.to_string(), created.clone());
        Ok(created)
    }

    async fn update(&self, patron: &PatronAccount) -> AppResult<PatronAccount> {
        let mut tables = self.tables();
        let stored = tables
            .patrons
            .get_mut(patron.card_number.as_str())
            .ok_or_else(|| AppError::NotFound(format!("Patron account {} not found", patron.card_number)))?;
        stored.email = patron.email.clone();
        stored.first_name = patron.first_name.clone();
        stored.last_name = patron.last_name.clone();
        stored.activated = patron.activated;
        Ok(stored.clone())
    }

    async fn list(&self, page: i64, size: i64) -> AppResult<(Vec<PatronAccount>, i64)> {
        let mut patrons: Vec<_> = self.tables().patrons.values().cloned().collect();
        patrons.sort_by(|a, b| a.login.cmp(&b.login));
        let total = patrons.len() as i64;
        let items = patrons
            .into_iter()
            .skip((page * size) as usize)
            .take(size as usize)
            .collect();
        Ok((items, total))
    }

    async fn delete(&self, card_number: &CardNumber) -> AppResult<()> {
        let mut tables = self.tables();
        tables
            .patrons
            .remove(card_number.as_str())
            .ok_or_else(|| AppError::NotFound(format!("Patron account {} not found", card_number)))?;
        tables.checkouts.retain(|_, c| &c.card_number != card_number);
        tables.wait_lists.retain(|_, w| &w.card_number != card_number);
        Ok(())
    }
}

#[async_trait]
impl WaitListStore for MemoryDb {
    async fn get_by_id(&self, id: i64) -> AppResult<WaitList> {
        self.tables()
            .wait_lists
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("Wait list", id))
    }

    async fn list(&self) -> AppResult<Vec<WaitList>> {
        Ok(self.tables().wait_lists.values().cloned().collect())
    }

    async fn create(
        &self,
        book_id: i64,
        card_number: &CardNumber,
        created_at: DateTime<Utc>,
    ) -> AppResult<WaitList> {
        let mut tables = self.tables();
        let id = tables.next_id();
        let created = WaitList {
            id,
            book_id,
            card_number: card_number.clone(),
            created_at,
        };
        tables.wait_lists.insert(id, created.clone());
        Ok(created)
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        self.tables()
            .wait_lists
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("Wait list", id))
    }

    async fn delete_by_book(&self, book_id: i64) -> AppResult<u64> {
        let mut tables = self.tables();
        let before = tables.wait_lists.len();
        tables.wait_lists.retain(|_, w| w.book_id != book_id);
        Ok((before - tables.wait_lists.len()) as u64)
    }

    async fn delete_all(&self) -> AppResult<()> {
        self.tables().wait_lists.clear();
        Ok(())
    }
}

/// Memory cache that can be taken offline, or made to refuse list pushes only
#[derive(Default)]
pub struct SwitchableCache {
    inner: MemoryCache,
    down: AtomicBool,
    refuse_pushes: AtomicBool,
}

impl SwitchableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails while the cache is down
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn refuse_pushes(&self, refuse: bool) {
        self.refuse_pushes.store(refuse, Ordering::SeqCst);
    }

    fn check(&self) -> AppResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::Cache("Connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for SwitchableCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn delete(&self, keys: &[String]) -> AppResult<()> {
        self.check()?;
        self.inner.delete(keys).await
    }

    async fn scan_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        self.check()?;
        self.inner.scan_prefix(prefix).await
    }

    async fn list_push(&self, key: &str, value: &str) -> AppResult<()> {
        self.check()?;
        if self.refuse_pushes.load(Ordering::SeqCst) {
            return Err(AppError::Cache(format!("RPUSH {} refused", key)));
        }
        self.inner.list_push(key, value).await
    }

    async fn list_range(&self, key: &str) -> AppResult<Vec<String>> {
        self.check()?;
        self.inner.list_range(key).await
    }

    async fn list_drop_front(&self, key: &str, count: usize) -> AppResult<()> {
        self.check()?;
        self.inner.list_drop_front(key, count).await
    }

    async fn set_add(&self, key: &str, member: &str) -> AppResult<bool> {
        self.check()?;
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> AppResult<()> {
        self.check()?;
        self.inner.set_remove(key, members).await
    }

    async fn ping(&self) -> AppResult<()> {
        self.check()?;
        self.inner.ping().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer that keeps every accepted message
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail_for: HashSet<String>,
    fail_all: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            fail_for: addresses.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<SentMail> {
        self.sent().into_iter().filter(|m| m.to == address).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str, _is_html: bool) -> AppResult<()> {
        if self.fail_all || self.fail_for.contains(to) {
            return Err(AppError::Mail(format!("refused {}", to)));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub fn staff() -> Actor {
    Actor::staff("librarian")
}

pub fn patron_actor(patron: &PatronAccount) -> Actor {
    Actor::patron(&patron.login, patron.card_number.clone())
}

/// Fully wired services over memory stores, seeded with one category, one
/// publisher, one book ("Dune") with one copy on hand, and one patron
/// (ann@example.org)
pub struct Fixture {
    pub db: Arc<MemoryDb>,
    pub cache: Arc<SwitchableCache>,
    pub mailer: Arc<RecordingMailer>,
    pub services: Services,
    pub category: Category,
    pub publisher: Publisher,
    pub book: Book,
    pub copy: BookCopy,
    pub patron: PatronAccount,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_mailer(RecordingMailer::new()).await
    }

    pub async fn with_mailer(mailer: RecordingMailer) -> Self {
        let db = Arc::new(MemoryDb::new());
        let cache = Arc::new(SwitchableCache::new());
        let mailer = Arc::new(mailer);
        let repository = db.repository();
        let services = Services::new(
            repository.clone(),
            cache.clone(),
            mailer.clone(),
            SearchService::new(Arc::new(NoopIndex)),
            &AppConfig::default(),
        );

        let category = repository
            .categories
            .create(&SaveCategory {
                name: "Science fiction".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let publisher = repository
            .publishers
            .create(&SavePublisher {
                name: "Chilton Books".to_string(),
            })
            .await
            .unwrap();
        let book = repository
            .books
            .create(&CreateBook {
                title: "Dune".to_string(),
                image: None,
                description: None,
                category_id: Some(category.id),
            })
            .await
            .unwrap();
        let copy = repository
            .copies
            .create(&SaveBookCopy {
                book_id: book.id,
                publisher_id: publisher.id,
                year_published: 1965,
                amount: 1,
                image: None,
                description: None,
            })
            .await
            .unwrap();

        let mut fixture = Self {
            db,
            cache,
            mailer,
            services,
            category,
            publisher,
            book,
            copy,
            patron: placeholder_patron(),
        };
        fixture.patron = fixture.add_patron("ann", Some("ann@example.org")).await;
        fixture
    }

    pub async fn add_publisher(&self, name: &str) -> Publisher {
        self.services
            .repository
            .publishers
            .create(&SavePublisher {
                name: name.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn add_patron(&self, login: &str, email: Option<&str>) -> PatronAccount {
        let card_number = format!("{:010}", self.services.repository.patrons.list(0, 1000).await.unwrap().1 + 1)
            .parse()
            .unwrap();
        self.services
            .repository
            .patrons
            .insert(&NewPatronAccount {
                card_number,
                login: login.to_string(),
                email: email.map(str::to_string),
                first_name: None,
                last_name: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    /// Store a checkout of the seeded copy for the seeded patron, bypassing the lifecycle
    pub async fn insert_checkout(&self, status: CheckoutState, end_time: DateTime<Utc>) -> Checkout {
        self.services
            .repository
            .checkouts
            .create(&NewCheckout {
                book_copy_id: self.copy.id,
                card_number: self.patron.card_number.clone(),
                start_time: Utc::now(),
                end_time,
                status,
            })
            .await
            .unwrap()
    }

    pub async fn amount(&self, copy_id: i64) -> i32 {
        self.services.repository.copies.get_by_id(copy_id).await.unwrap().amount
    }

    pub async fn set_amount(&self, copy_id: i64, amount: i32) {
        let copies = &self.services.repository.copies;
        let stored = copies.get_by_id(copy_id).await.unwrap();
        copies
            .update(
                copy_id,
                &SaveBookCopy {
                    book_id: stored.book_id,
                    publisher_id: stored.publisher_id,
                    year_published: stored.year_published,
                    amount,
                    image: stored.image,
                    description: stored.description,
                },
            )
            .await
            .unwrap();
    }
}

fn placeholder_patron() -> PatronAccount {
    PatronAccount {
        card_number: "0000000000".parse().unwrap(),
        login: String::new(),
        email: None,
        first_name: None,
        last_name: None,
        activated: true,
        created_at: Utc::now(),
    }
}
