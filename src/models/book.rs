//! Book (title) model, its cached snapshot and paging types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{book_copy::BookCopy, category::Category};
use crate::error::AppError;

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
}

/// Update book request (full replacement of the editable fields)
pub type UpdateBook = CreateBook;

/// Everything the book detail page shows, as stored in the detail cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookSnapshot {
    pub book: Book,
    pub category: Option<Category>,
    pub copies: Vec<BookCopy>,
    /// Sum of on-hand amounts over all copies
    pub available: i64,
}

impl BookSnapshot {
    pub fn new(book: Book, category: Option<Category>, copies: Vec<BookCopy>) -> Self {
        let available = copies.iter().map(|c| c.amount as i64).sum();
        Self {
            book,
            category,
            copies,
            available,
        }
    }
}

/// Sortable book columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSortField {
    Id,
    Title,
}

/// Sort order of a listing, rendered as `field,direction` (e.g. `title,asc`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookSort {
    pub field: BookSortField,
    pub ascending: bool,
}

impl Default for BookSort {
    fn default() -> Self {
        Self {
            field: BookSortField::Id,
            ascending: true,
        }
    }
}

impl BookSort {
    /// SQL ORDER BY clause; only whitelisted columns can reach the query
    pub fn order_by(&self) -> &'static str {
        match (self.field, self.ascending) {
            (BookSortField::Id, true) => "id ASC",
            (BookSortField::Id, false) => "id DESC",
            (BookSortField::Title, true) => "title ASC, id ASC",
            (BookSortField::Title, false) => "title DESC, id DESC",
        }
    }
}

impl std::fmt::Display for BookSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let field = match self.field {
            BookSortField::Id => "id",
            BookSortField::Title => "title",
        };
        let direction = if self.ascending { "asc" } else { "desc" };
        write!(f, "{},{}", field, direction)
    }
}

impl std::str::FromStr for BookSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(str::trim);
        let field = match parts.next().unwrap_or("id").to_ascii_lowercase().as_str() {
            "id" => BookSortField::Id,
            "title" => BookSortField::Title,
            other => return Err(AppError::Validation(format!("Unsupported sort field: {}", other))),
        };
        let ascending = match parts.next().map(|d| d.to_ascii_lowercase()) {
            None => true,
            Some(d) if d == "asc" => true,
            Some(d) if d == "desc" => false,
            Some(d) => return Err(AppError::Validation(format!("Unsupported sort direction: {}", d))),
        };
        Ok(Self { field, ascending })
    }
}

/// Normalized page request (zero-based page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    pub sort: BookSort,
}

impl PageRequest {
    pub const DEFAULT_SIZE: i64 = 20;
    pub const MAX_SIZE: i64 = 200;

    pub fn offset(&self) -> i64 {
        self.page * self.size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: Self::DEFAULT_SIZE,
            sort: BookSort::default(),
        }
    }
}

/// Book listing query parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BookListQuery {
    /// Category filter; -1 (or absent) lists every book
    pub category_id: Option<i64>,
    pub page: Option<i64>,
    pub size: Option<i64>,
    /// `field,direction` with field in {id, title}
    pub sort: Option<String>,
}

impl BookListQuery {
    pub fn page_request(&self) -> Result<PageRequest, AppError> {
        let sort = match &self.sort {
            Some(s) => s.parse()?,
            None => BookSort::default(),
        };
        Ok(PageRequest {
            page: self.page.unwrap_or(0).max(0),
            size: self
                .size
                .unwrap_or(PageRequest::DEFAULT_SIZE)
                .clamp(1, PageRequest::MAX_SIZE),
            sort,
        })
    }
}

/// One page of books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookPage {
    pub items: Vec<Book>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}
