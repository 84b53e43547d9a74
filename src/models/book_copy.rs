//! Book copy (inventory unit) model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// A publisher's edition of a book for a given year, with its on-hand amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookCopy {
    pub id: i64,
    pub book_id: i64,
    pub publisher_id: i64,
    pub year_published: i32,
    /// Copies currently on the shelf, never negative
    pub amount: i32,
    pub image: Option<String>,
    pub description: Option<String>,
}

impl BookCopy {
    pub fn is_available(&self) -> bool {
        self.amount > 0
    }
}

/// Create or fully update a copy
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SaveBookCopy {
    pub book_id: i64,
    pub publisher_id: i64,
    #[validate(range(min = 0, max = 9999, message = "Invalid publication year"))]
    pub year_published: i32,
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: i32,
    pub image: Option<String>,
    pub description: Option<String>,
}

/// Partial update request; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PatchBookCopy {
    pub year_published: Option<i32>,
    pub amount: Option<i32>,
    pub image: Option<String>,
    pub description: Option<String>,
}

impl PatchBookCopy {
    /// Merge onto the stored copy, producing a full update
    pub fn apply_to(self, existing: &BookCopy) -> SaveBookCopy {
        SaveBookCopy {
            book_id: existing.book_id,
            publisher_id: existing.publisher_id,
            year_published: self.year_published.unwrap_or(existing.year_published),
            amount: self.amount.unwrap_or(existing.amount),
            image: self.image.or_else(|| existing.image.clone()),
            description: self.description.or_else(|| existing.description.clone()),
        }
    }
}
