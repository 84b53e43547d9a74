//! Wait-list records and the notification payload queued for each waiting patron

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::patron::{CardNumber, PatronAccount};

/// Durable wait-list record (not deduplicated)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WaitList {
    pub id: i64,
    pub book_id: i64,
    pub card_number: CardNumber,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct WaitListRow {
    pub id: i64,
    pub book_id: i64,
    pub card_number: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<WaitListRow> for WaitList {
    type Error = crate::error::AppError;

    fn try_from(row: WaitListRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            book_id: row.book_id,
            card_number: row.card_number.trim().parse()?,
            created_at: row.created_at,
        })
    }
}

/// Register a patron for availability of a book
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateWaitList {
    pub book_id: i64,
    pub card_number: CardNumber,
}

/// What a mail hand-off needs to know about one patron and one title.
///
/// Its JSON encoding is also the dedup key of a book's queue, so the field
/// order is part of the queue format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct NotificationPayload {
    pub username: String,
    pub email: Option<String>,
    pub book_title: String,
}

impl NotificationPayload {
    pub fn new(patron: &PatronAccount, book_title: &str) -> Self {
        Self {
            username: patron.display_name(),
            email: patron.email.clone(),
            book_title: book_title.to_string(),
        }
    }
}
