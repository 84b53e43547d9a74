//! Patron account model and card numbers

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// Library card number: exactly ten ASCII digits, zero padded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct CardNumber(String);

impl CardNumber {
    pub const WIDTH: usize = 10;
    const MAX: u32 = 999_999_999;

    /// Draw a random card number in 0000000001..=0999999999
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let n: u32 = rng.gen_range(1..=Self::MAX);
        CardNumber(format!("{:0width$}", n, width = Self::WIDTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for CardNumber {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == Self::WIDTH && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(CardNumber(s.to_string()))
        } else {
            Err(AppError::Validation(format!("Invalid card number: {}", s)))
        }
    }
}

impl TryFrom<String> for CardNumber {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CardNumber> for String {
    fn from(card: CardNumber) -> Self {
        card.0
    }
}

impl std::fmt::Display for CardNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted patron account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatronAccount {
    pub card_number: CardNumber,
    pub login: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
}

impl PatronAccount {
    /// Name used to greet the patron in messages
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.login.clone(),
        }
    }
}

/// Patron account row as returned by the database
#[derive(Debug, FromRow)]
pub struct PatronAccountRow {
    pub card_number: String,
    pub login: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PatronAccountRow> for PatronAccount {
    type Error = AppError;

    fn try_from(row: PatronAccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            card_number: row.card_number.trim().parse()?,
            login: row.login,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            activated: row.activated,
            created_at: row.created_at,
        })
    }
}

/// A patron account that has been assigned a card number but not yet stored.
///
/// The key is chosen by the application rather than by a database sequence,
/// so "new" cannot be inferred from a missing key and is a distinct type.
#[derive(Debug, Clone)]
pub struct NewPatronAccount {
    pub card_number: CardNumber,
    pub login: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create patron request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreatePatron {
    #[validate(length(min = 1, max = 50, message = "Login must be 1 to 50 characters"))]
    pub login: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Update patron profile request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdatePatron {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Activate or deactivate an account
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePatronStatus {
    pub activated: bool,
}
