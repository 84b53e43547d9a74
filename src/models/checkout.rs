//! Checkout (reservation/loan) model and its lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

use super::{claims::Actor, patron::CardNumber};
use crate::error::{AppError, AppResult};

/// Lifecycle state of a checkout.
///
/// `Returned`, `Canceled` and `Refused` are terminal. A checkout holds one
/// unit of its copy's amount exactly while it is `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutState {
    Pending,
    Confirmed,
    Returned,
    Canceled,
    Refused,
}

/// What a transition does to the copy's on-hand amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyEffect {
    Keep,
    /// Decrement by one; fails when nothing is on hand
    Take,
    /// Increment by one and report an availability transition
    Release,
}

/// A checked, legal state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<CheckoutState>,
    pub to: CheckoutState,
    pub copy: CopyEffect,
}

impl CheckoutState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Pending => "pending",
            CheckoutState::Confirmed => "confirmed",
            CheckoutState::Returned => "returned",
            CheckoutState::Canceled => "canceled",
            CheckoutState::Refused => "refused",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Returned | CheckoutState::Canceled | CheckoutState::Refused
        )
    }

    /// Decide the state a new checkout is stored in.
    ///
    /// Patrons always land in `Pending` whatever they asked for; staff may
    /// create directly in `Confirmed`, which takes a copy.
    pub fn plan_creation(
        requested: Option<CheckoutState>,
        actor: &Actor,
        end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Transition> {
        let to = if actor.is_privileged() {
            requested.unwrap_or(CheckoutState::Pending)
        } else {
            CheckoutState::Pending
        };

        match to {
            CheckoutState::Pending => Ok(Transition {
                from: None,
                to,
                copy: CopyEffect::Keep,
            }),
            CheckoutState::Confirmed => {
                ensure_due_in_future(end_time, now)?;
                Ok(Transition {
                    from: None,
                    to,
                    copy: CopyEffect::Take,
                })
            }
            other => Err(AppError::Validation(format!(
                "A checkout cannot be created as {}",
                other.as_str()
            ))),
        }
    }

    /// Check a requested state change and work out its copy effect
    pub fn plan_transition(
        self,
        target: CheckoutState,
        actor: &Actor,
        end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Transition> {
        use CheckoutState::*;

        if self.is_terminal() {
            return Err(AppError::Validation(format!(
                "Checkout is already {}",
                self.as_str()
            )));
        }

        let legal = matches!(
            (self, target),
            (Pending, Pending | Confirmed | Canceled | Refused)
                | (Confirmed, Confirmed | Returned | Canceled | Refused)
        );
        if !legal {
            return Err(AppError::Validation(format!(
                "Cannot move a checkout from {} to {}",
                self.as_str(),
                target.as_str()
            )));
        }

        let staff_only = match (self, target) {
            (_, Confirmed) | (_, Refused) | (_, Returned) => true,
            (Confirmed, Canceled) => true,
            _ => false,
        };
        if staff_only && !actor.is_privileged() {
            return Err(AppError::Authorization(format!(
                "Only staff can move a checkout to {}",
                target.as_str()
            )));
        }

        if target == Confirmed {
            ensure_due_in_future(end_time, now)?;
        }

        let copy = match (self, target) {
            (Confirmed, Confirmed) => CopyEffect::Keep,
            (_, Confirmed) => CopyEffect::Take,
            (Confirmed, _) => CopyEffect::Release,
            _ => CopyEffect::Keep,
        };

        Ok(Transition {
            from: Some(self),
            to: target,
            copy,
        })
    }
}

fn ensure_due_in_future(end_time: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
    if end_time <= now {
        return Err(AppError::Validation(
            "End time is less than current time!".to_string(),
        ));
    }
    Ok(())
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckoutState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(CheckoutState::Pending),
            "confirmed" => Ok(CheckoutState::Confirmed),
            "returned" => Ok(CheckoutState::Returned),
            "canceled" => Ok(CheckoutState::Canceled),
            "refused" => Ok(CheckoutState::Refused),
            _ => Err(format!("Invalid checkout status: {}", s)),
        }
    }
}

// SQLx conversion for CheckoutState
impl sqlx::Type<Postgres> for CheckoutState {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for CheckoutState {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for CheckoutState {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Checkout model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Checkout {
    pub id: i64,
    pub book_copy_id: i64,
    pub card_number: CardNumber,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: CheckoutState,
    pub reminder_sent_at: Option<DateTime<Utc>>,
}

impl Checkout {
    pub fn is_returned(&self) -> bool {
        self.status == CheckoutState::Returned
    }
}

#[derive(Debug, FromRow)]
pub struct CheckoutRow {
    pub id: i64,
    pub book_copy_id: i64,
    pub card_number: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: CheckoutState,
    pub reminder_sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<CheckoutRow> for Checkout {
    type Error = AppError;

    fn try_from(row: CheckoutRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            book_copy_id: row.book_copy_id,
            card_number: row.card_number.trim().parse()?,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status,
            reminder_sent_at: row.reminder_sent_at,
        })
    }
}

/// Checkout about to be inserted
#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub book_copy_id: i64,
    pub card_number: CardNumber,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: CheckoutState,
}

/// Create checkout request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCheckout {
    pub book_copy_id: i64,
    pub card_number: CardNumber,
    /// Due time
    pub end_time: DateTime<Utc>,
    /// Requested initial state; ignored for patrons
    pub status: Option<CheckoutState>,
}

/// Full update request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateCheckout {
    pub end_time: DateTime<Utc>,
    pub status: CheckoutState,
}

/// Partial update request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PatchCheckout {
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<CheckoutState>,
}

/// Checkout listing filters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CheckoutQuery {
    pub status: Option<CheckoutState>,
    pub card_number: Option<CardNumber>,
}
