//! Checkouts repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::CheckoutStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        checkout::{CheckoutRow, NewCheckout},
        CardNumber, Checkout, CheckoutState,
    },
};

#[derive(Clone)]
pub struct CheckoutsRepository {
    pool: Pool<Postgres>,
}

impl CheckoutsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Checkout with id {} not found", id))
}

fn convert(rows: Vec<CheckoutRow>) -> AppResult<Vec<Checkout>> {
    rows.into_iter().map(Checkout::try_from).collect()
}

#[async_trait]
impl CheckoutStore for CheckoutsRepository {
    async fn get_by_id(&self, id: i64) -> AppResult<Checkout> {
        sqlx::query_as::<_, CheckoutRow>("SELECT * FROM check_out WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))?
            .try_into()
    }

    async fn create(&self, checkout: &NewCheckout) -> AppResult<Checkout> {
        sqlx::query_as::<_, CheckoutRow>(
            r#"
            INSERT INTO check_out (book_copy_id, card_number, start_time, end_time, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(checkout.book_copy_id)
        .bind(checkout.card_number.as_str())
        .bind(checkout.start_time)
        .bind(checkout.end_time)
        .bind(checkout.status)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn save(&self, checkout: &Checkout, expected: CheckoutState) -> AppResult<Option<Checkout>> {
        sqlx::query_as::<_, CheckoutRow>(
            r#"
            UPDATE check_out
            SET end_time = $1, status = $2, reminder_sent_at = $3
            WHERE id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(checkout.end_time)
        .bind(checkout.status)
        .bind(checkout.reminder_sent_at)
        .bind(checkout.id)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?
        .map(Checkout::try_from)
        .transpose()
    }

    async fn delete(&self, id: i64, expected: CheckoutState) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM check_out WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_by_status(&self, status: CheckoutState) -> AppResult<Vec<Checkout>> {
        let rows = sqlx::query_as::<_, CheckoutRow>(
            "SELECT * FROM check_out WHERE status = $1 ORDER BY end_time DESC, id DESC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn list_by_patron(&self, card_number: &CardNumber) -> AppResult<Vec<Checkout>> {
        let rows = sqlx::query_as::<_, CheckoutRow>(
            "SELECT * FROM check_out WHERE card_number = $1 ORDER BY end_time DESC, id DESC",
        )
        .bind(card_number.as_str())
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn list_all(&self) -> AppResult<Vec<Checkout>> {
        let rows = sqlx::query_as::<_, CheckoutRow>(
            "SELECT * FROM check_out ORDER BY end_time DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn list_awaiting_reminder(&self) -> AppResult<Vec<Checkout>> {
        let rows = sqlx::query_as::<_, CheckoutRow>(
            r#"
            SELECT * FROM check_out
            WHERE status = $1 AND reminder_sent_at IS NULL
            ORDER BY end_time
            "#,
        )
        .bind(CheckoutState::Confirmed)
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn mark_reminder_sent(&self, id: i64, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE check_out SET reminder_sent_at = $1 WHERE id = $2 AND reminder_sent_at IS NULL",
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
