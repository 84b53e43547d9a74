//! Wait-list records repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::WaitListStore;
use crate::{
    error::{AppError, AppResult},
    models::{wait_list::WaitListRow, CardNumber, WaitList},
};

#[derive(Clone)]
pub struct WaitListsRepository {
    pool: Pool<Postgres>,
}

impl WaitListsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Wait list with id {} not found", id))
}

#[async_trait]
impl WaitListStore for WaitListsRepository {
    async fn get_by_id(&self, id: i64) -> AppResult<WaitList> {
        sqlx::query_as::<_, WaitListRow>("SELECT * FROM wait_list WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))?
            .try_into()
    }

    async fn list(&self) -> AppResult<Vec<WaitList>> {
        let rows = sqlx::query_as::<_, WaitListRow>("SELECT * FROM wait_list ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(WaitList::try_from).collect()
    }

    async fn create(
        &self,
        book_id: i64,
        card_number: &CardNumber,
        created_at: DateTime<Utc>,
    ) -> AppResult<WaitList> {
        sqlx::query_as::<_, WaitListRow>(
            r#"
            INSERT INTO wait_list (book_id, card_number, created_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(card_number.as_str())
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM wait_list WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn delete_by_book(&self, book_id: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM wait_list WHERE book_id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> AppResult<()> {
        sqlx::query("TRUNCATE TABLE wait_list")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
