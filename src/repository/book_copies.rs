//! Book copies repository: inventory amounts live here

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::CopyStore;
use crate::{
    error::{AppError, AppResult},
    models::{book_copy::SaveBookCopy, BookCopy},
};

#[derive(Clone)]
pub struct BookCopiesRepository {
    pool: Pool<Postgres>,
}

impl BookCopiesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Book copy with id {} not found", id))
}

#[async_trait]
impl CopyStore for BookCopiesRepository {
    async fn get_by_id(&self, id: i64) -> AppResult<BookCopy> {
        sqlx::query_as::<_, BookCopy>("SELECT * FROM book_copy WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn list_by_book(&self, book_id: i64) -> AppResult<Vec<BookCopy>> {
        let copies = sqlx::query_as::<_, BookCopy>(
            "SELECT * FROM book_copy WHERE book_id = $1 ORDER BY year_published DESC, id",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(copies)
    }

    async fn find_available(&self, book_id: i64) -> AppResult<Vec<BookCopy>> {
        let copies = sqlx::query_as::<_, BookCopy>(
            "SELECT * FROM book_copy WHERE book_id = $1 AND amount > 0 ORDER BY id",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(copies)
    }

    async fn find_by_publish_year(
        &self,
        publisher_id: i64,
        book_id: i64,
        year_published: i32,
    ) -> AppResult<Option<BookCopy>> {
        let copy = sqlx::query_as::<_, BookCopy>(
            r#"
            SELECT * FROM book_copy
            WHERE publisher_id = $1 AND book_id = $2 AND year_published = $3
            "#,
        )
        .bind(publisher_id)
        .bind(book_id)
        .bind(year_published)
        .fetch_optional(&self.pool)
        .await?;
        Ok(copy)
    }

    async fn create(&self, copy: &SaveBookCopy) -> AppResult<BookCopy> {
        let created = sqlx::query_as::<_, BookCopy>(
            r#"
            INSERT INTO book_copy (book_id, publisher_id, year_published, amount, image, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(copy.book_id)
        .bind(copy.publisher_id)
        .bind(copy.year_published)
        .bind(copy.amount)
        .bind(&copy.image)
        .bind(&copy.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, copy: &SaveBookCopy) -> AppResult<BookCopy> {
        sqlx::query_as::<_, BookCopy>(
            r#"
            UPDATE book_copy
            SET book_id = $1, publisher_id = $2, year_published = $3, amount = $4,
                image = $5, description = $6
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(copy.book_id)
        .bind(copy.publisher_id)
        .bind(copy.year_published)
        .bind(copy.amount)
        .bind(&copy.image)
        .bind(&copy.description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM book_copy WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn delete_by_book(&self, book_id: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM book_copy WHERE book_id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn take_one(&self, id: i64) -> AppResult<Option<BookCopy>> {
        let copy = sqlx::query_as::<_, BookCopy>(
            "UPDATE book_copy SET amount = amount - 1 WHERE id = $1 AND amount > 0 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(copy)
    }

    async fn release_one(&self, id: i64) -> AppResult<BookCopy> {
        sqlx::query_as::<_, BookCopy>(
            "UPDATE book_copy SET amount = amount + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }
}
