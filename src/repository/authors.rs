//! Authors repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::AuthorStore;
use crate::{
    error::{AppError, AppResult},
    models::{author::SaveAuthor, Author},
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Author with id {} not found", id))
}

#[async_trait]
impl AuthorStore for AuthorsRepository {
    async fn get_by_id(&self, id: i64) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM author WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self, page: i64, size: i64) -> AppResult<(Vec<Author>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM author")
            .fetch_one(&self.pool)
            .await?;
        let authors = sqlx::query_as::<_, Author>(
            "SELECT * FROM author ORDER BY name, id LIMIT $1 OFFSET $2",
        )
        .bind(size)
        .bind(page * size)
        .fetch_all(&self.pool)
        .await?;
        Ok((authors, total))
    }

    async fn create(&self, author: &SaveAuthor) -> AppResult<Author> {
        let created = sqlx::query_as::<_, Author>("INSERT INTO author (name) VALUES ($1) RETURNING *")
            .bind(&author.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, author: &SaveAuthor) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("UPDATE author SET name = $1 WHERE id = $2 RETURNING *")
            .bind(&author.name)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM author WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}
