//! Publishers repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::PublisherStore;
use crate::{
    error::{AppError, AppResult},
    models::{publisher::SavePublisher, Publisher},
};

#[derive(Clone)]
pub struct PublishersRepository {
    pool: Pool<Postgres>,
}

impl PublishersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Publisher with id {} not found", id))
}

#[async_trait]
impl PublisherStore for PublishersRepository {
    async fn get_by_id(&self, id: i64) -> AppResult<Publisher> {
        sqlx::query_as::<_, Publisher>("SELECT * FROM publisher WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self) -> AppResult<Vec<Publisher>> {
        let publishers = sqlx::query_as::<_, Publisher>("SELECT * FROM publisher ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(publishers)
    }

    async fn create(&self, publisher: &SavePublisher) -> AppResult<Publisher> {
        let created = sqlx::query_as::<_, Publisher>("INSERT INTO publisher (name) VALUES ($1) RETURNING *")
            .bind(&publisher.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, publisher: &SavePublisher) -> AppResult<Publisher> {
        sqlx::query_as::<_, Publisher>("UPDATE publisher SET name = $1 WHERE id = $2 RETURNING *")
            .bind(&publisher.name)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        // Fails on the foreign key while copies still reference the publisher
        let result = sqlx::query("DELETE FROM publisher WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}
