//! Patron accounts repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::PatronStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        patron::{NewPatronAccount, PatronAccountRow},
        CardNumber, PatronAccount,
    },
};

#[derive(Clone)]
pub struct PatronsRepository {
    pool: Pool<Postgres>,
}

impl PatronsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn not_found(card_number: &CardNumber) -> AppError {
    AppError::NotFound(format!("Patron account {} not found", card_number))
}

/// Map unique violations on login/email to a conflict
fn map_unique(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::Conflict("Login or email already exists".to_string());
        }
    }
    AppError::Database(e)
}

#[async_trait]
impl PatronStore for PatronsRepository {
    async fn get_by_card_number(&self, card_number: &CardNumber) -> AppResult<PatronAccount> {
        sqlx::query_as::<_, PatronAccountRow>("SELECT * FROM patron_account WHERE card_number = $1")
            .bind(card_number.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(card_number))?
            .try_into()
    }

    async fn exists(&self, card_number: &CardNumber) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM patron_account WHERE card_number = $1)",
        )
        .bind(card_number.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn find_by_login(&self, login: &str) -> AppResult<Option<PatronAccount>> {
        sqlx::query_as::<_, PatronAccountRow>(
            "SELECT * FROM patron_account WHERE LOWER(login) = LOWER($1)",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?
        .map(PatronAccount::try_from)
        .transpose()
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<PatronAccount>> {
        sqlx::query_as::<_, PatronAccountRow>(
            "SELECT * FROM patron_account WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(PatronAccount::try_from)
        .transpose()
    }

    async fn insert(&self, patron: &NewPatronAccount) -> AppResult<PatronAccount> {
        sqlx::query_as::<_, PatronAccountRow>(
            r#"
            INSERT INTO patron_account (card_number, login, email, first_name, last_name, activated, created_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6)
            RETURNING *
            "#,
        )
        .bind(patron.card_number.as_str())
        .bind(&patron.login)
        .bind(&patron.email)
        .bind(&patron.first_name)
        .bind(&patron.last_name)
        .bind(patron.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)?
        .try_into()
    }

    async fn update(&self, patron: &PatronAccount) -> AppResult<PatronAccount> {
        sqlx::query_as::<_, PatronAccountRow>(
            r#"
            UPDATE patron_account
            SET email = $1, first_name = $2, last_name = $3, activated = $4
            WHERE card_number = $5
            RETURNING *
            "#,
        )
        .bind(&patron.email)
        .bind(&patron.first_name)
        .bind(&patron.last_name)
        .bind(patron.activated)
        .bind(patron.card_number.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique)?
        .ok_or_else(|| not_found(&patron.card_number))?
        .try_into()
    }

    async fn list(&self, page: i64, size: i64) -> AppResult<(Vec<PatronAccount>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patron_account")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, PatronAccountRow>(
            "SELECT * FROM patron_account ORDER BY login LIMIT $1 OFFSET $2",
        )
        .bind(size)
        .bind(page * size)
        .fetch_all(&self.pool)
        .await?;

        let patrons = rows
            .into_iter()
            .map(PatronAccount::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((patrons, total))
    }

    async fn delete(&self, card_number: &CardNumber) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM patron_account WHERE card_number = $1")
            .bind(card_number.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(card_number));
        }
        Ok(())
    }
}
