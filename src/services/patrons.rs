//! Patron accounts

use chrono::Utc;
use validator::Validate;

use super::{
    checkouts::CheckoutsService,
    search::{SearchKind, SearchService},
};
use crate::{
    error::{AppError, AppResult, Operation},
    models::{
        patron::{CreatePatron, NewPatronAccount, UpdatePatron, UpdatePatronStatus},
        CardNumber, CheckoutState, PatronAccount,
    },
    repository::Repository,
};

const PATRON: &str = "patron account";
const MAX_CARD_ATTEMPTS: usize = 32;

#[derive(Clone)]
pub struct PatronsService {
    repository: Repository,
    checkouts: CheckoutsService,
    search: SearchService,
}

impl PatronsService {
    pub fn new(repository: Repository, checkouts: CheckoutsService, search: SearchService) -> Self {
        Self {
            repository,
            checkouts,
            search,
        }
    }

    /// Draw random card numbers until one is free
    async fn allocate_card_number(&self) -> AppResult<CardNumber> {
        for _ in 0..MAX_CARD_ATTEMPTS {
            let candidate = CardNumber::generate(&mut rand::thread_rng());
            if !self.repository.patrons.exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!("Card number {} already taken, drawing again", candidate);
        }
        Err(AppError::Internal(
            "Could not allocate a free card number".to_string(),
        ))
    }

    pub async fn get(&self, card_number: &CardNumber) -> AppResult<PatronAccount> {
        tracing::debug!("Request to get patron account : {}", card_number);
        self.repository.patrons.get_by_card_number(card_number).await
    }

    pub async fn list(&self, page: i64, size: i64) -> AppResult<(Vec<PatronAccount>, i64)> {
        tracing::debug!("Request to list patron accounts : page {} size {}", page, size);
        self.repository.patrons.list(page.max(0), size.clamp(1, 200)).await
    }

    pub async fn create(&self, request: CreatePatron) -> AppResult<PatronAccount> {
        tracing::debug!("Request to create patron account : {}", request.login);
        request.validate()?;

        if self.repository.patrons.find_by_login(&request.login).await?.is_some() {
            return Err(AppError::Conflict("Login already exists".to_string()));
        }
        if let Some(email) = &request.email {
            if self.repository.patrons.find_by_email(email).await?.is_some() {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }

        let card_number = self.allocate_card_number().await?;
        let created = self
            .repository
            .patrons
            .insert(&NewPatronAccount {
                card_number,
                login: request.login,
                email: request.email,
                first_name: request.first_name,
                last_name: request.last_name,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| e.into_operation_failure(Operation::Create, PATRON))?;

        tracing::info!("Patron account {} created for {}", created.card_number, created.login);
        self.search
            .index(SearchKind::Patron, &created.card_number, &created);
        Ok(created)
    }

    pub async fn update(&self, card_number: &CardNumber, request: UpdatePatron) -> AppResult<PatronAccount> {
        tracing::debug!("Request to update patron account : {}", card_number);
        request.validate()?;
        let mut patron = self.repository.patrons.get_by_card_number(card_number).await?;

        if let Some(email) = &request.email {
            let taken = self.repository.patrons.find_by_email(email).await?;
            if taken.map_or(false, |other| &other.card_number != card_number) {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }

        patron.email = request.email;
        patron.first_name = request.first_name;
        patron.last_name = request.last_name;
        let updated = self
            .repository
            .patrons
            .update(&patron)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Update, PATRON))?;

        self.search
            .index(SearchKind::Patron, &updated.card_number, &updated);
        Ok(updated)
    }

    pub async fn update_status(
        &self,
        card_number: &CardNumber,
        request: UpdatePatronStatus,
    ) -> AppResult<PatronAccount> {
        tracing::debug!("Request to set patron account {} activated={}", card_number, request.activated);
        let mut patron = self.repository.patrons.get_by_card_number(card_number).await?;
        patron.activated = request.activated;
        let updated = self
            .repository
            .patrons
            .update(&patron)
            .await
            .map_err(|e| e.into_operation_failure(Operation::PartialUpdate, PATRON))?;

        tracing::info!(
            "Patron account {} {}",
            updated.card_number,
            if updated.activated { "activated" } else { "deactivated" }
        );
        self.search
            .index(SearchKind::Patron, &updated.card_number, &updated);
        Ok(updated)
    }

    /// Delete an account; its confirmed checkouts are purged first so their
    /// copies go back on the shelf, the rest go with the account
    pub async fn delete(&self, card_number: &CardNumber) -> AppResult<()> {
        tracing::debug!("Request to delete patron account : {}", card_number);
        self.repository.patrons.get_by_card_number(card_number).await?;

        let active: Vec<_> = self
            .repository
            .checkouts
            .list_by_patron(card_number)
            .await?
            .into_iter()
            .filter(|c| c.status == CheckoutState::Confirmed)
            .collect();
        for checkout in active {
            let id = checkout.id;
            self.checkouts.purge(checkout).await.map_err(|e| {
                tracing::warn!("Patron account {} kept, checkout {} not purged: {}", card_number, id, e);
                e.into_operation_failure(Operation::Delete, PATRON)
            })?;
        }

        self.repository
            .patrons
            .delete(card_number)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Delete, PATRON))?;
        self.search.remove(SearchKind::Patron, card_number);
        Ok(())
    }
}
