//! Checkout lifecycle: creation, transitions, returns and purges
//!
//! Entering `Confirmed` takes one unit of the copy and leaving it gives the
//! unit back. The copy amount and the checkout row live in separate writes,
//! so every copy-changing transition runs as a small saga:
//!
//! 1. change the amount (the take is a conditional decrement)
//! 2. write the reminder side record
//! 3. save the checkout
//! 4. if the save failed, undo 2 and 1 and report a generic failure
//!
//! The guarantee is best-effort: a crash between 1 and 4 leaves the amount
//! off by one.

use chrono::Utc;

use super::{
    availability::AvailabilityCache,
    notifications::NotificationDispatcher,
    reminders::ReminderScheduler,
    search::{SearchKind, SearchService},
};
use crate::{
    error::{AppError, AppResult, Operation},
    models::{
        checkout::{
            CheckoutQuery, CopyEffect, CreateCheckout, NewCheckout, PatchCheckout, UpdateCheckout,
        },
        Actor, BookCopy, Checkout, CheckoutState,
    },
    repository::Repository,
};

const CHECKOUT: &str = "checkout";
const NOT_AVAILABLE: &str = "The book is no longer available!";

#[derive(Clone)]
pub struct CheckoutsService {
    repository: Repository,
    availability: AvailabilityCache,
    reminders: ReminderScheduler,
    notifications: NotificationDispatcher,
    search: SearchService,
}

fn ensure_owner(checkout: &Checkout, actor: &Actor) -> AppResult<()> {
    if actor.is_privileged() || actor.card_number.as_ref() == Some(&checkout.card_number) {
        Ok(())
    } else {
        Err(AppError::Authorization(format!(
            "Checkout {} belongs to another patron",
            checkout.id
        )))
    }
}

fn changed_underneath(id: i64) -> AppError {
    AppError::Conflict(format!("Checkout {} was changed by another request", id))
}

impl CheckoutsService {
    pub fn new(
        repository: Repository,
        availability: AvailabilityCache,
        reminders: ReminderScheduler,
        notifications: NotificationDispatcher,
        search: SearchService,
    ) -> Self {
        Self {
            repository,
            availability,
            reminders,
            notifications,
            search,
        }
    }

    async fn evict_detail(&self, book_id: i64) {
        if let Err(e) = self.availability.invalidate_detail(book_id).await {
            tracing::warn!("Failed to evict book {}: {}", book_id, e);
        }
    }

    /// Decrement the copy amount, re-checking it right before the write
    async fn take_copy(&self, copy_id: i64) -> AppResult<BookCopy> {
        let copy = self.repository.copies.get_by_id(copy_id).await?;
        if !copy.is_available() {
            return Err(AppError::Validation(NOT_AVAILABLE.to_string()));
        }
        self.repository
            .copies
            .take_one(copy_id)
            .await?
            .ok_or_else(|| AppError::Conflict(NOT_AVAILABLE.to_string()))
    }

    async fn undo_take(&self, copy_id: i64) {
        if let Err(e) = self.repository.copies.release_one(copy_id).await {
            tracing::error!("Failed to give back copy {} after aborted checkout: {}", copy_id, e);
        }
    }

    async fn undo_release(&self, copy_id: i64) {
        match self.repository.copies.take_one(copy_id).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::error!(
                "Copy {} was taken again before an aborted release could be undone",
                copy_id
            ),
            Err(e) => tracing::error!("Failed to undo release of copy {}: {}", copy_id, e),
        }
    }

    async fn discard_record(&self, checkout: &Checkout) {
        if let Err(e) = self.reminders.discard_record(checkout).await {
            tracing::warn!("Failed to drop reminder record of checkout {}: {}", checkout.id, e);
        }
    }

    /// Drop the side record of a lost race unless the winner left the checkout confirmed
    async fn settle_record(&self, checkout: &Checkout) {
        match self.repository.checkouts.get_by_id(checkout.id).await {
            Ok(current) if current.status == CheckoutState::Confirmed => {}
            _ => self.discard_record(checkout).await,
        }
    }

    /// Everything that follows a confirmed checkout being stored
    async fn after_take(&self, saved: &Checkout, copy: &BookCopy) {
        self.reminders.schedule(saved);
        self.evict_detail(copy.book_id).await;
    }

    /// Everything that follows a checkout releasing its copy
    async fn after_release(&self, checkout: &Checkout, copy: &BookCopy, was_available: bool) {
        self.reminders.cancel(checkout.id);
        self.discard_record(checkout).await;
        self.evict_detail(copy.book_id).await;
        if !was_available {
            self.notifications.dispatch_quietly(copy.book_id).await;
        }
    }

    pub async fn get(&self, id: i64, actor: &Actor) -> AppResult<Checkout> {
        tracing::debug!("Request to get checkout : {}", id);
        let checkout = self.repository.checkouts.get_by_id(id).await?;
        ensure_owner(&checkout, actor)?;
        Ok(checkout)
    }

    /// Checkouts filtered by status and/or card, newest due first; patrons see only their own
    pub async fn list(&self, query: CheckoutQuery, actor: &Actor) -> AppResult<Vec<Checkout>> {
        tracing::debug!("Request to list checkouts : {:?}", query);
        let card_number = if actor.is_privileged() {
            query.card_number
        } else {
            let own = actor
                .card_number
                .clone()
                .ok_or_else(|| AppError::Authorization("No library card attached".to_string()))?;
            if query.card_number.as_ref().map_or(false, |c| c != &own) {
                return Err(AppError::Authorization(
                    "Cannot list checkouts of another patron".to_string(),
                ));
            }
            Some(own)
        };

        let checkouts = match (query.status, card_number) {
            (Some(status), Some(card)) => {
                let mut checkouts = self.repository.checkouts.list_by_patron(&card).await?;
                checkouts.retain(|c| c.status == status);
                checkouts
            }
            (Some(status), None) => self.repository.checkouts.list_by_status(status).await?,
            (None, Some(card)) => self.repository.checkouts.list_by_patron(&card).await?,
            (None, None) => self.repository.checkouts.list_all().await?,
        };
        Ok(checkouts)
    }

    /// Create a checkout; patrons always get a pending request
    pub async fn create(&self, request: CreateCheckout, actor: &Actor) -> AppResult<Checkout> {
        tracing::debug!("Request to create checkout of copy : {}", request.book_copy_id);
        actor.require_card(&request.card_number)?;

        let now = Utc::now();
        let transition =
            CheckoutState::plan_creation(request.status, actor, request.end_time, now)?;

        let copy = self.repository.copies.get_by_id(request.book_copy_id).await?;
        let patron = self
            .repository
            .patrons
            .get_by_card_number(&request.card_number)
            .await?;
        if !patron.activated {
            return Err(AppError::Validation(format!(
                "Patron account {} is not activated",
                patron.card_number
            )));
        }

        let new = NewCheckout {
            book_copy_id: copy.id,
            card_number: request.card_number,
            start_time: now,
            end_time: request.end_time,
            status: transition.to,
        };

        let created = match transition.copy {
            CopyEffect::Take => {
                let copy = self
                    .take_copy(copy.id)
                    .await
                    .map_err(|e| e.into_operation_failure(Operation::Create, CHECKOUT))?;
                let created = match self.repository.checkouts.create(&new).await {
                    Ok(created) => created,
                    Err(e) => {
                        self.undo_take(copy.id).await;
                        return Err(e.into_operation_failure(Operation::Create, CHECKOUT));
                    }
                };
                if let Err(e) = self.reminders.record(&created).await {
                    tracing::warn!("Failed to write reminder record of checkout {}: {}", created.id, e);
                }
                self.after_take(&created, &copy).await;
                created
            }
            _ => self
                .repository
                .checkouts
                .create(&new)
                .await
                .map_err(|e| e.into_operation_failure(Operation::Create, CHECKOUT))?,
        };

        tracing::info!("Checkout {} created as {}", created.id, created.status);
        self.search.index(SearchKind::Checkout, created.id, &created);
        Ok(created)
    }

    pub async fn update(&self, id: i64, request: UpdateCheckout, actor: &Actor) -> AppResult<Checkout> {
        tracing::debug!("Request to update checkout : {}", id);
        let existing = self.repository.checkouts.get_by_id(id).await?;
        self.apply(existing, request.end_time, request.status, actor, Operation::Update)
            .await
    }

    /// Absent fields keep their stored value
    pub async fn patch(&self, id: i64, request: PatchCheckout, actor: &Actor) -> AppResult<Checkout> {
        tracing::debug!("Request to partially update checkout : {}", id);
        let existing = self.repository.checkouts.get_by_id(id).await?;
        let end_time = request.end_time.unwrap_or(existing.end_time);
        let status = request.status.unwrap_or(existing.status);
        self.apply(existing, end_time, status, actor, Operation::PartialUpdate)
            .await
    }

    /// Mark a confirmed checkout as returned
    pub async fn return_checkout(&self, id: i64, actor: &Actor) -> AppResult<Checkout> {
        tracing::debug!("Request to return checkout : {}", id);
        let existing = self.repository.checkouts.get_by_id(id).await?;
        let end_time = existing.end_time;
        self.apply(existing, end_time, CheckoutState::Returned, actor, Operation::Update)
            .await
    }

    async fn apply(
        &self,
        existing: Checkout,
        end_time: chrono::DateTime<Utc>,
        target: CheckoutState,
        actor: &Actor,
        operation: Operation,
    ) -> AppResult<Checkout> {
        ensure_owner(&existing, actor)?;
        let transition = existing
            .status
            .plan_transition(target, actor, end_time, Utc::now())?;

        let mut next = existing.clone();
        next.status = target;
        next.end_time = end_time;
        let renewed = transition.copy == CopyEffect::Keep
            && target == CheckoutState::Confirmed
            && end_time != existing.end_time;
        if renewed {
            next.reminder_sent_at = None;
        }

        let saved = match transition.copy {
            CopyEffect::Take => {
                let copy = self
                    .take_copy(existing.book_copy_id)
                    .await
                    .map_err(|e| e.into_operation_failure(operation, CHECKOUT))?;
                if let Err(e) = self.reminders.record(&next).await {
                    tracing::warn!("Failed to write reminder record of checkout {}: {}", next.id, e);
                }
                let saved = match self.repository.checkouts.save(&next, existing.status).await {
                    Ok(Some(saved)) => saved,
                    Ok(None) => {
                        self.settle_record(&next).await;
                        self.undo_take(copy.id).await;
                        return Err(changed_underneath(next.id));
                    }
                    Err(e) => {
                        self.discard_record(&next).await;
                        self.undo_take(copy.id).await;
                        return Err(e.into_operation_failure(operation, CHECKOUT));
                    }
                };
                self.after_take(&saved, &copy).await;
                saved
            }
            CopyEffect::Release => {
                let copy = self
                    .repository
                    .copies
                    .get_by_id(existing.book_copy_id)
                    .await
                    .map_err(|e| e.into_operation_failure(operation, CHECKOUT))?;
                let was_available = !self
                    .repository
                    .copies
                    .find_available(copy.book_id)
                    .await
                    .map_err(|e| e.into_operation_failure(operation, CHECKOUT))?
                    .is_empty();
                let copy = self
                    .repository
                    .copies
                    .release_one(copy.id)
                    .await
                    .map_err(|e| e.into_operation_failure(operation, CHECKOUT))?;
                let saved = match self.repository.checkouts.save(&next, existing.status).await {
                    Ok(Some(saved)) => saved,
                    Ok(None) => {
                        self.undo_release(copy.id).await;
                        return Err(changed_underneath(next.id));
                    }
                    Err(e) => {
                        self.undo_release(copy.id).await;
                        return Err(e.into_operation_failure(operation, CHECKOUT));
                    }
                };
                self.after_release(&saved, &copy, was_available).await;
                saved
            }
            CopyEffect::Keep => {
                let saved = self
                    .repository
                    .checkouts
                    .save(&next, existing.status)
                    .await
                    .map_err(|e| e.into_operation_failure(operation, CHECKOUT))?
                    .ok_or_else(|| changed_underneath(next.id))?;
                if renewed {
                    if let Err(e) = self.reminders.record(&saved).await {
                        tracing::warn!("Failed to rewrite reminder record of checkout {}: {}", saved.id, e);
                    }
                    self.reminders.schedule(&saved);
                }
                saved
            }
        };

        if saved.status != existing.status {
            tracing::info!("Checkout {} moved from {} to {}", saved.id, existing.status, saved.status);
        }
        self.search.index(SearchKind::Checkout, saved.id, &saved);
        Ok(saved)
    }

    /// Remove a checkout record; a confirmed one gives its copy back first
    pub async fn delete(&self, id: i64, actor: &Actor) -> AppResult<()> {
        tracing::debug!("Request to delete checkout : {}", id);
        actor.require_privileged()?;
        let existing = self.repository.checkouts.get_by_id(id).await?;
        self.purge(existing).await
    }

    /// Delete a checkout read just before, releasing its copy if it is confirmed
    pub(crate) async fn purge(&self, existing: Checkout) -> AppResult<()> {
        let id = existing.id;
        if existing.status != CheckoutState::Confirmed {
            let deleted = self
                .repository
                .checkouts
                .delete(id, existing.status)
                .await
                .map_err(|e| e.into_operation_failure(Operation::Delete, CHECKOUT))?;
            if !deleted {
                return Err(changed_underneath(id));
            }
            self.reminders.cancel(id);
            self.search.remove(SearchKind::Checkout, id);
            return Ok(());
        }

        let released = async {
            let copy = self.repository.copies.get_by_id(existing.book_copy_id).await?;
            let was_available = !self
                .repository
                .copies
                .find_available(copy.book_id)
                .await?
                .is_empty();
            let copy = self.repository.copies.release_one(copy.id).await?;
            Ok::<_, AppError>((copy, was_available))
        }
        .await;
        let (copy, was_available) =
            released.map_err(|e| e.into_operation_failure(Operation::Delete, CHECKOUT))?;

        match self.repository.checkouts.delete(id, CheckoutState::Confirmed).await {
            Ok(true) => {}
            Ok(false) => {
                self.undo_release(copy.id).await;
                return Err(changed_underneath(id));
            }
            Err(e) => {
                self.undo_release(copy.id).await;
                return Err(e.into_operation_failure(Operation::Delete, CHECKOUT));
            }
        }

        tracing::info!("Confirmed checkout {} purged, copy {} released", id, copy.id);
        self.after_release(&existing, &copy, was_available).await;
        self.search.remove(SearchKind::Checkout, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationPayload;
    use crate::services::cache::{keys, CacheStore};
    use crate::testing::{patron_actor, staff, Fixture};
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn request(f: &Fixture, status: Option<CheckoutState>) -> CreateCheckout {
        CreateCheckout {
            book_copy_id: f.copy.id,
            card_number: f.patron.card_number.clone(),
            end_time: Utc::now() + Duration::days(14),
            status,
        }
    }

    fn to(status: CheckoutState) -> PatchCheckout {
        PatchCheckout {
            status: Some(status),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_patron_asking_for_confirmed_gets_pending() {
        let f = Fixture::new().await;
        let created = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &patron_actor(&f.patron))
            .await
            .unwrap();

        assert_eq!(created.status, CheckoutState::Pending);
        let stored = f.services.repository.checkouts.get_by_id(created.id).await.unwrap();
        assert_eq!(stored.status, CheckoutState::Pending);
        assert_eq!(f.amount(f.copy.id).await, 1);
    }

    #[tokio::test]
    async fn test_staff_confirmation_takes_the_copy_and_arms_a_reminder() {
        let f = Fixture::new().await;
        let created = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();

        assert_eq!(created.status, CheckoutState::Confirmed);
        assert_eq!(f.amount(f.copy.id).await, 0);
        assert_eq!(f.services.reminders.pending(), 1);
        let key = keys::checkout_record(created.card_number.as_str(), created.id);
        assert!(f.cache.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_confirming_requires_future_due_time_except_refusal() {
        let f = Fixture::new().await;
        let pending = f
            .insert_checkout(CheckoutState::Pending, Utc::now() + Duration::days(1))
            .await;
        let checkouts = &f.services.checkouts;

        let err = checkouts
            .patch(
                pending.id,
                PatchCheckout {
                    end_time: Some(Utc::now() - Duration::seconds(1)),
                    status: Some(CheckoutState::Confirmed),
                },
                &staff(),
            )
            .await;
        assert!(matches!(err, Err(AppError::Validation(_))));
        assert_eq!(f.amount(f.copy.id).await, 1);

        let refused = checkouts
            .patch(
                pending.id,
                PatchCheckout {
                    end_time: Some(Utc::now() - Duration::seconds(1)),
                    status: Some(CheckoutState::Refused),
                },
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(refused.status, CheckoutState::Refused);
    }

    #[tokio::test]
    async fn test_confirming_with_nothing_on_hand_is_rejected() {
        let f = Fixture::new().await;
        f.set_amount(f.copy.id, 0).await;
        let pending = f
            .insert_checkout(CheckoutState::Pending, Utc::now() + Duration::days(3))
            .await;

        let err = f
            .services
            .checkouts
            .patch(pending.id, to(CheckoutState::Confirmed), &staff())
            .await;
        assert!(matches!(err, Err(AppError::Validation(ref m)) if m == NOT_AVAILABLE));
        assert_eq!(f.amount(f.copy.id).await, 0);
        let stored = f.services.repository.checkouts.get_by_id(pending.id).await.unwrap();
        assert_eq!(stored.status, CheckoutState::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirmations_never_drive_amount_negative() {
        let f = Fixture::new().await;
        f.set_amount(f.copy.id, 2).await;
        let mut ids = Vec::new();
        for _ in 0..6 {
            ids.push(
                f.insert_checkout(CheckoutState::Pending, Utc::now() + Duration::days(3))
                    .await
                    .id,
            );
        }

        let tasks: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let checkouts = f.services.checkouts.clone();
                tokio::spawn(async move {
                    checkouts.patch(id, to(CheckoutState::Confirmed), &staff()).await
                })
            })
            .collect();

        let mut confirmed = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                confirmed += 1;
            }
        }
        assert_eq!(confirmed, 2);
        assert_eq!(f.amount(f.copy.id).await, 0);
    }

    #[tokio::test]
    async fn test_racing_confirmations_of_one_checkout_take_one_copy() {
        let f = Fixture::new().await;
        f.set_amount(f.copy.id, 2).await;
        let pending = f
            .insert_checkout(CheckoutState::Pending, Utc::now() + Duration::days(3))
            .await;
        let checkouts = &f.services.checkouts;
        let end_time = pending.end_time;

        // Both requests read the checkout while it was still pending
        let first = f.services.repository.checkouts.get_by_id(pending.id).await.unwrap();
        let second = f.services.repository.checkouts.get_by_id(pending.id).await.unwrap();

        let won = assert_ok!(
            checkouts
                .apply(first, end_time, CheckoutState::Confirmed, &staff(), Operation::Update)
                .await
        );
        assert_eq!(won.status, CheckoutState::Confirmed);
        let lost = assert_err!(
            checkouts
                .apply(second, end_time, CheckoutState::Confirmed, &staff(), Operation::Update)
                .await
        );
        assert!(matches!(lost, AppError::Conflict(_)));

        assert_eq!(f.amount(f.copy.id).await, 1);
        let key = keys::checkout_record(pending.card_number.as_str(), pending.id);
        assert!(f.cache.exists(&key).await.unwrap());
        assert_eq!(f.services.reminders.pending(), 1);
    }

    #[tokio::test]
    async fn test_racing_returns_of_one_checkout_release_one_copy() {
        let f = Fixture::new().await;
        f.set_amount(f.copy.id, 2).await;
        let confirmed = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();
        assert_eq!(f.amount(f.copy.id).await, 1);
        let checkouts = &f.services.checkouts;
        let end_time = confirmed.end_time;

        let first = f.services.repository.checkouts.get_by_id(confirmed.id).await.unwrap();
        let second = f.services.repository.checkouts.get_by_id(confirmed.id).await.unwrap();

        assert_ok!(
            checkouts
                .apply(first, end_time, CheckoutState::Returned, &staff(), Operation::Update)
                .await
        );
        let lost = assert_err!(
            checkouts
                .apply(second, end_time, CheckoutState::Canceled, &staff(), Operation::Update)
                .await
        );
        assert!(matches!(lost, AppError::Conflict(_)));

        assert_eq!(f.amount(f.copy.id).await, 2);
        let stored = f.services.repository.checkouts.get_by_id(confirmed.id).await.unwrap();
        assert_eq!(stored.status, CheckoutState::Returned);
    }

    #[tokio::test]
    async fn test_purge_racing_a_return_releases_once() {
        let f = Fixture::new().await;
        let confirmed = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();
        let stale = f.services.repository.checkouts.get_by_id(confirmed.id).await.unwrap();

        f.services
            .checkouts
            .return_checkout(confirmed.id, &staff())
            .await
            .unwrap();
        let err = assert_err!(f.services.checkouts.purge(stale).await);
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(f.amount(f.copy.id).await, 1);
    }

    #[tokio::test]
    async fn test_failed_save_restores_amount_and_drops_side_record() {
        let f = Fixture::new().await;
        let pending = f
            .insert_checkout(CheckoutState::Pending, Utc::now() + Duration::days(3))
            .await;
        f.db.fail_checkout_writes(true);

        let err = f
            .services
            .checkouts
            .patch(pending.id, to(CheckoutState::Confirmed), &staff())
            .await;
        assert!(matches!(
            err,
            Err(AppError::OperationFailed { operation: Operation::PartialUpdate, entity: "checkout" })
        ));
        assert_eq!(f.amount(f.copy.id).await, 1);
        let key = keys::checkout_record(pending.card_number.as_str(), pending.id);
        assert!(!f.cache.exists(&key).await.unwrap());
        assert_eq!(f.services.reminders.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_create_gives_the_copy_back() {
        let f = Fixture::new().await;
        f.db.fail_checkout_writes(true);
        let err = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await;
        assert!(matches!(err, Err(AppError::OperationFailed { operation: Operation::Create, .. })));
        assert_eq!(f.amount(f.copy.id).await, 1);
    }

    #[tokio::test]
    async fn test_return_of_last_copy_notifies_wait_list() {
        let f = Fixture::new().await;
        let checkouts = &f.services.checkouts;
        let confirmed = checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();
        assert_eq!(f.amount(f.copy.id).await, 0);

        let waiting = f.add_patron("ben", Some("ben@example.org")).await;
        f.services
            .queue
            .add(f.book.id, &NotificationPayload::new(&waiting, &f.book.title))
            .await
            .unwrap();

        let returned = checkouts.return_checkout(confirmed.id, &staff()).await.unwrap();
        assert_eq!(returned.status, CheckoutState::Returned);
        assert_eq!(f.amount(f.copy.id).await, 1);

        let sent = f.mailer.sent_to("ben@example.org");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("Dune"));
        assert!(f.services.queue.drain_all(f.book.id).await.unwrap().is_empty());
        assert_eq!(f.services.reminders.pending(), 0);
    }

    #[tokio::test]
    async fn test_return_with_unreachable_cache_still_releases_copy() {
        let f = Fixture::new().await;
        let checkouts = &f.services.checkouts;
        let confirmed = checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();
        f.cache.set_down(true);

        let returned = checkouts.return_checkout(confirmed.id, &staff()).await.unwrap();
        assert_eq!(returned.status, CheckoutState::Returned);
        assert_eq!(f.amount(f.copy.id).await, 1);
        assert_eq!(f.services.reminders.pending(), 0);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_with_unreachable_cache_still_takes_copy() {
        let f = Fixture::new().await;
        f.cache.set_down(true);
        let confirmed = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();
        assert_eq!(confirmed.status, CheckoutState::Confirmed);
        assert_eq!(f.amount(f.copy.id).await, 0);
        assert_eq!(f.services.reminders.pending(), 1);
    }

    #[tokio::test]
    async fn test_return_while_other_copies_available_does_not_notify() {
        let f = Fixture::new().await;
        f.set_amount(f.copy.id, 2).await;
        let confirmed = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();
        f.services
            .queue
            .add(f.book.id, &NotificationPayload::new(&f.patron, &f.book.title))
            .await
            .unwrap();

        f.services
            .checkouts
            .return_checkout(confirmed.id, &staff())
            .await
            .unwrap();
        assert!(f.mailer.sent().is_empty());
        assert_eq!(f.services.queue.drain_all(f.book.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_returned_checkout_is_closed() {
        let f = Fixture::new().await;
        let confirmed = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();
        f.services
            .checkouts
            .return_checkout(confirmed.id, &staff())
            .await
            .unwrap();

        let err = f
            .services
            .checkouts
            .return_checkout(confirmed.id, &staff())
            .await;
        assert!(matches!(err, Err(AppError::Validation(_))));
        assert_eq!(f.amount(f.copy.id).await, 1);
    }

    #[tokio::test]
    async fn test_patron_can_cancel_own_pending_request_only() {
        let f = Fixture::new().await;
        let pending = f
            .insert_checkout(CheckoutState::Pending, Utc::now() + Duration::days(3))
            .await;
        let stranger = f.add_patron("eve", None).await;

        let err = f
            .services
            .checkouts
            .patch(pending.id, to(CheckoutState::Canceled), &patron_actor(&stranger))
            .await;
        assert!(matches!(err, Err(AppError::Authorization(_))));

        let canceled = f
            .services
            .checkouts
            .patch(pending.id, to(CheckoutState::Canceled), &patron_actor(&f.patron))
            .await
            .unwrap();
        assert_eq!(canceled.status, CheckoutState::Canceled);
    }

    #[tokio::test]
    async fn test_renewal_resets_and_rearms_reminder() {
        let f = Fixture::new().await;
        let confirmed = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();
        f.services
            .repository
            .checkouts
            .mark_reminder_sent(confirmed.id, Utc::now())
            .await
            .unwrap();

        let renewed = f
            .services
            .checkouts
            .patch(
                confirmed.id,
                PatchCheckout {
                    end_time: Some(confirmed.end_time + Duration::days(14)),
                    status: None,
                },
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(renewed.reminder_sent_at, None);
        assert_eq!(f.amount(f.copy.id).await, 0);
        assert_eq!(f.services.reminders.pending(), 1);
    }

    #[tokio::test]
    async fn test_purging_confirmed_checkout_releases_copy() {
        let f = Fixture::new().await;
        let confirmed = f
            .services
            .checkouts
            .create(request(&f, Some(CheckoutState::Confirmed)), &staff())
            .await
            .unwrap();

        let err = f
            .services
            .checkouts
            .delete(confirmed.id, &patron_actor(&f.patron))
            .await;
        assert!(matches!(err, Err(AppError::Authorization(_))));

        f.services.checkouts.delete(confirmed.id, &staff()).await.unwrap();
        assert_eq!(f.amount(f.copy.id).await, 1);
        assert_eq!(f.services.reminders.pending(), 0);
    }

    #[tokio::test]
    async fn test_listing_filters_and_patron_scope() {
        let f = Fixture::new().await;
        let other = f.add_patron("ben", None).await;
        f.insert_checkout(CheckoutState::Pending, Utc::now() + Duration::days(1))
            .await;
        f.insert_checkout(CheckoutState::Returned, Utc::now() + Duration::days(9))
            .await;
        f.services
            .repository
            .checkouts
            .create(&NewCheckout {
                book_copy_id: f.copy.id,
                card_number: other.card_number.clone(),
                start_time: Utc::now(),
                end_time: Utc::now() + Duration::days(5),
                status: CheckoutState::Pending,
            })
            .await
            .unwrap();
        let checkouts = &f.services.checkouts;

        let all = checkouts.list(CheckoutQuery::default(), &staff()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].end_time >= w[1].end_time));

        let pending = checkouts
            .list(
                CheckoutQuery {
                    status: Some(CheckoutState::Pending),
                    card_number: None,
                },
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        let own = checkouts
            .list(CheckoutQuery::default(), &patron_actor(&f.patron))
            .await
            .unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|c| c.card_number == f.patron.card_number));

        let err = checkouts
            .list(
                CheckoutQuery {
                    status: None,
                    card_number: Some(other.card_number.clone()),
                },
                &patron_actor(&f.patron),
            )
            .await;
        assert!(matches!(err, Err(AppError::Authorization(_))));
    }
}
