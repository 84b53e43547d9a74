//! Business logic services

pub mod authors;
pub mod availability;
pub mod cache;
pub mod catalog;
pub mod checkouts;
pub mod copies;
pub mod email;
pub mod notifications;
pub mod patrons;
pub mod publishers;
pub mod reminders;
pub mod search;
pub mod wait_list_queue;
pub mod wait_lists;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub availability: availability::AvailabilityCache,
    pub queue: wait_list_queue::WaitListQueue,
    pub email: email::EmailService,
    pub notifications: notifications::NotificationDispatcher,
    pub reminders: reminders::ReminderScheduler,
    pub search: search::SearchService,
    pub catalog: catalog::CatalogService,
    pub publishers: publishers::PublishersService,
    pub authors: authors::AuthorsService,
    pub copies: copies::CopiesService,
    pub checkouts: checkouts::CheckoutsService,
    pub patrons: patrons::PatronsService,
    pub wait_lists: wait_lists::WaitListsService,
}

impl Services {
    /// Wire every service over the given stores and collaborators
    pub fn new(
        repository: Repository,
        cache: Arc<dyn cache::CacheStore>,
        mailer: Arc<dyn email::Mailer>,
        search: search::SearchService,
        config: &AppConfig,
    ) -> Self {
        let availability = availability::AvailabilityCache::new(cache.clone(), &config.cache);
        let queue = wait_list_queue::WaitListQueue::new(cache.clone());
        let email = email::EmailService::new(mailer, config.email.base_url.clone());
        let notifications = notifications::NotificationDispatcher::new(queue.clone(), email.clone());
        let reminders = reminders::ReminderScheduler::new(
            repository.clone(),
            cache,
            email.clone(),
            config.reminders.lead_hours,
        );

        let checkouts = checkouts::CheckoutsService::new(
            repository.clone(),
            availability.clone(),
            reminders.clone(),
            notifications.clone(),
            search.clone(),
        );

        Self {
            catalog: catalog::CatalogService::new(
                repository.clone(),
                availability.clone(),
                queue.clone(),
                search.clone(),
            ),
            publishers: publishers::PublishersService::new(
                repository.clone(),
                availability.clone(),
                search.clone(),
            ),
            authors: authors::AuthorsService::new(repository.clone(), search.clone()),
            copies: copies::CopiesService::new(
                repository.clone(),
                availability.clone(),
                notifications.clone(),
                search.clone(),
            ),
            patrons: patrons::PatronsService::new(repository.clone(), checkouts.clone(), search.clone()),
            checkouts,
            wait_lists: wait_lists::WaitListsService::new(
                repository.clone(),
                queue.clone(),
                notifications.clone(),
                search.clone(),
            ),
            repository,
            availability,
            queue,
            email,
            notifications,
            reminders,
            search,
        }
    }
}
