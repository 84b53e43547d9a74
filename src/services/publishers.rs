//! Publishers, with the cached publisher list

use validator::Validate;

use super::{
    availability::AvailabilityCache,
    search::{SearchKind, SearchService},
};
use crate::{
    error::{AppResult, Operation},
    models::{publisher::SavePublisher, Publisher},
    repository::Repository,
};

const PUBLISHER: &str = "publisher";

#[derive(Clone)]
pub struct PublishersService {
    repository: Repository,
    availability: AvailabilityCache,
    search: SearchService,
}

impl PublishersService {
    pub fn new(repository: Repository, availability: AvailabilityCache, search: SearchService) -> Self {
        Self {
            repository,
            availability,
            search,
        }
    }

    async fn evict_list(&self) {
        if let Err(e) = self.availability.invalidate_publishers().await {
            tracing::warn!("Failed to evict publisher list: {}", e);
        }
    }

    /// Every publisher, read through the cached publisher list
    pub async fn list(&self) -> AppResult<Vec<Publisher>> {
        tracing::debug!("Request to list publishers");
        if let Some(publishers) = self.availability.get_publishers().await {
            return Ok(publishers);
        }
        let publishers = self.repository.publishers.list().await?;
        if let Err(e) = self.availability.put_publishers(&publishers).await {
            tracing::warn!("Failed to cache publisher list: {}", e);
        }
        Ok(publishers)
    }

    pub async fn get(&self, id: i64) -> AppResult<Publisher> {
        tracing::debug!("Request to get publisher : {}", id);
        self.repository.publishers.get_by_id(id).await
    }

    pub async fn create(&self, publisher: SavePublisher) -> AppResult<Publisher> {
        tracing::debug!("Request to create publisher : {}", publisher.name);
        publisher.validate()?;
        let created = self
            .repository
            .publishers
            .create(&publisher)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Create, PUBLISHER))?;

        self.evict_list().await;
        self.search.index(SearchKind::Publisher, created.id, &created);
        Ok(created)
    }

    pub async fn update(&self, id: i64, publisher: SavePublisher) -> AppResult<Publisher> {
        tracing::debug!("Request to update publisher : {}", id);
        publisher.validate()?;
        let updated = self
            .repository
            .publishers
            .update(id, &publisher)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Update, PUBLISHER))?;

        self.evict_list().await;
        self.search.index(SearchKind::Publisher, updated.id, &updated);
        Ok(updated)
    }

    /// Delete a publisher no copy refers to
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        tracing::debug!("Request to delete publisher : {}", id);
        self.repository.publishers.get_by_id(id).await?;
        self.repository
            .publishers
            .delete(id)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Delete, PUBLISHER))?;

        self.evict_list().await;
        self.search.remove(SearchKind::Publisher, id);
        Ok(())
    }
}
