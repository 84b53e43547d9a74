//! Full-text search side channel
//!
//! Indexing is best-effort: writes are pushed from a background task and a
//! failure is only logged. The circulation flows never read the index; only
//! the per-entity search endpoints do.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use meilisearch_sdk::client::Client;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::SearchConfig,
    error::{AppError, AppResult},
};

const MAX_PAGE_SIZE: i64 = 200;

/// Index names, one per entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Book,
    BookCopy,
    Category,
    Publisher,
    Author,
    Checkout,
    Patron,
    WaitList,
}

impl SearchKind {
    pub fn index_name(&self) -> &'static str {
        match self {
            SearchKind::Book => "books",
            SearchKind::BookCopy => "book_copies",
            SearchKind::Category => "categories",
            SearchKind::Publisher => "publishers",
            SearchKind::Author => "authors",
            SearchKind::Checkout => "checkouts",
            SearchKind::Patron => "patron_accounts",
            SearchKind::WaitList => "wait_lists",
        }
    }

    /// Catalog indexes are open to every reader; the rest hold patron data
    pub fn is_catalog(&self) -> bool {
        matches!(
            self,
            SearchKind::Book
                | SearchKind::BookCopy
                | SearchKind::Category
                | SearchKind::Publisher
                | SearchKind::Author
        )
    }
}

/// Parses the entity segment of a search route, e.g. `book-copies`
impl FromStr for SearchKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "books" => Ok(SearchKind::Book),
            "book-copies" => Ok(SearchKind::BookCopy),
            "categories" => Ok(SearchKind::Category),
            "publishers" => Ok(SearchKind::Publisher),
            "authors" => Ok(SearchKind::Author),
            "checkouts" => Ok(SearchKind::Checkout),
            "patrons" => Ok(SearchKind::Patron),
            "wait-lists" => Ok(SearchKind::WaitList),
            other => Err(AppError::Validation(format!("Unknown search entity: {}", other))),
        }
    }
}

/// Raw hits of one index query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub documents: Vec<serde_json::Value>,
    pub total: usize,
}

/// One page of search results as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SearchPage {
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<serde_json::Value>,
    pub total: usize,
    pub page: i64,
    pub size: i64,
}

/// A document ready for indexing; `body` must carry an `id` field
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDocument {
    pub kind: SearchKind,
    pub id: String,
    pub body: serde_json::Value,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index(&self, document: SearchDocument) -> AppResult<()>;
    async fn remove(&self, kind: SearchKind, id: String) -> AppResult<()>;
    async fn search(&self, kind: SearchKind, query: String, offset: usize, limit: usize) -> AppResult<SearchHits>;
}

pub struct MeilisearchIndex {
    client: Client,
}

impl MeilisearchIndex {
    pub fn new(config: &SearchConfig) -> AppResult<Self> {
        let client = Client::new(config.url.as_str(), config.api_key.as_deref())
            .map_err(|e| AppError::Search(format!("Failed to create Meilisearch client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchIndex for MeilisearchIndex {
    async fn index(&self, document: SearchDocument) -> AppResult<()> {
        self.client
            .index(document.kind.index_name())
            .add_or_replace(&[document.body], Some("id"))
            .await
            .map_err(|e| AppError::Search(format!("Failed to index {}: {}", document.id, e)))?;
        Ok(())
    }

    async fn remove(&self, kind: SearchKind, id: String) -> AppResult<()> {
        self.client
            .index(kind.index_name())
            .delete_document(&id)
            .await
            .map_err(|e| AppError::Search(format!("Failed to remove {}: {}", id, e)))?;
        Ok(())
    }

    async fn search(&self, kind: SearchKind, query: String, offset: usize, limit: usize) -> AppResult<SearchHits> {
        let index = self.client.index(kind.index_name());
        let results = index
            .search()
            .with_query(&query)
            .with_offset(offset)
            .with_limit(limit)
            .execute::<serde_json::Value>()
            .await
            .map_err(|e| AppError::Search(format!("Failed to search {}: {}", kind.index_name(), e)))?;

        let total = results
            .estimated_total_hits
            .or(results.total_hits)
            .unwrap_or(results.hits.len());
        Ok(SearchHits {
            documents: results.hits.into_iter().map(|hit| hit.result).collect(),
            total,
        })
    }
}

/// Index used when search is disabled
pub struct NoopIndex;

#[async_trait]
impl SearchIndex for NoopIndex {
    async fn index(&self, _document: SearchDocument) -> AppResult<()> {
        Ok(())
    }

    async fn remove(&self, _kind: SearchKind, _id: String) -> AppResult<()> {
        Ok(())
    }

    async fn search(&self, _kind: SearchKind, _query: String, _offset: usize, _limit: usize) -> AppResult<SearchHits> {
        Ok(SearchHits::default())
    }
}

/// Fire-and-forget front of a [`SearchIndex`]
#[derive(Clone)]
pub struct SearchService {
    index: Arc<dyn SearchIndex>,
}

impl SearchService {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    pub fn from_config(config: &SearchConfig) -> AppResult<Self> {
        if !config.enabled {
            return Ok(Self::new(Arc::new(NoopIndex)));
        }
        tracing::info!("Indexing into Meilisearch at {}", config.url);
        Ok(Self::new(Arc::new(MeilisearchIndex::new(config)?)))
    }

    /// Queue an entity for indexing
    pub fn index<T: Serialize>(&self, kind: SearchKind, id: impl ToString, entity: &T) {
        let id = id.to_string();
        let body = match serde_json::to_value(entity) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Cannot index {} {}: {}", kind.index_name(), id, e);
                return;
            }
        };
        let index = self.index.clone();
        tokio::spawn(async move {
            if let Err(e) = index.index(SearchDocument { kind, id, body }).await {
                tracing::warn!("{}", e);
            }
        });
    }

    /// Queue an entity for removal from its index
    pub fn remove(&self, kind: SearchKind, id: impl ToString) {
        let id = id.to_string();
        let index = self.index.clone();
        tokio::spawn(async move {
            if let Err(e) = index.remove(kind, id).await {
                tracing::warn!("{}", e);
            }
        });
    }

    /// One page of full-text matches from an entity's index
    pub async fn search(&self, kind: SearchKind, query: &str, page: i64, size: i64) -> AppResult<SearchPage> {
        let query = query.trim();
        tracing::debug!("Request to search {} for query {}", kind.index_name(), query);
        if query.is_empty() {
            return Err(AppError::Validation("Search query must not be empty".to_string()));
        }
        let page = page.max(0);
        let size = size.clamp(1, MAX_PAGE_SIZE);

        let hits = self
            .index
            .search(kind, query.to_string(), (page * size) as usize, size as usize)
            .await?;
        Ok(SearchPage {
            items: hits.documents,
            total: hits.total,
            page,
            size,
        })
    }
}
