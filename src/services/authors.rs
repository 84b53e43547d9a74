//! Authors

use validator::Validate;

use super::search::{SearchKind, SearchService};
use crate::{
    error::{AppResult, Operation},
    models::{
        author::{AuthorPage, SaveAuthor},
        Author,
    },
    repository::Repository,
};

const AUTHOR: &str = "author";

#[derive(Clone)]
pub struct AuthorsService {
    repository: Repository,
    search: SearchService,
}

impl AuthorsService {
    pub fn new(repository: Repository, search: SearchService) -> Self {
        Self { repository, search }
    }

    pub async fn get(&self, id: i64) -> AppResult<Author> {
        tracing::debug!("Request to get author : {}", id);
        self.repository.authors.get_by_id(id).await
    }

    /// One page of authors ordered by name
    pub async fn list(&self, page: i64, size: i64) -> AppResult<AuthorPage> {
        tracing::debug!("Request to list authors : page {} size {}", page, size);
        let page = page.max(0);
        let size = size.clamp(1, 200);
        let (items, total) = self.repository.authors.list(page, size).await?;
        Ok(AuthorPage {
            items,
            total,
            page,
            size,
        })
    }

    pub async fn create(&self, author: SaveAuthor) -> AppResult<Author> {
        tracing::debug!("Request to create author : {}", author.name);
        author.validate()?;
        let created = self
            .repository
            .authors
            .create(&author)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Create, AUTHOR))?;
        self.search.index(SearchKind::Author, created.id, &created);
        Ok(created)
    }

    pub async fn update(&self, id: i64, author: SaveAuthor) -> AppResult<Author> {
        tracing::debug!("Request to update author : {}", id);
        author.validate()?;
        let updated = self
            .repository
            .authors
            .update(id, &author)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Update, AUTHOR))?;
        self.search.index(SearchKind::Author, updated.id, &updated);
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        tracing::debug!("Request to delete author : {}", id);
        self.repository.authors.get_by_id(id).await?;
        self.repository
            .authors
            .delete(id)
            .await
            .map_err(|e| e.into_operation_failure(Operation::Delete, AUTHOR))?;
        self.search.remove(SearchKind::Author, id);
        Ok(())
    }
}
