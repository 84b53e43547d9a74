//! Full-text search endpoints, one per indexed entity

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    services::search::{SearchKind, SearchPage},
    AppState,
};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Full-text query
    pub query: String,
    /// Zero-based page number
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// Search an entity's index; checkouts, patrons and wait-lists are staff only
#[utoipa::path(
    get,
    path = "/_search/{entity}",
    tag = "search",
    security(("bearer_auth" = [])),
    params(
        ("entity" = String, Path, description = "books, book-copies, categories, publishers, authors, checkouts, patrons or wait-lists"),
        SearchQuery
    ),
    responses(
        (status = 200, description = "Matching documents", body = SearchPage),
        (status = 400, description = "Unknown entity or empty query"),
        (status = 403, description = "Staff only for patron data")
    )
)]
pub async fn search(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(entity): Path<String>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<SearchPage>> {
    let kind: SearchKind = entity.parse()?;
    if !kind.is_catalog() {
        claims.require_privileged()?;
    }

    let page = state
        .services
        .search
        .search(
            kind,
            &query.query,
            query.page.unwrap_or(0),
            query.size.unwrap_or(20),
        )
        .await?;
    Ok(Json(page))
}
