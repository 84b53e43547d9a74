//! Book copy endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        book_copy::{PatchBookCopy, SaveBookCopy},
        BookCopy,
    },
    AppState,
};

use super::AuthenticatedUser;

#[utoipa::path(
    get,
    path = "/book-copies/{id}",
    tag = "copies",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Copy", body = BookCopy),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn get_copy(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<BookCopy>> {
    let copy = state.services.copies.get(id).await?;
    Ok(Json(copy))
}

/// Add a copy of a book
#[utoipa::path(
    post,
    path = "/book-copies",
    tag = "copies",
    security(("bearer_auth" = [])),
    request_body = SaveBookCopy,
    responses(
        (status = 201, description = "Copy created", body = BookCopy),
        (status = 400, description = "Invalid input or publish year already held")
    )
)]
pub async fn create_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(copy): Json<SaveBookCopy>,
) -> AppResult<(StatusCode, Json<BookCopy>)> {
    claims.require_privileged()?;

    let created = state.services.copies.create(copy).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/book-copies/{id}",
    tag = "copies",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Copy ID")
    ),
    request_body = SaveBookCopy,
    responses(
        (status = 200, description = "Copy updated", body = BookCopy),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn update_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(copy): Json<SaveBookCopy>,
) -> AppResult<Json<BookCopy>> {
    claims.require_privileged()?;

    let updated = state.services.copies.update(id, copy).await?;
    Ok(Json(updated))
}

/// Update the given fields of a copy
#[utoipa::path(
    patch,
    path = "/book-copies/{id}",
    tag = "copies",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Copy ID")
    ),
    request_body = PatchBookCopy,
    responses(
        (status = 200, description = "Copy updated", body = BookCopy),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn patch_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(patch): Json<PatchBookCopy>,
) -> AppResult<Json<BookCopy>> {
    claims.require_privileged()?;

    let updated = state.services.copies.patch(id, patch).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/book-copies/{id}",
    tag = "copies",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Copy ID")
    ),
    responses(
        (status = 204, description = "Copy deleted"),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn delete_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    claims.require_privileged()?;

    state.services.copies.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
