//! Wait-list endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{wait_list::CreateWaitList, NotificationPayload, WaitList},
    AppState,
};

use super::AuthenticatedUser;

#[derive(Serialize, ToSchema)]
pub struct NotifyResponse {
    /// Mails handed to the mailer
    pub notified: usize,
}

#[utoipa::path(
    get,
    path = "/wait-lists",
    tag = "wait-lists",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All wait-list records", body = Vec<WaitList>),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_wait_lists(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<WaitList>>> {
    claims.require_privileged()?;

    let records = state.services.wait_lists.list().await?;
    Ok(Json(records))
}

#[utoipa::path(
    get,
    path = "/wait-lists/{id}",
    tag = "wait-lists",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Wait-list record ID")
    ),
    responses(
        (status = 200, description = "Wait-list record", body = WaitList),
        (status = 404, description = "Record not found")
    )
)]
pub async fn get_wait_list(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<WaitList>> {
    let record = state.services.wait_lists.get(id).await?;
    claims.require_card(&record.card_number)?;
    Ok(Json(record))
}

/// Ask to be told when a book is available again
#[utoipa::path(
    post,
    path = "/wait-lists",
    tag = "wait-lists",
    security(("bearer_auth" = [])),
    request_body = CreateWaitList,
    responses(
        (status = 201, description = "Registered", body = WaitList),
        (status = 404, description = "Book or patron not found")
    )
)]
pub async fn create_wait_list(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateWaitList>,
) -> AppResult<(StatusCode, Json<WaitList>)> {
    let created = state
        .services
        .wait_lists
        .create(request, &claims.actor())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    delete,
    path = "/wait-lists/{id}",
    tag = "wait-lists",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Wait-list record ID")
    ),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 404, description = "Record not found")
    )
)]
pub async fn delete_wait_list(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    claims.require_privileged()?;

    state.services.wait_lists.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Maintenance: remove every record and every queue
#[utoipa::path(
    delete,
    path = "/wait-lists",
    tag = "wait-lists",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "All wait-lists removed"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn delete_all_wait_lists(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<StatusCode> {
    claims.require_privileged()?;

    state.services.wait_lists.delete_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Patrons queued for a book, in notification order
#[utoipa::path(
    get,
    path = "/books/{id}/wait-list",
    tag = "wait-lists",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Queued payloads", body = Vec<NotificationPayload>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn queued(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<NotificationPayload>>> {
    claims.require_privileged()?;

    let payloads = state.services.wait_lists.queued(id).await?;
    Ok(Json(payloads))
}

/// Notify a book's queue now
#[utoipa::path(
    post,
    path = "/books/{id}/notify",
    tag = "wait-lists",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Queue notified", body = NotifyResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn notify(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<NotifyResponse>> {
    claims.require_privileged()?;

    let notified = state.services.wait_lists.notify(id).await?;
    Ok(Json(NotifyResponse { notified }))
}
