//! Checkout endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        checkout::{CheckoutQuery, CreateCheckout, PatchCheckout, UpdateCheckout},
        Checkout,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List checkouts by status and/or patron card, newest due first
#[utoipa::path(
    get,
    path = "/checkouts",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(CheckoutQuery),
    responses(
        (status = 200, description = "Matching checkouts", body = Vec<Checkout>),
        (status = 403, description = "Another patron's checkouts")
    )
)]
pub async fn list_checkouts(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<CheckoutQuery>,
) -> AppResult<Json<Vec<Checkout>>> {
    let checkouts = state.services.checkouts.list(query, &claims.actor()).await?;
    Ok(Json(checkouts))
}

#[utoipa::path(
    get,
    path = "/checkouts/{id}",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Checkout ID")
    ),
    responses(
        (status = 200, description = "Checkout", body = Checkout),
        (status = 404, description = "Checkout not found")
    )
)]
pub async fn get_checkout(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Checkout>> {
    let checkout = state.services.checkouts.get(id, &claims.actor()).await?;
    Ok(Json(checkout))
}

/// Request (patron) or record (staff) a checkout
#[utoipa::path(
    post,
    path = "/checkouts",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    request_body = CreateCheckout,
    responses(
        (status = 201, description = "Checkout created", body = Checkout),
        (status = 400, description = "Invalid input or no copy on hand"),
        (status = 409, description = "Copy taken concurrently")
    )
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateCheckout>,
) -> AppResult<(StatusCode, Json<Checkout>)> {
    let created = state.services.checkouts.create(request, &claims.actor()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/checkouts/{id}",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Checkout ID")
    ),
    request_body = UpdateCheckout,
    responses(
        (status = 200, description = "Checkout updated", body = Checkout),
        (status = 400, description = "Illegal transition")
    )
)]
pub async fn update_checkout(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCheckout>,
) -> AppResult<Json<Checkout>> {
    let updated = state
        .services
        .checkouts
        .update(id, request, &claims.actor())
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    patch,
    path = "/checkouts/{id}",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Checkout ID")
    ),
    request_body = PatchCheckout,
    responses(
        (status = 200, description = "Checkout updated", body = Checkout),
        (status = 400, description = "Illegal transition")
    )
)]
pub async fn patch_checkout(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<PatchCheckout>,
) -> AppResult<Json<Checkout>> {
    let updated = state
        .services
        .checkouts
        .patch(id, request, &claims.actor())
        .await?;
    Ok(Json(updated))
}

/// Mark a confirmed checkout as returned
#[utoipa::path(
    post,
    path = "/checkouts/{id}/return",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Checkout ID")
    ),
    responses(
        (status = 200, description = "Checkout returned", body = Checkout),
        (status = 400, description = "Checkout is not confirmed")
    )
)]
pub async fn return_checkout(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Checkout>> {
    let returned = state
        .services
        .checkouts
        .return_checkout(id, &claims.actor())
        .await?;
    Ok(Json(returned))
}

/// Purge a checkout record
#[utoipa::path(
    delete,
    path = "/checkouts/{id}",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Checkout ID")
    ),
    responses(
        (status = 204, description = "Checkout deleted"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn delete_checkout(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.checkouts.delete(id, &claims.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}
