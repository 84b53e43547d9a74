//! Patron account endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{
        patron::{CreatePatron, UpdatePatron, UpdatePatronStatus},
        CardNumber, PatronAccount,
    },
    AppState,
};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PatronListQuery {
    /// Zero-based page number
    pub page: Option<i64>,
    pub size: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct PatronPage {
    pub items: Vec<PatronAccount>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

/// List patron accounts by login
#[utoipa::path(
    get,
    path = "/patrons",
    tag = "patrons",
    security(("bearer_auth" = [])),
    params(PatronListQuery),
    responses(
        (status = 200, description = "One page of patron accounts", body = PatronPage),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_patrons(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<PatronListQuery>,
) -> AppResult<Json<PatronPage>> {
    claims.require_privileged()?;

    let page = query.page.unwrap_or(0);
    let size = query.size.unwrap_or(20);
    let (items, total) = state.services.patrons.list(page, size).await?;
    Ok(Json(PatronPage {
        items,
        total,
        page,
        size,
    }))
}

#[utoipa::path(
    get,
    path = "/patrons/{card_number}",
    tag = "patrons",
    security(("bearer_auth" = [])),
    params(
        ("card_number" = String, Path, description = "Ten digit card number")
    ),
    responses(
        (status = 200, description = "Patron account", body = PatronAccount),
        (status = 404, description = "Patron account not found")
    )
)]
pub async fn get_patron(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(card_number): Path<CardNumber>,
) -> AppResult<Json<PatronAccount>> {
    claims.require_card(&card_number)?;

    let patron = state.services.patrons.get(&card_number).await?;
    Ok(Json(patron))
}

/// Open a patron account; the card number is assigned by the server
#[utoipa::path(
    post,
    path = "/patrons",
    tag = "patrons",
    security(("bearer_auth" = [])),
    request_body = CreatePatron,
    responses(
        (status = 201, description = "Patron account created", body = PatronAccount),
        (status = 409, description = "Login or email already exists")
    )
)]
pub async fn create_patron(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreatePatron>,
) -> AppResult<(StatusCode, Json<PatronAccount>)> {
    claims.require_privileged()?;

    let created = state.services.patrons.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/patrons/{card_number}",
    tag = "patrons",
    security(("bearer_auth" = [])),
    params(
        ("card_number" = String, Path, description = "Ten digit card number")
    ),
    request_body = UpdatePatron,
    responses(
        (status = 200, description = "Patron account updated", body = PatronAccount),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn update_patron(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(card_number): Path<CardNumber>,
    Json(request): Json<UpdatePatron>,
) -> AppResult<Json<PatronAccount>> {
    claims.require_card(&card_number)?;

    let updated = state.services.patrons.update(&card_number, request).await?;
    Ok(Json(updated))
}

/// Activate or deactivate an account
#[utoipa::path(
    put,
    path = "/patrons/{card_number}/status",
    tag = "patrons",
    security(("bearer_auth" = [])),
    params(
        ("card_number" = String, Path, description = "Ten digit card number")
    ),
    request_body = UpdatePatronStatus,
    responses(
        (status = 200, description = "Status updated", body = PatronAccount),
        (status = 403, description = "Staff only")
    )
)]
pub async fn update_patron_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(card_number): Path<CardNumber>,
    Json(request): Json<UpdatePatronStatus>,
) -> AppResult<Json<PatronAccount>> {
    claims.require_privileged()?;

    let updated = state
        .services
        .patrons
        .update_status(&card_number, request)
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/patrons/{card_number}",
    tag = "patrons",
    security(("bearer_auth" = [])),
    params(
        ("card_number" = String, Path, description = "Ten digit card number")
    ),
    responses(
        (status = 204, description = "Patron account deleted"),
        (status = 404, description = "Patron account not found")
    )
)]
pub async fn delete_patron(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(card_number): Path<CardNumber>,
) -> AppResult<StatusCode> {
    claims.require_privileged()?;

    state.services.patrons.delete(&card_number).await?;
    Ok(StatusCode::NO_CONTENT)
}
