//! API handlers for the circulation REST endpoints

pub mod authors;
pub mod books;
pub mod categories;
pub mod checkouts;
pub mod copies;
pub mod health;
pub mod openapi;
pub mod patrons;
pub mod publishers;
pub mod search;
pub mod wait_lists;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};

use crate::{error::AppError, models::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Every `/api/v1` route
pub fn routes(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/copies", get(books::list_book_copies))
        .route("/books/:id/wait-list", get(wait_lists::queued))
        .route("/books/:id/notify", post(wait_lists::notify))
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Publishers
        .route(
            "/publishers",
            get(publishers::list_publishers).post(publishers::create_publisher),
        )
        .route(
            "/publishers/:id",
            get(publishers::get_publisher)
                .put(publishers::update_publisher)
                .delete(publishers::delete_publisher),
        )
        // Authors
        .route(
            "/authors",
            get(authors::list_authors).post(authors::create_author),
        )
        .route(
            "/authors/:id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        // Copies
        .route("/book-copies", post(copies::create_copy))
        .route(
            "/book-copies/:id",
            get(copies::get_copy)
                .put(copies::update_copy)
                .patch(copies::patch_copy)
                .delete(copies::delete_copy),
        )
        // Checkouts
        .route(
            "/checkouts",
            get(checkouts::list_checkouts).post(checkouts::create_checkout),
        )
        .route(
            "/checkouts/:id",
            get(checkouts::get_checkout)
                .put(checkouts::update_checkout)
                .patch(checkouts::patch_checkout)
                .delete(checkouts::delete_checkout),
        )
        .route("/checkouts/:id/return", post(checkouts::return_checkout))
        // Patrons
        .route(
            "/patrons",
            get(patrons::list_patrons).post(patrons::create_patron),
        )
        .route(
            "/patrons/:card_number",
            get(patrons::get_patron)
                .put(patrons::update_patron)
                .delete(patrons::delete_patron),
        )
        .route(
            "/patrons/:card_number/status",
            axum::routing::put(patrons::update_patron_status),
        )
        // Wait-lists
        .route(
            "/wait-lists",
            get(wait_lists::list_wait_lists)
                .post(wait_lists::create_wait_list)
                .delete(wait_lists::delete_all_wait_lists),
        )
        .route(
            "/wait-lists/:id",
            get(wait_lists::get_wait_list).delete(wait_lists::delete_wait_list),
        )
        // Search
        .route("/_search/:entity", get(search::search))
        .with_state(state)
}
