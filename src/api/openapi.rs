//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    authors, books, categories, checkouts, copies, health, patrons, publishers, search, wait_lists,
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "1.0.0",
        description = "Library circulation REST API: catalog, copies, patrons, checkouts, wait-lists and search"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::list_book_copies,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Publishers
        publishers::list_publishers,
        publishers::get_publisher,
        publishers::create_publisher,
        publishers::update_publisher,
        publishers::delete_publisher,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Copies
        copies::get_copy,
        copies::create_copy,
        copies::update_copy,
        copies::patch_copy,
        copies::delete_copy,
        // Checkouts
        checkouts::list_checkouts,
        checkouts::get_checkout,
        checkouts::create_checkout,
        checkouts::update_checkout,
        checkouts::patch_checkout,
        checkouts::return_checkout,
        checkouts::delete_checkout,
        // Patrons
        patrons::list_patrons,
        patrons::get_patron,
        patrons::create_patron,
        patrons::update_patron,
        patrons::update_patron_status,
        patrons::delete_patron,
        // Wait-lists
        wait_lists::list_wait_lists,
        wait_lists::get_wait_list,
        wait_lists::create_wait_list,
        wait_lists::delete_wait_list,
        wait_lists::delete_all_wait_lists,
        wait_lists::queued,
        wait_lists::notify,
        // Search
        search::search,
    ),
    components(
        schemas(
            // Catalog
            crate::models::Book,
            crate::models::book::CreateBook,
            crate::models::BookSnapshot,
            crate::models::BookPage,
            crate::models::Category,
            crate::models::category::SaveCategory,
            crate::models::Publisher,
            crate::models::publisher::SavePublisher,
            crate::models::Author,
            crate::models::author::SaveAuthor,
            crate::models::author::AuthorPage,
            crate::models::BookCopy,
            crate::models::book_copy::SaveBookCopy,
            crate::models::book_copy::PatchBookCopy,
            // Checkouts
            crate::models::Checkout,
            crate::models::CheckoutState,
            crate::models::checkout::CreateCheckout,
            crate::models::checkout::UpdateCheckout,
            crate::models::checkout::PatchCheckout,
            // Patrons
            crate::models::CardNumber,
            crate::models::PatronAccount,
            crate::models::patron::CreatePatron,
            crate::models::patron::UpdatePatron,
            crate::models::patron::UpdatePatronStatus,
            patrons::PatronPage,
            // Wait-lists
            crate::models::WaitList,
            crate::models::wait_list::CreateWaitList,
            crate::models::NotificationPayload,
            wait_lists::NotifyResponse,
            // Search
            crate::services::search::SearchPage,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book titles"),
        (name = "categories", description = "Book categories"),
        (name = "publishers", description = "Publishers of copies"),
        (name = "authors", description = "Authors"),
        (name = "copies", description = "Physical copies and their on-hand amount"),
        (name = "checkouts", description = "Reservations and loans"),
        (name = "patrons", description = "Patron accounts"),
        (name = "wait-lists", description = "Availability wait-lists"),
        (name = "search", description = "Full-text search over indexed entities")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
