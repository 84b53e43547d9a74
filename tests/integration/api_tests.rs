//! API integration tests against a running server
//!
//! Run with: cargo test -- --ignored
//! The server must use the same `JWT_SECRET` as these tests.

use chrono::{Duration, Utc};
use circulation_server::models::{CardNumber, Role, UserClaims};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "change-this-secret-in-production".to_string())
}

fn token(role: Role, card_number: Option<CardNumber>) -> String {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: "integration".to_string(),
        role,
        card_number,
        exp: now + 3600,
        iat: now,
    }
    .create_token(&secret())
    .expect("Failed to mint token")
}

fn staff(request: RequestBuilder) -> RequestBuilder {
    request.bearer_auth(token(Role::Librarian, None))
}

async fn created(request: RequestBuilder) -> Value {
    let response = request.send().await.expect("Failed to send request");
    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
}

fn unique(prefix: &str) -> String {
    format!("{}{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness_reports_cache_state() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    let status = body["status"].as_str().unwrap_or_default();
    assert!(status == "ready" || status == "degraded");
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{}/books", BASE_URL))
        .bearer_auth("not-a-token")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_patrons_cannot_write_catalog() {
    let client = Client::new();

    let response = client
        .post(format!("{}/categories", BASE_URL))
        .bearer_auth(token(Role::Patron, Some("0000000001".parse().unwrap())))
        .json(&json!({ "name": "Forbidden" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_book_listing_and_invalid_sort() {
    let client = Client::new();

    let response = staff(client.get(format!("{}/books?category_id=-1&page=0&size=5&sort=title,asc", BASE_URL)))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert!(body["total"].is_number());

    let response = staff(client.get(format!("{}/books?sort=password,asc", BASE_URL)))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_return_notifies_wait_list() {
    let client = Client::new();

    let category = created(
        staff(client.post(format!("{}/categories", BASE_URL))).json(&json!({ "name": unique("cat") })),
    )
    .await;
    let book = created(staff(client.post(format!("{}/books", BASE_URL))).json(&json!({
        "title": unique("Dune "),
        "category_id": category["id"],
    })))
    .await;
    let book_id = book["id"].as_i64().expect("No book ID");
    let publisher = created(
        staff(client.post(format!("{}/publishers", BASE_URL))).json(&json!({ "name": unique("pub") })),
    )
    .await;
    let copy = created(staff(client.post(format!("{}/book-copies", BASE_URL))).json(&json!({
        "book_id": book_id,
        "publisher_id": publisher["id"],
        "year_published": 1965,
        "amount": 1,
    })))
    .await;

    let reader = created(
        staff(client.post(format!("{}/patrons", BASE_URL))).json(&json!({ "login": unique("reader") })),
    )
    .await;
    let waiter = created(staff(client.post(format!("{}/patrons", BASE_URL))).json(&json!({
        "login": unique("waiter"),
        "email": format!("{}@example.org", unique("waiter")),
    })))
    .await;

    let checkout = created(staff(client.post(format!("{}/checkouts", BASE_URL))).json(&json!({
        "book_copy_id": copy["id"],
        "card_number": reader["card_number"],
        "end_time": (Utc::now() + Duration::days(14)).to_rfc3339(),
        "status": "confirmed",
    })))
    .await;
    assert_eq!(checkout["status"], "confirmed");

    let waiter_card: CardNumber = waiter["card_number"]
        .as_str()
        .expect("No card number")
        .parse()
        .expect("Invalid card number");
    created(
        client
            .post(format!("{}/wait-lists", BASE_URL))
            .bearer_auth(token(Role::Patron, Some(waiter_card.clone())))
            .json(&json!({ "book_id": book_id, "card_number": waiter_card })),
    )
    .await;

    let response = staff(client.post(format!("{}/checkouts/{}/return", BASE_URL, checkout["id"])))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "returned");

    let queued: Value = staff(client.get(format!("{}/books/{}/wait-list", BASE_URL, book_id)))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(queued.as_array().map(Vec::len), Some(0));

    let detail: Value = staff(client.get(format!("{}/books/{}", BASE_URL, book_id)))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(detail["available"], 1);

    // Cleanup
    let _ = staff(client.delete(format!("{}/books/{}", BASE_URL, book_id)))
        .send()
        .await;
    let _ = staff(client.delete(format!("{}/publishers/{}", BASE_URL, publisher["id"])))
        .send()
        .await;
    let _ = staff(client.delete(format!("{}/categories/{}", BASE_URL, category["id"])))
        .send()
        .await;
}

#[tokio::test]
#[ignore]
async fn test_unknown_publisher_is_rejected() {
    let client = Client::new();

    let category = created(
        staff(client.post(format!("{}/categories", BASE_URL))).json(&json!({ "name": unique("cat") })),
    )
    .await;
    let book = created(staff(client.post(format!("{}/books", BASE_URL))).json(&json!({
        "title": unique("Orphan "),
        "category_id": category["id"],
    })))
    .await;

    let response = staff(client.post(format!("{}/book-copies", BASE_URL)))
        .json(&json!({
            "book_id": book["id"],
            "publisher_id": -1,
            "year_published": 2001,
            "amount": 1,
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 404);

    let _ = staff(client.delete(format!("{}/books/{}", BASE_URL, book["id"])))
        .send()
        .await;
    let _ = staff(client.delete(format!("{}/categories/{}", BASE_URL, category["id"])))
        .send()
        .await;
}

#[tokio::test]
#[ignore]
async fn test_search_endpoints() {
    let client = Client::new();

    let response = staff(client.get(format!("{}/_search/books?query=dune&page=0&size=5", BASE_URL)))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert_eq!(body["size"], 5);

    let response = staff(client.get(format!("{}/_search/shelves?query=dune", BASE_URL)))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);

    let response = client
        .get(format!("{}/_search/patrons?query=ann", BASE_URL))
        .bearer_auth(token(Role::Patron, Some("0000000001".parse().unwrap())))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);
}
