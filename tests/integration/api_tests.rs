//! API integration tests
//!
//! These run against a live Bookworm backend seeded with a staff account.

use bookworm::{
    config::AppConfig,
    models::{reservation::ReservationQuery, user::Session},
    services::catalog::CatalogQuery,
    AppState, ErrorKind,
};
use chrono::{Duration, Local};
use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://127.0.0.1:8000";

fn staff_credentials() -> (String, String) {
    (
        std::env::var("BOOKWORM_EMAIL").unwrap_or_else(|_| "admin@bookworm.test".to_string()),
        std::env::var("BOOKWORM_PASSWORD").unwrap_or_else(|_| "adminadmin".to_string()),
    )
}

fn state() -> AppState {
    let mut config = AppConfig::default();
    config.api.base_url = BASE_URL.to_string();
    AppState::new(config).expect("Failed to build client")
}

async fn staff_session(state: &AppState) -> Session {
    let (email, password) = staff_credentials();
    state
        .services
        .auth
        .sign_in(&email, &password)
        .await
        .expect("Failed to sign in")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_sign_in_raw() {
    let client = Client::new();
    let (email, password) = staff_credentials();

    let response = client
        .post(format!("{}/api/auth/sign-in/", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["access"].is_string());
    assert!(body["refresh"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_sign_in_invalid_credentials() {
    let state = state();
    let (email, _) = staff_credentials();

    let err = state
        .services
        .auth
        .sign_in(&email, "definitely-wrong")
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Authentication | ErrorKind::Rejected));
    assert!(state.services.sessions.current().await.is_none());
}

#[tokio::test]
#[ignore]
async fn test_current_user_is_staff() {
    let state = state();
    let session = staff_session(&state).await;

    assert!(session.is_staff());
    assert!(session.user.id.is_some());
}

#[tokio::test]
#[ignore]
async fn test_browse_catalogue() {
    let state = state();
    let loaded = state.services.catalog.reload().await.expect("Failed to load books");

    let page = state.services.catalog.browse(&CatalogQuery::default()).await;
    assert_eq!(page.total, loaded);
    assert!(page.items.len() <= state.config.catalog.page_size);
}

#[tokio::test]
#[ignore]
async fn test_reserve_and_return_first_available_copy() {
    let state = state();
    let session = staff_session(&state).await;

    state.services.catalog.reload().await.expect("Failed to load books");
    let books = state.services.catalog.books().await;
    let Some(book) = books.iter().find(|b| b.is_available) else {
        return;
    };

    let desk = state
        .services
        .reservations
        .open_book(book.book_id)
        .await
        .expect("Failed to open book");
    let copy_id = desk
        .book()
        .await
        .copies
        .iter()
        .find(|c| c.is_available)
        .map(|c| c.copy_id)
        .expect("No available copy");

    let reservation = desk
        .reserve(&session, book.book_id, copy_id, &session.user.email, Local::now().date_naive())
        .await
        .expect("Failed to reserve");
    assert_eq!(reservation.copy, copy_id);
    assert!(desk.consistency_violations().await.is_empty());

    let copy = desk
        .mark_returned(&session, book.book_id, copy_id)
        .await
        .expect("Failed to return");
    assert!(copy.is_available);
    assert!(desk.list_active_reservations(book.book_id).await.is_empty());
    desk.close().await;
}

#[tokio::test]
#[ignore]
async fn test_reserve_in_the_past_is_rejected_locally() {
    let state = state();
    let session = staff_session(&state).await;

    state.services.catalog.reload().await.expect("Failed to load books");
    let books = state.services.catalog.books().await;
    let Some(book) = books.first() else {
        return;
    };
    let Some(copy) = book.copies.first() else {
        return;
    };

    let desk = state
        .services
        .reservations
        .open_book(book.book_id)
        .await
        .expect("Failed to open book");
    let err = desk
        .reserve(
            &session,
            book.book_id,
            copy.copy_id,
            &session.user.email,
            Local::now().date_naive() - Duration::days(1),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
#[ignore]
async fn test_reservations_overview() {
    let state = state();
    let session = staff_session(&state).await;

    let page = state
        .services
        .reservations
        .overview(&session, &ReservationQuery::default(), 1)
        .await
        .expect("Failed to list reservations");
    assert!(page.items.len() <= state.config.reservations.page_size);
}

#[tokio::test]
#[ignore]
async fn test_list_users() {
    let state = state();
    let session = staff_session(&state).await;

    let page = state
        .services
        .users
        .page(&session, 1)
        .await
        .expect("Failed to list users");
    assert!(page.items.len() <= state.config.users.page_size);
}

#[tokio::test]
#[ignore]
async fn test_unknown_book_is_not_found() {
    let state = state();

    let err = state.services.catalog.get_book(i32::MAX).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
