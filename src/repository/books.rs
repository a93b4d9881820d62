//! Books gateway (`/api/books/`)

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use super::ApiClient;
use crate::{
    error::AppResult,
    models::book::{Book, BookCopy, BookInput},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BooksApi: Send + Sync {
    /// List books, optionally filtered by the backend text search
    async fn list(&self, q: Option<String>) -> AppResult<Vec<Book>>;
    /// Single book with its copies
    async fn get(&self, book_id: i32) -> AppResult<Book>;
    async fn create(&self, input: &BookInput) -> AppResult<Book>;
    async fn update(&self, book_id: i32, input: &BookInput) -> AppResult<Book>;
    async fn delete(&self, book_id: i32) -> AppResult<()>;
    /// Set a copy's availability flag; used to mark a copy returned
    async fn set_copy_available(&self, book_id: i32, copy_id: i32, is_available: bool) -> AppResult<BookCopy>;
}

#[derive(Serialize)]
struct SearchParams {
    q: String,
}

#[derive(Serialize)]
struct CopyAvailability {
    is_available: bool,
}

#[derive(Clone)]
pub struct HttpBooksApi {
    client: ApiClient,
}

impl HttpBooksApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BooksApi for HttpBooksApi {
    async fn list(&self, q: Option<String>) -> AppResult<Vec<Book>> {
        let params = q.map(|q| SearchParams { q });
        self.client
            .get_json("/api/books/", params.as_ref(), "loading the catalogue")
            .await
    }

    async fn get(&self, book_id: i32) -> AppResult<Book> {
        self.client
            .get_json(&format!("/api/books/{}/", book_id), None::<&()>, "loading book details")
            .await
    }

    async fn create(&self, input: &BookInput) -> AppResult<Book> {
        self.client
            .send_json(Method::POST, "/api/books/", input, "adding a book")
            .await
    }

    async fn update(&self, book_id: i32, input: &BookInput) -> AppResult<Book> {
        self.client
            .send_json(Method::PUT, &format!("/api/books/{}/", book_id), input, "updating a book")
            .await
    }

    async fn delete(&self, book_id: i32) -> AppResult<()> {
        self.client
            .send_empty(Method::DELETE, &format!("/api/books/{}/", book_id), "deleting a book")
            .await
    }

    async fn set_copy_available(&self, book_id: i32, copy_id: i32, is_available: bool) -> AppResult<BookCopy> {
        self.client
            .send_json(
                Method::PUT,
                &format!("/api/books/{}/copies/{}/", book_id, copy_id),
                &CopyAvailability { is_available },
                "updating copy availability",
            )
            .await
    }
}
