//! Repository layer: typed gateways over the Bookworm REST backend
//!
//! Each backend resource gets an async trait so services can be exercised
//! against mocks; the HTTP implementations share one [`ApiClient`].

pub mod auth;
pub mod books;
pub mod reservations;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

pub use auth::AuthApi;
pub use books::BooksApi;
pub use reservations::ReservationsApi;
pub use users::UsersApi;

/// Access token shared between the HTTP client and the auth service
#[derive(Clone, Default)]
pub struct BearerToken(Arc<RwLock<Option<String>>>);

impl BearerToken {
    pub async fn set(&self, token: impl Into<String>) {
        *self.0.write().await = Some(token.into());
    }

    pub async fn clear(&self) {
        *self.0.write().await = None;
    }

    pub async fn get(&self) -> Option<String> {
        self.0.read().await.clone()
    }
}

/// Shared HTTP client for all backend gateways
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: BearerToken,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .user_agent(concat!("bookworm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            token: BearerToken::default(),
        })
    }

    pub fn token(&self) -> BearerToken {
        self.token.clone()
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match self.token.get().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and turn non-success statuses into [`AppError`]s
    async fn send(&self, builder: RequestBuilder, what: &str) -> AppResult<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!("Request for {} failed: {}", what, e);
            AppError::Network(format!("Could not reach the library server while {}: {}", what, e))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = AppError::from_status(status, &body);
        tracing::debug!("Backend rejected {} with {}: {}", what, status, err.message());
        Err(err)
    }

    pub(crate) async fn get_json<T, Q>(&self, path: &str, query: Option<&Q>, what: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let mut builder = self.request(Method::GET, path).await;
        if let Some(query) = query {
            builder = builder.query(query);
        }
        Ok(self.send(builder, what).await?.json().await?)
    }

    pub(crate) async fn send_json<T, B>(&self, method: Method, path: &str, body: &B, what: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.request(method, path).await.json(body);
        Ok(self.send(builder, what).await?.json().await?)
    }

    /// Request without a JSON body whose response is decoded
    pub(crate) async fn send_bare<T>(&self, method: Method, path: &str, what: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let builder = self.request(method, path).await;
        Ok(self.send(builder, what).await?.json().await?)
    }

    /// Request whose response body is ignored
    pub(crate) async fn send_empty(&self, method: Method, path: &str, what: &str) -> AppResult<()> {
        let builder = self.request(method, path).await;
        self.send(builder, what).await?;
        Ok(())
    }
}

/// All backend gateways
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BooksApi>,
    pub reservations: Arc<dyn ReservationsApi>,
    pub auth: Arc<dyn AuthApi>,
    pub users: Arc<dyn UsersApi>,
    pub token: BearerToken,
}

impl Repository {
    /// Create HTTP-backed gateways sharing one client
    pub fn new(client: ApiClient) -> Self {
        Self {
            books: Arc::new(books::HttpBooksApi::new(client.clone())),
            reservations: Arc::new(reservations::HttpReservationsApi::new(client.clone())),
            auth: Arc::new(auth::HttpAuthApi::new(client.clone())),
            users: Arc::new(users::HttpUsersApi::new(client.clone())),
            token: client.token(),
        }
    }
}
