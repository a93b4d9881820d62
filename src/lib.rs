//! Bookworm Library client
//!
//! Typed client for the Bookworm library REST backend: session handling,
//! catalogue queries, the book-copy reservation lifecycle, waitlists and
//! user administration. Presentation layers (the bundled CLI, a GUI) sit on
//! top of [`services::Services`].

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorKind};

/// Client state shared by every front-end view
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    /// Build the HTTP client, gateways and services for `config`
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let client = repository::ApiClient::new(&config)?;
        let repository = repository::Repository::new(client);
        let services = services::Services::new(repository, &config);

        Ok(Self {
            config: Arc::new(config),
            services: Arc::new(services),
        })
    }
}
