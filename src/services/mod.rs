//! Client-side services

pub mod auth;
pub mod catalog;
pub mod reservations;
pub mod session;
pub mod users;
pub mod waitlist;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub reservations: reservations::ReservationsService,
    pub users: users::UsersService,
    pub waitlist: waitlist::WaitlistService,
    pub sessions: session::SessionStore,
}

impl Services {
    /// Create all services over the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self::with_clock(repository, config, reservations::local_today())
    }

    /// Same as [`Services::new`] with an explicit source of "today"
    pub fn with_clock(repository: Repository, config: &AppConfig, today: reservations::Today) -> Self {
        let sessions = session::SessionStore::new();
        Self {
            auth: auth::AuthService::new(repository.auth.clone(), repository.token.clone(), sessions.clone()),
            catalog: catalog::CatalogService::new(repository.books.clone(), config.catalog.clone()),
            reservations: reservations::ReservationsService::new(
                repository.books.clone(),
                repository.reservations.clone(),
                today,
                config.reservations.page_size,
            ),
            users: users::UsersService::new(repository.users, config.users.page_size),
            waitlist: waitlist::WaitlistService::new(),
            sessions,
        }
    }
}
