//! Session store: the authenticated identity of the running client

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::user::Session,
};

#[derive(Clone, Default)]
pub struct SessionStore {
    current: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, session: Session) {
        tracing::info!("Signed in as {} ({})", session.user.email, session.role);
        *self.current.write().await = Some(session);
    }

    pub async fn clear(&self) {
        if let Some(session) = self.current.write().await.take() {
            tracing::info!("Signed out {}", session.user.email);
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// Current session, or an authentication error when signed out
    pub async fn require(&self) -> AppResult<Session> {
        self.current()
            .await
            .ok_or_else(|| AppError::Authentication("Not signed in".to_string()))
    }

    pub(crate) async fn update<F>(&self, f: F) -> AppResult<Session>
    where
        F: FnOnce(&mut Session),
    {
        let mut guard = self.current.write().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| AppError::Authentication("Not signed in".to_string()))?;
        f(session);
        Ok(session.clone())
    }
}
