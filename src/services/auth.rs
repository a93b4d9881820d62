//! Authentication service: sign-in, sign-up, token refresh and session bootstrap

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppResult, ErrorKind},
    models::user::{AuthResponse, AuthTokens, Session, SignIn, SignUp, User},
    repository::{AuthApi, BearerToken},
};

use super::session::SessionStore;

#[derive(Clone)]
pub struct AuthService {
    api: Arc<dyn AuthApi>,
    token: BearerToken,
    sessions: SessionStore,
}

impl AuthService {
    pub fn new(api: Arc<dyn AuthApi>, token: BearerToken, sessions: SessionStore) -> Self {
        Self { api, token, sessions }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let form = SignIn {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        form.validate()?;

        let response = self.api.sign_in(&form).await?;
        self.open_session(response).await
    }

    /// Create an account and sign in with it
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> AppResult<Session> {
        let form = SignUp {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        form.validate()?;

        let response = self.api.sign_up(&form).await?;
        self.open_session(response).await
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// A failed refresh signs the client out.
    pub async fn refresh(&self) -> AppResult<Session> {
        let session = self.sessions.require().await?;

        match self.api.refresh(session.tokens.refresh.clone()).await {
            Ok(refreshed) => {
                self.token.set(refreshed.access.clone()).await;
                self.sessions
                    .update(|s| {
                        s.tokens.access = refreshed.access;
                        if let Some(refresh) = refreshed.refresh {
                            s.tokens.refresh = refresh;
                        }
                    })
                    .await
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, signing out: {}", e);
                self.sign_out().await;
                Err(e)
            }
        }
    }

    /// Rebuild a session from previously issued tokens.
    ///
    /// Tries the access token first and falls back to a refresh when the
    /// backend no longer accepts it.
    pub async fn restore(&self, tokens: AuthTokens) -> AppResult<Session> {
        self.token.set(tokens.access.clone()).await;

        let (user, tokens) = match self.api.me().await {
            Ok(user) => (user, tokens),
            Err(e) if e.kind() == ErrorKind::Authentication => {
                tracing::debug!("Access token rejected, trying refresh");
                let refreshed = match self.api.refresh(tokens.refresh.clone()).await {
                    Ok(refreshed) => refreshed,
                    Err(e) => {
                        self.sign_out().await;
                        return Err(e);
                    }
                };
                self.token.set(refreshed.access.clone()).await;
                let tokens = AuthTokens {
                    access: refreshed.access,
                    refresh: refreshed.refresh.unwrap_or(tokens.refresh),
                };
                match self.api.me().await {
                    Ok(user) => (user, tokens),
                    Err(e) => {
                        self.sign_out().await;
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                self.token.clear().await;
                return Err(e);
            }
        };

        let session = Session::new(user, tokens);
        self.sessions.set(session.clone()).await;
        Ok(session)
    }

    /// Identity behind the current session, refreshed from the backend
    pub async fn me(&self) -> AppResult<User> {
        self.sessions.require().await?;
        let user = self.api.me().await?;
        self.sessions
            .update(|s| {
                s.role = user.role();
                s.user = user.clone();
            })
            .await?;
        Ok(user)
    }

    pub async fn sign_out(&self) {
        self.token.clear().await;
        self.sessions.clear().await;
    }

    async fn open_session(&self, response: AuthResponse) -> AppResult<Session> {
        self.token.set(response.access.clone()).await;

        // The sign-in payload has no user id; ask for the full identity
        let user = if response.user.id.is_some() {
            response.user
        } else {
            match self.api.me().await {
                Ok(me) => User {
                    id: me.id,
                    ..response.user
                },
                Err(e) => {
                    tracing::warn!("Could not load full identity after sign-in: {}", e);
                    response.user
                }
            }
        };

        let session = Session::new(
            user,
            AuthTokens {
                access: response.access,
                refresh: response.refresh,
            },
        );
        self.sessions.set(session.clone()).await;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::user::{RefreshResponse, Role},
        repository::auth::MockAuthApi,
    };

    fn staff_response() -> AuthResponse {
        AuthResponse {
            access: "access-1".to_string(),
            refresh: "refresh-1".to_string(),
            user: User {
                id: None,
                email: "staff@example.com".to_string(),
                name: "Staff".to_string(),
                is_staff: true,
            },
        }
    }

    fn service(api: MockAuthApi) -> (AuthService, BearerToken) {
        let token = BearerToken::default();
        (AuthService::new(Arc::new(api), token.clone(), SessionStore::new()), token)
    }

    #[tokio::test]
    async fn test_sign_in_opens_session_and_installs_token() {
        let mut api = MockAuthApi::new();
        api.expect_sign_in()
            .withf(|form| form.email == "staff@example.com")
            .times(1)
            .returning(|_| Ok(staff_response()));
        api.expect_me().times(1).returning(|| {
            Ok(User {
                id: Some(1),
                email: "staff@example.com".to_string(),
                name: "Staff".to_string(),
                is_staff: true,
            })
        });

        let (service, token) = service(api);
        let session = service.sign_in(" staff@example.com ", "secret").await.unwrap();

        assert_eq!(session.role, Role::Staff);
        assert_eq!(session.user.id, Some(1));
        assert_eq!(token.get().await.as_deref(), Some("access-1"));
        assert!(service.sessions().current().await.is_some());
    }

    #[tokio::test]
    async fn test_sign_in_validates_before_calling_backend() {
        let mut api = MockAuthApi::new();
        api.expect_sign_in().never();

        let (service, _) = service(api);
        let err = service.sign_in("not-an-email", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.invalid_fields(), vec!["email", "password"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_signs_out() {
        let mut api = MockAuthApi::new();
        api.expect_sign_in().returning(|_| Ok(staff_response()));
        api.expect_me().returning(|| Err(AppError::Network("offline".to_string())));
        api.expect_refresh()
            .times(1)
            .returning(|_| Err(AppError::Authentication("Token is invalid or expired".to_string())));

        let (service, token) = service(api);
        service.sign_in("staff@example.com", "secret").await.unwrap();

        let err = service.refresh().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(service.sessions().current().await.is_none());
        assert!(token.get().await.is_none());
    }

    #[tokio::test]
    async fn test_restore_falls_back_to_refresh() {
        let mut api = MockAuthApi::new();
        let mut calls = 0;
        api.expect_me().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Err(AppError::Authentication("expired".to_string()))
            } else {
                Ok(User {
                    id: Some(5),
                    email: "reader@example.com".to_string(),
                    name: "Reader".to_string(),
                    is_staff: false,
                })
            }
        });
        api.expect_refresh()
            .withf(|refresh| refresh == "refresh-0")
            .times(1)
            .returning(|_| {
                Ok(RefreshResponse {
                    access: "access-2".to_string(),
                    refresh: None,
                })
            });

        let (service, token) = service(api);
        let session = service
            .restore(AuthTokens {
                access: "access-0".to_string(),
                refresh: "refresh-0".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.role, Role::Member);
        assert_eq!(session.tokens.access, "access-2");
        assert_eq!(session.tokens.refresh, "refresh-0");
        assert_eq!(token.get().await.as_deref(), Some("access-2"));
    }

    #[tokio::test]
    async fn test_me_requires_session_and_updates_role() {
        let mut api = MockAuthApi::new();
        api.expect_sign_in().returning(|_| Ok(staff_response()));
        let mut calls = 0;
        api.expect_me().times(2).returning(move || {
            calls += 1;
            Ok(User {
                id: Some(1),
                email: "staff@example.com".to_string(),
                name: "Staff".to_string(),
                is_staff: calls == 1,
            })
        });

        let (service, _) = service(api);
        let err = service.me().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);

        service.sign_in("staff@example.com", "secret").await.unwrap();
        let user = service.me().await.unwrap();
        assert!(!user.is_staff);
        let session = service.sessions().current().await.unwrap();
        assert_eq!(session.role, Role::Member);
    }
}
