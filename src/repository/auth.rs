//! Authentication gateway (`/api/auth/`)

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use super::ApiClient;
use crate::{
    error::AppResult,
    models::user::{AuthResponse, RefreshResponse, SignIn, SignUp, User},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, form: &SignIn) -> AppResult<AuthResponse>;
    async fn sign_up(&self, form: &SignUp) -> AppResult<AuthResponse>;
    async fn refresh(&self, refresh_token: String) -> AppResult<RefreshResponse>;
    /// Identity behind the current bearer token
    async fn me(&self) -> AppResult<User>;
}

#[derive(Serialize)]
struct RefreshRequest {
    refresh: String,
}

#[derive(Clone)]
pub struct HttpAuthApi {
    client: ApiClient,
}

impl HttpAuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn sign_in(&self, form: &SignIn) -> AppResult<AuthResponse> {
        self.client
            .send_json(Method::POST, "/api/auth/sign-in/", form, "signing in")
            .await
    }

    async fn sign_up(&self, form: &SignUp) -> AppResult<AuthResponse> {
        self.client
            .send_json(Method::POST, "/api/auth/sign-up/", form, "signing up")
            .await
    }

    async fn refresh(&self, refresh_token: String) -> AppResult<RefreshResponse> {
        self.client
            .send_json(
                Method::POST,
                "/api/auth/token/refresh/",
                &RefreshRequest { refresh: refresh_token },
                "refreshing the session",
            )
            .await
    }

    async fn me(&self) -> AppResult<User> {
        self.client
            .get_json("/api/auth/users/me/", None::<&()>, "loading the current user")
            .await
    }
}
