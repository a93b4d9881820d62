//! Users gateway (`/api/users/`)

use async_trait::async_trait;
use reqwest::Method;

use super::ApiClient;
use crate::{
    error::AppResult,
    models::user::{UpdateUser, User},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersApi: Send + Sync {
    /// Non-staff accounts (staff only)
    async fn list(&self) -> AppResult<Vec<User>>;
    async fn get(&self, user_id: i32) -> AppResult<User>;
    async fn update(&self, user_id: i32, update: &UpdateUser) -> AppResult<User>;
    async fn delete(&self, user_id: i32) -> AppResult<()>;
}

#[derive(Clone)]
pub struct HttpUsersApi {
    client: ApiClient,
}

impl HttpUsersApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UsersApi for HttpUsersApi {
    async fn list(&self) -> AppResult<Vec<User>> {
        self.client
            .get_json("/api/users/", None::<&()>, "loading users")
            .await
    }

    async fn get(&self, user_id: i32) -> AppResult<User> {
        let mut user: User = self
            .client
            .get_json(&format!("/api/users/{}/", user_id), None::<&()>, "loading a user")
            .await?;
        // The detail endpoint only returns name and email
        user.id.get_or_insert(user_id);
        Ok(user)
    }

    async fn update(&self, user_id: i32, update: &UpdateUser) -> AppResult<User> {
        let mut user: User = self
            .client
            .send_json(Method::PUT, &format!("/api/users/{}/", user_id), update, "updating a user")
            .await?;
        user.id.get_or_insert(user_id);
        Ok(user)
    }

    async fn delete(&self, user_id: i32) -> AppResult<()> {
        self.client
            .send_empty(Method::DELETE, &format!("/api/users/{}/", user_id), "deleting a user")
            .await
    }
}
