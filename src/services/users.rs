//! User administration service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        user::{Capability, Session, UpdateUser, User},
        Page,
    },
    repository::UsersApi,
};

#[derive(Clone)]
pub struct UsersService {
    api: Arc<dyn UsersApi>,
    page_size: usize,
}

impl UsersService {
    pub fn new(api: Arc<dyn UsersApi>, page_size: usize) -> Self {
        Self { api, page_size }
    }

    /// List member accounts (staff only)
    pub async fn list_users(&self, session: &Session) -> AppResult<Vec<User>> {
        session.require(Capability::ManageUsers)?;
        self.api.list().await
    }

    pub async fn page(&self, session: &Session, page: usize) -> AppResult<Page<User>> {
        let users = self.list_users(session).await?;
        Ok(Page::slice(&users, page, self.page_size))
    }

    /// Staff may view anyone, members only themselves
    pub async fn get_user(&self, session: &Session, user_id: i32) -> AppResult<User> {
        session.require_user_access(user_id)?;
        self.api.get(user_id).await
    }

    pub async fn update_user(&self, session: &Session, user_id: i32, update: UpdateUser) -> AppResult<User> {
        session.require_user_access(user_id)?;
        let update = UpdateUser {
            name: update.name.map(|n| n.trim().to_string()),
            email: update.email.map(|e| e.trim().to_string()),
        };
        update.validate()?;

        let user = self.api.update(user_id, &update).await?;
        tracing::info!("Updated user {}", user_id);
        Ok(user)
    }

    pub async fn delete_user(&self, session: &Session, user_id: i32) -> AppResult<()> {
        session.require(Capability::ManageUsers)?;
        self.api.delete(user_id).await?;
        tracing::info!("Deleted user {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{AppError, ErrorKind},
        models::user::AuthTokens,
        repository::users::MockUsersApi,
    };

    fn session(id: i32, is_staff: bool) -> Session {
        Session::new(
            User {
                id: Some(id),
                email: format!("user{}@bookworm.test", id),
                name: format!("User {}", id),
                is_staff,
            },
            AuthTokens {
                access: "a".to_string(),
                refresh: "r".to_string(),
            },
        )
    }

    fn member(id: i32) -> User {
        User {
            id: Some(id),
            email: format!("user{}@bookworm.test", id),
            name: format!("User {}", id),
            is_staff: false,
        }
    }

    #[tokio::test]
    async fn test_members_cannot_list_or_delete() {
        let mut api = MockUsersApi::new();
        api.expect_list().never();
        api.expect_delete().never();

        let service = UsersService::new(Arc::new(api), 10);
        assert_eq!(
            service.list_users(&session(2, false)).await.unwrap_err().kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            service.delete_user(&session(2, false), 3).await.unwrap_err().kind(),
            ErrorKind::Authorization
        );
    }

    #[tokio::test]
    async fn test_member_reads_only_self() {
        let mut api = MockUsersApi::new();
        api.expect_get()
            .withf(|id| *id == 2)
            .times(1)
            .returning(|id| Ok(member(id)));

        let service = UsersService::new(Arc::new(api), 10);
        assert_eq!(service.get_user(&session(2, false), 2).await.unwrap().id, Some(2));
        assert_eq!(
            service.get_user(&session(2, false), 3).await.unwrap_err().kind(),
            ErrorKind::Authorization
        );
    }

    #[tokio::test]
    async fn test_update_validates_email() {
        let mut api = MockUsersApi::new();
        api.expect_update()
            .withf(|id, update| *id == 2 && update.email.as_deref() == Some("new@bookworm.test"))
            .times(1)
            .returning(|id, update| {
                Ok(User {
                    email: update.email.clone().unwrap_or_default(),
                    ..member(id)
                })
            });

        let service = UsersService::new(Arc::new(api), 10);
        let err = service
            .update_user(
                &session(2, false),
                2,
                UpdateUser {
                    name: None,
                    email: Some("nope".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["email"]);

        let user = service
            .update_user(
                &session(2, false),
                2,
                UpdateUser {
                    name: None,
                    email: Some(" new@bookworm.test ".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(user.email, "new@bookworm.test");
    }

    #[tokio::test]
    async fn test_staff_pages_users() {
        let mut api = MockUsersApi::new();
        api.expect_list()
            .returning(|| Ok((1..=23).map(member).collect()));
        api.expect_delete()
            .returning(|id| Err(AppError::NotFound(format!("User {} not found", id))));

        let service = UsersService::new(Arc::new(api), 10);
        let page = service.page(&session(1, true), 3).await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total_pages, 3);

        let err = service.delete_user(&session(1, true), 99).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
