//! User, role and session models

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Account as returned by the auth and user endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Missing from the sign-in payload; filled in by `GET /api/auth/users/me/`
    #[serde(default)]
    pub id: Option<i32>,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_staff: bool,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from_staff_flag(self.is_staff)
    }
}

/// Closed set of roles known to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Member,
}

impl Role {
    pub fn from_staff_flag(is_staff: bool) -> Self {
        if is_staff {
            Role::Staff
        } else {
            Role::Member
        }
    }

    /// Capability table
    pub fn allows(self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Staff, _) => true,
            (Role::Member, Capability::BrowseCatalog)
            | (Role::Member, Capability::ReserveForSelf)
            | (Role::Member, Capability::ExtendOwn)
            | (Role::Member, Capability::ManageOwnProfile) => true,
            (Role::Member, _) => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Staff => write!(f, "staff"),
            Role::Member => write!(f, "member"),
        }
    }
}

/// Gated operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    BrowseCatalog,
    ManageCatalog,
    ReserveForSelf,
    ReserveForOthers,
    ExtendOwn,
    ExtendAny,
    MarkReturned,
    ViewAllReservations,
    ManageOwnProfile,
    ManageUsers,
}

impl Capability {
    fn describe(self) -> &'static str {
        match self {
            Capability::BrowseCatalog => "browse the catalogue",
            Capability::ManageCatalog => "manage the catalogue",
            Capability::ReserveForSelf => "reserve books",
            Capability::ReserveForOthers => "reserve books for other borrowers",
            Capability::ExtendOwn => "extend reservations",
            Capability::ExtendAny => "extend other borrowers' reservations",
            Capability::MarkReturned => "mark copies as returned",
            Capability::ViewAllReservations => "view all reservations",
            Capability::ManageOwnProfile => "edit the profile",
            Capability::ManageUsers => "manage users",
        }
    }
}

/// Token pair issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

/// Sign-in / sign-up response
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

/// `POST /api/auth/token/refresh/` response
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    /// Present when the backend rotates refresh tokens
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Authenticated identity of the acting user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub role: Role,
    pub tokens: AuthTokens,
}

impl Session {
    pub fn new(user: User, tokens: AuthTokens) -> Self {
        Self {
            role: user.role(),
            user,
            tokens,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "A {} account may not {}",
                self.role,
                capability.describe()
            )))
        }
    }

    /// Whether `email` designates the session's own account
    pub fn is_self(&self, email: &str) -> bool {
        self.user.email.eq_ignore_ascii_case(email.trim())
    }

    /// Reserving for oneself needs `ReserveForSelf`, for anyone else `ReserveForOthers`
    pub fn require_reserve_for(&self, email: &str) -> Result<(), AppError> {
        if self.is_self(email) {
            self.require(Capability::ReserveForSelf)
        } else {
            self.require(Capability::ReserveForOthers)
        }
    }

    pub fn require_extend_for(&self, email: &str) -> Result<(), AppError> {
        if self.is_self(email) {
            self.require(Capability::ExtendOwn)
        } else {
            self.require(Capability::ExtendAny)
        }
    }

    /// Staff may act on any user, members only on themselves
    pub fn require_user_access(&self, user_id: i32) -> Result<(), AppError> {
        if self.is_staff() {
            return Ok(());
        }
        match self.user.id {
            Some(id) if id == user_id => self.require(Capability::ManageOwnProfile),
            _ => Err(AppError::Authorization("Permission denied".to_string())),
        }
    }
}

/// Sign-in form
#[derive(Debug, Clone, Serialize, Validate)]
pub struct SignIn {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Invalid email format")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Sign-up form
#[derive(Debug, Clone, Serialize, Validate)]
pub struct SignUp {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Invalid email format")
    )]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Update user request (`PUT /api/users/{id}/`)
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct UpdateUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(is_staff: bool) -> Session {
        Session::new(
            User {
                id: Some(3),
                email: "reader@example.com".to_string(),
                name: "Reader".to_string(),
                is_staff,
            },
            AuthTokens {
                access: "a".to_string(),
                refresh: "r".to_string(),
            },
        )
    }

    #[test]
    fn test_capability_table() {
        for cap in [
            Capability::ManageCatalog,
            Capability::MarkReturned,
            Capability::ManageUsers,
            Capability::ReserveForOthers,
        ] {
            assert!(Role::Staff.allows(cap));
            assert!(!Role::Member.allows(cap));
        }
        assert!(Role::Member.allows(Capability::ReserveForSelf));
        assert!(Role::Member.allows(Capability::ExtendOwn));
    }

    #[test]
    fn test_member_reserves_only_for_self() {
        let member = session(false);
        assert!(member.require_reserve_for("Reader@Example.com").is_ok());
        let err = member.require_reserve_for("other@example.com").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Authorization);
        assert!(session(true).require_reserve_for("other@example.com").is_ok());
    }

    #[test]
    fn test_user_access() {
        let member = session(false);
        assert!(member.require_user_access(3).is_ok());
        assert!(member.require_user_access(4).is_err());
        assert!(session(true).require_user_access(4).is_ok());
    }

    #[test]
    fn test_sign_in_payload_without_id() {
        let json = r#"{"access": "a", "refresh": "r",
                       "user": {"email": "staff@example.com", "name": "Staff", "is_staff": true}}"#;
        let response: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.user.id, None);
        assert_eq!(response.user.role(), Role::Staff);
    }

    #[test]
    fn test_sign_up_validation() {
        let form = SignUp {
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            password: "short".to_string(),
        };
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("password"));
        assert!(!fields.contains_key("email"));
    }
}
