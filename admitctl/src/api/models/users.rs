//! API request/response models for users.

use super::pagination::Pagination;
use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Job function of an account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    Coordinator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Coordinator => "coordinator",
            Role::Admin => "admin",
        }
    }
}

/// Registration lifecycle of an account. Only active accounts can sign in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Pending,
    Active,
    Rejected,
}

// User response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub role: Role,
    /// Human agent identifier such as `AGT001`
    pub agent_code: Option<String>,
    pub status: UserStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only return users with this role
    pub role: Option<Role>,

    /// Only return users in this registration state
    pub status: Option<UserStatus>,

    /// Case-insensitive substring match on username, email or name
    pub search: Option<String>,
}

/// Form body for rejecting a pending registration
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectUserForm {
    pub reason: Option<String>,
}

/// Result of approving or rejecting a registration
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserReviewResponse {
    pub message: String,
    pub user: UserResponse,
}

/// The authenticated caller, resolved from the bearer token on every request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub agent_code: Option<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_agent(&self) -> bool {
        self.role == Role::Agent
    }

    pub fn is_reviewer(&self) -> bool {
        matches!(self.role, Role::Coordinator | Role::Admin)
    }

    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name, &self.username)
    }
}

/// Join first and last name, falling back to the username when neither is set
pub fn full_name(first: &Option<String>, last: &Option<String>, username: &str) -> String {
    let joined = [first.as_deref(), last.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() { username.to_string() } else { joined }
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            full_name: full_name(&db.first_name, &db.last_name, &db.username),
            id: db.id,
            username: db.username,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            role: db.role,
            agent_code: db.agent_code,
            status: db.status,
            rejection_reason: db.rejection_reason,
            created_at: db.created_at,
            updated_at: db.updated_at,
            reviewed_at: db.reviewed_at,
        }
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            role: db.role,
            first_name: db.first_name,
            last_name: db.last_name,
            agent_code: db.agent_code,
        }
    }
}
