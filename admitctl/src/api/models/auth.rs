//! Request and response payloads for login and registration.

use super::users::{Role, UserStatus};
use crate::errors::Error;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Human agent identifier such as `AGT001`; agents only
    #[serde(alias = "agent_id")]
    pub agent_code: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RegisterRequest {
    /// Trim fields and check the shape of the username and email
    pub fn normalized(self) -> Result<Self, Error> {
        let username = self.username.trim().to_string();
        if username.is_empty() || username.chars().any(char::is_whitespace) {
            return Err(Error::BadRequest {
                message: "Username must be non-empty and contain no spaces".to_string(),
            });
        }
        let email = self.email.trim().to_string();
        if !email.contains('@') {
            return Err(Error::BadRequest {
                message: "A valid email address is required".to_string(),
            });
        }
        let agent_code = if self.role == Role::Agent { trimmed(self.agent_code) } else { None };

        Ok(Self {
            username,
            email,
            password: self.password,
            role: self.role,
            first_name: trimmed(self.first_name),
            last_name: trimmed(self.last_name),
            agent_code,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    /// Always `pending` until an admin reviews the account
    pub status: UserStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    pub role: Role,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub username: String,
}

/// Plain acknowledgement body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: Role) -> RegisterRequest {
        RegisterRequest {
            username: "  agent1 ".to_string(),
            email: " agent1@example.com".to_string(),
            password: "secret1".to_string(),
            role,
            first_name: Some(" ".to_string()),
            last_name: Some("Rao".to_string()),
            agent_code: Some(" AGT001 ".to_string()),
        }
    }

    #[test]
    fn test_normalized() {
        let agent = request(Role::Agent).normalized().unwrap();
        assert_eq!(agent.username, "agent1");
        assert_eq!(agent.email, "agent1@example.com");
        assert_eq!(agent.first_name, None);
        assert_eq!(agent.agent_code.as_deref(), Some("AGT001"));

        // Only agents carry an agent code
        let coordinator = request(Role::Coordinator).normalized().unwrap();
        assert_eq!(coordinator.agent_code, None);

        let mut bad = request(Role::Agent);
        bad.username = "two words".to_string();
        assert!(bad.normalized().is_err());

        let mut bad = request(Role::Agent);
        bad.email = "nope".to_string();
        assert!(bad.normalized().is_err());
    }

    #[test]
    fn test_agent_id_alias() {
        let parsed: RegisterRequest = serde_json::from_str(
            r#"{"username":"a","email":"a@b.c","password":"secret1","role":"agent","agent_id":"AGT009"}"#,
        )
        .unwrap();
        assert_eq!(parsed.agent_code.as_deref(), Some("AGT009"));
    }
}
