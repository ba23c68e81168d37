//! API request/response models for student applications.

use super::pagination::Pagination;
use super::users::Role;
use crate::db::models::{documents::StudentDocumentDBResponse, students::StudentDBResponse, users::UserDBResponse};
use crate::errors::Error;
use crate::types::{StudentId, UserId};
use crate::workflow::ReviewAction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "student_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Pending,
    CoordinatorApproved,
    Approved,
    Rejected,
}

impl StudentStatus {
    pub const ALL: [StudentStatus; 4] = [
        StudentStatus::Pending,
        StudentStatus::CoordinatorApproved,
        StudentStatus::Approved,
        StudentStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Pending => "pending",
            StudentStatus::CoordinatorApproved => "coordinator_approved",
            StudentStatus::Approved => "approved",
            StudentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a reviewer's signature was produced
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "signature_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SignatureType {
    #[default]
    Draw,
    Upload,
}

/// Body for `POST /api/students`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentCreate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
}

fn required(name: &str, value: String) -> Result<String, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::BadRequest {
            message: format!("{name} must not be empty"),
        });
    }
    Ok(trimmed.to_string())
}

impl StudentCreate {
    /// Trim every field and reject blanks or an implausible email
    pub fn normalized(self) -> Result<Self, Error> {
        let student = Self {
            first_name: required("first_name", self.first_name)?,
            last_name: required("last_name", self.last_name)?,
            email: required("email", self.email)?,
            phone: required("phone", self.phone)?,
            course: required("course", self.course)?,
        };

        if !student.email.contains('@') {
            return Err(Error::BadRequest {
                message: "email must be a valid email address".to_string(),
            });
        }

        Ok(student)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: StudentId,
    pub token_number: String,
    #[schema(value_type = String, format = "uuid")]
    pub agent_id: UserId,
    /// Username of the submitting agent (list and detail views)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub status: StudentStatus,
    #[serde(with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub incentive_amount: Option<Decimal>,
    /// document type → download path
    pub documents: BTreeMap<String, String>,
    pub coordinator_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub signature_data: Option<String>,
    pub signature_type: Option<SignatureType>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub coordinator_id: Option<UserId>,
    pub coordinator_approved_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub admin_id: Option<UserId>,
    pub admin_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StudentDBResponse> for StudentResponse {
    fn from(db: StudentDBResponse) -> Self {
        Self {
            id: db.id,
            token_number: db.token_number,
            agent_id: db.agent_id,
            agent_username: None,
            agent_name: None,
            first_name: db.first_name,
            last_name: db.last_name,
            email: db.email,
            phone: db.phone,
            course: db.course,
            status: db.status,
            incentive_amount: db.incentive_amount,
            documents: BTreeMap::new(),
            coordinator_notes: db.coordinator_notes,
            admin_notes: db.admin_notes,
            signature_data: db.signature_data,
            signature_type: db.signature_type,
            coordinator_id: db.coordinator_id,
            coordinator_approved_at: db.coordinator_approved_at,
            admin_id: db.admin_id,
            admin_reviewed_at: db.admin_reviewed_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl StudentResponse {
    pub fn with_agent(mut self, agent: Option<&UserDBResponse>) -> Self {
        if let Some(agent) = agent {
            self.agent_username = Some(agent.username.clone());
            self.agent_name = Some(super::users::full_name(&agent.first_name, &agent.last_name, &agent.username));
        }
        self
    }

    pub fn with_documents<'a>(mut self, documents: impl IntoIterator<Item = &'a StudentDocumentDBResponse>) -> Self {
        for doc in documents {
            self.documents.insert(
                doc.document_type.clone(),
                format!("/api/students/{}/documents/{}/download", self.id, doc.document_type),
            );
        }
        self
    }
}

/// Form body for `PUT /api/students/{id}/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StatusUpdateForm {
    /// `approved` (or `coordinator_approved`) to approve, `rejected` to reject
    pub status: String,
    pub notes: Option<String>,
    /// Image data URL (`data:image/png;base64,...`)
    pub signature_data: Option<String>,
    pub signature_type: Option<SignatureType>,
}

impl StatusUpdateForm {
    pub fn action(&self) -> Result<ReviewAction, Error> {
        match self.status.trim() {
            "approved" | "coordinator_approved" => Ok(ReviewAction::Approve),
            "rejected" => Ok(ReviewAction::Reject),
            other => Err(Error::BadRequest {
                message: format!("Invalid status '{other}'. Expected 'approved' or 'rejected'"),
            }),
        }
    }
}

/// Form body for the admin final-decision endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReviewNotesForm {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub message: String,
    pub student: StudentResponse,
}

/// Query parameters for `GET /api/students/paginated`
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListStudentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<StudentStatus>,

    /// Exact course name
    pub course: Option<String>,

    /// Submitting agent (ignored for agents, who only ever see their own)
    #[param(value_type = Option<String>, format = "uuid")]
    pub agent_id: Option<UserId>,

    /// Case-insensitive match on name, email, phone or token number
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentOption {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub agent_code: Option<String>,
    pub role: Role,
}

/// Values the student list can be filtered by
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FilterOptions {
    pub courses: Vec<String>,
    pub statuses: Vec<StudentStatus>,
    pub agents: Vec<AgentOption>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create() -> StudentCreate {
        StudentCreate {
            first_name: "  Priya ".to_string(),
            last_name: "Sharma".to_string(),
            email: "priya@example.com".to_string(),
            phone: "9876543210".to_string(),
            course: "BSc".to_string(),
        }
    }

    #[test]
    fn test_normalized_trims() {
        let student = create().normalized().unwrap();
        assert_eq!(student.first_name, "Priya");
    }

    #[test]
    fn test_normalized_rejects_blank_and_bad_email() {
        let mut blank = create();
        blank.phone = "   ".to_string();
        assert!(blank.normalized().unwrap_err().to_string().contains("phone must not be empty"));

        let mut bad = create();
        bad.email = "priya.example.com".to_string();
        assert!(matches!(bad.normalized(), Err(Error::BadRequest { .. })));
    }

    #[test]
    fn test_status_form_action() {
        let form = |s: &str| StatusUpdateForm {
            status: s.to_string(),
            ..Default::default()
        };
        assert_eq!(form("approved").action().unwrap(), ReviewAction::Approve);
        assert_eq!(form("coordinator_approved").action().unwrap(), ReviewAction::Approve);
        assert_eq!(form("rejected").action().unwrap(), ReviewAction::Reject);
        assert!(form("verified").action().is_err());
    }

    #[test]
    fn test_status_display_matches_serde() {
        for status in StudentStatus::ALL {
            assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{status}\""));
        }
    }
}
