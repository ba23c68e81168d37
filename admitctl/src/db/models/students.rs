//! Database models for student applications.

use crate::api::models::students::{SignatureType, StudentStatus};
use crate::types::{StudentId, UserId};
use crate::workflow::ReviewStage;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Database request for creating a student application
#[derive(Debug, Clone)]
pub struct StudentCreateDBRequest {
    pub token_number: String,
    pub agent_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    /// Incentive amount of the course rule active at creation time
    pub incentive_amount: Option<Decimal>,
}

/// Build a token number of the form `TOK<YYYYMMDD><first 8 hex of a UUID, uppercased>`
pub fn token_number(now: DateTime<Utc>, seed: Uuid) -> String {
    let simple = seed.simple().to_string();
    format!("TOK{}{}", now.format("%Y%m%d"), simple[..8].to_uppercase())
}

/// A review decision applied with compare-and-set on `expected`
#[derive(Debug, Clone)]
pub struct StudentTransitionDBRequest {
    pub expected: StudentStatus,
    pub to: StudentStatus,
    pub stage: ReviewStage,
    pub reviewer_id: UserId,
    pub notes: Option<String>,
    pub signature_data: Option<String>,
    pub signature_type: Option<SignatureType>,
}

/// Database response for a student application
#[derive(Debug, Clone)]
pub struct StudentDBResponse {
    pub id: StudentId,
    pub token_number: String,
    pub agent_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub status: StudentStatus,
    pub incentive_amount: Option<Decimal>,
    pub coordinator_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub signature_data: Option<String>,
    pub signature_type: Option<SignatureType>,
    pub coordinator_id: Option<UserId>,
    pub coordinator_approved_at: Option<DateTime<Utc>>,
    pub admin_id: Option<UserId>,
    pub admin_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentDBResponse {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Moment the application was finally decided, if it has been
    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.admin_reviewed_at.or(self.coordinator_approved_at)
    }
}
