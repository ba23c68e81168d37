//! Database models for agent incentives.

use crate::api::models::incentives::IncentiveStatus;
use crate::types::{IncentiveId, StudentId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct IncentiveCreateDBRequest {
    pub agent_id: UserId,
    pub student_id: StudentId,
    pub course: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct IncentiveUpdateDBRequest {
    pub status: IncentiveStatus,
}

/// An incentive joined with the agent and student it belongs to
#[derive(Debug, Clone)]
pub struct IncentiveDBResponse {
    pub id: IncentiveId,
    pub agent_id: UserId,
    pub student_id: StudentId,
    pub course: String,
    pub amount: Decimal,
    pub status: IncentiveStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub agent_username: Option<String>,
    pub agent_first_name: Option<String>,
    pub agent_last_name: Option<String>,
    pub student_name: Option<String>,
    pub token_number: Option<String>,
}
