//! API models for agent incentives.

use super::users::full_name;
use crate::db::models::incentives::IncentiveDBResponse;
use crate::types::{IncentiveId, StudentId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "incentive_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IncentiveStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncentiveResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: IncentiveId,
    #[schema(value_type = String, format = "uuid")]
    pub agent_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub student_id: StudentId,
    pub course: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub status: IncentiveStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub agent_username: Option<String>,
    pub agent_name: Option<String>,
    pub student_name: Option<String>,
    pub token_number: Option<String>,
}

impl From<IncentiveDBResponse> for IncentiveResponse {
    fn from(db: IncentiveDBResponse) -> Self {
        let agent_name = db
            .agent_username
            .as_deref()
            .map(|username| full_name(&db.agent_first_name, &db.agent_last_name, username));
        Self {
            id: db.id,
            agent_id: db.agent_id,
            student_id: db.student_id,
            course: db.course,
            amount: db.amount,
            status: db.status,
            created_at: db.created_at,
            paid_at: db.paid_at,
            agent_username: db.agent_username,
            agent_name,
            student_name: db.student_name,
            token_number: db.token_number,
        }
    }
}

/// `GET /api/incentives` body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncentiveSummary {
    pub incentives: Vec<IncentiveResponse>,
    /// Sum of paid incentives
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_earned: Decimal,
    /// Sum of unpaid incentives
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_pending: Decimal,
}

impl IncentiveSummary {
    pub fn new(incentives: Vec<IncentiveResponse>) -> Self {
        let (mut total_earned, mut total_pending) = (Decimal::ZERO, Decimal::ZERO);
        for incentive in &incentives {
            match incentive.status {
                IncentiveStatus::Paid => total_earned += incentive.amount,
                IncentiveStatus::Unpaid => total_pending += incentive.amount,
            }
        }
        Self {
            incentives,
            total_earned,
            total_pending,
        }
    }
}

/// Form body for `PUT /api/admin/incentives/{id}/status`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncentiveStatusForm {
    pub status: IncentiveStatus,
}

/// Query parameters for `GET /api/admin/incentives`
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListIncentivesQuery {
    pub status: Option<IncentiveStatus>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub agent_id: Option<UserId>,
}
