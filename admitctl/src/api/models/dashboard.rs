//! API models for the admin dashboard.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub pending: i64,
    pub coordinator_approved: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseBreakdown {
    pub course: String,
    pub students: i64,
    pub approved: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    /// Every student record, whatever its status
    pub total_admissions: i64,
    pub active_agents: i64,
    pub pending_registrations: i64,
    pub status_breakdown: StatusBreakdown,
    pub course_breakdown: Vec<CourseBreakdown>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub incentives_paid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub incentives_unpaid: Decimal,
}
