//! Database models for course incentive rules.

use crate::types::CourseRuleId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct CourseRuleCreateDBRequest {
    pub course: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct CourseRuleUpdateDBRequest {
    pub course: Option<String>,
    pub amount: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CourseRuleDBResponse {
    pub id: CourseRuleId,
    pub course: String,
    pub amount: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
