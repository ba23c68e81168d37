//! API models for course incentive rules.

use crate::db::models::courses::CourseRuleDBResponse;
use crate::errors::Error;
use crate::types::CourseRuleId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Form body for creating a course rule
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseRuleCreate {
    pub course: String,
    #[schema(value_type = f64)]
    pub amount: Decimal,
}

/// Form body for updating a course rule. Omitted fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CourseRuleUpdate {
    pub course: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub amount: Option<Decimal>,
    pub active: Option<bool>,
}

/// Reject a blank course name or a negative amount
pub fn validate_rule(course: Option<&str>, amount: Option<Decimal>) -> Result<(), Error> {
    if let Some(course) = course
        && course.trim().is_empty()
    {
        return Err(Error::BadRequest {
            message: "Course name must not be empty".to_string(),
        });
    }
    if let Some(amount) = amount
        && amount.is_sign_negative()
    {
        return Err(Error::BadRequest {
            message: "Incentive amount cannot be negative".to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseRuleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CourseRuleId,
    pub course: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CourseRuleDBResponse> for CourseRuleResponse {
    fn from(db: CourseRuleDBResponse) -> Self {
        Self {
            id: db.id,
            course: db.course,
            amount: db.amount,
            active: db.active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListCourseRulesQuery {
    /// Include soft-deleted rules
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseRuleDeleted {
    pub message: String,
}
