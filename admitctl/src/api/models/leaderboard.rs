//! API models for agent leaderboards.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    Overall,
    Weekly,
    Monthly,
    DateRange,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    #[schema(value_type = String, format = "uuid")]
    pub agent_id: UserId,
    pub username: String,
    pub full_name: String,
    pub agent_code: Option<String>,
    /// All-time approved admissions
    pub total_admissions: i64,
    /// All-time incentive total
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_incentive: Decimal,
    /// Admissions decided inside the window; absent for the overall board
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_admissions: Option<i64>,
    #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none", default)]
    #[schema(value_type = Option<f64>)]
    pub period_incentive: Option<Decimal>,
    /// 1-based position
    pub rank: usize,
    pub is_top_3: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardPeriod {
    pub start: DateTime<Utc>,
    /// Exclusive
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardSummary {
    pub total_period_admissions: i64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_period_incentives: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
    #[serde(rename = "type")]
    pub kind: LeaderboardKind,
    pub total_agents: usize,
    pub period: Option<LeaderboardPeriod>,
    pub summary: LeaderboardSummary,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct DateRangeQuery {
    /// `YYYY-MM-DD` or an ISO-8601 timestamp
    pub start_date: String,
    /// `YYYY-MM-DD` (inclusive) or an ISO-8601 timestamp
    pub end_date: String,
}
