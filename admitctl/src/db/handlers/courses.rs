//! Database repository for course incentive rules.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::courses::{CourseRuleCreateDBRequest, CourseRuleDBResponse, CourseRuleUpdateDBRequest},
};
use crate::types::{CourseRuleId, abbrev_uuid};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

const COURSES_SEEDED_KEY: &str = "courses_seeded";

#[derive(Debug, Clone, Default)]
pub struct CourseRuleFilter {
    pub include_inactive: bool,
}

impl CourseRuleFilter {
    pub fn active() -> Self {
        Self { include_inactive: false }
    }
}

#[derive(Debug, Clone, FromRow)]
struct CourseRule {
    pub id: CourseRuleId,
    pub course: String,
    pub amount: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CourseRule> for CourseRuleDBResponse {
    fn from(r: CourseRule) -> Self {
        Self {
            id: r.id,
            course: r.course,
            amount: r.amount,
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub struct CourseRules<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for CourseRules<'c> {
    type CreateRequest = CourseRuleCreateDBRequest;
    type UpdateRequest = CourseRuleUpdateDBRequest;
    type Response = CourseRuleDBResponse;
    type Id = CourseRuleId;
    type Filter = CourseRuleFilter;

    #[instrument(skip(self, request), fields(course = %request.course, amount = %request.amount), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let rule = sqlx::query_as::<_, CourseRule>(
            "INSERT INTO course_rules (id, course, amount) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(request.course.trim())
        .bind(request.amount)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(rule.into())
    }

    #[instrument(skip(self), fields(rule_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let rule = sqlx::query_as::<_, CourseRule>("SELECT * FROM course_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(rule.map(Into::into))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<CourseRuleId>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rules = sqlx::query_as::<_, CourseRule>("SELECT * FROM course_rules WHERE id = ANY($1)")
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rules.into_iter().map(|r| (r.id, r.into())).collect())
    }

    #[instrument(skip(self, filter), fields(include_inactive = filter.include_inactive), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rules = sqlx::query_as::<_, CourseRule>(
            "SELECT * FROM course_rules WHERE ($1 OR active) ORDER BY active DESC, course ASC, created_at DESC",
        )
        .bind(filter.include_inactive)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rules.into_iter().map(Into::into).collect())
    }

    /// Soft delete: the rule stays for history but no longer applies to new students
    #[instrument(skip(self), fields(rule_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE course_rules SET active = FALSE, updated_at = NOW() WHERE id = $1 AND active")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(rule_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let rule = sqlx::query_as::<_, CourseRule>(
            r#"
            UPDATE course_rules SET
                course = COALESCE($2, course),
                amount = COALESCE($3, amount),
                active = COALESCE($4, active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.course.as_deref().map(str::trim))
        .bind(request.amount)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(rule.into())
    }
}

impl<'c> CourseRules<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// The active rule for a course, matched case-insensitively
    #[instrument(skip(self), err)]
    pub async fn get_active_by_course(&mut self, course: &str) -> Result<Option<CourseRuleDBResponse>> {
        let rule = sqlx::query_as::<_, CourseRule>("SELECT * FROM course_rules WHERE LOWER(course) = LOWER($1) AND active")
            .bind(course.trim())
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(rule.map(Into::into))
    }

    /// Insert `rules` unless seeding has already happened. Returns whether it ran.
    #[instrument(skip(self, rules), fields(count = rules.len()), err)]
    pub async fn seed_once(&mut self, rules: &[CourseRuleCreateDBRequest]) -> Result<bool> {
        // Claim the flag first so concurrent starts seed at most once
        let claimed = sqlx::query("UPDATE system_config SET value = TRUE, updated_at = NOW() WHERE key = $1 AND value = FALSE")
            .bind(COURSES_SEEDED_KEY)
            .execute(&mut *self.db)
            .await?
            .rows_affected()
            > 0;

        if !claimed {
            return Ok(false);
        }

        for rule in rules {
            sqlx::query(
                r#"
                INSERT INTO course_rules (id, course, amount)
                VALUES ($1, $2, $3)
                ON CONFLICT (LOWER(course)) WHERE active DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(rule.course.trim())
            .bind(rule.amount)
            .execute(&mut *self.db)
            .await?;
        }

        Ok(true)
    }
}
