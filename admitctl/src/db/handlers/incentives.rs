//! Database repository for agent incentives.

use crate::api::models::incentives::IncentiveStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::incentives::{IncentiveCreateDBRequest, IncentiveDBResponse, IncentiveUpdateDBRequest},
};
use crate::types::{IncentiveId, StudentId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct IncentiveFilter {
    pub agent_id: Option<UserId>,
    pub status: Option<IncentiveStatus>,
}

impl IncentiveFilter {
    pub fn for_agent(agent_id: UserId) -> Self {
        Self {
            agent_id: Some(agent_id),
            ..Default::default()
        }
    }
}

const SELECT_JOINED: &str = r#"
    SELECT i.*,
           u.username AS agent_username,
           u.first_name AS agent_first_name,
           u.last_name AS agent_last_name,
           s.first_name || ' ' || s.last_name AS student_name,
           s.token_number AS token_number
    FROM incentives i
    LEFT JOIN users u ON u.id = i.agent_id
    LEFT JOIN students s ON s.id = i.student_id
"#;

#[derive(Debug, Clone, FromRow)]
struct Incentive {
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

impl From<Incentive> for IncentiveDBResponse {
    fn from(i: Incentive) -> Self {
        Self {
            id: i.id,
            agent_id: i.agent_id,
            student_id: i.student_id,
            course: i.course,
            amount: i.amount,
            status: i.status,
            created_at: i.created_at,
            paid_at: i.paid_at,
            agent_username: i.agent_username,
            agent_first_name: i.agent_first_name,
            agent_last_name: i.agent_last_name,
            student_name: i.student_name,
            token_number: i.token_number,
        }
    }
}

pub struct Incentives<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Incentives<'c> {
    type CreateRequest = IncentiveCreateDBRequest;
    type UpdateRequest = IncentiveUpdateDBRequest;
    type Response = IncentiveDBResponse;
    type Id = IncentiveId;
    type Filter = IncentiveFilter;

    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&request.student_id), amount = %request.amount), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO incentives (id, agent_id, student_id, course, amount) VALUES ($1, $2, $3, $4, $5)")
            .bind(id)
            .bind(request.agent_id)
            .bind(request.student_id)
            .bind(&request.course)
            .bind(request.amount)
            .execute(&mut *self.db)
            .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(incentive_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let query = format!("{SELECT_JOINED} WHERE i.id = $1");
        let incentive = sqlx::query_as::<_, Incentive>(&query)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(incentive.map(Into::into))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<IncentiveId>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = format!("{SELECT_JOINED} WHERE i.id = ANY($1)");
        let incentives = sqlx::query_as::<_, Incentive>(&query)
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        Ok(incentives.into_iter().map(|i| (i.id, i.into())).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let query = format!(
            "{SELECT_JOINED} WHERE ($1::uuid IS NULL OR i.agent_id = $1) AND ($2::incentive_status IS NULL OR i.status = $2) ORDER BY i.created_at DESC"
        );
        let incentives = sqlx::query_as::<_, Incentive>(&query)
            .bind(filter.agent_id)
            .bind(filter.status)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(incentives.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(incentive_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM incentives WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark paid or unpaid; `paid_at` tracks the most recent payment
    #[instrument(skip(self, request), fields(incentive_id = %abbrev_uuid(&id), status = ?request.status), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query(
            r#"
            UPDATE incentives SET
                status = $2,
                paid_at = CASE WHEN $2 = 'paid'::incentive_status THEN COALESCE(paid_at, NOW()) ELSE NULL END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(request.status)
        .execute(&mut *self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Incentives<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn get_by_student(&mut self, student_id: StudentId) -> Result<Option<IncentiveDBResponse>> {
        let query = format!("{SELECT_JOINED} WHERE i.student_id = $1");
        let incentive = sqlx::query_as::<_, Incentive>(&query)
            .bind(student_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(incentive.map(Into::into))
    }

    /// Incentives keyed by student, for joining onto student listings
    #[instrument(skip(self, student_ids), fields(count = student_ids.len()), err)]
    pub async fn list_for_students(&mut self, student_ids: &[StudentId]) -> Result<HashMap<StudentId, IncentiveDBResponse>> {
        if student_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = format!("{SELECT_JOINED} WHERE i.student_id = ANY($1)");
        let incentives = sqlx::query_as::<_, Incentive>(&query)
            .bind(student_ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(incentives.into_iter().map(|i| (i.student_id, i.into())).collect())
    }
}
