//! Database repository for student applications.

use crate::types::{StudentId, UserId, abbrev_uuid};
use crate::{
    api::models::students::{SignatureType, StudentStatus},
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::students::{StudentCreateDBRequest, StudentDBResponse, StudentTransitionDBRequest},
    },
    workflow::ReviewStage,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing students. A `None` limit returns every match.
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub skip: i64,
    pub limit: Option<i64>,
    pub agent_id: Option<UserId>,
    pub status: Option<StudentStatus>,
    pub course: Option<String>,
    pub search: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl StudentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn for_agent(mut self, agent_id: UserId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()))
    }

    fn course(&self) -> Option<&str> {
        self.course.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::uuid IS NULL OR agent_id = $1)
      AND ($2::student_status IS NULL OR status = $2)
      AND ($3::text IS NULL OR LOWER(course) = LOWER($3))
      AND ($4::text IS NULL
           OR LOWER(first_name || ' ' || last_name) LIKE $4
           OR LOWER(email) LIKE $4
           OR phone LIKE $4
           OR LOWER(token_number) LIKE $4)
      AND ($5::timestamptz IS NULL OR created_at >= $5)
      AND ($6::timestamptz IS NULL OR created_at < $6)
"#;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Student {
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

impl From<Student> for StudentDBResponse {
    fn from(s: Student) -> Self {
        Self {
            id: s.id,
            token_number: s.token_number,
            agent_id: s.agent_id,
            first_name: s.first_name,
            last_name: s.last_name,
            email: s.email,
            phone: s.phone,
            course: s.course,
            status: s.status,
            incentive_amount: s.incentive_amount,
            coordinator_notes: s.coordinator_notes,
            admin_notes: s.admin_notes,
            signature_data: s.signature_data,
            signature_type: s.signature_type,
            coordinator_id: s.coordinator_id,
            coordinator_approved_at: s.coordinator_approved_at,
            admin_id: s.admin_id,
            admin_reviewed_at: s.admin_reviewed_at,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

pub struct Students<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Students<'c> {
    type CreateRequest = StudentCreateDBRequest;
    type UpdateRequest = StudentTransitionDBRequest;
    type Response = StudentDBResponse;
    type Id = StudentId;
    type Filter = StudentFilter;

    #[instrument(skip(self, request), fields(agent_id = %abbrev_uuid(&request.agent_id), course = %request.course), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (id, token_number, agent_id, first_name, last_name, email, phone, course, incentive_amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.token_number)
        .bind(request.agent_id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.course)
        .bind(request.incentive_amount)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(student.into())
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(student.map(Into::into))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<StudentId>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let students = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ANY($1)")
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        Ok(students.into_iter().map(|s| (s.id, s.into())).collect())
    }

    #[instrument(skip(self, filter), fields(limit = ?filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let query = format!("SELECT * FROM students {FILTER_CLAUSE} ORDER BY created_at DESC, id LIMIT $7 OFFSET $8");
        let students = sqlx::query_as::<_, Student>(&query)
            .bind(filter.agent_id)
            .bind(filter.status)
            .bind(filter.course())
            .bind(filter.search_pattern())
            .bind(filter.created_from)
            .bind(filter.created_to)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(students.into_iter().map(Into::into).collect())
    }

    /// Submitted applications are kept for the review trail and incentive history
    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        Err(DbError::Other(anyhow::anyhow!("student applications cannot be deleted")))
    }

    /// Apply a review decision if the student is still in `request.expected`.
    ///
    /// NotFound when the status has moved on since it was read, so exactly one of
    /// several concurrent reviewers wins.
    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&id), from = %request.expected, to = %request.to), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let by_coordinator = request.stage == ReviewStage::Coordinator;
        let notes = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());

        let student = sqlx::query_as::<_, Student>(
            r#"
            UPDATE students SET
                status = $3,
                coordinator_id = CASE WHEN $4 THEN $5 ELSE coordinator_id END,
                coordinator_approved_at = CASE WHEN $4 AND $3 <> 'rejected'::student_status THEN NOW() ELSE coordinator_approved_at END,
                coordinator_notes = CASE WHEN $4 THEN COALESCE($6, coordinator_notes) ELSE coordinator_notes END,
                admin_id = CASE WHEN $4 THEN admin_id ELSE $5 END,
                admin_reviewed_at = CASE WHEN $4 THEN admin_reviewed_at ELSE NOW() END,
                admin_notes = CASE WHEN $4 THEN admin_notes ELSE COALESCE($6, admin_notes) END,
                signature_data = COALESCE($7, signature_data),
                signature_type = COALESCE($8, signature_type),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.expected)
        .bind(request.to)
        .bind(by_coordinator)
        .bind(request.reviewer_id)
        .bind(notes)
        .bind(&request.signature_data)
        .bind(request.signature_type)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(student.into())
    }
}

impl<'c> Students<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total rows matching the filter, ignoring skip/limit
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &StudentFilter) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM students {FILTER_CLAUSE}");
        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(filter.agent_id)
            .bind(filter.status)
            .bind(filter.course())
            .bind(filter.search_pattern())
            .bind(filter.created_from)
            .bind(filter.created_to)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Distinct course names that have at least one application
    #[instrument(skip(self), err)]
    pub async fn distinct_courses(&mut self) -> Result<Vec<String>> {
        let courses = sqlx::query_scalar::<_, String>("SELECT DISTINCT course FROM students ORDER BY course")
            .fetch_all(&mut *self.db)
            .await?;
        Ok(courses)
    }

    /// Applications a coordinator has signed off that await the admin's decision
    #[instrument(skip(self), err)]
    pub async fn awaiting_final_approval(&mut self) -> Result<Vec<StudentDBResponse>> {
        let students = sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE status = 'coordinator_approved' ORDER BY coordinator_approved_at ASC NULLS LAST, created_at ASC",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(students.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::models::students::token_number;
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    fn create_request(agent_id: UserId, first_name: &str, course: &str) -> StudentCreateDBRequest {
        StudentCreateDBRequest {
            token_number: token_number(Utc::now(), Uuid::new_v4()),
            agent_id,
            first_name: first_name.to_string(),
            last_name: "Kumar".to_string(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            phone: "9000000000".to_string(),
            course: course.to_string(),
            incentive_amount: Some(Decimal::from(3000)),
        }
    }

    fn coordinator_approval(reviewer_id: UserId) -> StudentTransitionDBRequest {
        StudentTransitionDBRequest {
            expected: StudentStatus::Pending,
            to: StudentStatus::CoordinatorApproved,
            stage: ReviewStage::Coordinator,
            reviewer_id,
            notes: Some("documents verified".to_string()),
            signature_data: Some("data:image/png;base64,AAAA".to_string()),
            signature_type: Some(SignatureType::Draw),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_get_student(pool: PgPool) {
        let agent = create_test_user(&pool, Role::Agent).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        let created = repo.create(&create_request(agent.id, "Ravi", "BSc")).await.unwrap();
        assert_eq!(created.status, StudentStatus::Pending);
        assert_eq!(created.agent_id, agent.id);
        assert_eq!(created.incentive_amount, Some(Decimal::from(3000)));
        assert!(created.token_number.starts_with("TOK"));

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.token_number, created.token_number);
        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_transition_is_compare_and_set(pool: PgPool) {
        let agent = create_test_user(&pool, Role::Agent).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        let student = repo.create(&create_request(agent.id, "Meera", "BCA")).await.unwrap();

        let approved = repo.update(student.id, &coordinator_approval(coordinator.id)).await.unwrap();
        assert_eq!(approved.status, StudentStatus::CoordinatorApproved);
        assert_eq!(approved.coordinator_id, Some(coordinator.id));
        assert!(approved.coordinator_approved_at.is_some());
        assert_eq!(approved.coordinator_notes.as_deref(), Some("documents verified"));
        assert_eq!(approved.signature_type, Some(SignatureType::Draw));
        assert!(approved.admin_id.is_none());

        // A second reviewer working from the stale `pending` status loses
        let stale = repo.update(student.id, &coordinator_approval(coordinator.id)).await;
        assert!(matches!(stale, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_stage_keeps_coordinator_fields(pool: PgPool) {
        let agent = create_test_user(&pool, Role::Agent).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        let student = repo.create(&create_request(agent.id, "Anil", "BA")).await.unwrap();
        repo.update(student.id, &coordinator_approval(coordinator.id)).await.unwrap();

        let final_decision = StudentTransitionDBRequest {
            expected: StudentStatus::CoordinatorApproved,
            to: StudentStatus::Approved,
            stage: ReviewStage::Admin,
            reviewer_id: admin.id,
            notes: Some("welcome".to_string()),
            signature_data: None,
            signature_type: None,
        };
        let done = repo.update(student.id, &final_decision).await.unwrap();
        assert_eq!(done.status, StudentStatus::Approved);
        assert_eq!(done.admin_id, Some(admin.id));
        assert!(done.admin_reviewed_at.is_some());
        assert_eq!(done.admin_notes.as_deref(), Some("welcome"));
        assert_eq!(done.coordinator_notes.as_deref(), Some("documents verified"));
        assert_eq!(done.signature_data.as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters(pool: PgPool) {
        let agent = create_test_user(&pool, Role::Agent).await;
        let other = create_test_user(&pool, Role::Agent).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        let first = repo.create(&create_request(agent.id, "Kiran", "BSc")).await.unwrap();
        repo.create(&create_request(agent.id, "Lata", "BCom")).await.unwrap();
        repo.create(&create_request(other.id, "Mohan", "bsc")).await.unwrap();
        repo.update(first.id, &coordinator_approval(coordinator.id)).await.unwrap();

        assert_eq!(repo.list(&StudentFilter::all()).await.unwrap().len(), 3);
        assert_eq!(repo.list(&StudentFilter::all().for_agent(agent.id)).await.unwrap().len(), 2);

        let by_course = StudentFilter {
            course: Some("BSC".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.count(&by_course).await.unwrap(), 2);

        let by_status = StudentFilter {
            status: Some(StudentStatus::CoordinatorApproved),
            ..StudentFilter::all()
        };
        let found = repo.list(&by_status).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, first.id);

        let by_search = StudentFilter {
            search: Some("lata".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_search).await.unwrap()[0].course, "BCom");

        let page = StudentFilter::page(0, 2);
        assert_eq!(repo.list(&page).await.unwrap().len(), 2);
        assert_eq!(repo.count(&page).await.unwrap(), 3);

        let future = StudentFilter {
            created_from: Some(Utc::now() + chrono::Duration::days(1)),
            ..Default::default()
        };
        assert_eq!(repo.count(&future).await.unwrap(), 0);

        let mut courses = repo.distinct_courses().await.unwrap();
        courses.sort();
        assert_eq!(courses, vec!["BCom", "BSc", "bsc"]);

        let awaiting = repo.awaiting_final_approval().await.unwrap();
        assert_eq!(awaiting.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_keeps_the_application(pool: PgPool) {
        let agent = create_test_user(&pool, Role::Agent).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        let student = repo.create(&create_request(agent.id, "Divya", "BNYS")).await.unwrap();
        assert!(repo.delete(student.id).await.is_err());
        assert!(repo.get_by_id(student.id).await.unwrap().is_some());
    }
}
