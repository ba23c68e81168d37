use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        students::{AgentOption, FilterOptions, ListStudentsQuery, StudentCreate, StudentResponse, StudentStatus},
        users::{CurrentUser, Role, full_name},
    },
    auth::permissions::{ensure_student_access, require_agent, require_reviewer},
    db::{
        handlers::{CourseRules, Documents, Repository, Students, Users, students::StudentFilter, users::UserFilter},
        models::students::{StudentCreateDBRequest, StudentDBResponse, token_number},
    },
    errors::{Error, Result},
    types::{Resource, StudentId, abbrev_uuid},
};

pub(crate) fn student_not_found(id: StudentId) -> Error {
    Error::NotFound {
        resource: "Student".to_string(),
        id: id.to_string(),
    }
}

/// Load a student the caller may see
pub(crate) async fn load_student(conn: &mut PgConnection, current_user: &CurrentUser, id: StudentId) -> Result<StudentDBResponse> {
    let student = Students::new(conn).get_by_id(id).await?.ok_or_else(|| student_not_found(id))?;
    ensure_student_access(current_user, &student)?;
    Ok(student)
}

/// Attach agent names and document links
pub(crate) async fn student_responses(conn: &mut PgConnection, students: Vec<StudentDBResponse>) -> Result<Vec<StudentResponse>> {
    let ids: Vec<StudentId> = students.iter().map(|s| s.id).collect();
    let agent_ids: Vec<_> = students.iter().map(|s| s.agent_id).collect::<HashSet<_>>().into_iter().collect();

    let agents = Users::new(&mut *conn).get_bulk(agent_ids).await?;
    let documents = Documents::new(&mut *conn).list_for_students(&ids).await?;

    Ok(students
        .into_iter()
        .map(|student| {
            let agent = agents.get(&student.agent_id);
            let docs = documents.get(&student.id);
            StudentResponse::from(student).with_agent(agent).with_documents(docs.into_iter().flatten())
        })
        .collect())
}

pub(crate) async fn student_response(conn: &mut PgConnection, student: StudentDBResponse) -> Result<StudentResponse> {
    student_responses(conn, vec![student])
        .await?
        .pop()
        .ok_or_else(|| Error::Internal {
            operation: "build student response".to_string(),
        })
}

/// Submit a student application. Agents only.
#[utoipa::path(
    post,
    path = "/students",
    request_body = StudentCreate,
    tag = "students",
    summary = "Create student",
    responses(
        (status = 201, description = "Student created", body = StudentResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Only agents can submit students"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_student(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<StudentCreate>,
) -> Result<(StatusCode, Json<StudentResponse>)> {
    require_agent(&current_user, Resource::Students)?;
    let request = request.normalized()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    // Snapshot the incentive now; later rule changes do not affect this student
    let rule = CourseRules::new(&mut tx).get_active_by_course(&request.course).await?;
    let (course, incentive_amount) = match rule {
        Some(rule) => (rule.course, Some(rule.amount)),
        None => (request.course, None),
    };

    let created = Students::new(&mut tx)
        .create(&StudentCreateDBRequest {
            token_number: token_number(Utc::now(), Uuid::new_v4()),
            agent_id: current_user.id,
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            phone: request.phone,
            course,
            incentive_amount,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(student_id = %abbrev_uuid(&created.id), token = %created.token_number, "Student created");

    let mut response = StudentResponse::from(created);
    response.agent_username = Some(current_user.username.clone());
    response.agent_name = Some(current_user.full_name());
    Ok((StatusCode::CREATED, Json(response)))
}

/// Agents see their own students, reviewers see every student
#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    summary = "List students",
    responses(
        (status = 200, description = "Students, newest first", body = Vec<StudentResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_students(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<StudentResponse>>> {
    let mut filter = StudentFilter::all();
    if current_user.is_agent() {
        filter = filter.for_agent(current_user.id);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let students = Students::new(&mut conn).list(&filter).await?;
    Ok(Json(student_responses(&mut conn, students).await?))
}

#[utoipa::path(
    get,
    path = "/students/paginated",
    tag = "students",
    summary = "List students with filters",
    params(ListStudentsQuery),
    responses(
        (status = 200, description = "A page of students", body = PaginatedResponse<StudentResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_students_paginated(
    State(state): State<AppState>,
    Query(query): Query<ListStudentsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<StudentResponse>>> {
    let (skip, limit) = query.pagination.params();
    let agent_id = if current_user.is_agent() { Some(current_user.id) } else { query.agent_id };
    let filter = StudentFilter {
        agent_id,
        status: query.status,
        course: query.course,
        search: query.search,
        ..StudentFilter::page(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Students::new(&mut conn);
    let students = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = student_responses(&mut conn, students).await?;
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/students/filter-options",
    tag = "students",
    summary = "Student filter options",
    responses(
        (status = 200, description = "Courses, statuses and agents to filter by", body = FilterOptions),
        (status = 403, description = "Coordinator or admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_filter_options(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<FilterOptions>> {
    require_reviewer(&current_user, Resource::Students)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let courses = Students::new(&mut conn).distinct_courses().await?;
    let agents = Users::new(&mut conn)
        .list(&UserFilter::new(0, i64::MAX).with_role(Role::Agent))
        .await?;

    let mut agents: Vec<AgentOption> = agents
        .into_iter()
        .map(|agent| AgentOption {
            full_name: full_name(&agent.first_name, &agent.last_name, &agent.username),
            id: agent.id,
            username: agent.username,
            agent_code: agent.agent_code,
            role: agent.role,
        })
        .collect();
    agents.sort_by(|a, b| a.username.cmp(&b.username));

    Ok(Json(FilterOptions {
        courses,
        statuses: StudentStatus::ALL.to_vec(),
        agents,
    }))
}

#[utoipa::path(
    get,
    path = "/students/{student_id}",
    tag = "students",
    summary = "Get student",
    params(("student_id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student detail", body = StudentResponse),
        (status = 403, description = "Agents can only view their own students"),
        (status = 404, description = "Student not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id)))]
pub async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
) -> Result<Json<StudentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let student = load_student(&mut conn, &current_user, student_id).await?;
    Ok(Json(student_response(&mut conn, student).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::models::students::{FilterOptions, StudentResponse, StudentStatus};
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn student(course: &str) -> serde_json::Value {
        json!({
            "first_name": "Anita",
            "last_name": "Desai",
            "email": "anita@example.com",
            "phone": "9876543210",
            "course": course
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_copies_incentive_from_rule(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let (name, value) = add_auth_headers(&agent);

        // Seeded rules include BSc at 3000
        let response = app.post("/api/students").add_header(name.clone(), value.clone()).json(&student("bsc")).await;
        response.assert_status(StatusCode::CREATED);
        let created: StudentResponse = response.json();
        assert_eq!(created.status, StudentStatus::Pending);
        assert_eq!(created.course, "BSc");
        assert_eq!(created.incentive_amount, Some(Decimal::from(3000)));
        assert_eq!(created.agent_id, agent.id);
        assert!(created.token_number.starts_with("TOK"));
        assert_eq!(created.token_number.len(), 19);

        let response = app
            .post("/api/students")
            .add_header(name, value)
            .json(&student("Diploma in Yoga"))
            .await;
        response.assert_status(StatusCode::CREATED);
        let uncovered: StudentResponse = response.json();
        assert!(uncovered.incentive_amount.is_none());
        assert_ne!(uncovered.token_number, created.token_number);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_only_agents_create_students(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let (name, value) = add_auth_headers(&coordinator);

        let response = app.post("/api/students").add_header(name, value).json(&student("BSc")).await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: serde_json::Value = response.json();
        assert_eq!(body["detail"], "Only agents can submit students");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_agents_only_see_their_own(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let other = create_test_user(&pool, Role::Agent).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;

        let mine = create_test_student(&pool, agent.id, "BSc").await;
        let theirs = create_test_student(&pool, other.id, "BCA").await;

        let (name, value) = add_auth_headers(&agent);
        let listed: Vec<StudentResponse> = app.get("/api/students").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
        assert_eq!(listed[0].agent_username.as_deref(), Some(agent.username.as_str()));

        let response = app
            .get(&format!("/api/students/{}", theirs.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: serde_json::Value = response.json();
        assert_eq!(body["detail"], "Access denied");

        app.get(&format!("/api/students/{}", Uuid::new_v4()))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let (name, value) = add_auth_headers(&coordinator);
        let listed: Vec<StudentResponse> = app.get("/api/students").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(listed.len(), 2);
        app.get(&format!("/api/students/{}", theirs.id))
            .add_header(name, value)
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_paginated_filters(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let other = create_test_user(&pool, Role::Agent).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        for _ in 0..3 {
            create_test_student(&pool, agent.id, "BSc").await;
        }
        create_test_student(&pool, other.id, "BCA").await;

        let (name, value) = add_auth_headers(&admin);
        let page: serde_json::Value = app
            .get("/api/students/paginated?limit=2&course=BSc")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(page["total_count"], 3);
        assert_eq!(page["data"].as_array().unwrap().len(), 2);

        let page: serde_json::Value = app
            .get(&format!("/api/students/paginated?agent_id={}", other.id))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(page["total_count"], 1);

        let page: serde_json::Value = app
            .get("/api/students/paginated?status=approved")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(page["total_count"], 0);

        // An agent's own scope wins over a requested agent_id
        let (name, value) = add_auth_headers(&other);
        let page: serde_json::Value = app
            .get(&format!("/api/students/paginated?agent_id={}", agent.id))
            .add_header(name, value)
            .await
            .json();
        assert_eq!(page["total_count"], 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_filter_options(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        create_test_student(&pool, agent.id, "BCA").await;
        create_test_student(&pool, agent.id, "BA").await;

        let (name, value) = add_auth_headers(&coordinator);
        let response = app.get("/api/students/filter-options").add_header(name, value).await;
        response.assert_status_ok();
        let options: FilterOptions = response.json();
        assert_eq!(options.courses, vec!["BA".to_string(), "BCA".to_string()]);
        assert_eq!(options.statuses.len(), 4);
        assert_eq!(options.agents.len(), 1);
        assert_eq!(options.agents[0].id, agent.id);

        let (name, value) = add_auth_headers(&agent);
        app.get("/api/students/filter-options")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
