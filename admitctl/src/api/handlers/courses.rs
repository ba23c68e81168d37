use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::form::FormData,
    api::models::{
        courses::{CourseRuleCreate, CourseRuleDeleted, CourseRuleResponse, CourseRuleUpdate, ListCourseRulesQuery, validate_rule},
        users::CurrentUser,
    },
    auth::permissions::require_admin,
    db::{
        errors::DbError,
        handlers::{CourseRules, Repository, courses::CourseRuleFilter},
        models::courses::{CourseRuleCreateDBRequest, CourseRuleUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{CourseRuleId, Resource, abbrev_uuid},
};

fn rule_not_found(id: CourseRuleId) -> Error {
    Error::NotFound {
        resource: "Course rule".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/admin/courses",
    tag = "courses",
    summary = "List course rules",
    params(ListCourseRulesQuery),
    responses(
        (status = 200, description = "Course incentive rules", body = Vec<CourseRuleResponse>),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_course_rules(
    State(state): State<AppState>,
    Query(query): Query<ListCourseRulesQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<CourseRuleResponse>>> {
    require_admin(&current_user, Resource::Courses)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rules = CourseRules::new(&mut conn)
        .list(&CourseRuleFilter {
            include_inactive: query.include_inactive,
        })
        .await?;

    Ok(Json(rules.into_iter().map(CourseRuleResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/admin/courses",
    tag = "courses",
    summary = "Create course rule",
    request_body(content = CourseRuleCreate, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Rule created", body = CourseRuleResponse),
        (status = 400, description = "Blank course or negative amount"),
        (status = 403, description = "Admin access required"),
        (status = 409, description = "An active rule for the course exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_course_rule(
    State(state): State<AppState>,
    current_user: CurrentUser,
    FormData(form): FormData<CourseRuleCreate>,
) -> Result<(StatusCode, Json<CourseRuleResponse>)> {
    require_admin(&current_user, Resource::Courses)?;
    validate_rule(Some(&form.course), Some(form.amount))?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rule = CourseRules::new(&mut conn)
        .create(&CourseRuleCreateDBRequest {
            course: form.course,
            amount: form.amount,
        })
        .await?;

    info!(course = %rule.course, amount = %rule.amount, "Course rule created");
    Ok((StatusCode::CREATED, Json(rule.into())))
}

/// Changes apply to students created afterwards; existing snapshots keep their amount
#[utoipa::path(
    put,
    path = "/admin/courses/{rule_id}",
    tag = "courses",
    summary = "Update course rule",
    request_body(content = CourseRuleUpdate, content_type = "multipart/form-data"),
    params(("rule_id" = String, Path, description = "Course rule ID")),
    responses(
        (status = 200, description = "Rule updated", body = CourseRuleResponse),
        (status = 400, description = "Blank course or negative amount"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Rule not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(rule_id = %abbrev_uuid(&rule_id)))]
pub async fn update_course_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<CourseRuleId>,
    current_user: CurrentUser,
    FormData(form): FormData<CourseRuleUpdate>,
) -> Result<Json<CourseRuleResponse>> {
    require_admin(&current_user, Resource::Courses)?;
    validate_rule(form.course.as_deref(), form.amount)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rule = CourseRules::new(&mut conn)
        .update(
            rule_id,
            &CourseRuleUpdateDBRequest {
                course: form.course,
                amount: form.amount,
                active: form.active,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => rule_not_found(rule_id),
            other => other.into(),
        })?;

    info!(course = %rule.course, amount = %rule.amount, active = rule.active, "Course rule updated");
    Ok(Json(rule.into()))
}

#[utoipa::path(
    delete,
    path = "/admin/courses/{rule_id}",
    tag = "courses",
    summary = "Deactivate course rule",
    params(("rule_id" = String, Path, description = "Course rule ID")),
    responses(
        (status = 200, description = "Rule deactivated", body = CourseRuleDeleted),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Rule not found or already inactive"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(rule_id = %abbrev_uuid(&rule_id)))]
pub async fn delete_course_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<CourseRuleId>,
    current_user: CurrentUser,
) -> Result<Json<CourseRuleDeleted>> {
    require_admin(&current_user, Resource::Courses)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !CourseRules::new(&mut conn).delete(rule_id).await? {
        return Err(rule_not_found(rule_id));
    }

    info!("Course rule deactivated");
    Ok(Json(CourseRuleDeleted {
        message: "Course deleted successfully".to_string(),
    }))
}

/// Active courses and their incentive amounts, for the submission form
#[utoipa::path(
    get,
    path = "/incentive-rules",
    tag = "courses",
    summary = "Active incentive rules",
    responses(
        (status = 200, description = "Active rules", body = Vec<CourseRuleResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_incentive_rules(State(state): State<AppState>) -> Result<Json<Vec<CourseRuleResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rules = CourseRules::new(&mut conn).list(&CourseRuleFilter::active()).await?;
    Ok(Json(rules.into_iter().map(CourseRuleResponse::from).collect()))
}
