//! Coordinator and admin decisions on student applications.
//!
//! Every decision runs in one transaction: the status moves with a compare-and-set
//! on the status that was read, and reaching `approved` inserts the agent's
//! incentive in the same transaction. A reviewer racing another therefore either
//! wins outright or gets a 409.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

use super::students::{load_student, student_response, student_responses};
use crate::{
    AppState,
    api::form::FormData,
    api::models::{
        signatures::validate_signature_data,
        students::{ReviewNotesForm, ReviewResponse, SignatureType, StatusUpdateForm, StudentResponse, StudentStatus},
        users::CurrentUser,
    },
    auth::permissions::{require_admin, require_reviewer},
    db::{
        errors::DbError,
        handlers::{CourseRules, Incentives, Repository, Signatures, Students},
        models::{incentives::IncentiveCreateDBRequest, students::StudentTransitionDBRequest},
    },
    errors::{Error, Result},
    types::{Resource, StudentId, abbrev_uuid},
    workflow::{self, ReviewAction},
};

struct Decision {
    action: ReviewAction,
    notes: Option<String>,
    signature: Option<(String, SignatureType)>,
}

fn decision_message(status: StudentStatus) -> &'static str {
    match status {
        StudentStatus::CoordinatorApproved => "Student approved by coordinator, awaiting admin approval",
        StudentStatus::Approved => "Student approved successfully",
        StudentStatus::Rejected => "Student rejected",
        StudentStatus::Pending => "Student updated",
    }
}

async fn review_student(state: &AppState, current_user: &CurrentUser, student_id: StudentId, decision: Decision) -> Result<ReviewResponse> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let student = load_student(&mut tx, current_user, student_id).await?;

    let transition = workflow::transition(state.config.workflow.approval_mode, student.status, current_user.role, decision.action)?;

    let signature = if transition.is_coordinator_approval() {
        match decision.signature {
            Some(signature) => Some(signature),
            None => match Signatures::new(&mut tx).get(current_user.id).await? {
                Some(saved) => Some((saved.signature_data, saved.signature_type)),
                None if state.config.workflow.require_coordinator_signature => {
                    return Err(Error::BadRequest {
                        message: "Signature is required for coordinator approval".to_string(),
                    });
                }
                None => None,
            },
        }
    } else {
        None
    };
    let (signature_data, signature_type) = signature.unzip();

    let updated = Students::new(&mut tx)
        .update(
            student_id,
            &StudentTransitionDBRequest {
                expected: transition.from,
                to: transition.to,
                stage: transition.stage,
                reviewer_id: current_user.id,
                notes: decision.notes,
                signature_data,
                signature_type,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::Conflict {
                message: "Student status changed while it was being reviewed".to_string(),
            },
            other => Error::Database(other),
        })?;

    let mut incentive_amount = None;
    if transition.creates_incentive() {
        let amount = match updated.incentive_amount {
            Some(amount) => Some(amount),
            None => CourseRules::new(&mut tx)
                .get_active_by_course(&updated.course)
                .await?
                .map(|rule| rule.amount),
        };
        if let Some(amount) = amount {
            Incentives::new(&mut tx)
                .create(&IncentiveCreateDBRequest {
                    agent_id: updated.agent_id,
                    student_id: updated.id,
                    course: updated.course.clone(),
                    amount,
                })
                .await?;
            incentive_amount = Some(amount);
        }
    }

    let response = student_response(&mut tx, updated).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(
        reviewer = %abbrev_uuid(&current_user.id),
        from = %transition.from,
        to = %transition.to,
        incentive = ?incentive_amount,
        "Student reviewed"
    );

    Ok(ReviewResponse {
        message: decision_message(transition.to).to_string(),
        student: response,
    })
}

/// Approve or reject a student as the calling reviewer
///
/// Coordinators approve with a signature, either in the form or the one saved
/// from `/admin/signature`. With `workflow.approval_mode = three_tier` their
/// approval parks the student at `coordinator_approved` for the admin.
#[utoipa::path(
    put,
    path = "/students/{student_id}/status",
    tag = "reviews",
    summary = "Review student",
    request_body(content = StatusUpdateForm, content_type = "multipart/form-data"),
    params(("student_id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Decision recorded", body = ReviewResponse),
        (status = 400, description = "Invalid status, missing signature or wrong review stage"),
        (status = 403, description = "Coordinator or admin access required"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Student has already been decided"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id)))]
pub async fn update_student_status(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
    FormData(form): FormData<StatusUpdateForm>,
) -> Result<Json<ReviewResponse>> {
    require_reviewer(&current_user, Resource::Students)?;
    let action = form.action()?;

    let signature = match form.signature_data.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(data) => Some((validate_signature_data(data)?, form.signature_type.unwrap_or_default())),
        None => None,
    };

    let response = review_student(
        &state,
        &current_user,
        student_id,
        Decision {
            action,
            notes: form.notes,
            signature,
        },
    )
    .await?;
    Ok(Json(response))
}

async fn admin_decision(state: AppState, current_user: CurrentUser, student_id: StudentId, action: ReviewAction, notes: Option<String>) -> Result<Json<ReviewResponse>> {
    require_admin(&current_user, Resource::Students)?;
    let response = review_student(
        &state,
        &current_user,
        student_id,
        Decision {
            action,
            notes,
            signature: None,
        },
    )
    .await?;
    Ok(Json(response))
}

#[utoipa::path(
    put,
    path = "/admin/approve-student/{student_id}",
    tag = "reviews",
    summary = "Final approval",
    request_body(content = ReviewNotesForm, content_type = "multipart/form-data"),
    params(("student_id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student approved and incentive recorded", body = ReviewResponse),
        (status = 400, description = "Student still awaits coordinator approval"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Student has already been decided"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id)))]
pub async fn admin_approve_student(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
    FormData(form): FormData<ReviewNotesForm>,
) -> Result<Json<ReviewResponse>> {
    admin_decision(state, current_user, student_id, ReviewAction::Approve, form.notes).await
}

#[utoipa::path(
    put,
    path = "/admin/reject-student/{student_id}",
    tag = "reviews",
    summary = "Final rejection",
    request_body(content = ReviewNotesForm, content_type = "multipart/form-data"),
    params(("student_id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student rejected", body = ReviewResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Student has already been decided"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id)))]
pub async fn admin_reject_student(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
    FormData(form): FormData<ReviewNotesForm>,
) -> Result<Json<ReviewResponse>> {
    admin_decision(state, current_user, student_id, ReviewAction::Reject, form.notes).await
}

/// Students a coordinator has approved, oldest sign-off first
#[utoipa::path(
    get,
    path = "/admin/pending-approvals",
    tag = "reviews",
    summary = "Awaiting final approval",
    responses(
        (status = 200, description = "Coordinator-approved students", body = Vec<StudentResponse>),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_pending_approvals(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<StudentResponse>>> {
    require_admin(&current_user, Resource::Students)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let students = Students::new(&mut conn).awaiting_final_approval().await?;
    Ok(Json(student_responses(&mut conn, students).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::models::incentives::IncentiveSummary;
    use crate::api::models::students::{ReviewResponse, StudentResponse, StudentStatus};
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use crate::workflow::ApprovalMode;
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;

    const SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[sqlx::test]
    #[test_log::test]
    async fn test_three_tier_flow_records_incentive(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let student = create_test_student(&pool, agent.id, "BSc").await;
        let (coord_name, coord_value) = add_auth_headers(&coordinator);
        let (admin_name, admin_value) = add_auth_headers(&admin);

        // Final approval needs the coordinator first
        app.put(&format!("/api/admin/approve-student/{}", student.id))
            .add_header(admin_name.clone(), admin_value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .put(&format!("/api/students/{}/status", student.id))
            .add_header(coord_name.clone(), coord_value.clone())
            .form(&json!({"status": "approved", "notes": "Documents verified", "signature_data": SIGNATURE}))
            .await;
        response.assert_status_ok();
        let reviewed: ReviewResponse = response.json();
        assert_eq!(reviewed.student.status, StudentStatus::CoordinatorApproved);
        assert_eq!(reviewed.message, "Student approved by coordinator, awaiting admin approval");
        assert_eq!(reviewed.student.coordinator_id, Some(coordinator.id));
        assert_eq!(reviewed.student.coordinator_notes.as_deref(), Some("Documents verified"));
        assert_eq!(reviewed.student.signature_data.as_deref(), Some(SIGNATURE));

        // Coordinators cannot act twice
        app.put(&format!("/api/students/{}/status", student.id))
            .add_header(coord_name, coord_value)
            .form(&json!({"status": "approved", "signature_data": SIGNATURE}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let queue: Vec<StudentResponse> = app
            .get("/api/admin/pending-approvals")
            .add_header(admin_name.clone(), admin_value.clone())
            .await
            .json();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, student.id);

        let response = app
            .put(&format!("/api/admin/approve-student/{}", student.id))
            .add_header(admin_name.clone(), admin_value.clone())
            .form(&json!({"notes": "Welcome"}))
            .await;
        response.assert_status_ok();
        let reviewed: ReviewResponse = response.json();
        assert_eq!(reviewed.student.status, StudentStatus::Approved);
        assert_eq!(reviewed.message, "Student approved successfully");
        assert_eq!(reviewed.student.admin_notes.as_deref(), Some("Welcome"));

        // Approved is terminal
        app.put(&format!("/api/admin/reject-student/{}", student.id))
            .add_header(admin_name, admin_value)
            .await
            .assert_status(StatusCode::CONFLICT);

        let (name, value) = add_auth_headers(&agent);
        let summary: IncentiveSummary = app.get("/api/incentives").add_header(name, value).await.json();
        assert_eq!(summary.incentives.len(), 1);
        assert_eq!(summary.incentives[0].amount, Decimal::from(3000));
        assert_eq!(summary.total_pending, Decimal::from(3000));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_coordinator_signature_required(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let student = create_test_student(&pool, agent.id, "BCA").await;
        let (name, value) = add_auth_headers(&coordinator);

        let response = app
            .put(&format!("/api/students/{}/status", student.id))
            .add_header(name.clone(), value.clone())
            .form(&json!({"status": "approved"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["detail"], "Signature is required for coordinator approval");

        // A saved signature is used when the form carries none
        app.post("/api/admin/signature")
            .add_header(name.clone(), value.clone())
            .json(&json!({"signature_data": SIGNATURE, "signature_type": "upload"}))
            .await
            .assert_status_ok();

        let reviewed: ReviewResponse = app
            .put(&format!("/api/students/{}/status", student.id))
            .add_header(name, value)
            .form(&json!({"status": "approved"}))
            .await
            .json();
        assert_eq!(reviewed.student.status, StudentStatus::CoordinatorApproved);
        assert_eq!(reviewed.student.signature_data.as_deref(), Some(SIGNATURE));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_rejection_and_role_checks(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let student = create_test_student(&pool, agent.id, "BA").await;

        let (name, value) = add_auth_headers(&agent);
        app.put(&format!("/api/students/{}/status", student.id))
            .add_header(name, value)
            .form(&json!({"status": "approved"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = add_auth_headers(&coordinator);
        app.put(&format!("/api/admin/reject-student/{}", student.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.put(&format!("/api/students/{}/status", student.id))
            .add_header(name.clone(), value.clone())
            .form(&json!({"status": "maybe"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .put(&format!("/api/students/{}/status", student.id))
            .add_header(name.clone(), value.clone())
            .form(&json!({"status": "rejected", "notes": "Incomplete"}))
            .await;
        response.assert_status_ok();
        let reviewed: ReviewResponse = response.json();
        assert_eq!(reviewed.student.status, StudentStatus::Rejected);
        assert_eq!(reviewed.message, "Student rejected");

        app.put(&format!("/api/students/{}/status", student.id))
            .add_header(name, value)
            .form(&json!({"status": "rejected"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let incentives: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incentives")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(incentives, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_two_tier_single_review(pool: PgPool) {
        let mut config = create_test_config();
        config.workflow.approval_mode = ApprovalMode::TwoTier;
        config.workflow.require_coordinator_signature = false;
        let (app, _dirs) = create_test_app_with_config(pool.clone(), config).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let student = create_test_student(&pool, agent.id, "BNYS").await;
        let (name, value) = add_auth_headers(&coordinator);

        let reviewed: ReviewResponse = app
            .put(&format!("/api/students/{}/status", student.id))
            .add_header(name, value)
            .form(&json!({"status": "approved"}))
            .await
            .json();
        assert_eq!(reviewed.student.status, StudentStatus::Approved);

        let amount: Decimal = sqlx::query_scalar("SELECT amount FROM incentives WHERE student_id = $1")
            .bind(student.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(amount, Decimal::from(5000));
    }
}
