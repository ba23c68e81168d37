//! PDF receipts for approved admissions.
//!
//! The agent copy is available to the submitting agent and to reviewers; the
//! admin copy is marked as the office copy and is admin only. Signatures are
//! recorded on the receipt as present or missing rather than embedded.

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::info;

use super::students::load_student;
use crate::{
    AppState,
    api::models::{
        students::StudentStatus,
        users::{CurrentUser, full_name},
    },
    auth::permissions::require_admin,
    db::handlers::{Incentives, Repository, Signatures, Users},
    errors::{Error, Result},
    reports::receipt::{ReceiptData, render_receipt},
    types::{Resource, StudentId, UserId, abbrev_uuid},
};

async fn receipt(state: &AppState, current_user: &CurrentUser, student_id: StudentId, admin_copy: bool) -> Result<Response> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let student = load_student(&mut conn, current_user, student_id).await?;
    if student.status != StudentStatus::Approved {
        return Err(Error::BadRequest {
            message: "Receipt is only available for approved students".to_string(),
        });
    }

    let user_ids: Vec<_> = [Some(student.agent_id), student.coordinator_id, student.admin_id]
        .into_iter()
        .flatten()
        .collect();
    let users = Users::new(&mut conn).get_bulk(user_ids).await?;
    let name_of = |id: UserId| {
        users
            .get(&id)
            .map(|u| full_name(&u.first_name, &u.last_name, &u.username))
    };

    let incentive = Incentives::new(&mut conn).get_by_student(student.id).await?;
    let admin_signed = match student.admin_id {
        Some(admin_id) => Signatures::new(&mut conn).get(admin_id).await?.is_some(),
        None => false,
    };
    drop(conn);

    let data = ReceiptData {
        agent_name: name_of(student.agent_id).unwrap_or_default(),
        agent_code: users.get(&student.agent_id).and_then(|u| u.agent_code.clone()),
        student_name: student.full_name(),
        coordinator_name: student.coordinator_id.and_then(name_of),
        admin_name: student.admin_id.and_then(name_of),
        incentive_amount: incentive.as_ref().map(|i| i.amount).or(student.incentive_amount),
        incentive_status: incentive.as_ref().map(|i| i.status),
        coordinator_signed: student.signature_data.is_some(),
        admin_signed,
        admin_copy,
        generated_at: Utc::now(),
        token_number: student.token_number,
        email: student.email,
        phone: student.phone,
        course: student.course,
        submitted_at: student.created_at,
        coordinator_approved_at: student.coordinator_approved_at,
        admin_reviewed_at: student.admin_reviewed_at,
    };

    let file_name = data.file_name();
    let pdf = tokio::task::spawn_blocking(move || render_receipt(&data))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("receipt task: {e}"),
        })??;

    info!(file_name = %file_name, admin_copy, "Receipt generated");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
        ],
        Body::from(pdf),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/students/{student_id}/receipt",
    tag = "receipts",
    summary = "Download receipt",
    params(("student_id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Receipt PDF", content_type = "application/pdf"),
        (status = 400, description = "Student is not approved"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Student not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id)))]
pub async fn download_receipt(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
) -> Result<Response> {
    receipt(&state, &current_user, student_id, false).await
}

#[utoipa::path(
    get,
    path = "/admin/students/{student_id}/receipt",
    tag = "receipts",
    summary = "Download admin receipt",
    params(("student_id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Office copy PDF", content_type = "application/pdf"),
        (status = 400, description = "Student is not approved"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Student not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id)))]
pub async fn download_admin_receipt(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
) -> Result<Response> {
    require_admin(&current_user, Resource::Receipts)?;
    receipt(&state, &current_user, student_id, true).await
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_receipt_for_approved_student(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let student = create_test_student(&pool, agent.id, "BSc").await;
        let (agent_name, agent_value) = add_auth_headers(&agent);

        app.get(&format!("/api/students/{}/receipt", student.id))
            .add_header(agent_name.clone(), agent_value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        approve_test_student(&pool, student.id, Decimal::from(3000)).await;

        let response = app
            .get(&format!("/api/students/{}/receipt", student.id))
            .add_header(agent_name.clone(), agent_value.clone())
            .await;
        response.assert_status_ok();
        assert_eq!(response.header("content-type").to_str().unwrap(), "application/pdf");
        assert!(response.as_bytes().starts_with(b"%PDF"));
        let disposition = response.header("content-disposition");
        assert!(disposition.to_str().unwrap().contains(&format!("receipt_{}.pdf", student.token_number)));

        app.get(&format!("/api/admin/students/{}/receipt", student.id))
            .add_header(agent_name, agent_value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = add_auth_headers(&admin);
        let response = app
            .get(&format!("/api/admin/students/{}/receipt", student.id))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        let disposition = response.header("content-disposition");
        assert!(disposition.to_str().unwrap().ends_with("_admin.pdf\""));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_receipt_hidden_from_other_agents(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let owner = create_test_user(&pool, Role::Agent).await;
        let other = create_test_user(&pool, Role::Agent).await;
        let student = create_test_student(&pool, owner.id, "BSc").await;
        approve_test_student(&pool, student.id, Decimal::from(3000)).await;

        let (name, value) = add_auth_headers(&other);
        app.get(&format!("/api/students/{}/receipt", student.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
