use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::collections::HashSet;
use tracing::info;

use crate::{
    AppState,
    api::models::{
        backups::ExportQuery,
        students::StudentStatus,
        users::{CurrentUser, full_name},
    },
    auth::permissions::require_admin,
    db::handlers::{Incentives, Repository, Students, Users, students::StudentFilter},
    errors::{Error, Result},
    leaderboard::parse_bound,
    reports::export::{self, ExportRow},
    types::Resource,
};

fn parse_status(value: Option<&str>) -> Result<Option<StudentStatus>> {
    match value.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => StudentStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == value)
            .map(Some)
            .ok_or_else(|| Error::BadRequest {
                message: format!("Invalid status '{value}'"),
            }),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Students matching the filters as an Excel workbook, with a per-agent summary sheet
#[utoipa::path(
    get,
    path = "/admin/export/excel",
    tag = "exports",
    summary = "Export students",
    params(ExportQuery),
    responses(
        (status = 200, description = "XLSX workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Invalid status or date"),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn export_students(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
    current_user: CurrentUser,
) -> Result<Response> {
    require_admin(&current_user, Resource::Exports)?;

    let filter = StudentFilter {
        status: parse_status(query.status.as_deref())?,
        course: non_empty(query.course),
        agent_id: query.agent_id,
        created_from: non_empty(query.start_date).map(|d| parse_bound(&d, false)).transpose()?,
        created_to: non_empty(query.end_date).map(|d| parse_bound(&d, true)).transpose()?,
        ..StudentFilter::all()
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let students = Students::new(&mut conn).list(&filter).await?;

    let ids: Vec<_> = students.iter().map(|s| s.id).collect();
    let agent_ids: Vec<_> = students.iter().map(|s| s.agent_id).collect::<HashSet<_>>().into_iter().collect();
    let agents = Users::new(&mut conn).get_bulk(agent_ids).await?;
    let incentives = Incentives::new(&mut conn).list_for_students(&ids).await?;
    drop(conn);

    let rows: Vec<ExportRow> = students
        .into_iter()
        .map(|student| {
            let agent = agents.get(&student.agent_id);
            let incentive = incentives.get(&student.id);
            ExportRow {
                student_name: student.full_name(),
                agent_username: agent.map(|a| a.username.clone()).unwrap_or_default(),
                agent_name: agent
                    .map(|a| full_name(&a.first_name, &a.last_name, &a.username))
                    .unwrap_or_default(),
                agent_code: agent.and_then(|a| a.agent_code.clone()),
                incentive_amount: incentive.map(|i| i.amount).or(student.incentive_amount),
                incentive_status: incentive.map(|i| i.status),
                token_number: student.token_number,
                email: student.email,
                phone: student.phone,
                course: student.course,
                status: student.status,
                created_at: student.created_at,
                coordinator_approved_at: student.coordinator_approved_at,
                admin_reviewed_at: student.admin_reviewed_at,
            }
        })
        .collect();

    let count = rows.len();
    let workbook = tokio::task::spawn_blocking(move || export::render_export(&rows))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("export task: {e}"),
        })??;

    info!(rows = count, "Students exported");
    Ok((
        [
            (header::CONTENT_TYPE, export::CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export::export_file_name(Utc::now())),
            ),
        ],
        Body::from(workbook),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::parse_status;
    use crate::api::models::students::StudentStatus;
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("all")).unwrap(), None);
        assert_eq!(parse_status(Some("coordinator_approved")).unwrap(), Some(StudentStatus::CoordinatorApproved));
        assert!(parse_status(Some("done")).is_err());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_export_workbook(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let student = create_test_student(&pool, agent.id, "BSc").await;
        approve_test_student(&pool, student.id, Decimal::from(3000)).await;
        create_test_student(&pool, agent.id, "BA").await;
        let (name, value) = add_auth_headers(&admin);

        let response = app
            .get("/api/admin/export/excel?status=approved&start_date=2020-01-01")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.header("content-type").to_str().unwrap(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        let disposition = response.header("content-disposition");
        assert!(disposition.to_str().unwrap().contains("students_export_"));
        // XLSX files are zip archives
        assert!(response.as_bytes().starts_with(b"PK"));

        app.get("/api/admin/export/excel?status=done")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        app.get("/api/admin/export/excel?start_date=01/02/2024")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = add_auth_headers(&agent);
        app.get("/api/admin/export/excel")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
