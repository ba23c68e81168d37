use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::info;

use crate::{
    AppState,
    api::form::FormData,
    api::models::{
        incentives::{IncentiveResponse, IncentiveStatusForm, IncentiveSummary, ListIncentivesQuery},
        users::CurrentUser,
    },
    auth::permissions::require_admin,
    db::{
        errors::DbError,
        handlers::{Incentives, Repository, incentives::IncentiveFilter},
        models::incentives::IncentiveUpdateDBRequest,
    },
    errors::{Error, Result},
    types::{IncentiveId, Resource, abbrev_uuid},
};

/// Incentives with paid and pending totals
///
/// Agents see their own; reviewers see every agent's.
#[utoipa::path(
    get,
    path = "/incentives",
    tag = "incentives",
    summary = "List incentives",
    responses(
        (status = 200, description = "Incentives and totals", body = IncentiveSummary),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_incentives(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<IncentiveSummary>> {
    let filter = if current_user.is_agent() {
        IncentiveFilter::for_agent(current_user.id)
    } else {
        IncentiveFilter::default()
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let incentives = Incentives::new(&mut conn).list(&filter).await?;

    Ok(Json(IncentiveSummary::new(
        incentives.into_iter().map(IncentiveResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/admin/incentives",
    tag = "incentives",
    summary = "List all incentives",
    params(ListIncentivesQuery),
    responses(
        (status = 200, description = "Filtered incentives", body = Vec<IncentiveResponse>),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_all_incentives(
    State(state): State<AppState>,
    Query(query): Query<ListIncentivesQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<IncentiveResponse>>> {
    require_admin(&current_user, Resource::Incentives)?;

    let filter = IncentiveFilter {
        agent_id: query.agent_id,
        status: query.status,
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let incentives = Incentives::new(&mut conn).list(&filter).await?;

    Ok(Json(incentives.into_iter().map(IncentiveResponse::from).collect()))
}

#[utoipa::path(
    put,
    path = "/admin/incentives/{incentive_id}/status",
    tag = "incentives",
    summary = "Mark paid or unpaid",
    request_body(content = IncentiveStatusForm, content_type = "multipart/form-data"),
    params(("incentive_id" = String, Path, description = "Incentive ID")),
    responses(
        (status = 200, description = "Incentive updated", body = IncentiveResponse),
        (status = 400, description = "Invalid status"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Incentive not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(incentive_id = %abbrev_uuid(&incentive_id)))]
pub async fn update_incentive_status(
    State(state): State<AppState>,
    Path(incentive_id): Path<IncentiveId>,
    current_user: CurrentUser,
    FormData(form): FormData<IncentiveStatusForm>,
) -> Result<Json<IncentiveResponse>> {
    require_admin(&current_user, Resource::Incentives)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let incentive = match Incentives::new(&mut conn)
        .update(incentive_id, &IncentiveUpdateDBRequest { status: form.status })
        .await
    {
        Ok(incentive) => incentive,
        Err(DbError::NotFound) => {
            return Err(Error::NotFound {
                resource: "Incentive".to_string(),
                id: incentive_id.to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    info!(status = ?incentive.status, "Incentive status updated");
    Ok(Json(incentive.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::models::incentives::{IncentiveResponse, IncentiveStatus, IncentiveSummary};
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[sqlx::test]
    #[test_log::test]
    async fn test_agent_totals_follow_payment(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        let other = create_test_user(&pool, Role::Agent).await;
        let admin = create_test_user(&pool, Role::Admin).await;

        let first = create_test_student(&pool, agent.id, "BSc").await;
        let second = create_test_student(&pool, agent.id, "BCA").await;
        let foreign = create_test_student(&pool, other.id, "BA").await;
        approve_test_student(&pool, first.id, Decimal::from(3000)).await;
        approve_test_student(&pool, second.id, Decimal::from(4000)).await;
        approve_test_student(&pool, foreign.id, Decimal::from(2500)).await;

        let (agent_name, agent_value) = add_auth_headers(&agent);
        let summary: IncentiveSummary = app
            .get("/api/incentives")
            .add_header(agent_name.clone(), agent_value.clone())
            .await
            .json();
        assert_eq!(summary.incentives.len(), 2);
        assert_eq!(summary.total_pending, Decimal::from(7000));
        assert_eq!(summary.total_earned, Decimal::ZERO);

        let (admin_name, admin_value) = add_auth_headers(&admin);
        let all: Vec<IncentiveResponse> = app
            .get("/api/admin/incentives")
            .add_header(admin_name.clone(), admin_value.clone())
            .await
            .json();
        assert_eq!(all.len(), 3);

        let first_incentive = all.iter().find(|i| i.student_id == first.id).unwrap();
        let response = app
            .put(&format!("/api/admin/incentives/{}/status", first_incentive.id))
            .add_header(admin_name.clone(), admin_value.clone())
            .form(&json!({"status": "paid"}))
            .await;
        response.assert_status_ok();
        let paid: IncentiveResponse = response.json();
        assert_eq!(paid.status, IncentiveStatus::Paid);
        assert!(paid.paid_at.is_some());

        let summary: IncentiveSummary = app.get("/api/incentives").add_header(agent_name, agent_value).await.json();
        assert_eq!(summary.total_earned, Decimal::from(3000));
        assert_eq!(summary.total_pending, Decimal::from(4000));

        let unpaid: Vec<IncentiveResponse> = app
            .get(&format!("/api/admin/incentives?status=unpaid&agent_id={}", agent.id))
            .add_header(admin_name, admin_value)
            .await
            .json();
        assert_eq!(unpaid.len(), 1);
        assert_eq!(unpaid[0].student_id, second.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_status_errors(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;

        let (name, value) = add_auth_headers(&admin);
        app.put(&format!("/api/admin/incentives/{}/status", Uuid::new_v4()))
            .add_header(name.clone(), value.clone())
            .form(&json!({"status": "paid"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.put(&format!("/api/admin/incentives/{}/status", Uuid::new_v4()))
            .add_header(name, value)
            .form(&json!({"status": "refunded"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = add_auth_headers(&coordinator);
        app.get("/api/admin/incentives")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
