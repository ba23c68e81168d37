use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::info;

use crate::{
    AppState,
    api::form::FormData,
    api::models::{
        pagination::PaginatedResponse,
        users::{CurrentUser, ListUsersQuery, RejectUserForm, UserResponse, UserReviewResponse, UserStatus},
    },
    auth::permissions::require_admin,
    db::handlers::{Repository, Users, users::UserFilter},
    errors::{Error, Result},
    types::{Resource, UserId, abbrev_uuid},
};

/// Registrations waiting for an admin decision
#[utoipa::path(
    get,
    path = "/admin/pending-users",
    tag = "users",
    summary = "List pending registrations",
    responses(
        (status = 200, description = "Pending users, newest first", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_pending_users(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<UserResponse>>> {
    require_admin(&current_user, Resource::Users)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let users = Users::new(&mut conn)
        .list(&UserFilter::new(0, i64::MAX).with_status(UserStatus::Pending))
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

fn pending_user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "Pending user".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    post,
    path = "/admin/pending-users/{user_id}/approve",
    tag = "users",
    summary = "Approve a registration",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User activated", body = UserReviewResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "No pending user with this ID"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&user_id)))]
pub async fn approve_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<UserReviewResponse>> {
    require_admin(&current_user, Resource::Users)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .review_registration(user_id, UserStatus::Active, current_user.id, None)
        .await?
        .ok_or_else(|| pending_user_not_found(user_id))?;

    info!(reviewed_by = %abbrev_uuid(&current_user.id), "Registration approved");
    Ok(Json(UserReviewResponse {
        message: format!("User {} approved successfully", user.username),
        user: user.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/admin/pending-users/{user_id}/reject",
    tag = "users",
    summary = "Reject a registration",
    request_body(content = RejectUserForm, content_type = "application/x-www-form-urlencoded"),
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User rejected", body = UserReviewResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "No pending user with this ID"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&user_id)))]
pub async fn reject_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
    FormData(form): FormData<RejectUserForm>,
) -> Result<Json<UserReviewResponse>> {
    require_admin(&current_user, Resource::Users)?;

    let reason = form.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .review_registration(user_id, UserStatus::Rejected, current_user.id, reason)
        .await?
        .ok_or_else(|| pending_user_not_found(user_id))?;

    info!(reviewed_by = %abbrev_uuid(&current_user.id), "Registration rejected");
    Ok(Json(UserReviewResponse {
        message: format!("User {} rejected successfully", user.username),
        user: user.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Paginated users", body = PaginatedResponse<UserResponse>),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    require_admin(&current_user, Resource::Users)?;

    let (skip, limit) = query.pagination.params();
    let mut filter = UserFilter::new(skip, limit);
    if let Some(role) = query.role {
        filter = filter.with_role(role);
    }
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(search) = query.search {
        filter = filter.with_search(search);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let users = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::{Role, UserResponse, UserReviewResponse, UserStatus};
    use crate::db::handlers::{Repository, Users};
    use crate::db::models::users::UserCreateDBRequest;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    async fn create_pending_user(pool: &PgPool, username: &str) -> UserResponse {
        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: None,
                last_name: None,
                role: Role::Coordinator,
                agent_code: None,
                status: UserStatus::Pending,
                password_hash: "unused".to_string(),
            })
            .await
            .unwrap();
        user.into()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pending_queue_and_reject(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let pending = create_pending_user(&pool, "waiting").await;
        let (name, value) = add_auth_headers(&admin);

        let response = app.get("/api/admin/pending-users").add_header(name.clone(), value.clone()).await;
        response.assert_status_ok();
        let queue: Vec<UserResponse> = response.json();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, pending.id);

        let response = app
            .post(&format!("/api/admin/pending-users/{}/reject", pending.id))
            .add_header(name.clone(), value.clone())
            .form(&json!({"reason": "Unknown applicant"}))
            .await;
        response.assert_status_ok();
        let reviewed: UserReviewResponse = response.json();
        assert!(reviewed.message.contains("rejected successfully"));
        assert_eq!(reviewed.user.status, UserStatus::Rejected);
        assert_eq!(reviewed.user.rejection_reason.as_deref(), Some("Unknown applicant"));

        // Already reviewed, and unknown IDs, are not in the queue
        app.post(&format!("/api/admin/pending-users/{}/approve", pending.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.post(&format!("/api/admin/pending-users/{}/approve", Uuid::new_v4()))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let queue: Vec<UserResponse> = app.get("/api/admin/pending-users").add_header(name, value).await.json();
        assert!(queue.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_endpoints_forbidden_for_others(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        for role in [Role::Agent, Role::Coordinator] {
            let user = create_test_user(&pool, role).await;
            let (name, value) = add_auth_headers(&user);
            let response = app.get("/api/admin/pending-users").add_header(name.clone(), value.clone()).await;
            response.assert_status(StatusCode::FORBIDDEN);
            let body: serde_json::Value = response.json();
            assert_eq!(body["detail"], "Admin access required");

            app.get("/api/admin/users").add_header(name, value).await.assert_status(StatusCode::FORBIDDEN);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_users_filters_by_role(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        for _ in 0..3 {
            create_test_user(&pool, Role::Agent).await;
        }
        create_test_user(&pool, Role::Coordinator).await;
        let (name, value) = add_auth_headers(&admin);

        let response = app
            .get("/api/admin/users?role=agent&limit=2")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let page: serde_json::Value = response.json();
        assert_eq!(page["total_count"], 3);
        assert_eq!(page["data"].as_array().unwrap().len(), 2);
        assert!(page["data"].as_array().unwrap().iter().all(|u| u["role"] == "agent"));

        let page: serde_json::Value = app.get("/api/admin/users").add_header(name, value).await.json();
        assert_eq!(page["total_count"], 5);
    }
}
