use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{dashboard::DashboardStats, users::CurrentUser},
    auth::permissions::require_admin,
    db::handlers::analytics,
    errors::Result,
    types::Resource,
};

#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "dashboard",
    summary = "Admission statistics",
    responses(
        (status = 200, description = "Counts by status and course with incentive totals", body = DashboardStats),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_dashboard(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<DashboardStats>> {
    require_admin(&current_user, Resource::Dashboard)?;
    Ok(Json(analytics::dashboard_stats(&state.db).await?))
}
