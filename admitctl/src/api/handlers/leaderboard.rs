use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        leaderboard::{DateRangeQuery, LeaderboardKind, LeaderboardResponse},
        users::CurrentUser,
    },
    db::handlers::analytics,
    errors::Result,
    leaderboard::{Window, rank},
};

async fn leaderboard(state: &AppState, kind: LeaderboardKind, window: Option<Window>) -> Result<Json<LeaderboardResponse>> {
    let tallies = analytics::agent_tallies(&state.db, window).await?;
    Ok(Json(rank(tallies, kind, window)))
}

/// All-time ranking of agents by approved admissions
#[utoipa::path(
    get,
    path = "/leaderboard/overall",
    tag = "leaderboard",
    summary = "Overall leaderboard",
    responses(
        (status = 200, description = "Agents ranked on all approved admissions", body = LeaderboardResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn overall_leaderboard(State(state): State<AppState>, _current_user: CurrentUser) -> Result<Json<LeaderboardResponse>> {
    leaderboard(&state, LeaderboardKind::Overall, None).await
}

/// Ranking for the current week, starting Monday 00:00 UTC
#[utoipa::path(
    get,
    path = "/leaderboard/weekly",
    tag = "leaderboard",
    summary = "Weekly leaderboard",
    responses(
        (status = 200, description = "Agents ranked on this week's approvals", body = LeaderboardResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn weekly_leaderboard(State(state): State<AppState>, _current_user: CurrentUser) -> Result<Json<LeaderboardResponse>> {
    leaderboard(&state, LeaderboardKind::Weekly, Some(Window::weekly(Utc::now()))).await
}

#[utoipa::path(
    get,
    path = "/leaderboard/monthly",
    tag = "leaderboard",
    summary = "Monthly leaderboard",
    responses(
        (status = 200, description = "Agents ranked on this calendar month's approvals", body = LeaderboardResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn monthly_leaderboard(State(state): State<AppState>, _current_user: CurrentUser) -> Result<Json<LeaderboardResponse>> {
    leaderboard(&state, LeaderboardKind::Monthly, Some(Window::monthly(Utc::now()))).await
}

#[utoipa::path(
    get,
    path = "/leaderboard/date-range",
    tag = "leaderboard",
    summary = "Custom range leaderboard",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Agents ranked on approvals inside the range", body = LeaderboardResponse),
        (status = 400, description = "Unparseable dates or start not before end"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(start = %query.start_date, end = %query.end_date))]
pub async fn date_range_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
    _current_user: CurrentUser,
) -> Result<Json<LeaderboardResponse>> {
    let window = Window::parse_range(&query.start_date, &query.end_date)?;
    leaderboard(&state, LeaderboardKind::DateRange, Some(window)).await
}
