//! OpenAPI document for the `/api` surface, served at `/api/openapi.json` and
//! rendered with Scalar at `/api/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{handlers, models};
use crate::errors::ErrorBody;

/// Bearer JWT issued by `/api/login`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Token returned by `POST /api/login`. Send it on every request:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "admitctl", description = "Student admission tracking: submissions, multi-tier approval, agent incentives and leaderboards."),
    servers((url = "/api", description = "Admission API")),
    modifiers(&SecurityAddon),
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::get_current_user,
        handlers::users::list_pending_users,
        handlers::users::approve_user,
        handlers::users::reject_user,
        handlers::users::list_users,
        handlers::students::create_student,
        handlers::students::list_students,
        handlers::students::list_students_paginated,
        handlers::students::get_filter_options,
        handlers::students::get_student,
        handlers::documents::upload_document,
        handlers::documents::list_documents,
        handlers::documents::download_document,
        handlers::reviews::update_student_status,
        handlers::reviews::admin_approve_student,
        handlers::reviews::admin_reject_student,
        handlers::reviews::list_pending_approvals,
        handlers::courses::list_course_rules,
        handlers::courses::create_course_rule,
        handlers::courses::update_course_rule,
        handlers::courses::delete_course_rule,
        handlers::courses::list_incentive_rules,
        handlers::incentives::list_incentives,
        handlers::incentives::list_all_incentives,
        handlers::incentives::update_incentive_status,
        handlers::leaderboard::overall_leaderboard,
        handlers::leaderboard::weekly_leaderboard,
        handlers::leaderboard::monthly_leaderboard,
        handlers::leaderboard::date_range_leaderboard,
        handlers::dashboard::get_dashboard,
        handlers::signatures::get_signature,
        handlers::signatures::save_signature,
        handlers::receipts::download_receipt,
        handlers::receipts::download_admin_receipt,
        handlers::exports::export_students,
        handlers::backups::create_backup,
        handlers::backups::list_backups,
    ),
    components(
        schemas(
            ErrorBody,
            models::auth::RegisterRequest,
            models::auth::RegisterResponse,
            models::auth::LoginRequest,
            models::auth::TokenResponse,
            models::auth::MessageResponse,
            models::users::Role,
            models::users::UserStatus,
            models::users::UserResponse,
            models::users::RejectUserForm,
            models::users::UserReviewResponse,
            models::students::StudentStatus,
            models::students::SignatureType,
            models::students::StudentCreate,
            models::students::StudentResponse,
            models::students::StatusUpdateForm,
            models::students::ReviewNotesForm,
            models::students::ReviewResponse,
            models::students::AgentOption,
            models::students::FilterOptions,
            models::documents::DocumentUpload,
            models::documents::DocumentResponse,
            models::documents::UploadResponse,
            models::courses::CourseRuleCreate,
            models::courses::CourseRuleUpdate,
            models::courses::CourseRuleResponse,
            models::courses::CourseRuleDeleted,
            models::incentives::IncentiveStatus,
            models::incentives::IncentiveResponse,
            models::incentives::IncentiveSummary,
            models::incentives::IncentiveStatusForm,
            models::leaderboard::LeaderboardKind,
            models::leaderboard::LeaderboardEntry,
            models::leaderboard::LeaderboardPeriod,
            models::leaderboard::LeaderboardSummary,
            models::leaderboard::LeaderboardResponse,
            models::dashboard::StatusBreakdown,
            models::dashboard::CourseBreakdown,
            models::dashboard::DashboardStats,
            models::signatures::SignatureForm,
            models::signatures::SignatureResponse,
            models::signatures::SignatureSaved,
            models::backups::BackupInfo,
            models::backups::BackupCreated,
            models::backups::BackupList,
        )
    ),
    tags(
        (name = "authentication", description = "Registration and sign-in"),
        (name = "users", description = "Registration review and user administration"),
        (name = "students", description = "Student applications"),
        (name = "documents", description = "Application documents"),
        (name = "reviews", description = "Coordinator and admin decisions"),
        (name = "courses", description = "Course incentive rules"),
        (name = "incentives", description = "Agent incentives"),
        (name = "leaderboard", description = "Agent rankings"),
        (name = "dashboard", description = "Admin statistics"),
        (name = "signatures", description = "Saved reviewer signatures"),
        (name = "receipts", description = "Admission receipts"),
        (name = "exports", description = "Spreadsheet exports"),
        (name = "backups", description = "Database and document backups"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes_and_security() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/students/{student_id}/status"));
        assert!(doc.paths.paths.contains_key("/admin/export/excel"));
        assert!(doc.paths.paths.contains_key("/leaderboard/date-range"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("BearerAuth"));
        assert!(components.schemas.contains_key("StudentResponse"));
    }
}
