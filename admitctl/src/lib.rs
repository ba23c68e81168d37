//! # admitctl: admission tracking for agent-referred students
//!
//! `admitctl` is an HTTP service that records student applications submitted by
//! recruiting agents, walks each application through a coordinator and admin review, and
//! pays agents a per-course incentive once an admission is approved.
//!
//! ## Overview
//!
//! Four roles use the service. **Agents** register themselves, wait for an admin to
//! approve the registration, and then submit students with their supporting documents.
//! **Coordinators** review pending students and sign off on them. **Admins** give the
//! final approval, manage course incentive rules, pay incentives, and take backups and
//! exports. Every authenticated user can see the agent leaderboards.
//!
//! The review flow depends on `workflow.approval_mode`. In `three_tier` mode a student
//! goes `pending -> coordinator_approved -> approved`; in `two_tier` mode a single review
//! moves it straight to `approved`. Either reviewer can reject at their stage. Approval
//! records one incentive for the submitting agent, priced from the course rule that was
//! active when the student was created.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum) and all state lives in
//! PostgreSQL, accessed through `sqlx`. Uploaded documents are written to a local
//! directory behind the [`db::handlers::file_storage::DocumentStorage`] trait.
//!
//! - The **API layer** ([`api`]) holds request handlers and the JSON/form models. Every
//!   route is mounted under `/api` and documented by [`openapi::ApiDoc`], which is served
//!   at `/api/openapi.json` and rendered at `/api/docs`.
//! - The **authentication layer** ([`auth`]) issues and verifies bearer JWTs, hashes
//!   passwords with Argon2, and holds the role checks used by handlers.
//! - The **database layer** ([`db`]) uses one repository per table (users, course rules,
//!   students, documents, incentives, signatures) plus read-only analytics queries.
//! - [`workflow`] decides which review transitions are legal, [`leaderboard`] ranks
//!   agents over time windows, [`reports`] renders PDF receipts and XLSX exports, and
//!   [`backup`] writes zip archives of the database and uploaded files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use admitctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = admitctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     admitctl::telemetry::init_telemetry(config.log_format)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run on startup. On first start the configured `seed_courses` are inserted
//! and, when `admin.password` is set, the bootstrap admin account is created or promoted.
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/admitctl").await?;
//! admitctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod backup;
pub mod config;
pub mod db;
pub mod errors;
pub mod leaderboard;
pub mod openapi;
pub mod reports;
pub mod telemetry;
pub mod types;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, post, put},
};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
use config::{AdminConfig, CorsOrigin, SeedCourse};

use crate::{
    api::models::users::{Role, UserStatus},
    auth::password,
    db::{
        handlers::{CourseRules, Repository, Users, file_storage::DocumentStorage, file_storage::LocalFileStorage},
        models::{courses::CourseRuleCreateDBRequest, users::UserCreateDBRequest},
    },
    openapi::ApiDoc,
};
use types::UserId;

/// Multipart framing on top of the file itself
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

/// Shared state handed to every handler
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub storage: Arc<dyn DocumentStorage>,
}

/// Get the admitctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the bootstrap admin account from `admin` configuration.
///
/// Does nothing when no password is configured. If a user with the configured
/// username already exists it is promoted to an active admin and its password reset,
/// so restarting with a new password recovers access.
///
/// Returns the admin's ID, or `None` when bootstrap was skipped.
#[instrument(skip_all, fields(username = %admin.username))]
pub async fn create_initial_admin_user(admin: &AdminConfig, db: &PgPool) -> anyhow::Result<Option<UserId>> {
    let Some(password) = admin.password.as_deref().filter(|p| !p.is_empty()) else {
        debug!("No admin password configured, skipping admin bootstrap");
        return Ok(None);
    };
    let password_hash = password::hash_string(password).map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;

    let mut tx = db.begin().await?;
    let mut users = Users::new(&mut tx);

    let id = match users.get_user_by_username(&admin.username).await? {
        Some(existing) => {
            users.activate_admin(existing.id, &password_hash).await?;
            info!("Existing admin account refreshed");
            existing.id
        }
        None => {
            let created = users
                .create(&UserCreateDBRequest {
                    username: admin.username.clone(),
                    email: admin.email.clone(),
                    first_name: Some("System".to_string()),
                    last_name: Some("Administrator".to_string()),
                    role: Role::Admin,
                    agent_code: None,
                    status: UserStatus::Active,
                    password_hash,
                })
                .await?;
            info!("Admin account created");
            created.id
        }
    };

    tx.commit().await?;
    Ok(Some(id))
}

/// Insert the configured incentive rules the first time the database is set up
#[instrument(skip_all, fields(count = courses.len()))]
pub async fn seed_courses(courses: &[SeedCourse], db: &PgPool) -> anyhow::Result<()> {
    let rules: Vec<_> = courses
        .iter()
        .map(|c| CourseRuleCreateDBRequest {
            course: c.course.clone(),
            amount: c.amount,
        })
        .collect();

    let mut tx = db.begin().await?;
    let seeded = CourseRules::new(&mut tx).seed_once(&rules).await?;
    tx.commit().await?;

    if seeded {
        info!("Seeded course incentive rules");
    } else {
        debug!("Course rules already seeded, skipping");
    }
    Ok(())
}

/// Connect, run migrations, and bootstrap data. An existing pool (tests) is reused.
async fn setup_database(config: &Config, pool: Option<PgPool>) -> anyhow::Result<PgPool> {
    let pool = match pool {
        Some(pool) => pool,
        None => {
            let settings = &config.database.pool;
            PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .min_connections(settings.min_connections)
                .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
                .idle_timeout((settings.idle_timeout_secs > 0).then(|| Duration::from_secs(settings.idle_timeout_secs)))
                .max_lifetime((settings.max_lifetime_secs > 0).then(|| Duration::from_secs(settings.max_lifetime_secs)))
                .connect(&config.database.url)
                .await?
        }
    };

    migrator().run(&pool).await?;

    create_initial_admin_user(&config.admin, &pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;
    seed_courses(&config.seed_courses, &pool).await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;
    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PUT, http::Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers([http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: every `/api` route, the OpenAPI document and Scalar UI,
/// `/healthz`, and the CORS, tracing and body-limit layers.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{
        auth, backups, courses, dashboard, documents, exports, incentives, leaderboard, receipts, reviews, signatures, students, users,
    };

    let api_routes = Router::new()
        // Authentication
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::get_current_user))
        // Registration review
        .route("/admin/pending-users", get(users::list_pending_users))
        .route("/admin/pending-users/{user_id}/approve", post(users::approve_user))
        .route("/admin/pending-users/{user_id}/reject", post(users::reject_user))
        .route("/admin/users", get(users::list_users))
        // Students and their documents
        .route("/students", post(students::create_student).get(students::list_students))
        .route("/students/paginated", get(students::list_students_paginated))
        .route("/students/filter-options", get(students::get_filter_options))
        .route("/students/{student_id}", get(students::get_student))
        .route("/students/{student_id}/upload", post(documents::upload_document))
        .route("/students/{student_id}/documents", get(documents::list_documents))
        .route(
            "/students/{student_id}/documents/{document_type}/download",
            get(documents::download_document),
        )
        .route("/students/{student_id}/receipt", get(receipts::download_receipt))
        // Reviews
        .route("/students/{student_id}/status", put(reviews::update_student_status))
        .route("/admin/approve-student/{student_id}", put(reviews::admin_approve_student))
        .route("/admin/reject-student/{student_id}", put(reviews::admin_reject_student))
        .route("/admin/pending-approvals", get(reviews::list_pending_approvals))
        .route("/admin/students/{student_id}/receipt", get(receipts::download_admin_receipt))
        // Course incentive rules
        .route("/admin/courses", get(courses::list_course_rules).post(courses::create_course_rule))
        .route(
            "/admin/courses/{rule_id}",
            put(courses::update_course_rule).delete(courses::delete_course_rule),
        )
        .route("/incentive-rules", get(courses::list_incentive_rules))
        // Incentives
        .route("/incentives", get(incentives::list_incentives))
        .route("/admin/incentives", get(incentives::list_all_incentives))
        .route("/admin/incentives/{incentive_id}/status", put(incentives::update_incentive_status))
        // Leaderboards
        .route("/leaderboard/overall", get(leaderboard::overall_leaderboard))
        .route("/leaderboard/weekly", get(leaderboard::weekly_leaderboard))
        .route("/leaderboard/monthly", get(leaderboard::monthly_leaderboard))
        .route("/leaderboard/date-range", get(leaderboard::date_range_leaderboard))
        // Administration
        .route("/admin/dashboard", get(dashboard::get_dashboard))
        .route("/admin/signature", get(signatures::get_signature).post(signatures::save_signature))
        .route("/admin/backup", post(backups::create_backup))
        .route("/admin/backups", get(backups::list_backups))
        .route("/admin/export/excel", get(exports::export_students))
        .route("/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(state.config.storage.max_upload_size + UPLOAD_BODY_SLACK))
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// A configured server: database pool, document storage and router.
///
/// 1. [`Application::new`] connects to the database, runs migrations, bootstraps the
///    admin account and course rules, and builds the router
/// 2. [`Application::serve`] binds the configured address and handles requests until the
///    shutdown future resolves, then closes the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// As [`Application::new`], reusing `pool` when one is given
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting admitctl with configuration: {:#?}", config);

        let pool = setup_database(&config, pool).await?;

        std::fs::create_dir_all(&config.storage.uploads_dir)?;
        std::fs::create_dir_all(&config.storage.backups_dir)?;
        let storage: Arc<dyn DocumentStorage> = Arc::new(LocalFileStorage::new(config.storage.uploads_dir.clone()));

        let state = AppState::builder().db(pool.clone()).config(config.clone()).storage(storage).build();
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> anyhow::Result<axum_test::TestServer> {
        axum_test::TestServer::new(self.router.into_make_service())
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "admitctl listening on http://{}, API docs at http://localhost:{}/api/docs",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
