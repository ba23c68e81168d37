//! Test utilities for integration testing (available with `test-utils` feature).

use std::sync::Arc;

use axum_test::TestServer;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tempfile::TempDir;
use uuid::Uuid;

use crate::{
    AppState, Application,
    api::models::{
        students::StudentStatus,
        users::{CurrentUser, Role, UserStatus},
    },
    auth::{password, session},
    config::{AdminConfig, Config, DatabaseConfig, PoolSettings},
    db::{
        handlers::{CourseRules, Incentives, Repository, Students, Users, file_storage::LocalFileStorage},
        models::{
            incentives::IncentiveCreateDBRequest,
            students::{StudentCreateDBRequest, StudentDBResponse, token_number},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    types::{StudentId, UserId},
};

/// Password of every user made by [`create_test_user`]
pub const TEST_PASSWORD: &str = "test-password-123";

/// Upload and backup directories, removed when dropped
pub struct TestDirs {
    pub uploads: TempDir,
    pub backups: TempDir,
}

impl TestDirs {
    fn new() -> Self {
        Self {
            uploads: TempDir::new().expect("Failed to create uploads dir"),
            backups: TempDir::new().expect("Failed to create backups dir"),
        }
    }

    fn apply(&self, config: &mut Config) {
        config.storage.uploads_dir = self.uploads.path().to_path_buf();
        config.storage.backups_dir = self.backups.path().to_path_buf();
    }
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            pool: PoolSettings {
                max_connections: 4,
                min_connections: 0,
                ..Default::default()
            },
            // sqlx::test hands the pool in directly
            url: "unused".to_string(),
        },
        admin: AdminConfig {
            password: None,
            ..Default::default()
        },
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    }
}

/// State for exercising extractors and handlers without a router
pub fn create_test_state(pool: PgPool, mut config: Config) -> (AppState, TestDirs) {
    let dirs = TestDirs::new();
    dirs.apply(&mut config);
    let storage = Arc::new(LocalFileStorage::new(config.storage.uploads_dir.clone()));
    let state = AppState::builder().db(pool).config(config).storage(storage).build();
    (state, dirs)
}

pub async fn create_test_app(pool: PgPool) -> (TestServer, TestDirs) {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, mut config: Config) -> (TestServer, TestDirs) {
    let dirs = TestDirs::new();
    dirs.apply(&mut config);

    let app = Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");
    let server = app.into_test_server().expect("Failed to create test server");
    (server, dirs)
}

/// An active user with a unique username, signed in with [`TEST_PASSWORD`]
pub async fn create_test_user(pool: &PgPool, role: Role) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let suffix = Uuid::new_v4().simple().to_string();
    let username = format!("test{}_{}", role.as_str(), &suffix[..12]);

    let request = UserCreateDBRequest {
        email: format!("{username}@example.com"),
        first_name: Some("Test".to_string()),
        last_name: Some(role.as_str().to_string()),
        role,
        agent_code: (role == Role::Agent).then(|| format!("AGT{}", suffix[..6].to_uppercase())),
        status: UserStatus::Active,
        password_hash: password::hash_string_with_params(TEST_PASSWORD, Some(password::Argon2Params::FAST))
            .expect("Failed to hash test password"),
        username,
    };

    Users::new(&mut conn).create(&request).await.expect("Failed to create test user")
}

/// A pending student for `agent_id`, priced from the active rule for `course`
pub async fn create_test_student(pool: &PgPool, agent_id: UserId, course: &str) -> StudentDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let rule = CourseRules::new(&mut conn)
        .get_active_by_course(course)
        .await
        .expect("Failed to look up course rule");

    let id = Uuid::new_v4();
    let request = StudentCreateDBRequest {
        token_number: token_number(chrono::Utc::now(), id),
        agent_id,
        first_name: "Student".to_string(),
        last_name: id.simple().to_string()[..8].to_string(),
        email: format!("student_{}@example.com", id.simple()),
        phone: "9876543210".to_string(),
        course: course.to_string(),
        incentive_amount: rule.map(|r| r.amount),
    };

    Students::new(&mut conn).create(&request).await.expect("Failed to create test student")
}

/// Mark a student approved now and record its incentive, skipping the review flow
pub async fn approve_test_student(pool: &PgPool, student_id: StudentId, amount: Decimal) {
    let mut tx = pool.begin().await.expect("Failed to begin transaction");

    sqlx::query("UPDATE students SET status = $2, admin_reviewed_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(student_id)
        .bind(StudentStatus::Approved)
        .execute(&mut *tx)
        .await
        .expect("Failed to approve test student");

    let student = Students::new(&mut tx)
        .get_by_id(student_id)
        .await
        .expect("Failed to load test student")
        .expect("Test student not found");

    Incentives::new(&mut tx)
        .create(&IncentiveCreateDBRequest {
            agent_id: student.agent_id,
            student_id,
            course: student.course,
            amount,
        })
        .await
        .expect("Failed to create test incentive");

    tx.commit().await.expect("Failed to commit");
}

/// `Authorization` header carrying a session token for `user`
pub fn add_auth_headers(user: &UserDBResponse) -> (String, String) {
    let token = session::create_session_token(&CurrentUser::from(user.clone()), &create_test_config())
        .expect("Failed to create session token");
    ("authorization".to_string(), format!("Bearer {token}"))
}
