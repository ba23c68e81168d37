use axum::{Json, extract::State};
use chrono::Utc;
use tracing::info;

use crate::{
    AppState,
    api::models::{
        backups::{BackupCreated, BackupList},
        users::CurrentUser,
    },
    auth::permissions::require_admin,
    backup,
    errors::{Error, Result},
    types::Resource,
};

/// Archive every table and uploaded document into `storage.backups_dir`
#[utoipa::path(
    post,
    path = "/admin/backup",
    tag = "backups",
    summary = "Create backup",
    responses(
        (status = 200, description = "Archive written", body = BackupCreated),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_backup(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<BackupCreated>> {
    require_admin(&current_user, Resource::Backups)?;

    let tables = backup::dump_tables(&state.db).await?;
    let backups_dir = state.config.storage.backups_dir.clone();
    let uploads_dir = state.config.storage.uploads_dir.clone();
    let info = tokio::task::spawn_blocking(move || backup::write_backup(&backups_dir, &uploads_dir, &tables, Utc::now()))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("backup task: {e}"),
        })??;

    info!(filename = %info.filename, size = info.size, "Backup created");
    Ok(Json(BackupCreated {
        message: "Backup created successfully".to_string(),
        backup: info,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/backups",
    tag = "backups",
    summary = "List backups",
    responses(
        (status = 200, description = "Archives, newest first", body = BackupList),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_backups(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<BackupList>> {
    require_admin(&current_user, Resource::Backups)?;

    let backups_dir = state.config.storage.backups_dir.clone();
    let backups = tokio::task::spawn_blocking(move || backup::list_backups(&backups_dir))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("backup listing task: {e}"),
        })??;

    Ok(Json(BackupList { backups }))
}

#[cfg(test)]
mod tests {
    use crate::api::models::backups::{BackupCreated, BackupList};
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sqlx::PgPool;
    use std::io::Read;

    #[sqlx::test]
    #[test_log::test]
    async fn test_backup_contains_tables(pool: PgPool) {
        let (app, dirs) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let agent = create_test_user(&pool, Role::Agent).await;
        create_test_student(&pool, agent.id, "BSc").await;
        let (name, value) = add_auth_headers(&admin);

        let empty: BackupList = app.get("/api/admin/backups").add_header(name.clone(), value.clone()).await.json();
        assert!(empty.backups.is_empty());

        let response = app.post("/api/admin/backup").add_header(name.clone(), value.clone()).await;
        response.assert_status_ok();
        let created: BackupCreated = response.json();
        assert!(created.backup.filename.starts_with("admission_system_backup_"));
        assert!(created.backup.size > 0);

        let listed: BackupList = app.get("/api/admin/backups").add_header(name, value).await.json();
        assert_eq!(listed.backups, vec![created.backup.clone()]);

        let file = std::fs::File::open(dirs.backups.path().join(&created.backup.filename)).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut students = String::new();
        archive
            .by_name("database/students.json")
            .unwrap()
            .read_to_string(&mut students)
            .unwrap();
        let rows: serde_json::Value = serde_json::from_str(&students).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 1);
        assert!(archive.by_name("backup_manifest.json").is_ok());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_backup_admin_only(pool: PgPool) {
        let (app, _dirs) = create_test_app(pool.clone()).await;
        let coordinator = create_test_user(&pool, Role::Coordinator).await;
        let (name, value) = add_auth_headers(&coordinator);

        app.post("/api/admin/backup")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
