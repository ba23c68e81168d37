//! Zip backups of the database and uploaded documents.
//!
//! Layout of an archive:
//!
//! ```text
//! backup_manifest.json
//! database/<table>.json     one JSON array per table
//! uploads/<storage key>     every stored document
//! ```

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::api::models::backups::BackupInfo;

const FILE_PREFIX: &str = "admission_system_backup_";
const MANIFEST_ENTRY: &str = "backup_manifest.json";
pub const BACKUP_FORMAT: &str = "admitctl-backup-v1";

/// Tables included in a backup, in dependency order
pub const TABLES: &[&str] = &[
    "users",
    "course_rules",
    "system_config",
    "students",
    "student_documents",
    "incentives",
    "signatures",
];

/// One table's rows as JSON
#[derive(Debug, Clone)]
pub struct TableDump {
    pub name: &'static str,
    pub rows: serde_json::Value,
}

/// Read every backed-up table as a JSON array, all from one snapshot
#[instrument(skip(db), err)]
pub async fn dump_tables(db: &PgPool) -> anyhow::Result<Vec<TableDump>> {
    let mut tx = db.begin().await.context("failed to begin backup transaction")?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await
        .context("failed to set backup isolation level")?;

    let mut dumps = Vec::with_capacity(TABLES.len());
    for &name in TABLES {
        // Table names come from the fixed list above
        let query = format!("SELECT COALESCE(json_agg(row_to_json(t)), '[]'::json) FROM {name} t");
        let rows: serde_json::Value = sqlx::query_scalar(&query)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("failed to dump table {name}"))?;
        dumps.push(TableDump { name, rows });
    }

    tx.commit().await.context("failed to end backup transaction")?;
    Ok(dumps)
}

pub fn backup_file_name(now: DateTime<Utc>) -> String {
    format!("{FILE_PREFIX}{}.zip", now.format("%Y%m%d_%H%M%S"))
}

/// Write a new archive into `backups_dir`. Blocking.
pub fn write_backup(backups_dir: &Path, uploads_dir: &Path, tables: &[TableDump], now: DateTime<Utc>) -> anyhow::Result<BackupInfo> {
    std::fs::create_dir_all(backups_dir)
        .with_context(|| format!("failed to create directory {}", backups_dir.to_string_lossy()))?;

    let filename = unique_name(backups_dir, now);
    let final_path = backups_dir.join(&filename);
    let uploads = collect_files(uploads_dir)?;

    write_atomically(&final_path, |out_file| {
        let mut zip = ZipWriter::new(out_file);
        let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let manifest = json!({
            "format": BACKUP_FORMAT,
            "app_version": env!("CARGO_PKG_VERSION"),
            "created_at": now.to_rfc3339(),
            "tables": tables.iter().map(|t| json!({
                "name": t.name,
                "rows": t.rows.as_array().map(Vec::len).unwrap_or(0),
            })).collect::<Vec<_>>(),
            "upload_count": uploads.len(),
        });
        zip.start_file(MANIFEST_ENTRY, opts).context("failed to start manifest entry")?;
        zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())
            .context("failed to write manifest entry")?;

        for table in tables {
            zip.start_file(format!("database/{}.json", table.name), opts)
                .with_context(|| format!("failed to start entry for table {}", table.name))?;
            zip.write_all(serde_json::to_string_pretty(&table.rows)?.as_bytes())
                .with_context(|| format!("failed to write entry for table {}", table.name))?;
        }

        for (relative, absolute) in &uploads {
            zip.start_file(format!("uploads/{relative}"), opts)
                .with_context(|| format!("failed to start entry for {relative}"))?;
            let mut source = File::open(absolute).with_context(|| format!("failed to open {}", absolute.to_string_lossy()))?;
            std::io::copy(&mut source, &mut zip).with_context(|| format!("failed to write entry for {relative}"))?;
        }

        zip.finish().context("failed to finalize zip archive")?;
        Ok(())
    })?;

    let size = std::fs::metadata(&final_path)?.len();
    info!(filename = %filename, size, uploads = uploads.len(), "Backup written");

    Ok(BackupInfo {
        filename,
        size,
        created_at: now,
    })
}

/// Write `path` through a `.partial` sibling that is renamed into place on success
/// and removed on failure, so a listed backup is always complete.
fn write_atomically(path: &Path, write: impl FnOnce(File) -> anyhow::Result<()>) -> anyhow::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial_path = PathBuf::from(partial);

    let result = File::create(&partial_path)
        .with_context(|| format!("failed to create output file {}", partial_path.to_string_lossy()))
        .and_then(write)
        .and_then(|()| std::fs::rename(&partial_path, path).context("failed to move backup into place"));

    if result.is_err()
        && let Err(e) = std::fs::remove_file(&partial_path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %partial_path.to_string_lossy(), error = %e, "Failed to remove partial backup");
    }
    result
}

/// Backups in `backups_dir`, newest first. A missing directory has no backups.
pub fn list_backups(backups_dir: &Path) -> anyhow::Result<Vec<BackupInfo>> {
    let entries = match std::fs::read_dir(backups_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", backups_dir.to_string_lossy())),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !filename.starts_with(FILE_PREFIX) || !filename.ends_with(".zip") {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let created_at = metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
        backups.push(BackupInfo {
            filename,
            size: metadata.len(),
            created_at,
        });
    }

    // Names embed the timestamp, so they break ties between equal mtimes
    backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.filename.cmp(&a.filename)));
    Ok(backups)
}

fn unique_name(dir: &Path, now: DateTime<Utc>) -> String {
    let base = backup_file_name(now);
    if !dir.join(&base).exists() {
        return base;
    }
    let stem = base.trim_end_matches(".zip").to_string();
    (1..)
        .map(|n| format!("{stem}_{n}.zip"))
        .find(|name| !dir.join(name).exists())
        .unwrap_or(base)
}

/// Every regular file under `root` as (slash-separated relative path, absolute path)
fn collect_files(root: &Path) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return Ok(files);
    }
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.to_string_lossy()))? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                let relative = path
                    .strip_prefix(root)
                    .context("upload outside uploads directory")?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((relative, path));
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_backup_file_name() {
        assert_eq!(
            backup_file_name(at("2025-03-09T07:05:03Z")),
            "admission_system_backup_20250309_070503.zip"
        );
    }

    #[test]
    fn test_write_backup_contents() {
        let uploads = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let student_dir = uploads.path().join("student-1");
        std::fs::create_dir_all(&student_dir).unwrap();
        std::fs::write(student_dir.join("transcript_a.pdf"), b"%PDF-1.4").unwrap();

        let tables = vec![TableDump {
            name: "users",
            rows: json!([{"username": "admin"}]),
        }];
        let info = write_backup(backups.path(), uploads.path(), &tables, Utc::now()).unwrap();
        assert!(info.size > 0);

        let mut archive = ZipArchive::new(File::open(backups.path().join(&info.filename)).unwrap()).unwrap();
        let mut manifest = String::new();
        archive.by_name(MANIFEST_ENTRY).unwrap().read_to_string(&mut manifest).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(manifest["format"], BACKUP_FORMAT);
        assert_eq!(manifest["upload_count"], 1);
        assert_eq!(manifest["tables"][0]["rows"], 1);

        let mut users = String::new();
        archive.by_name("database/users.json").unwrap().read_to_string(&mut users).unwrap();
        assert!(users.contains("admin"));

        let mut document = Vec::new();
        archive
            .by_name("uploads/student-1/transcript_a.pdf")
            .unwrap()
            .read_to_end(&mut document)
            .unwrap();
        assert_eq!(document, b"%PDF-1.4");

        // No partial files left behind
        let names: Vec<String> = std::fs::read_dir(backups.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![info.filename.clone()]);
    }

    #[test]
    fn test_same_second_backups_do_not_collide() {
        let uploads = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let now = at("2025-03-09T07:05:03Z");

        let first = write_backup(backups.path(), uploads.path(), &[], now).unwrap();
        let second = write_backup(backups.path(), uploads.path(), &[], now).unwrap();
        assert_ne!(first.filename, second.filename);
        assert_eq!(second.filename, "admission_system_backup_20250309_070503_1.zip");

        std::fs::write(backups.path().join("notes.txt"), b"ignored").unwrap();
        let listed = list_backups(backups.path()).unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let backups = tempfile::tempdir().unwrap();
        let target = backups.path().join(backup_file_name(Utc::now()));

        let result = write_atomically(&target, |mut file| {
            file.write_all(b"PK half an archive")?;
            anyhow::bail!("disk full")
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(backups.path()).unwrap().count(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_dump_tables_covers_every_table(pool: sqlx::PgPool) {
        crate::test_utils::create_test_user(&pool, crate::api::models::users::Role::Agent).await;

        let dumps = dump_tables(&pool).await.unwrap();
        let names: Vec<&str> = dumps.iter().map(|d| d.name).collect();
        assert_eq!(names, TABLES);

        let users = dumps.iter().find(|d| d.name == "users").unwrap();
        assert!(!users.rows.as_array().unwrap().is_empty());
        let signatures = dumps.iter().find(|d| d.name == "signatures").unwrap();
        assert_eq!(signatures.rows, json!([]));
    }

    #[test]
    fn test_list_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_backups(&dir.path().join("absent")).unwrap().is_empty());
    }
}
