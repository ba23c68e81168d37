use crate::db::{
    errors::{DbError, Result},
    models::file_storage::{FileStorageRequest, FileStorageResponse},
};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Trait for document storage backends
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Store document content and return its storage key
    async fn store(&self, request: FileStorageRequest) -> Result<FileStorageResponse>;

    /// Retrieve document content using storage key
    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>>;

    /// Delete document content using storage key
    async fn delete(&self, storage_key: &str) -> Result<()>;

    /// Check if a document exists using storage key
    async fn exists(&self, storage_key: &str) -> Result<bool>;
}

/// Replace anything outside `[A-Za-z0-9._-]` so names can never escape their directory
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Storage key for one upload: `<student_id>/<document_type>/<upload_id>_<file_name>`.
///
/// Each document type has its own directory and every upload its own id, so keys never
/// collide across types and a re-upload never overwrites the bytes of the current row.
pub fn document_key(request: &FileStorageRequest, upload_id: Uuid) -> Result<String> {
    let doc_type = sanitize_component(&request.document_type);
    let file_name = sanitize_component(&request.file_name);
    if doc_type.is_empty() || file_name.is_empty() {
        return Err(DbError::Other(anyhow::anyhow!("document type and file name must be non-empty")));
    }
    Ok(format!("{}/{}/{}_{}", request.student_id, doc_type, upload_id.simple(), file_name))
}

/// Local filesystem storage rooted at `storage.uploads_dir`
pub struct LocalFileStorage {
    base_path: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, storage_key: &str) -> Result<PathBuf> {
        let relative = Path::new(storage_key);
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(DbError::NotFound);
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl DocumentStorage for LocalFileStorage {
    #[instrument(skip(self, request), fields(student_id = %request.student_id, document_type = %request.document_type, size = request.content.len()), err)]
    async fn store(&self, request: FileStorageRequest) -> Result<FileStorageResponse> {
        let storage_key = document_key(&request, Uuid::new_v4())?;
        let full_path = self.resolve(&storage_key)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&request.content).await?;
        file.sync_all().await?;

        Ok(FileStorageResponse {
            storage_key,
            size_bytes: request.content.len() as i64,
        })
    }

    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(storage_key)?;
        Ok(fs::read(&full_path).await?)
    }

    async fn delete(&self, storage_key: &str) -> Result<()> {
        let full_path = self.resolve(storage_key)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, storage_key: &str) -> Result<bool> {
        let full_path = self.resolve(storage_key)?;
        Ok(fs::try_exists(&full_path).await?)
    }
}
