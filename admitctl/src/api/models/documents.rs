//! API models for student document uploads.

use crate::db::models::documents::StudentDocumentDBResponse;
use crate::types::StudentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart body for `POST /api/students/{id}/upload`
#[derive(Debug, ToSchema)]
#[allow(dead_code)] // documents the multipart schema only
pub struct DocumentUpload {
    /// e.g. `transcript`, `id_proof`, `marksheet`, `photo`
    pub document_type: String,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub student_id: StudentId,
    pub document_type: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
    pub download_url: String,
}

impl From<StudentDocumentDBResponse> for DocumentResponse {
    fn from(db: StudentDocumentDBResponse) -> Self {
        Self {
            download_url: format!("/api/students/{}/documents/{}/download", db.student_id, db.document_type),
            student_id: db.student_id,
            document_type: db.document_type,
            file_name: db.file_name,
            content_type: db.content_type,
            size_bytes: db.size_bytes,
            uploaded_at: db.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub document: DocumentResponse,
}
