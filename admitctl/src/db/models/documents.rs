//! Database models for uploaded student documents.

use crate::types::{StudentId, UserId};
use chrono::{DateTime, Utc};

/// Metadata recorded after the file bytes have been stored
#[derive(Debug, Clone)]
pub struct StudentDocumentDBRequest {
    pub student_id: StudentId,
    pub document_type: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub uploaded_by: UserId,
}

#[derive(Debug, Clone)]
pub struct StudentDocumentDBResponse {
    pub student_id: StudentId,
    pub document_type: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub uploaded_by: Option<UserId>,
    pub uploaded_at: DateTime<Utc>,
}
