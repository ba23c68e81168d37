//! Metadata for uploaded student documents.
//!
//! One row per (student, document type). Re-uploading the same type replaces the
//! previous record; the bytes themselves live in [`super::file_storage`].

use crate::db::{
    errors::Result,
    models::documents::{StudentDocumentDBRequest, StudentDocumentDBResponse},
};
use crate::types::{StudentId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct StudentDocument {
    pub student_id: StudentId,
    pub document_type: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub uploaded_by: Option<UserId>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<StudentDocument> for StudentDocumentDBResponse {
    fn from(d: StudentDocument) -> Self {
        Self {
            student_id: d.student_id,
            document_type: d.document_type,
            file_name: d.file_name,
            content_type: d.content_type,
            size_bytes: d.size_bytes,
            storage_key: d.storage_key,
            uploaded_by: d.uploaded_by,
            uploaded_at: d.uploaded_at,
        }
    }
}

pub struct Documents<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Documents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert or replace the document of this type. Returns the new row and the
    /// storage key it replaced, if that key differs.
    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&request.student_id), document_type = %request.document_type), err)]
    pub async fn upsert(&mut self, request: &StudentDocumentDBRequest) -> Result<(StudentDocumentDBResponse, Option<String>)> {
        let previous = sqlx::query_scalar::<_, String>(
            "SELECT storage_key FROM student_documents WHERE student_id = $1 AND document_type = $2 FOR UPDATE",
        )
        .bind(request.student_id)
        .bind(&request.document_type)
        .fetch_optional(&mut *self.db)
        .await?;

        let document = sqlx::query_as::<_, StudentDocument>(
            r#"
            INSERT INTO student_documents (student_id, document_type, file_name, content_type, size_bytes, storage_key, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (student_id, document_type) DO UPDATE SET
                file_name = EXCLUDED.file_name,
                content_type = EXCLUDED.content_type,
                size_bytes = EXCLUDED.size_bytes,
                storage_key = EXCLUDED.storage_key,
                uploaded_by = EXCLUDED.uploaded_by,
                uploaded_at = NOW()
            RETURNING *
            "#,
        )
        .bind(request.student_id)
        .bind(&request.document_type)
        .bind(&request.file_name)
        .bind(&request.content_type)
        .bind(request.size_bytes)
        .bind(&request.storage_key)
        .bind(request.uploaded_by)
        .fetch_one(&mut *self.db)
        .await?;

        let replaced = previous.filter(|key| *key != document.storage_key);
        Ok((document.into(), replaced))
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn get(&mut self, student_id: StudentId, document_type: &str) -> Result<Option<StudentDocumentDBResponse>> {
        let document = sqlx::query_as::<_, StudentDocument>(
            "SELECT * FROM student_documents WHERE student_id = $1 AND document_type = $2",
        )
        .bind(student_id)
        .bind(document_type)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(document.map(Into::into))
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn list_for_student(&mut self, student_id: StudentId) -> Result<Vec<StudentDocumentDBResponse>> {
        let documents = sqlx::query_as::<_, StudentDocument>(
            "SELECT * FROM student_documents WHERE student_id = $1 ORDER BY document_type",
        )
        .bind(student_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    /// Documents for many students at once, grouped by student
    #[instrument(skip(self, student_ids), fields(count = student_ids.len()), err)]
    pub async fn list_for_students(&mut self, student_ids: &[StudentId]) -> Result<HashMap<StudentId, Vec<StudentDocumentDBResponse>>> {
        if student_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let documents = sqlx::query_as::<_, StudentDocument>(
            "SELECT * FROM student_documents WHERE student_id = ANY($1) ORDER BY document_type",
        )
        .bind(student_ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut grouped: HashMap<StudentId, Vec<StudentDocumentDBResponse>> = HashMap::new();
        for document in documents {
            grouped.entry(document.student_id).or_default().push(document.into());
        }
        Ok(grouped)
    }
}
