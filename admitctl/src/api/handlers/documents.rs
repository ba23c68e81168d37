use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use super::students::load_student;
use crate::{
    AppState,
    api::models::{
        documents::{DocumentResponse, DocumentUpload, UploadResponse},
        users::CurrentUser,
    },
    db::{
        handlers::Documents,
        models::{documents::StudentDocumentDBRequest, file_storage::FileStorageRequest},
    },
    errors::{Error, Result},
    types::{StudentId, abbrev_uuid},
};

fn multipart_error(err: MultipartError) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge {
            message: "Uploaded file is too large".to_string(),
        }
    } else {
        Error::BadRequest {
            message: format!("Invalid multipart upload: {}", err.body_text()),
        }
    }
}

struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    content: Vec<u8>,
}

/// Upload or replace one document of a student
#[utoipa::path(
    post,
    path = "/students/{student_id}/upload",
    tag = "documents",
    summary = "Upload document",
    request_body(content = DocumentUpload, content_type = "multipart/form-data"),
    params(("student_id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Document stored", body = UploadResponse),
        (status = 400, description = "Missing field or file type not allowed"),
        (status = 403, description = "Agents can only upload for their own students"),
        (status = 404, description = "Student not found"),
        (status = 413, description = "File exceeds the upload limit"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id)))]
pub async fn upload_document(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        load_student(&mut conn, &current_user, student_id).await?;
    }

    let max_size = state.config.storage.max_upload_size;
    let mut document_type = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("document_type") => {
                document_type = Some(field.text().await.map_err(multipart_error)?.trim().to_string());
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let content = field.bytes().await.map_err(multipart_error)?;
                upload = Some(UploadedFile {
                    file_name,
                    content_type,
                    content: content.to_vec(),
                });
            }
            _ => {}
        }
    }

    let document_type = document_type.filter(|t| !t.is_empty()).ok_or_else(|| Error::BadRequest {
        message: "document_type is required".to_string(),
    })?;
    let upload = upload.ok_or_else(|| Error::BadRequest {
        message: "file is required".to_string(),
    })?;

    if !state.config.is_allowed_extension(&upload.file_name) {
        let allowed = state
            .config
            .storage
            .allowed_extensions
            .iter()
            .map(|ext| ext.to_uppercase())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::BadRequest {
            message: format!("Only {allowed} files are allowed"),
        });
    }
    if upload.content.is_empty() {
        return Err(Error::BadRequest {
            message: "Uploaded file is empty".to_string(),
        });
    }
    if upload.content.len() > max_size {
        return Err(Error::PayloadTooLarge {
            message: format!("File exceeds the maximum upload size of {max_size} bytes"),
        });
    }

    let content_type = upload
        .content_type
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .unwrap_or_else(|| mime_guess::from_path(&upload.file_name).first_or_octet_stream().to_string());

    let stored = state
        .storage
        .store(FileStorageRequest {
            student_id,
            document_type: document_type.clone(),
            file_name: upload.file_name.clone(),
            content: upload.content,
        })
        .await?;

    let saved = async {
        let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
        let result = Documents::new(&mut tx)
            .upsert(&StudentDocumentDBRequest {
                student_id,
                document_type: document_type.clone(),
                file_name: upload.file_name,
                content_type,
                size_bytes: stored.size_bytes,
                storage_key: stored.storage_key.clone(),
                uploaded_by: current_user.id,
            })
            .await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        Ok::<_, Error>(result)
    }
    .await;

    // Nothing references the new file unless the metadata committed
    let (document, replaced) = match saved {
        Ok(result) => result,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&stored.storage_key).await {
                warn!(storage_key = %stored.storage_key, error = %cleanup, "Failed to remove orphaned upload");
            }
            return Err(e);
        }
    };

    if let Some(old_key) = replaced
        && let Err(e) = state.storage.delete(&old_key).await
    {
        warn!(storage_key = %old_key, error = %e, "Failed to remove replaced document");
    }

    info!(document_type = %document_type, size = document.size_bytes, "Document uploaded");
    Ok(Json(UploadResponse {
        message: "Document uploaded successfully".to_string(),
        document: document.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/students/{student_id}/documents",
    tag = "documents",
    summary = "List documents",
    params(("student_id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Documents of the student", body = Vec<DocumentResponse>),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Student not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id)))]
pub async fn list_documents(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    load_student(&mut conn, &current_user, student_id).await?;

    let documents = Documents::new(&mut conn).list_for_student(student_id).await?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/students/{student_id}/documents/{document_type}/download",
    tag = "documents",
    summary = "Download document",
    params(
        ("student_id" = String, Path, description = "Student ID"),
        ("document_type" = String, Path, description = "Document type, e.g. transcript"),
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Student or document not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(student_id = %abbrev_uuid(&student_id), document_type = %document_type))]
pub async fn download_document(
    State(state): State<AppState>,
    Path((student_id, document_type)): Path<(StudentId, String)>,
    current_user: CurrentUser,
) -> Result<Response> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    load_student(&mut conn, &current_user, student_id).await?;

    let not_found = || Error::NotFound {
        resource: "Document".to_string(),
        id: format!("{student_id}/{document_type}"),
    };
    let document = Documents::new(&mut conn)
        .get(student_id, &document_type)
        .await?
        .ok_or_else(not_found)?;
    drop(conn);

    if !state.storage.exists(&document.storage_key).await? {
        warn!(storage_key = %document.storage_key, "Document metadata without stored file");
        return Err(not_found());
    }
    let content = state.storage.retrieve(&document.storage_key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, document.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.file_name.replace('"', "")),
            ),
        ],
        Body::from(content),
    )
        .into_response())
}
