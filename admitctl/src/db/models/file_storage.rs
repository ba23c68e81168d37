use crate::types::StudentId;

/// Request to store uploaded document content
#[derive(Debug, Clone)]
pub struct FileStorageRequest {
    pub student_id: StudentId,
    pub document_type: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Response from storing document content
#[derive(Debug, Clone)]
pub struct FileStorageResponse {
    /// Key relative to the storage root, e.g. `<student_id>/transcript/<upload_id>_marks.pdf`
    pub storage_key: String,
    pub size_bytes: i64,
}
