//! API models for backups and exports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BackupInfo {
    pub filename: String,
    /// Bytes
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BackupCreated {
    pub message: String,
    pub backup: BackupInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BackupList {
    pub backups: Vec<BackupInfo>,
}

/// Query for `GET /api/admin/export/excel`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ExportQuery {
    /// A student status, or `all`
    pub status: Option<String>,
    pub course: Option<String>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub agent_id: Option<uuid::Uuid>,
    /// `YYYY-MM-DD`, inclusive
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    pub end_date: Option<String>,
}
