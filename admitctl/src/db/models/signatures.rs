//! Database models for reviewer signatures.

use crate::api::models::students::SignatureType;
use crate::types::UserId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct SignatureUpsertDBRequest {
    pub user_id: UserId,
    pub signature_data: String,
    pub signature_type: SignatureType,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignatureDBResponse {
    pub user_id: UserId,
    pub signature_data: String,
    pub signature_type: SignatureType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
