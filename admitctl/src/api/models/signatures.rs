//! API models for reviewer signatures.

use super::students::SignatureType;
use crate::db::models::signatures::SignatureDBResponse;
use crate::errors::Error;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Form body for `POST /api/admin/signature`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignatureForm {
    /// Image as a `data:image/...;base64,` URL
    pub signature_data: String,
    #[serde(default)]
    pub signature_type: SignatureType,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignatureResponse {
    pub signature_data: String,
    pub signature_type: SignatureType,
    pub updated_at: DateTime<Utc>,
}

impl From<SignatureDBResponse> for SignatureResponse {
    fn from(db: SignatureDBResponse) -> Self {
        Self {
            signature_data: db.signature_data,
            signature_type: db.signature_type,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignatureSaved {
    pub message: String,
    pub signature: SignatureResponse,
}

/// Check that `data` is a base64 image data URL and return the trimmed value
pub fn validate_signature_data(data: &str) -> Result<String, Error> {
    let data = data.trim();
    let invalid = |message: &str| Error::BadRequest {
        message: message.to_string(),
    };

    if data.is_empty() {
        return Err(invalid("Signature is required"));
    }
    let rest = data
        .strip_prefix("data:image/")
        .ok_or_else(|| invalid("Signature must be an image data URL"))?;
    let (_, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| invalid("Signature must be base64 encoded"))?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| invalid("Signature is not valid base64"))?;
    if decoded.is_empty() {
        return Err(invalid("Signature image is empty"));
    }

    Ok(data.to_string())
}
