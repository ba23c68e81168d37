use axum::{Json, extract::State};
use tracing::info;

use crate::{
    AppState,
    api::form::FormData,
    api::models::{
        signatures::{SignatureForm, SignatureResponse, SignatureSaved, validate_signature_data},
        users::CurrentUser,
    },
    auth::permissions::require_reviewer,
    db::{handlers::Signatures, models::signatures::SignatureUpsertDBRequest},
    errors::{Error, Result},
    types::Resource,
};

/// The caller's saved signature
#[utoipa::path(
    get,
    path = "/admin/signature",
    tag = "signatures",
    summary = "Get saved signature",
    responses(
        (status = 200, description = "Saved signature", body = SignatureResponse),
        (status = 403, description = "Coordinator or admin access required"),
        (status = 404, description = "No signature saved yet"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_signature(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SignatureResponse>> {
    require_reviewer(&current_user, Resource::Signatures)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let signature = Signatures::new(&mut conn)
        .get(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Signature".to_string(),
            id: current_user.id.to_string(),
        })?;

    Ok(Json(signature.into()))
}

/// Save or replace the caller's signature, used when a review form carries none
#[utoipa::path(
    post,
    path = "/admin/signature",
    tag = "signatures",
    summary = "Save signature",
    request_body(content = SignatureForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Signature saved", body = SignatureSaved),
        (status = 400, description = "Not a base64 image data URL"),
        (status = 403, description = "Coordinator or admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn save_signature(
    State(state): State<AppState>,
    current_user: CurrentUser,
    FormData(form): FormData<SignatureForm>,
) -> Result<Json<SignatureSaved>> {
    require_reviewer(&current_user, Resource::Signatures)?;
    let signature_data = validate_signature_data(&form.signature_data)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let signature = Signatures::new(&mut conn)
        .upsert(&SignatureUpsertDBRequest {
            user_id: current_user.id,
            signature_data,
            signature_type: form.signature_type,
        })
        .await?;

    info!(signature_type = ?signature.signature_type, "Signature saved");
    Ok(Json(SignatureSaved {
        message: "Signature saved successfully".to_string(),
        signature: signature.into(),
    }))
}
