use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use models::{Attachment, CreateAttachment};
use serde::{Deserialize, Serialize};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, routes::require_identity};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarRequest {
    pub name: String,
    pub content_type: String,
    /// Base64-encoded file body.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarResponse {
    pub url: String,
}

fn decode_body(content: &str) -> Result<Vec<u8>, ApiError> {
    STANDARD
        .decode(content)
        .map_err(|err| ApiError::BadRequest(format!("invalid base64 body: {err}")))
}

pub async fn upload_attachment(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateAttachment>,
) -> Result<ResponseJson<ApiResponse<Attachment>>, ApiError> {
    require_identity(&state).await?;
    let bytes = decode_body(&payload.data)?;
    let attachment = state
        .files
        .attach(payload.target, &payload.name, &payload.content_type, bytes)
        .await?;
    Ok(ResponseJson(ApiResponse::success(attachment)))
}

pub async fn get_task_attachments(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Attachment>>>, ApiError> {
    require_identity(&state).await?;
    let attachments = state.gateway.attachments_for_task(task_id).await?;
    Ok(ResponseJson(ApiResponse::success(attachments)))
}

pub async fn get_draft_attachments(
    State(state): State<AppState>,
    Path(draft_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Attachment>>>, ApiError> {
    require_identity(&state).await?;
    Ok(ResponseJson(ApiResponse::success(
        state.files.draft_attachments(draft_id),
    )))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    Path((task_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require_identity(&state).await?;
    state.files.delete_attachment(task_id, attachment_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<AvatarRequest>,
) -> Result<ResponseJson<ApiResponse<AvatarResponse>>, ApiError> {
    let identity = require_identity(&state).await?;
    let bytes = decode_body(&payload.data)?;
    let url = state
        .files
        .upload_avatar(
            identity.user_id,
            &payload.name,
            &payload.content_type,
            bytes,
        )
        .await?;
    // The session keeps the refreshed avatar without a full re-login.
    state.sessions.refresh().await.ok();
    Ok(ResponseJson(ApiResponse::success(AvatarResponse { url })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files", post(upload_attachment))
        .route("/files/tasks/{task_id}", get(get_task_attachments))
        .route("/files/drafts/{draft_id}", get(get_draft_attachments))
        .route(
            "/files/tasks/{task_id}/{attachment_id}",
            delete(delete_attachment),
        )
        .route("/files/avatar", post(upload_avatar))
}
