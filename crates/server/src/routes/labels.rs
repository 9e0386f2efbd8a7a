use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get},
};
use models::{Capability, CreateLabel, Label};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    routes::{require_capability, require_identity},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelFilter {
    pub organization_id: Option<Uuid>,
}

pub async fn get_labels(
    State(state): State<AppState>,
    Query(filter): Query<LabelFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Label>>>, ApiError> {
    require_identity(&state).await?;
    let labels = state.gateway.labels(filter.organization_id).await?;
    Ok(ResponseJson(ApiResponse::success(labels)))
}

pub async fn create_label(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateLabel>,
) -> Result<ResponseJson<ApiResponse<Label>>, ApiError> {
    require_identity(&state).await?;
    let label = state.gateway.create_label(data).await?;
    Ok(ResponseJson(ApiResponse::success(label)))
}

pub async fn delete_label(
    State(state): State<AppState>,
    Path(label_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let identity = require_identity(&state).await?;
    require_capability(&identity, Capability::ManageColumns)?;
    state.gateway.delete_label(label_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/labels", get(get_labels).post(create_label))
        .route("/labels/{label_id}", delete(delete_label))
}
