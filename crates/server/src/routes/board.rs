//! Board routes: snapshot/reload, drag-and-drop moves, and the structural
//! column/task operations. Capability checks run here and in the board
//! service; the client-side gate is a UX convenience only.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use models::{
    BoardColumn, CreateBoardColumn, CreateTask, Task, TaskAssociations, UpdateBoardColumn,
    UpdateTask,
};
use serde::Deserialize;
use services::services::board::{BoardSnapshot, MoveOutcome, MoveRequest};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, routes::require_identity};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

pub async fn get_board(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<BoardSnapshot>>, ApiError> {
    require_identity(&state).await?;
    let board = state.boards.open(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(board.snapshot().await)))
}

pub async fn reload_board(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<BoardSnapshot>>, ApiError> {
    require_identity(&state).await?;
    let board = state.boards.open(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(board.reload().await?)))
}

pub async fn move_item(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    axum::Json(request): axum::Json<MoveRequest>,
) -> Result<ResponseJson<ApiResponse<MoveOutcome>>, ApiError> {
    require_identity(&state).await?;
    let board = state.boards.open(project_id).await?;
    let outcome = board.move_item(request).await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

pub async fn add_column(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateBoardColumn>,
) -> Result<ResponseJson<ApiResponse<BoardColumn>>, ApiError> {
    let identity = require_identity(&state).await?;
    if payload.project_id != project_id {
        return Err(ApiError::BadRequest(
            "column project does not match the route".to_string(),
        ));
    }
    let board = state.boards.open(project_id).await?;
    let column = board.add_column(&identity, &payload.title).await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

pub async fn edit_column(
    State(state): State<AppState>,
    Path((project_id, column_id)): Path<(Uuid, Uuid)>,
    axum::Json(payload): axum::Json<UpdateBoardColumn>,
) -> Result<ResponseJson<ApiResponse<BoardColumn>>, ApiError> {
    let identity = require_identity(&state).await?;
    let title = payload
        .title
        .ok_or_else(|| ApiError::BadRequest("a new column title is required".to_string()))?;
    let board = state.boards.open(project_id).await?;
    let column = board.edit_column(&identity, column_id, &title).await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

pub async fn delete_column(
    State(state): State<AppState>,
    Path((project_id, column_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let identity = require_identity(&state).await?;
    let board = state.boards.open(project_id).await?;
    board.delete_column(&identity, column_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn add_task(
    State(state): State<AppState>,
    Path((project_id, column_id)): Path<(Uuid, Uuid)>,
    axum::Json(data): axum::Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let identity = require_identity(&state).await?;
    let board = state.boards.open(project_id).await?;
    let draft_id = data.draft_id;
    let task = board.add_task(&identity, column_id, data).await?;
    if let Some(draft_id) = draft_id {
        state.files.promote_drafts(draft_id, task.id).await?;
    }
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn edit_task(
    State(state): State<AppState>,
    Path((project_id, column_id, task_id)): Path<(Uuid, Uuid, Uuid)>,
    axum::Json(data): axum::Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let identity = require_identity(&state).await?;
    let board = state.boards.open(project_id).await?;
    let task = board.edit_task(&identity, column_id, task_id, data).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path((project_id, column_id, task_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let identity = require_identity(&state).await?;
    let board = state.boards.open(project_id).await?;
    board.delete_task(&identity, column_id, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn task_associations(
    State(state): State<AppState>,
    Path((_project_id, _column_id, task_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<TaskAssociations>>, ApiError> {
    require_identity(&state).await?;
    let associations = state.gateway.associations_for_task(task_id).await?;
    Ok(ResponseJson(ApiResponse::success(associations)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToColumnRequest {
    pub column_id: Uuid,
    pub order: i32,
}

/// Direct persisted move through the single-task helper, bypassing the
/// board's local state. Used by clients that are not holding a live board.
pub async fn move_task_to_column(
    State(state): State<AppState>,
    Path((_project_id, task_id)): Path<(Uuid, Uuid)>,
    axum::Json(payload): axum::Json<MoveToColumnRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    require_identity(&state).await?;
    let task = state
        .gateway
        .move_to_column(task_id, payload.column_id, payload.order)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn set_completion(
    State(state): State<AppState>,
    Path((project_id, column_id, task_id)): Path<(Uuid, Uuid, Uuid)>,
    axum::Json(payload): axum::Json<CompletionRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let identity = require_identity(&state).await?;
    let board = state.boards.open(project_id).await?;
    let task = board
        .set_task_completion(
            &identity,
            column_id,
            task_id,
            payload.completed,
            payload.completed_at,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/projects/{project_id}/board",
        Router::new()
            .route("/", get(get_board))
            .route("/reload", post(reload_board))
            .route("/move", post(move_item))
            .route("/columns", post(add_column))
            .route(
                "/columns/{column_id}",
                put(edit_column).delete(delete_column),
            )
            .route("/columns/{column_id}/tasks", post(add_task))
            .route(
                "/columns/{column_id}/tasks/{task_id}",
                put(edit_task).delete(delete_task),
            )
            .route(
                "/columns/{column_id}/tasks/{task_id}/completion",
                post(set_completion),
            )
            .route(
                "/columns/{column_id}/tasks/{task_id}/associations",
                get(task_associations),
            )
            .route("/tasks/{task_id}/move", post(move_task_to_column)),
    )
}
