use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use models::{Capability, CreateProject, Profile, Project, UpdateProject};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    routes::{require_capability, require_identity},
};

pub async fn get_projects(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    require_identity(&state).await?;
    let projects = state.gateway.projects().await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    require_identity(&state).await?;
    let project = state
        .gateway
        .find_project(project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("project {project_id}")))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn create_project(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let identity = require_identity(&state).await?;
    let project = state.gateway.create_project(identity.user_id, data).await?;
    state
        .gateway
        .add_project_member(project.id, identity.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    axum::Json(data): axum::Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    require_identity(&state).await?;
    let project = state.gateway.update_project(project_id, data).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let identity = require_identity(&state).await?;
    require_capability(&identity, Capability::ManageColumns)?;
    state.boards.close(project_id);
    state.gateway.delete_project(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_members(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Profile>>>, ApiError> {
    require_identity(&state).await?;
    let members = state.gateway.project_members(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

pub async fn add_member(
    State(state): State<AppState>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let identity = require_identity(&state).await?;
    require_capability(&identity, Capability::ManageMembers)?;
    state.gateway.add_project_member(project_id, user_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let identity = require_identity(&state).await?;
    require_capability(&identity, Capability::ManageMembers)?;
    state
        .gateway
        .remove_project_member(project_id, user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(get_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{project_id}/members", get(get_members))
        .route(
            "/projects/{project_id}/members/{user_id}",
            post(add_member).delete(remove_member),
        )
}
