use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use models::{Capability, CreateOrganization, Organization, Profile, Project, UpdateOrganization};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    routes::{require_capability, require_identity},
};

pub async fn get_organizations(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Organization>>>, ApiError> {
    require_identity(&state).await?;
    let organizations = state.gateway.organizations().await?;
    Ok(ResponseJson(ApiResponse::success(organizations)))
}

pub async fn create_organization(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateOrganization>,
) -> Result<ResponseJson<ApiResponse<Organization>>, ApiError> {
    let identity = require_identity(&state).await?;
    let organization = state
        .gateway
        .create_organization(identity.user_id, data)
        .await?;
    Ok(ResponseJson(ApiResponse::success(organization)))
}

pub async fn update_organization(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
    axum::Json(data): axum::Json<UpdateOrganization>,
) -> Result<ResponseJson<ApiResponse<Organization>>, ApiError> {
    let identity = require_identity(&state).await?;
    require_capability(&identity, Capability::ManageMembers)?;
    let organization = state
        .gateway
        .update_organization(organization_id, data)
        .await?;
    Ok(ResponseJson(ApiResponse::success(organization)))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let identity = require_identity(&state).await?;
    require_capability(&identity, Capability::ManageMembers)?;
    state.gateway.delete_organization(organization_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_organization_projects(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    require_identity(&state).await?;
    let projects = state
        .gateway
        .projects_for_organization(organization_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_organization_members(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Profile>>>, ApiError> {
    require_identity(&state).await?;
    let members = state.gateway.organization_members(organization_id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations",
            get(get_organizations).post(create_organization),
        )
        .route(
            "/organizations/{organization_id}",
            axum::routing::put(update_organization).delete(delete_organization),
        )
        .route(
            "/organizations/{organization_id}/projects",
            get(get_organization_projects),
        )
        .route(
            "/organizations/{organization_id}/members",
            get(get_organization_members),
        )
}
