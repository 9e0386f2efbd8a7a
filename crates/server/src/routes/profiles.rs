use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use models::{Capability, Profile, UpdateProfile};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    routes::{require_capability, require_identity},
};

pub async fn get_profiles(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Profile>>>, ApiError> {
    require_identity(&state).await?;
    let profiles = state.gateway.profiles().await?;
    Ok(ResponseJson(ApiResponse::success(profiles)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    require_identity(&state).await?;
    let profile = state
        .gateway
        .find_profile(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("profile {user_id}")))?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// Admin edit of another user's profile, including role changes. Users edit
/// their own profile through the session routes.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    axum::Json(data): axum::Json<UpdateProfile>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let identity = require_identity(&state).await?;
    if identity.user_id != user_id || data.role.is_some() {
        require_capability(&identity, Capability::ManageMembers)?;
    }
    let role = data.role;
    let profile = state.gateway.update_profile(user_id, data).await?;
    if let Some(role) = role {
        state.sessions.sync_role(user_id, role).await?;
    }
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let identity = require_identity(&state).await?;
    require_capability(&identity, Capability::ManageMembers)?;
    if identity.user_id == user_id {
        return Err(ApiError::BadRequest(
            "cannot delete the signed-in account".to_string(),
        ));
    }
    state.sessions.delete_account(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profiles", get(get_profiles))
        .route(
            "/profiles/{user_id}",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
}
