//! Session routes: login/signup/logout, the current identity and its
//! capability set, and profile/user updates for the signed-in account.

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use models::{Capability, Profile, UpdateProfile};
use remote::{Credentials, UserPatch};
use serde::Deserialize;
use services::services::session::Identity;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, routes::require_identity};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

pub async fn login(
    State(state): State<AppState>,
    axum::Json(credentials): axum::Json<Credentials>,
) -> Result<ResponseJson<ApiResponse<Identity>>, ApiError> {
    let identity = state.sessions.login(credentials).await?;
    Ok(ResponseJson(ApiResponse::success(identity)))
}

pub async fn signup(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<SignupRequest>,
) -> Result<ResponseJson<ApiResponse<Identity>>, ApiError> {
    let identity = state
        .sessions
        .signup(
            Credentials {
                email: payload.email,
                password: payload.password,
            },
            payload.name,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(identity)))
}

pub async fn logout(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.sessions.logout().await;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn session(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Option<Identity>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(
        state.sessions.identity().await,
    )))
}

pub async fn refresh(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Option<Identity>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(
        state.sessions.refresh().await?,
    )))
}

/// Capability set for the signed-in role, so the SPA can hide controls that
/// the server would reject anyway.
pub async fn capabilities(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Capability>>>, ApiError> {
    let identity = require_identity(&state).await?;
    Ok(ResponseJson(ApiResponse::success(
        identity.role.capabilities(),
    )))
}

pub async fn update_user(
    State(state): State<AppState>,
    axum::Json(patch): axum::Json<UserPatch>,
) -> Result<ResponseJson<ApiResponse<Identity>>, ApiError> {
    let identity = state.sessions.update_user(patch).await?;
    Ok(ResponseJson(ApiResponse::success(identity)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<UpdateProfile>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    require_identity(&state).await?;
    let profile = state.sessions.update_profile(data).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/login", post(login))
            .route("/signup", post(signup))
            .route("/logout", post(logout))
            .route("/session", get(session))
            .route("/refresh", post(refresh))
            .route("/capabilities", get(capabilities))
            .route("/user", put(update_user))
            .route("/profile", put(update_profile)),
    )
}
