pub mod auth;
pub mod board;
pub mod files;
pub mod labels;
pub mod organizations;
pub mod profiles;
pub mod projects;

use axum::Router;
use models::Capability;
use services::services::session::Identity;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{AppState, error::ApiError};

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(board::router())
        .merge(files::router())
        .merge(labels::router())
        .merge(organizations::router())
        .merge(profiles::router())
        .merge(projects::router());

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) async fn require_identity(state: &AppState) -> Result<Identity, ApiError> {
    state
        .sessions
        .identity()
        .await
        .ok_or(ApiError::Unauthorized)
}

pub(crate) fn require_capability(
    identity: &Identity,
    capability: Capability,
) -> Result<(), ApiError> {
    if identity.role.allows(capability) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "requires the {capability} capability"
        )))
    }
}
