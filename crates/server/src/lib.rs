pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use services::services::{
    board::BoardRegistry, files::FileService, gateway::Gateway, session::SessionService,
};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub sessions: Arc<SessionService>,
    pub boards: Arc<BoardRegistry>,
    pub files: Arc<FileService>,
}
