use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use remote::RemoteError;
use services::services::{
    board::BoardError, files::FileServiceError, session::SessionError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    File(#[from] FileServiceError),
    #[error("authentication required")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Board(BoardError::Forbidden(_)) => StatusCode::FORBIDDEN,
            ApiError::Board(BoardError::EmptyTitle)
            | ApiError::Board(BoardError::IndexOutOfBounds { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Board(BoardError::UnknownColumn(_))
            | ApiError::Board(BoardError::UnknownTask(_)) => StatusCode::NOT_FOUND,
            ApiError::Board(BoardError::Remote(err)) => remote_status(err),
            ApiError::Session(SessionError::NotAuthenticated) => StatusCode::UNAUTHORIZED,
            ApiError::Session(SessionError::Remote(err)) => remote_status(err),
            ApiError::Remote(err) => remote_status(err),
            ApiError::File(FileServiceError::InvalidPayload(_)) => StatusCode::BAD_REQUEST,
            ApiError::File(FileServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::File(FileServiceError::Remote(err)) => remote_status(err),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

fn remote_status(err: &RemoteError) -> StatusCode {
    match err {
        RemoteError::NoData => StatusCode::NOT_FOUND,
        RemoteError::Auth(_) | RemoteError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ApiResponse::<()>::error(self.to_string()));
        (status, body).into_response()
    }
}
