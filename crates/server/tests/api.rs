use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use remote::MemoryRemote;
use serde_json::json;
use server::{AppState, routes};
use services::services::{
    board::BoardRegistry,
    files::FileService,
    gateway::Gateway,
    session::{MemorySessionStore, SessionService},
};
use tower::ServiceExt;
use uuid::Uuid;

fn app(remote: Arc<MemoryRemote>) -> (Router, AppState) {
    let gateway = Gateway::new(remote.clone());
    let state = AppState {
        gateway: gateway.clone(),
        sessions: Arc::new(SessionService::new(
            remote.clone(),
            gateway.clone(),
            Arc::new(MemorySessionStore::default()),
        )),
        boards: Arc::new(BoardRegistry::new(gateway.clone())),
        files: Arc::new(FileService::new(remote, gateway)),
    };
    (routes::router(state.clone()), state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn login(app: &Router, email: &str) {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            json!({"email": email, "password": "pw"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn project_list_requires_a_session() {
    let remote = Arc::new(MemoryRemote::new());
    let (app, _state) = app(remote);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/projects")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_unlocks_the_api() {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed_user("sam@taskboard.dev", "pw", json!({}));
    let (app, _state) = app(remote);

    login(&app, "sam@taskboard.dev").await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/projects")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn column_creation_is_rejected_for_plain_users() {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed_user("sam@taskboard.dev", "pw", json!({"role": "user"}));
    let (app, _state) = app(remote);
    let project_id = Uuid::new_v4();

    login(&app, "sam@taskboard.dev").await;
    let response = app
        .oneshot(post_json(
            &format!("/api/projects/{project_id}/board/columns"),
            json!({"title": "Blocked", "projectId": project_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_can_create_columns() {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed_user("ana@taskboard.dev", "pw", json!({"role": "admin"}));
    let (app, state) = app(remote.clone());
    let project_id = Uuid::new_v4();

    login(&app, "ana@taskboard.dev").await;
    let response = app
        .oneshot(post_json(
            &format!("/api/projects/{project_id}/board/columns"),
            json!({"title": "Todo", "projectId": project_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    state.boards.open(project_id).await.unwrap().flush().await;
    assert_eq!(remote.rows("columns").len(), 1);
}
