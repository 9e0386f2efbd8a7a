use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RemoteError;

/// Authenticated user as the auth provider reports it. Role may live in the
/// profile table, in `user_metadata` or in `app_metadata`; the session service
/// resolves the precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
    pub user_metadata: Option<Value>,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in_with_password(&self, credentials: Credentials)
    -> Result<AuthSession, RemoteError>;

    async fn sign_up(&self, credentials: Credentials) -> Result<AuthSession, RemoteError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError>;

    /// Returns the current session for a previously issued token, or `None`
    /// when the token has expired or been revoked.
    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>, RemoteError>;

    async fn update_user(
        &self,
        access_token: &str,
        patch: UserPatch,
    ) -> Result<AuthUser, RemoteError>;

    /// Admin surface: mutate another user by id.
    async fn update_user_by_id(&self, id: Uuid, patch: UserPatch) -> Result<AuthUser, RemoteError>;

    /// Admin surface: delete a user account.
    async fn delete_user(&self, id: Uuid) -> Result<(), RemoteError>;
}
